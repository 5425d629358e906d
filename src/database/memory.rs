//! In-memory store for unit tests. Mirrors the Postgres unique indexes.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{DirectoryStore, OWNER_UNIQUE, USER_EMAIL_UNIQUE};
use crate::error::StoreError;
use crate::models::{Business, NewBusiness, NewUserProfile, UserProfile};

#[derive(Default)]
struct Tables {
    businesses: Vec<Business>,
    users: Vec<UserProfile>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failing: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail, as if the database went away.
    pub fn fail_all(&self) {
        *self.failing.lock().unwrap() = true;
    }

    pub fn business_count(&self) -> usize {
        self.tables.lock().unwrap().businesses.len()
    }

    pub fn insert_user_raw(&self, profile: UserProfile) {
        self.tables.lock().unwrap().users.push(profile);
    }

    fn check(&self) -> Result<(), StoreError> {
        if *self.failing.lock().unwrap() {
            Err(StoreError::Other("store unavailable".into()))
        } else {
            Ok(())
        }
    }

    fn with_user<T>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut UserProfile) -> T,
    ) -> Result<Option<T>, StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        Ok(tables.users.iter_mut().find(|u| u.id == user_id).map(|user| {
            let out = f(user);
            user.updated_at = Utc::now();
            out
        }))
    }
}

#[async_trait]
impl DirectoryStore for MemoryStore {
    async fn create_business(&self, business: NewBusiness) -> Result<Business, StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        if tables.businesses.iter().any(|b| b.owner_id == business.owner_id) {
            return Err(StoreError::UniqueViolation(OWNER_UNIQUE.into()));
        }

        let record = Business {
            id: business.id,
            name: business.name,
            description: business.description,
            hours: business.hours,
            city: business.city,
            photo_url: business.photo_url,
            owner_id: business.owner_id,
            owner_email: business.owner_email,
            rating: business.rating,
            business_type: business.business_type,
            address: business.address,
            phone: business.phone,
            schedule: business.schedule,
            created_at: business.created_at,
            updated_at: business.updated_at,
        };
        tables.businesses.push(record.clone());
        Ok(record)
    }

    async fn get_business(&self, business_id: Uuid) -> Result<Option<Business>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.businesses.iter().find(|b| b.id == business_id).cloned())
    }

    async fn get_business_for_owner(&self, owner_id: &str) -> Result<Option<Business>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.businesses.iter().find(|b| b.owner_id == owner_id).cloned())
    }

    async fn list_businesses_by_city(
        &self,
        city: &str,
        limit: i64,
    ) -> Result<Vec<Business>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .businesses
            .iter()
            .filter(|b| b.city == city)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn list_businesses_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Business>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .businesses
            .iter()
            .filter(|b| ids.contains(&b.id))
            .cloned()
            .collect())
    }

    async fn list_cities(&self) -> Result<Vec<String>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        let mut cities: Vec<String> = tables.businesses.iter().map(|b| b.city.clone()).collect();
        cities.sort();
        cities.dedup();
        Ok(cities)
    }

    async fn update_business(&self, business: Business) -> Result<Business, StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let existing = tables
            .businesses
            .iter_mut()
            .find(|b| b.id == business.id)
            .ok_or_else(|| StoreError::Other("no such business".into()))?;
        *existing = Business {
            owner_id: existing.owner_id.clone(),
            created_at: existing.created_at,
            updated_at: Utc::now(),
            ..business
        };
        Ok(existing.clone())
    }

    async fn create_user(&self, profile: NewUserProfile) -> Result<UserProfile, StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        if tables.users.iter().any(|u| u.id == profile.id) {
            return Err(StoreError::UniqueViolation("users_pkey".into()));
        }
        if tables.users.iter().any(|u| u.email == profile.email) {
            return Err(StoreError::UniqueViolation(USER_EMAIL_UNIQUE.into()));
        }

        let record = UserProfile {
            id: profile.id,
            email: profile.email,
            display_name: profile.display_name,
            photo_url: profile.photo_url,
            location: profile.location,
            favorites: Vec::new(),
            reviews: Vec::new(),
            recently_visited: Vec::new(),
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        };
        tables.users.push(record.clone());
        Ok(record)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn update_user(&self, profile: UserProfile) -> Result<UserProfile, StoreError> {
        self.with_user(&profile.id.clone(), |user| {
            user.display_name = profile.display_name;
            user.photo_url = profile.photo_url;
            user.location = profile.location;
            user.clone()
        })?
        .ok_or_else(|| StoreError::Other("no such user".into()))
    }

    async fn set_user_location(&self, user_id: &str, city: &str) -> Result<(), StoreError> {
        self.with_user(user_id, |user| user.location = city.to_string())?;
        Ok(())
    }

    async fn add_favorite(
        &self,
        user_id: &str,
        business_id: Uuid,
    ) -> Result<Option<Vec<Uuid>>, StoreError> {
        self.with_user(user_id, |user| {
            if !user.favorites.contains(&business_id) {
                user.favorites.push(business_id);
            }
            user.favorites.clone()
        })
    }

    async fn remove_favorite(
        &self,
        user_id: &str,
        business_id: Uuid,
    ) -> Result<Option<Vec<Uuid>>, StoreError> {
        self.with_user(user_id, |user| {
            user.favorites.retain(|id| *id != business_id);
            user.favorites.clone()
        })
    }

    async fn record_visit(
        &self,
        user_id: &str,
        business_id: Uuid,
        cap: usize,
    ) -> Result<(), StoreError> {
        self.with_user(user_id, |user| {
            user.recently_visited.retain(|id| *id != business_id);
            user.recently_visited.insert(0, business_id);
            user.recently_visited.truncate(cap);
        })?;
        Ok(())
    }
}
