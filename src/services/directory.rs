use std::sync::Arc;

use crate::config::DirectorySettings;
use crate::database::DirectoryStore;
use crate::error::ServiceError;
use crate::models::{AuthState, Business};
use crate::services::{order_by_ids, parse_business_id};

/// Upper bound for a client-requested page
pub const MAX_PAGE_SIZE: i64 = 50;

/// City-scoped listing, detail lookup and visit history
#[derive(Clone)]
pub struct DirectoryService {
    store: Arc<dyn DirectoryStore>,
    settings: DirectorySettings,
}

impl DirectoryService {
    pub fn new(store: Arc<dyn DirectoryStore>, settings: DirectorySettings) -> Self {
        Self { store, settings }
    }

    /// Businesses whose city equals `city` exactly. A blank city never reaches the store.
    pub async fn businesses_in_city(
        &self,
        city: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Business>, ServiceError> {
        if city.trim().is_empty() {
            return Ok(Vec::new());
        }

        let limit = limit
            .unwrap_or(self.settings.page_size)
            .clamp(1, MAX_PAGE_SIZE);
        let businesses = self.store.list_businesses_by_city(city, limit).await?;
        log::debug!("City '{}' matched {} businesses", city, businesses.len());
        Ok(businesses)
    }

    pub async fn cities(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.store.list_cities().await?)
    }

    /// `Ok(None)` is the not-found outcome, for unknown and malformed ids alike.
    pub async fn business_detail(
        &self,
        raw_id: &str,
        session: &AuthState,
    ) -> Result<Option<Business>, ServiceError> {
        let Some(business_id) = parse_business_id(raw_id) else {
            return Ok(None);
        };

        let business = self.store.get_business(business_id).await?;

        if let (Some(business), Some(profile)) = (&business, session.profile()) {
            if let Err(err) = self
                .store
                .record_visit(&profile.id, business.id, self.settings.recent_visits_cap)
                .await
            {
                log::warn!("Failed to record visit for user {}: {err}", profile.id);
            }
        }

        Ok(business)
    }

    pub async fn recently_visited(&self, session: &AuthState) -> Result<Vec<Business>, ServiceError> {
        let profile = session
            .profile()
            .ok_or(crate::error::AuthError::MissingIdentity)?;

        let businesses = self
            .store
            .list_businesses_by_ids(&profile.recently_visited)
            .await?;
        Ok(order_by_ids(&profile.recently_visited, businesses))
    }
}
