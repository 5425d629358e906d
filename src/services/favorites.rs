use std::sync::Arc;

use crate::database::DirectoryStore;
use crate::error::{AuthError, ServiceError};
use crate::models::{AuthState, Business, FavoriteToggle};
use crate::services::{order_by_ids, parse_business_id};

/// Keeps the favorites set on the caller's profile
#[derive(Clone)]
pub struct FavoritesService {
    store: Arc<dyn DirectoryStore>,
}

impl FavoritesService {
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self { store }
    }

    /// Flips membership of `raw_id` based on the session snapshot.
    ///
    /// Both directions are single idempotent writes, so two toggles computed from the same
    /// snapshot land on the same state as one. Only ids of existing businesses are added;
    /// removal works for orphaned ids too.
    pub async fn toggle(
        &self,
        session: &AuthState,
        raw_id: &str,
    ) -> Result<FavoriteToggle, ServiceError> {
        let Some(profile) = session.profile() else {
            return Ok(FavoriteToggle::Unauthenticated);
        };
        let business_id = parse_business_id(raw_id).ok_or(ServiceError::NotFound("Business"))?;

        let favorites = if profile.has_favorite(business_id) {
            self.store.remove_favorite(&profile.id, business_id).await?
        } else {
            if self.store.get_business(business_id).await?.is_none() {
                return Err(ServiceError::NotFound("Business"));
            }
            self.store.add_favorite(&profile.id, business_id).await?
        };
        let favorites = favorites.ok_or(AuthError::ProfileNotFound)?;

        let is_favorite = favorites.contains(&business_id);
        log::debug!(
            "User {} favorite {} -> {}",
            profile.id,
            business_id,
            is_favorite
        );

        Ok(FavoriteToggle::Updated {
            business_id,
            is_favorite,
            favorites,
        })
    }

    /// Favorite businesses in list order; ids whose business is gone are skipped.
    pub async fn favorite_businesses(&self, session: &AuthState) -> Result<Vec<Business>, ServiceError> {
        let profile = session.profile().ok_or(AuthError::MissingIdentity)?;

        let businesses = self.store.list_businesses_by_ids(&profile.favorites).await?;
        Ok(order_by_ids(&profile.favorites, businesses))
    }
}
