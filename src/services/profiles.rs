use std::sync::Arc;

use validator::{Validate, ValidateEmail};

use crate::database::{DirectoryStore, USER_EMAIL_UNIQUE};
use crate::error::{AuthError, ServiceError, StoreError};
use crate::models::{AuthState, RegisterUserRequest, UpdateProfileRequest, UserProfile};

/// Session resolution and the profile lifecycle
#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn DirectoryStore>,
    default_city: String,
}

impl ProfileService {
    pub fn new(store: Arc<dyn DirectoryStore>, default_city: impl Into<String>) -> Self {
        Self {
            store,
            default_city: default_city.into(),
        }
    }

    /// Merges the provider identity with the stored profile. No identity, or an identity
    /// that never registered a profile, is an unauthenticated session.
    pub async fn resolve_session(&self, identity: Option<&str>) -> Result<AuthState, ServiceError> {
        let Some(user_id) = identity else {
            return Ok(AuthState::Unauthenticated);
        };

        Ok(match self.store.get_user(user_id).await? {
            Some(profile) => AuthState::Authenticated { profile },
            None => {
                log::debug!("Identity {user_id} has no profile yet");
                AuthState::Unauthenticated
            }
        })
    }

    pub async fn register(
        &self,
        identity: Option<&str>,
        provider_email: Option<&str>,
        request: RegisterUserRequest,
    ) -> Result<UserProfile, ServiceError> {
        let user_id = identity.ok_or(AuthError::MissingIdentity)?;
        request.validate()?;

        let email = request
            .email
            .clone()
            .or_else(|| provider_email.map(str::to_string))
            .map(|e| e.trim().to_string())
            .filter(|e| e.validate_email())
            .ok_or(AuthError::InvalidEmail)?;

        if self.store.get_user(user_id).await?.is_some() {
            return Err(AuthError::ProfileAlreadyExists.into());
        }

        let new_profile = request.into_new_profile(user_id.to_string(), email, &self.default_city);
        match self.store.create_user(new_profile).await {
            Ok(profile) => {
                log::info!("Registered profile {}", profile.id);
                Ok(profile)
            }
            Err(StoreError::UniqueViolation(constraint)) if constraint == USER_EMAIL_UNIQUE => {
                Err(AuthError::EmailInUse.into())
            }
            Err(StoreError::UniqueViolation(_)) => Err(AuthError::ProfileAlreadyExists.into()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn update(
        &self,
        session: &AuthState,
        request: UpdateProfileRequest,
    ) -> Result<UserProfile, ServiceError> {
        let mut profile = session
            .profile()
            .cloned()
            .ok_or(AuthError::MissingIdentity)?;
        request.validate()?;

        request.apply_to_existing(&mut profile);
        Ok(self.store.update_user(profile).await?)
    }
}
