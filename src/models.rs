use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Largest photo accepted by the creation flow, in decoded bytes.
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

// ============================================================================
// ENUMS
// ============================================================================

/// Day key of a per-day schedule
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

/// Free-text opening hours keyed by day, stored as JSONB
pub type Schedule = BTreeMap<Weekday, String>;

/// Where a resolved city name came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CitySource {
    Geocoder,
    Fallback,
}

// ============================================================================
// BUSINESSES
// ============================================================================

/// Business listed in the directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Business {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub hours: String,
    pub city: String,
    pub photo_url: Option<String>,
    pub owner_id: String,
    pub owner_email: String,
    pub rating: Option<f64>,
    pub business_type: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub schedule: Option<Schedule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Helper for creating new business
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBusiness {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub hours: String,
    pub city: String,
    pub photo_url: Option<String>,
    pub owner_id: String,
    pub owner_email: String,
    pub rating: Option<f64>,
    pub business_type: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub schedule: Option<Schedule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// USERS
// ============================================================================

/// Profile of a signed-in user, keyed by the auth provider identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub location: String,
    pub favorites: Vec<Uuid>,
    pub reviews: Vec<String>,
    pub recently_visited: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn has_favorite(&self, business_id: Uuid) -> bool {
        self.favorites.contains(&business_id)
    }
}

/// Helper for creating new profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUserProfile {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of resolving the caller's session
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthState {
    Unauthenticated,
    Authenticated { profile: UserProfile },
}

impl AuthState {
    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            AuthState::Authenticated { profile } => Some(profile),
            AuthState::Unauthenticated => None,
        }
    }
}

// ============================================================================
// LOCATION
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedCity {
    pub city: String,
    pub source: CitySource,
}

// ============================================================================
// FAVORITES
// ============================================================================

/// Outcome of a favorites toggle
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FavoriteToggle {
    /// No signed-in user, nothing was written
    Unauthenticated,
    Updated {
        business_id: Uuid,
        is_favorite: bool,
        favorites: Vec<Uuid>,
    },
}

// ============================================================================
// REQUEST/RESPONSE DTOs
// ============================================================================

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    /// Machine-readable error code, e.g. `auth/email-already-in-use`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            code: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.to_string());
        self
    }
}

/// Photo sent inline with a business form
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    /// Standard base64 of the file contents
    pub data: String,
}

impl PhotoUpload {
    pub fn decode(&self) -> Result<Vec<u8>, String> {
        if !self.content_type.starts_with("image/") {
            return Err("Фото должно быть изображением".into());
        }

        let bytes = STANDARD
            .decode(self.data.trim())
            .map_err(|_| "Не удалось прочитать файл фото".to_string())?;

        if bytes.is_empty() {
            return Err("Файл фото пуст".into());
        }
        if bytes.len() > MAX_PHOTO_BYTES {
            return Err("Фото не должно превышать 5 МБ".into());
        }

        Ok(bytes)
    }
}

/// Business form, used for both creation and owner updates
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBusinessRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 4000))]
    pub description: String,
    #[validate(length(min = 1, max = 500))]
    pub hours: String,
    #[validate(length(min = 1, max = 120))]
    pub city: String,
    #[validate(email)]
    pub owner_email: Option<String>,
    #[validate(range(min = 0.0, max = 5.0))]
    pub rating: Option<f64>,
    #[validate(length(max = 60))]
    pub business_type: Option<String>,
    #[validate(length(max = 300))]
    pub address: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    pub schedule: Option<Schedule>,
    pub photo: Option<PhotoUpload>,
}

impl CreateBusinessRequest {
    /// Checks the validator attributes cannot express: required text must not be blank.
    pub fn validate_business_rules(&self) -> Result<(), String> {
        let required = [
            (&self.name, "Укажите название"),
            (&self.description, "Укажите описание"),
            (&self.hours, "Укажите часы работы"),
            (&self.city, "Укажите город"),
        ];

        for (value, message) in required {
            if value.trim().is_empty() {
                return Err(message.into());
            }
        }

        Ok(())
    }

    pub fn into_new_business(self, owner: &UserProfile, photo_url: Option<String>) -> NewBusiness {
        let now = Utc::now();
        NewBusiness {
            id: Uuid::new_v4(),
            name: self.name,
            description: self.description,
            hours: self.hours,
            city: self.city,
            photo_url,
            owner_id: owner.id.clone(),
            owner_email: self.owner_email.unwrap_or_else(|| owner.email.clone()),
            rating: self.rating,
            business_type: self.business_type,
            address: self.address,
            phone: self.phone,
            schedule: self.schedule,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copies the form onto an existing record. The photo is only replaced when a new one was uploaded.
    pub fn apply_to_existing(self, existing: &mut Business, photo_url: Option<String>) {
        existing.name = self.name;
        existing.description = self.description;
        existing.hours = self.hours;
        existing.city = self.city;
        if let Some(email) = self.owner_email {
            existing.owner_email = email;
        }
        existing.rating = self.rating;
        existing.business_type = self.business_type;
        existing.address = self.address;
        existing.phone = self.phone;
        existing.schedule = self.schedule;
        if photo_url.is_some() {
            existing.photo_url = photo_url;
        }
        existing.updated_at = Utc::now();
    }
}

/// Payload sent once after sign-up to create the profile
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterUserRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 80))]
    pub display_name: String,
    #[validate(length(max = 1024))]
    pub photo_url: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub location: Option<String>,
}

impl RegisterUserRequest {
    pub fn into_new_profile(self, id: String, email: String, default_city: &str) -> NewUserProfile {
        let now = Utc::now();
        NewUserProfile {
            id,
            email,
            display_name: self.display_name,
            photo_url: self.photo_url,
            location: self.location.unwrap_or_else(|| default_city.to_string()),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial profile update; absent fields are left as they are
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 80))]
    pub display_name: Option<String>,
    #[validate(length(max = 1024))]
    pub photo_url: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub location: Option<String>,
}

impl UpdateProfileRequest {
    pub fn apply_to_existing(self, existing: &mut UserProfile) {
        if let Some(display_name) = self.display_name {
            existing.display_name = display_name;
        }
        if let Some(photo_url) = self.photo_url {
            existing.photo_url = Some(photo_url);
        }
        if let Some(location) = self.location {
            existing.location = location;
        }
        existing.updated_at = Utc::now();
    }
}
