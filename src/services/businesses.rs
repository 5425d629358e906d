use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use crate::database::{DirectoryStore, OWNER_UNIQUE};
use crate::error::{AuthError, ServiceError, StoreError};
use crate::models::{AuthState, Business, CreateBusinessRequest, UserProfile};
use crate::services::parse_business_id;
use crate::storage::{photo_key, PhotoStore};

const ALREADY_OWNS_BUSINESS: &str = "У вас уже есть зарегистрированный бизнес";

struct UploadedPhoto {
    key: String,
    url: String,
}

/// Owner-side business operations: creation, update and lookup
#[derive(Clone)]
pub struct BusinessService {
    store: Arc<dyn DirectoryStore>,
    photos: Arc<dyn PhotoStore>,
}

impl BusinessService {
    pub fn new(store: Arc<dyn DirectoryStore>, photos: Arc<dyn PhotoStore>) -> Self {
        Self { store, photos }
    }

    /// Creates the caller's business. The photo is uploaded before the record is written,
    /// so a failed upload leaves nothing behind and a failed write removes the photo again.
    pub async fn create(
        &self,
        session: &AuthState,
        request: CreateBusinessRequest,
    ) -> Result<Business, ServiceError> {
        let owner = session.profile().ok_or(AuthError::MissingIdentity)?;
        validate_form(&request)?;

        if self.store.get_business_for_owner(&owner.id).await?.is_some() {
            return Err(ServiceError::Conflict(ALREADY_OWNS_BUSINESS.into()));
        }

        let uploaded = self.upload_photo(owner, &request).await?;
        let new_business =
            request.into_new_business(owner, uploaded.as_ref().map(|p| p.url.clone()));

        match self.store.create_business(new_business).await {
            Ok(business) => {
                log::info!("Business {} created by {}", business.id, owner.id);
                Ok(business)
            }
            Err(err) => {
                self.discard_photo(uploaded).await;
                Err(match err {
                    StoreError::UniqueViolation(constraint) if constraint == OWNER_UNIQUE => {
                        ServiceError::Conflict(ALREADY_OWNS_BUSINESS.into())
                    }
                    other => other.into(),
                })
            }
        }
    }

    /// Replaces the editable fields. Only the owner may update; the photo changes only when a new one
    /// is sent, and the replaced photo is removed once the record points at the new one.
    pub async fn update(
        &self,
        session: &AuthState,
        raw_id: &str,
        request: CreateBusinessRequest,
    ) -> Result<Business, ServiceError> {
        let caller = session.profile().ok_or(AuthError::MissingIdentity)?;
        let business_id = parse_business_id(raw_id).ok_or(ServiceError::NotFound("Business"))?;
        validate_form(&request)?;

        let mut existing = self
            .store
            .get_business(business_id)
            .await?
            .ok_or(ServiceError::NotFound("Business"))?;
        if existing.owner_id != caller.id {
            return Err(ServiceError::Forbidden(
                "Изменять бизнес может только его владелец".into(),
            ));
        }

        let uploaded = self.upload_photo(caller, &request).await?;
        let previous_url = existing.photo_url.clone();
        request.apply_to_existing(&mut existing, uploaded.as_ref().map(|p| p.url.clone()));

        match self.store.update_business(existing).await {
            Ok(updated) => {
                if uploaded.is_some() {
                    self.remove_replaced_photo(previous_url, updated.photo_url.as_deref())
                        .await;
                }
                Ok(updated)
            }
            Err(err) => {
                self.discard_photo(uploaded).await;
                Err(err.into())
            }
        }
    }

    pub async fn for_owner(&self, session: &AuthState) -> Result<Option<Business>, ServiceError> {
        let owner = session.profile().ok_or(AuthError::MissingIdentity)?;
        Ok(self.store.get_business_for_owner(&owner.id).await?)
    }

    async fn upload_photo(
        &self,
        owner: &UserProfile,
        request: &CreateBusinessRequest,
    ) -> Result<Option<UploadedPhoto>, ServiceError> {
        let Some(photo) = &request.photo else {
            return Ok(None);
        };

        let bytes = photo.decode().map_err(ServiceError::Validation)?;
        let key = photo_key(&owner.id, Utc::now(), &photo.file_name);
        let url = self.photos.put(&key, &bytes).await?;
        Ok(Some(UploadedPhoto { key, url }))
    }

    async fn remove_replaced_photo(&self, previous_url: Option<String>, current_url: Option<&str>) {
        let Some(previous_url) = previous_url else {
            return;
        };
        if current_url == Some(previous_url.as_str()) {
            return;
        }

        match self.photos.key_for_url(&previous_url) {
            Some(key) => {
                if let Err(err) = self.photos.remove(&key).await {
                    log::warn!("Failed to remove replaced photo {key}: {err}");
                }
            }
            None => log::debug!("Replaced photo {previous_url} is not ours to remove"),
        }
    }

    async fn discard_photo(&self, uploaded: Option<UploadedPhoto>) {
        if let Some(photo) = uploaded {
            if let Err(err) = self.photos.remove(&photo.key).await {
                log::warn!("Failed to remove orphaned photo {}: {err}", photo.key);
            }
        }
    }
}

fn validate_form(request: &CreateBusinessRequest) -> Result<(), ServiceError> {
    request.validate()?;
    request
        .validate_business_rules()
        .map_err(ServiceError::Validation)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::error::StorageError;
    use crate::models::PhotoUpload;
    use crate::services::fixtures::{profile, signed_in};
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use std::sync::Mutex;

    /// Photo store that records keys, optionally failing every upload
    #[derive(Default)]
    struct RecordingPhotos {
        fail: bool,
        stored: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PhotoStore for RecordingPhotos {
        async fn put(&self, key: &str, _bytes: &[u8]) -> Result<String, StorageError> {
            if self.fail {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.stored.lock().unwrap().push(key.to_string());
            Ok(format!("https://cdn.test/{key}"))
        }

        async fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.stored.lock().unwrap().retain(|k| k != key);
            Ok(())
        }

        fn key_for_url(&self, url: &str) -> Option<String> {
            url.strip_prefix("https://cdn.test/").map(str::to_string)
        }
    }

    fn form() -> CreateBusinessRequest {
        CreateBusinessRequest {
            name: "Пекарня".into(),
            description: "Свежий хлеб".into(),
            hours: "8:00-20:00".into(),
            city: "Калининград".into(),
            owner_email: None,
            rating: None,
            business_type: Some("bakery".into()),
            address: Some("ул. Театральная, 1".into()),
            phone: None,
            schedule: None,
            photo: None,
        }
    }

    fn with_photo(request: CreateBusinessRequest) -> CreateBusinessRequest {
        with_photo_named(request, "front.jpg")
    }

    fn with_photo_named(mut request: CreateBusinessRequest, file_name: &str) -> CreateBusinessRequest {
        request.photo = Some(PhotoUpload {
            file_name: file_name.into(),
            content_type: "image/jpeg".into(),
            data: STANDARD.encode([0xff, 0xd8, 0xff, 0xe0]),
        });
        request
    }

    fn service_with(store: Arc<MemoryStore>, photos: Arc<RecordingPhotos>) -> BusinessService {
        BusinessService::new(store, photos)
    }

    fn owner_session(store: &MemoryStore, id: &str) -> AuthState {
        let user = profile(id);
        store.insert_user_raw(user.clone());
        signed_in(user)
    }

    #[tokio::test]
    async fn creation_with_photo_stores_its_url() {
        let store = Arc::new(MemoryStore::new());
        let photos = Arc::new(RecordingPhotos::default());
        let session = owner_session(&store, "owner-1");

        let business = service_with(store.clone(), photos.clone())
            .create(&session, with_photo(form()))
            .await
            .unwrap();

        let keys = photos.stored.lock().unwrap().clone();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with("owner-1/"));
        assert!(keys[0].ends_with("_front.jpg"));
        assert_eq!(
            business.photo_url.as_deref(),
            Some(format!("https://cdn.test/{}", keys[0]).as_str())
        );
        assert_eq!(business.owner_id, "owner-1");
        assert_eq!(business.owner_email, "owner-1@example.com");
    }

    #[tokio::test]
    async fn failed_upload_creates_no_record() {
        let store = Arc::new(MemoryStore::new());
        let photos = Arc::new(RecordingPhotos {
            fail: true,
            ..Default::default()
        });
        let session = owner_session(&store, "owner-1");

        let result = service_with(store.clone(), photos)
            .create(&session, with_photo(form()))
            .await;

        assert!(matches!(result, Err(ServiceError::Storage(_))));
        assert_eq!(store.business_count(), 0);
    }

    #[tokio::test]
    async fn failed_write_removes_uploaded_photo() {
        let store = Arc::new(MemoryStore::new());
        let photos = Arc::new(RecordingPhotos::default());
        let session = owner_session(&store, "owner-1");
        let service = service_with(store.clone(), photos.clone());
        store.fail_all();

        let result = service.create(&session, with_photo(form())).await;

        assert!(result.is_err());
        assert!(photos.stored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_business_for_same_owner_is_a_conflict() {
        let store = Arc::new(MemoryStore::new());
        let photos = Arc::new(RecordingPhotos::default());
        let session = owner_session(&store, "owner-1");
        let service = service_with(store.clone(), photos.clone());

        service.create(&session, form()).await.unwrap();
        let second = service.create(&session, with_photo(form())).await;

        assert!(matches!(second, Err(ServiceError::Conflict(_))));
        assert_eq!(store.business_count(), 1);
        assert!(photos.stored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_required_field_is_a_validation_error() {
        let store = Arc::new(MemoryStore::new());
        let session = owner_session(&store, "owner-1");
        let mut request = form();
        request.city = " ".into();

        let result = service_with(store.clone(), Arc::default())
            .create(&session, request)
            .await;

        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert_eq!(store.business_count(), 0);
    }

    #[tokio::test]
    async fn anonymous_caller_cannot_create() {
        let store = Arc::new(MemoryStore::new());
        let result = service_with(store, Arc::default())
            .create(&AuthState::Unauthenticated, form())
            .await;

        assert!(matches!(
            result,
            Err(ServiceError::Auth(AuthError::MissingIdentity))
        ));
    }

    #[tokio::test]
    async fn only_the_owner_can_update() {
        let store = Arc::new(MemoryStore::new());
        let owner = owner_session(&store, "owner-1");
        let stranger = owner_session(&store, "stranger");
        let service = service_with(store.clone(), Arc::default());
        let created = service.create(&owner, form()).await.unwrap();

        let mut change = form();
        change.hours = "круглосуточно".into();

        let denied = service.update(&stranger, &created.id.to_string(), change.clone()).await;
        assert!(matches!(denied, Err(ServiceError::Forbidden(_))));

        let updated = service
            .update(&owner, &created.id.to_string(), change)
            .await
            .unwrap();
        assert_eq!(updated.hours, "круглосуточно");
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn owner_lookup_returns_their_business() {
        let store = Arc::new(MemoryStore::new());
        let owner = owner_session(&store, "owner-1");
        let service = service_with(store.clone(), Arc::default());

        assert!(service.for_owner(&owner).await.unwrap().is_none());
        let created = service.create(&owner, form()).await.unwrap();
        assert_eq!(service.for_owner(&owner).await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn new_photo_replaces_the_old_one() {
        let store = Arc::new(MemoryStore::new());
        let photos = Arc::new(RecordingPhotos::default());
        let owner = owner_session(&store, "owner-1");
        let service = service_with(store.clone(), photos.clone());
        let created = service
            .create(&owner, with_photo_named(form(), "one.png"))
            .await
            .unwrap();

        let updated = service
            .update(&owner, &created.id.to_string(), with_photo_named(form(), "two.png"))
            .await
            .unwrap();

        let keys = photos.stored.lock().unwrap().clone();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].ends_with("_two.png"));
        assert_eq!(
            updated.photo_url.as_deref(),
            Some(format!("https://cdn.test/{}", keys[0]).as_str())
        );
    }

    #[tokio::test]
    async fn update_without_photo_keeps_the_old_one() {
        let store = Arc::new(MemoryStore::new());
        let photos = Arc::new(RecordingPhotos::default());
        let owner = owner_session(&store, "owner-1");
        let service = service_with(store.clone(), photos.clone());
        let created = service.create(&owner, with_photo(form())).await.unwrap();

        let updated = service
            .update(&owner, &created.id.to_string(), form())
            .await
            .unwrap();

        assert_eq!(photos.stored.lock().unwrap().len(), 1);
        assert_eq!(updated.photo_url, created.photo_url);
    }
}
