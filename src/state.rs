use std::sync::Arc;

use crate::clients::geocoding::GeocodingClient;
use crate::config::DirectorySettings;
use crate::database::DirectoryStore;
use crate::services::{
    BusinessService, DirectoryService, FavoritesService, LocationResolver, ProfileService,
};
use crate::storage::PhotoStore;

/// Everything a handler needs, assembled once at start-up
pub struct AppState {
    pub store: Arc<dyn DirectoryStore>,
    pub directory: DirectoryService,
    pub favorites: FavoritesService,
    pub businesses: BusinessService,
    pub profiles: ProfileService,
    pub locations: LocationResolver,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DirectoryStore>,
        photos: Arc<dyn PhotoStore>,
        geocoder: GeocodingClient,
        settings: DirectorySettings,
    ) -> Self {
        Self {
            directory: DirectoryService::new(store.clone(), settings.clone()),
            favorites: FavoritesService::new(store.clone()),
            businesses: BusinessService::new(store.clone(), photos),
            profiles: ProfileService::new(store.clone(), settings.default_city.clone()),
            locations: LocationResolver::new(geocoder, settings.default_city),
            store,
        }
    }
}
