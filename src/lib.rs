pub mod clients;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;

use std::path::Path;

use actix_web::web;

/// JSON bodies may carry a base64 photo, so the default 32 KiB limit is raised.
pub const JSON_BODY_LIMIT: usize = 8 * 1024 * 1024;

/// Mount point of the uploaded photos served from `PHOTO_DIR`
pub const UPLOADS_PATH: &str = "/uploads";

/// Static service for uploaded photos. `photo_dir` must exist.
pub fn photo_files(photo_dir: &Path) -> actix_files::Files {
    actix_files::Files::new(UPLOADS_PATH, photo_dir)
}

/// Registers the `/api/v1` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().limit(JSON_BODY_LIMIT))
        .service(
            web::scope("/api/v1")
                // Health
                .service(handlers::health_check)
                // Session & location
                .service(handlers::get_session)
                .service(handlers::resolve_location)
                // Directory
                .service(handlers::list_cities)
                .service(handlers::list_businesses)
                .service(handlers::get_my_business)
                .service(handlers::get_business)
                .service(handlers::create_business)
                .service(handlers::update_business)
                // Favorites
                .service(handlers::list_favorites)
                .service(handlers::toggle_favorite)
                // Users
                .service(handlers::register_user)
                .service(handlers::get_profile)
                .service(handlers::update_profile)
                .service(handlers::list_recently_visited),
        );
}
