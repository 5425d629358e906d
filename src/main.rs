use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;

use city_directory::clients::geocoding::GeocodingClient;
use city_directory::config::AppConfig;
use city_directory::database::DatabaseService;
use city_directory::state::AppState;
use city_directory::storage::LocalPhotoStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env()?;

    let db = DatabaseService::new(&config.database_url).await.map_err(|err| {
        log::error!("Failed to initialize database: {err:?}");
        std::io::Error::other(err)
    })?;

    if let Err(e) = db.init_schema().await {
        log::error!("Failed to initialize DB schema: {:#?}", e);
    } else {
        log::info!("DB schema ensured");
    }

    let geocoder = GeocodingClient::new(&config.geocoder).map_err(|err| {
        log::error!("Failed to build geocoding client: {err:?}");
        std::io::Error::other(err)
    })?;
    std::fs::create_dir_all(&config.photo_dir)?;
    let photo_dir = config.photo_dir.clone();
    let photos = LocalPhotoStore::new(config.photo_dir.clone(), &config.photo_base_url);

    let state = web::Data::new(AppState::new(
        Arc::new(db),
        Arc::new(photos),
        geocoder,
        config.directory.clone(),
    ));

    log::info!(
        "🚀 Starting City Directory Service on {} (default city: {})",
        config.bind_address,
        config.directory.default_city
    );

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .configure(city_directory::configure)
            .service(city_directory::photo_files(&photo_dir))
    })
    .bind(&config.bind_address)?
    .run()
    .await
}
