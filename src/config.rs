use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

/// City used whenever the caller's location cannot be resolved
pub const DEFAULT_CITY: &str = "Калининград";

/// Directory and location settings shared by every request
#[derive(Debug, Clone)]
pub struct DirectorySettings {
    pub default_city: String,
    pub page_size: i64,
    pub recent_visits_cap: usize,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            default_city: DEFAULT_CITY.to_string(),
            page_size: 6,
            recent_visits_cap: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeocoderSettings {
    pub base_url: String,
    pub language: String,
    pub zoom: u8,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: String,
    pub database_url: String,
    pub geocoder: GeocoderSettings,
    pub directory: DirectorySettings,
    pub photo_dir: PathBuf,
    pub photo_base_url: String,
}

impl AppConfig {
    pub fn from_env() -> std::io::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> std::io::Result<Self> {
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port: u16 = parse_or(&lookup, "PORT", 8082);

        let database_url = lookup("DATABASE_URL").ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "DATABASE_URL must be set in environment",
            )
        })?;

        let geocoder = GeocoderSettings {
            base_url: lookup("GEOCODER_URL")
                .unwrap_or_else(|| "https://nominatim.openstreetmap.org".to_string()),
            language: lookup("GEOCODER_LANGUAGE").unwrap_or_else(|| "ru".to_string()),
            zoom: parse_or(&lookup, "GEOCODER_ZOOM", 10),
            timeout: Duration::from_secs(parse_or(&lookup, "GEOCODER_TIMEOUT_SECS", 5)),
        };

        let defaults = DirectorySettings::default();
        let directory = DirectorySettings {
            default_city: lookup("DEFAULT_CITY")
                .filter(|city| !city.trim().is_empty())
                .unwrap_or(defaults.default_city),
            page_size: parse_or(&lookup, "DIRECTORY_PAGE_SIZE", defaults.page_size).clamp(1, 50),
            recent_visits_cap: defaults.recent_visits_cap,
        };

        Ok(Self {
            bind_address: format!("{}:{}", host, port),
            database_url,
            geocoder,
            directory,
            photo_dir: PathBuf::from(lookup("PHOTO_DIR").unwrap_or_else(|| "./uploads".to_string())),
            photo_base_url: lookup("PHOTO_BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{}{}", port, crate::UPLOADS_PATH)),
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            log::warn!("Invalid {key} value '{raw}': {e}, using default {default}");
            default
        }),
        None => default,
    }
}
