use serde::Deserialize;
use thiserror::Error;

use crate::config::GeocoderSettings;
use crate::models::Coordinates;

const USER_AGENT: &str = concat!("city-directory-service/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum GeocodingError {
    #[error("Reverse geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Reverse geocoding returned HTTP {0}")]
    Status(u16),

    #[error("Response has no city, town or village")]
    NoPlaceName,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<Address>,
}

#[derive(Debug, Default, Deserialize)]
struct Address {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
}

impl Address {
    fn place_name(self) -> Option<String> {
        [self.city, self.town, self.village]
            .into_iter()
            .flatten()
            .map(|name| name.trim().to_string())
            .find(|name| !name.is_empty())
    }
}

/// Client for a Nominatim-compatible `/reverse` endpoint
#[derive(Clone)]
pub struct GeocodingClient {
    client: reqwest::Client,
    base_url: String,
    language: String,
    zoom: u8,
}

impl GeocodingClient {
    pub fn new(settings: &GeocoderSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            language: settings.language.clone(),
            zoom: settings.zoom,
        })
    }

    pub async fn reverse_city(&self, coords: Coordinates) -> Result<String, GeocodingError> {
        let url = format!("{}/reverse", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("format", "json".to_string()),
                ("lat", coords.latitude.to_string()),
                ("lon", coords.longitude.to_string()),
                ("zoom", self.zoom.to_string()),
                ("accept-language", self.language.clone()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeocodingError::Status(response.status().as_u16()));
        }

        let body: ReverseResponse = response.json().await?;
        body.address
            .and_then(Address::place_name)
            .ok_or(GeocodingError::NoPlaceName)
    }
}
