use crate::clients::geocoding::GeocodingClient;
use crate::database::DirectoryStore;
use crate::models::{AuthState, CitySource, Coordinates, ResolvedCity};

/// Turns coordinates into a city name, never failing: every error degrades to the default city.
#[derive(Clone)]
pub struct LocationResolver {
    geocoder: GeocodingClient,
    default_city: String,
}

impl LocationResolver {
    pub fn new(geocoder: GeocodingClient, default_city: impl Into<String>) -> Self {
        Self {
            geocoder,
            default_city: default_city.into(),
        }
    }

    pub async fn resolve(&self, coords: Coordinates) -> ResolvedCity {
        if !coords.is_valid() {
            log::warn!(
                "Rejecting coordinates ({}, {}), using default city",
                coords.latitude,
                coords.longitude
            );
            return self.fallback();
        }

        match self.geocoder.reverse_city(coords).await {
            Ok(city) => ResolvedCity {
                city,
                source: CitySource::Geocoder,
            },
            Err(err) => {
                log::warn!("Reverse geocoding failed, using default city: {err}");
                self.fallback()
            }
        }
    }

    /// Resolves and, for a signed-in caller, stores the city as the profile location.
    pub async fn resolve_for(
        &self,
        store: &dyn DirectoryStore,
        session: &AuthState,
        coords: Coordinates,
    ) -> ResolvedCity {
        let resolved = self.resolve(coords).await;

        if let Some(profile) = session.profile() {
            if profile.location != resolved.city {
                if let Err(err) = store.set_user_location(&profile.id, &resolved.city).await {
                    log::warn!("Failed to store location for user {}: {err}", profile.id);
                }
            }
        }

        resolved
    }

    fn fallback(&self) -> ResolvedCity {
        ResolvedCity {
            city: self.default_city.clone(),
            source: CitySource::Fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeocoderSettings;
    use crate::database::memory::MemoryStore;
    use crate::services::fixtures::{profile, signed_in};
    use httpmock::prelude::*;
    use std::time::Duration;

    const POINT: Coordinates = Coordinates {
        latitude: 54.96,
        longitude: 20.47,
    };

    fn resolver(base_url: String) -> LocationResolver {
        let client = GeocodingClient::new(&GeocoderSettings {
            base_url,
            language: "ru".into(),
            zoom: 10,
            timeout: Duration::from_millis(500),
        })
        .unwrap();
        LocationResolver::new(client, "Калининград")
    }

    fn fallback() -> ResolvedCity {
        ResolvedCity {
            city: "Калининград".into(),
            source: CitySource::Fallback,
        }
    }

    #[tokio::test]
    async fn geocoded_city_is_returned() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/reverse");
            then.status(200).body(r#"{"address":{"town":"Зеленоградск"}}"#);
        });

        let resolved = resolver(server.base_url()).resolve(POINT).await;

        assert_eq!(resolved.city, "Зеленоградск");
        assert_eq!(resolved.source, CitySource::Geocoder);
    }

    #[tokio::test]
    async fn every_failure_resolves_to_default_city() {
        let bodies = [
            (200, "{ broken"),
            (200, r#"{"address":{}}"#),
            (200, r#"{"error":"Unable to geocode"}"#),
            (500, "oops"),
        ];

        for (status, body) in bodies {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(GET).path("/reverse");
                then.status(status).body(body);
            });

            assert_eq!(resolver(server.base_url()).resolve(POINT).await, fallback());
        }
    }

    #[tokio::test]
    async fn unreachable_geocoder_resolves_to_default_city() {
        let resolved = resolver("http://127.0.0.1:9".into()).resolve(POINT).await;
        assert_eq!(resolved, fallback());
    }

    #[tokio::test]
    async fn invalid_coordinates_skip_the_request() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/reverse");
            then.status(200).body(r#"{"address":{"city":"Москва"}}"#);
        });

        let resolved = resolver(server.base_url())
            .resolve(Coordinates {
                latitude: 120.0,
                longitude: 0.0,
            })
            .await;

        assert_eq!(resolved, fallback());
        mock.assert_calls(0);
    }

    #[tokio::test]
    async fn signed_in_caller_location_is_stored() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/reverse");
            then.status(200).body(r#"{"address":{"city":"Светлогорск"}}"#);
        });
        let store = MemoryStore::new();
        let user = profile("u1");
        store.insert_user_raw(user.clone());

        resolver(server.base_url())
            .resolve_for(&store, &signed_in(user), POINT)
            .await;

        let stored = store.get_user("u1").await.unwrap().unwrap();
        assert_eq!(stored.location, "Светлогорск");
    }
}
