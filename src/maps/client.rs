use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::{
    config::MapsConfig,
    upstream::{send_with_retry, RetryPolicy, UpstreamError},
};

/// A resolved location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub place_id: String,
    pub formatted_address: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Address and place lookups. `Ok(None)` means the provider knows nothing
/// about the input.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Option<Place>, UpstreamError>;

    async fn place_details(&self, place_id: &str) -> Result<Option<Place>, UpstreamError>;
}

/// Google Maps Platform (Geocoding and Places Details) over HTTPS.
pub struct GoogleMapsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct GeocodeEnvelope {
    status: String,
    #[serde(default)]
    results: Vec<RawPlace>,
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct DetailsEnvelope {
    status: String,
    result: Option<RawPlace>,
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct RawPlace {
    place_id: String,
    #[serde(default)]
    formatted_address: String,
    name: Option<String>,
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl From<RawPlace> for Place {
    fn from(raw: RawPlace) -> Self {
        Self {
            place_id: raw.place_id,
            formatted_address: raw.formatted_address,
            lat: raw.geometry.location.lat,
            lng: raw.geometry.location.lng,
            name: raw.name,
        }
    }
}

/// Maps the provider's `status` field; anything but OK / no-match is an error.
fn check_status(status: &str, message: Option<String>) -> Result<bool, UpstreamError> {
    match status {
        "OK" => Ok(true),
        "ZERO_RESULTS" | "NOT_FOUND" => Ok(false),
        other => {
            warn!(status = other, message = ?message, "maps provider rejected request");
            Err(UpstreamError::Rejected(other.to_string()))
        }
    }
}

impl GoogleMapsClient {
    pub fn new(http: reqwest::Client, cfg: &MapsConfig, retry: RetryPolicy) -> Self {
        Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            retry,
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, UpstreamError> {
        let url = format!("{}/{}", self.base_url, path);
        let resp = send_with_retry(self.retry, || {
            self.http
                .get(&url)
                .query(params)
                .query(&[("key", self.api_key.as_str())])
        })
        .await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl Geocoder for GoogleMapsClient {
    #[instrument(skip(self))]
    async fn geocode(&self, address: &str) -> Result<Option<Place>, UpstreamError> {
        let env: GeocodeEnvelope = self.get("geocode/json", &[("address", address)]).await?;
        if !check_status(&env.status, env.error_message)? {
            return Ok(None);
        }
        let place = env.results.into_iter().next().map(Place::from);
        debug!(found = place.is_some(), "geocode done");
        Ok(place)
    }

    #[instrument(skip(self))]
    async fn place_details(&self, place_id: &str) -> Result<Option<Place>, UpstreamError> {
        let env: DetailsEnvelope = self
            .get(
                "place/details/json",
                &[
                    ("place_id", place_id),
                    ("fields", "place_id,formatted_address,name,geometry"),
                ],
            )
            .await?;
        if !check_status(&env.status, env.error_message)? {
            return Ok(None);
        }
        Ok(env.result.map(Place::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, upstream::test_server};
    use axum::{extract::Query, routing::get, Json, Router};
    use serde_json::{json, Value};
    use std::{collections::HashMap, time::Duration};

    async fn client() -> GoogleMapsClient {
        let app = Router::new()
            .route(
                "/maps/api/geocode/json",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    let body: Value = match q.get("address").map(String::as_str) {
                        _ if q.get("key").map(String::as_str) != Some("test") => {
                            json!({"status": "REQUEST_DENIED", "error_message": "bad key"})
                        }
                        Some("nowhere") => json!({"status": "ZERO_RESULTS", "results": []}),
                        Some(addr) => json!({
                            "status": "OK",
                            "results": [{
                                "place_id": "abc123",
                                "formatted_address": addr,
                                "geometry": {"location": {"lat": 40.8, "lng": -73.96}},
                            }],
                        }),
                        None => json!({"status": "INVALID_REQUEST"}),
                    };
                    Json(body)
                }),
            )
            .route(
                "/maps/api/place/details/json",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    let body = match q.get("place_id").map(String::as_str) {
                        Some("abc123") => json!({
                            "status": "OK",
                            "result": {
                                "place_id": "abc123",
                                "name": "Maple Hall",
                                "formatted_address": "1 Campus Rd",
                                "geometry": {"location": {"lat": 1.5, "lng": 2.5}},
                            },
                        }),
                        _ => json!({"status": "NOT_FOUND"}),
                    };
                    Json(body)
                }),
            );
        let addr = test_server::spawn(app).await;

        let mut cfg = AppConfig::for_tests();
        cfg.maps.base_url = format!("http://{addr}/maps/api/");
        GoogleMapsClient::new(
            reqwest::Client::new(),
            &cfg.maps,
            RetryPolicy {
                max_retries: 0,
                backoff: Duration::from_millis(1),
            },
        )
    }

    #[tokio::test]
    async fn geocode_reads_first_result() {
        let maps = client().await;
        let place = maps.geocode("116th St & Broadway").await.unwrap().unwrap();
        assert_eq!(place.place_id, "abc123");
        assert_eq!(place.formatted_address, "116th St & Broadway");
        assert_eq!((place.lat, place.lng), (40.8, -73.96));
    }

    #[tokio::test]
    async fn zero_results_is_none() {
        let maps = client().await;
        assert!(maps.geocode("nowhere").await.unwrap().is_none());
        assert!(maps.place_details("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn place_details_include_name() {
        let maps = client().await;
        let place = maps.place_details("abc123").await.unwrap().unwrap();
        assert_eq!(place.name.as_deref(), Some("Maple Hall"));
        assert_eq!(place.formatted_address, "1 Campus Rd");
    }

    #[test]
    fn other_statuses_are_rejections() {
        assert!(check_status("OK", None).unwrap());
        assert!(!check_status("ZERO_RESULTS", None).unwrap());
        assert!(matches!(
            check_status("OVER_QUERY_LIMIT", None),
            Err(UpstreamError::Rejected(s)) if s == "OVER_QUERY_LIMIT"
        ));
    }
}
