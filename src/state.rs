use crate::chatbot::client::{ChatClient, OpenAiChatClient};
use crate::config::AppConfig;
use crate::db::{self, DocumentStore};
use crate::maps::client::{Geocoder, GoogleMapsClient};
use crate::upstream::{self, RetryPolicy};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<AppConfig>,
    pub chat: Arc<dyn ChatClient>,
    pub geocoder: Arc<dyn Geocoder>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = db::connect(&config.database_url).await?;
        tracing::info!(backend = store.kind(), "document store ready");

        let http = upstream::http_client(&config.upstream)?;
        let retry = RetryPolicy::from_config(&config.upstream);
        let chat = Arc::new(OpenAiChatClient::new(http.clone(), &config.ai, retry)) as Arc<dyn ChatClient>;
        let geocoder = Arc::new(GoogleMapsClient::new(http, &config.maps, retry)) as Arc<dyn Geocoder>;

        Ok(Self::from_parts(store, config, chat, geocoder))
    }

    pub fn from_parts(
        store: Arc<dyn DocumentStore>,
        config: Arc<AppConfig>,
        chat: Arc<dyn ChatClient>,
        geocoder: Arc<dyn Geocoder>,
    ) -> Self {
        Self {
            store,
            config,
            chat,
            geocoder,
        }
    }

    /// In-memory store and canned upstreams; nothing leaves the process.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::chatbot::client::ChatTurn;
        use crate::db::MemoryStore;
        use crate::maps::client::Place;
        use crate::upstream::UpstreamError;
        use async_trait::async_trait;

        struct FakeChat;
        #[async_trait]
        impl ChatClient for FakeChat {
            async fn complete_with(
                &self,
                _system: &str,
                history: &[ChatTurn],
                message: &str,
            ) -> Result<String, UpstreamError> {
                Ok(format!("echo({}): {}", history.len(), message))
            }
        }

        struct FakeGeocoder;
        #[async_trait]
        impl Geocoder for FakeGeocoder {
            async fn geocode(&self, address: &str) -> Result<Option<Place>, UpstreamError> {
                match address {
                    "nowhere" => Ok(None),
                    "down" => Err(UpstreamError::Status(503)),
                    _ => Ok(Some(Place {
                        place_id: "fake-place".into(),
                        formatted_address: address.to_string(),
                        lat: 1.0,
                        lng: 2.0,
                        name: None,
                    })),
                }
            }
            async fn place_details(&self, place_id: &str) -> Result<Option<Place>, UpstreamError> {
                Ok((place_id == "fake-place").then(|| Place {
                    place_id: place_id.to_string(),
                    formatted_address: "1 Fake St".into(),
                    lat: 1.0,
                    lng: 2.0,
                    name: Some("Fake Hall".into()),
                }))
            }
        }

        Self::from_parts(
            Arc::new(MemoryStore::new()),
            Arc::new(AppConfig::for_tests()),
            Arc::new(FakeChat),
            Arc::new(FakeGeocoder),
        )
    }
}
