use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// OpenAI-compatible chat-completion endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapsConfig {
    pub base_url: String,
    pub api_key: String,
}

/// Timeout and retry budget shared by every outbound call.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub ai: AiConfig,
    pub maps: MapsConfig,
    pub upstream: UpstreamConfig,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "dormmate".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "dormmate-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60),
        };
        let ai = AiConfig {
            endpoint: std::env::var("AI_CHAT_ENDPOINT")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".into()),
            api_key: std::env::var("AI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: std::env::var("AI_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".into()),
        };
        let maps = MapsConfig {
            base_url: std::env::var("GOOGLE_MAPS_BASE_URL")
                .unwrap_or_else(|_| "https://maps.googleapis.com/maps/api".into()),
            api_key: std::env::var("GOOGLE_MAPS_API_KEY").unwrap_or_default(),
        };
        let upstream = UpstreamConfig {
            timeout_secs: env_parse("UPSTREAM_TIMEOUT_SECS").unwrap_or(15),
            max_retries: env_parse("UPSTREAM_MAX_RETRIES").unwrap_or(2),
            backoff_ms: env_parse("UPSTREAM_BACKOFF_MS").unwrap_or(200),
        };
        let request_timeout_secs = env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(30);

        anyhow::ensure!(!jwt.secret.is_empty(), "JWT_SECRET must not be empty");
        anyhow::ensure!(jwt.ttl_minutes > 0, "JWT_TTL_MINUTES must be positive");

        Ok(Self {
            database_url,
            jwt,
            ai,
            maps,
            upstream,
            request_timeout_secs,
        })
    }

    /// Settings used by tests; nothing here reaches the network.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: "memory://".into(),
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            ai: AiConfig {
                endpoint: "http://127.0.0.1:9/v1/chat/completions".into(),
                api_key: None,
                model: "test-model".into(),
            },
            maps: MapsConfig {
                base_url: "http://127.0.0.1:9/maps/api".into(),
                api_key: "test".into(),
            },
            upstream: UpstreamConfig {
                timeout_secs: 2,
                max_retries: 2,
                backoff_ms: 1,
            },
            request_timeout_secs: 30,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
