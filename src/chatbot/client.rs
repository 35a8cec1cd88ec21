use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    config::AiConfig,
    upstream::{send_with_retry, RetryPolicy, UpstreamError},
};

const SYSTEM_PROMPT: &str = "You are a helpful assistant for students looking for dorm \
housing and roommates. Answer concisely.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// A conversational model that answers one message given prior turns.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Answers under the `system` instructions instead of the assistant's own.
    async fn complete_with(
        &self,
        system: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String, UpstreamError>;

    async fn complete(&self, history: &[ChatTurn], message: &str) -> Result<String, UpstreamError> {
        self.complete_with(SYSTEM_PROMPT, history, message).await
    }
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChatClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatTurn>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiChatClient {
    pub fn new(http: reqwest::Client, cfg: &AiConfig, retry: RetryPolicy) -> Self {
        Self {
            http,
            endpoint: cfg.endpoint.clone(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            retry,
        }
    }

    fn messages(system: &str, history: &[ChatTurn], message: &str) -> Vec<ChatTurn> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatTurn {
            role: ChatRole::System,
            content: system.to_string(),
        });
        messages.extend(history.iter().cloned());
        messages.push(ChatTurn {
            role: ChatRole::User,
            content: message.to_string(),
        });
        messages
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    #[instrument(skip_all, fields(model = %self.model, turns = history.len()))]
    async fn complete_with(
        &self,
        system: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String, UpstreamError> {
        let body = CompletionRequest {
            model: &self.model,
            messages: Self::messages(system, history, message),
        };
        let resp = send_with_retry(self.retry, || {
            let req = self.http.post(&self.endpoint).json(&body);
            match &self.api_key {
                Some(key) => req.bearer_auth(key),
                None => req,
            }
        })
        .await?;

        let parsed: CompletionResponse = resp.json().await?;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| UpstreamError::Decode("completion has no choices".into()))?;
        debug!(chars = answer.len(), "chat completion received");
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, upstream::test_server};
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::time::Duration;

    fn client(endpoint: String) -> OpenAiChatClient {
        let mut cfg = AppConfig::for_tests();
        cfg.ai.endpoint = endpoint;
        cfg.ai.api_key = Some("sk-test".into());
        OpenAiChatClient::new(
            reqwest::Client::new(),
            &cfg.ai,
            RetryPolicy {
                max_retries: 1,
                backoff: Duration::from_millis(1),
            },
        )
    }

    #[tokio::test]
    async fn sends_history_and_reads_first_choice() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|headers: axum::http::HeaderMap, Json(body): Json<Value>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let roles: Vec<String> = body["messages"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|m| m["role"].as_str().unwrap().to_string())
                    .collect();
                Json(json!({
                    "choices": [{"message": {"role": "assistant",
                        "content": format!("{auth}|{}|{}", body["model"].as_str().unwrap(), roles.join(","))}}]
                }))
            }),
        );
        let addr = test_server::spawn(app).await;
        let chat = client(format!("http://{addr}/v1/chat/completions"));

        let history = vec![
            ChatTurn {
                role: ChatRole::User,
                content: "hi".into(),
            },
            ChatTurn {
                role: ChatRole::Assistant,
                content: "hello".into(),
            },
        ];
        let answer = chat.complete(&history, "any dorms near campus?").await.unwrap();
        assert_eq!(answer, "Bearer sk-test|test-model|system,user,assistant,user");
    }

    #[tokio::test]
    async fn custom_system_prompt_replaces_default() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                let system = body["messages"][0]["content"].as_str().unwrap().to_string();
                Json(json!({"choices": [{"message": {"content": system}}]}))
            }),
        );
        let addr = test_server::spawn(app).await;
        let chat = client(format!("http://{addr}/v1/chat/completions"));

        let answer = chat.complete_with("reply in JSON", &[], "hi").await.unwrap();
        assert_eq!(answer, "reply in JSON");
        let answer = chat.complete(&[], "hi").await.unwrap();
        assert_eq!(answer, SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn provider_error_is_upstream_status() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
        );
        let addr = test_server::spawn(app).await;
        let chat = client(format!("http://{addr}/v1/chat/completions"));
        let err = chat.complete(&[], "hello").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status(401)));
    }

    #[tokio::test]
    async fn empty_choices_is_decode_error() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({"choices": []})) }),
        );
        let addr = test_server::spawn(app).await;
        let chat = client(format!("http://{addr}/v1/chat/completions"));
        let err = chat.complete(&[], "hello").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Decode(_)));
    }
}
