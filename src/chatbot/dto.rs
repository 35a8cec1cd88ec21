use serde::{Deserialize, Serialize};

use crate::{
    chatbot::client::{ChatRole, ChatTurn},
    error::AppError,
};

pub const MAX_HISTORY: usize = 20;
pub const MAX_QUERY_CHARS: usize = 4000;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(alias = "message", alias = "user_message")]
    pub query: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

impl ChatRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.query.trim().is_empty() {
            return Err(AppError::validation("query must not be empty"));
        }
        if self.query.chars().count() > MAX_QUERY_CHARS {
            return Err(AppError::validation(format!(
                "query must be at most {MAX_QUERY_CHARS} characters"
            )));
        }
        if self.history.len() > MAX_HISTORY {
            return Err(AppError::validation(format!(
                "history must have at most {MAX_HISTORY} turns"
            )));
        }
        if self.history.iter().any(|t| t.role == ChatRole::System) {
            return Err(AppError::validation("history may only contain user and assistant turns"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}
