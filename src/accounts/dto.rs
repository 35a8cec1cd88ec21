use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{accounts::repo_types::Account, auth::dto::REDACTED};

/// Account as returned to clients; the password hash never leaves the server.
#[derive(Debug, Serialize)]
pub struct PublicAccount {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub dorms: Vec<Uuid>,
    pub roommates: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&Account> for PublicAccount {
    fn from(a: &Account) -> Self {
        Self {
            id: a.id,
            username: a.username.clone(),
            email: a.email.clone(),
            dorms: a.dorms.clone(),
            roommates: a.roommates.clone(),
            created_at: a.created_at,
        }
    }
}

/// Body of `PUT /users/me`; omitted fields are left unchanged.
#[derive(Default, Deserialize)]
pub struct UpdateAccountRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for UpdateAccountRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateAccountRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .finish()
    }
}

/// Confirmation body for deletions.
#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub detail: String,
}

impl DeletedResponse {
    pub fn new(kind: &str) -> Self {
        Self {
            detail: format!("{kind} deleted"),
        }
    }
}
