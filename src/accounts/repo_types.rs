use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{db::Collection, repo::Document, roommates::preferences::RoommatePreferences};

/// Account document in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String, // argon2 PHC string, never sent to clients
    #[serde(default)]
    pub dorms: Vec<Uuid>,
    #[serde(default)]
    pub roommates: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roommate_preferences: Option<RoommatePreferences>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Account {
    pub fn new(id: Uuid, username: String, email: String, password_hash: String) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id,
            username,
            email,
            password_hash,
            dorms: Vec::new(),
            roommates: Vec::new(),
            roommate_preferences: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Document for Account {
    const COLLECTION: Collection = Collection {
        name: "users",
        unique: &["username"],
    };
    const KIND: &'static str = "User";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Profile fields that may change after registration.
#[derive(Debug, Serialize)]
pub struct AccountPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Replaces the stored roommate preferences as a whole.
#[derive(Debug, Serialize)]
pub struct PreferencesPatch<'a> {
    pub roommate_preferences: &'a RoommatePreferences,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
