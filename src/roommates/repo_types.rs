use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{
    dates::iso_date, db::Collection, repo::Document, roommates::dto::CreateRoommateRequest,
};

/// Roommate request document in the `roommate_requests` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoommateRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub preferred_gender: Option<String>,
    #[serde(default)]
    pub max_rent: Option<f64>,
    #[serde(default, with = "iso_date::option")]
    pub move_in_date: Option<Date>,
    #[serde(default)]
    pub preferences: Option<String>,
    /// Filed without a bearer token, so `user_id` is unverified.
    #[serde(default)]
    pub anonymous: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl RoommateRequest {
    pub fn from_request(id: Uuid, user_id: Uuid, anonymous: bool, req: CreateRoommateRequest) -> Self {
        Self {
            id,
            user_id,
            preferred_gender: req.preferred_gender.filter(|g| !g.trim().is_empty()),
            max_rent: req.max_rent,
            move_in_date: req.move_in_date,
            preferences: req.preferences,
            anonymous,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

impl Document for RoommateRequest {
    const COLLECTION: Collection = Collection {
        name: "roommate_requests",
        unique: &[],
    };
    const KIND: &'static str = "Roommate request";

    fn id(&self) -> Uuid {
        self.id
    }
}
