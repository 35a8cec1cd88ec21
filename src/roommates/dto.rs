use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::Date;
use uuid::Uuid;

use crate::{
    dates::iso_date, db::Filter, error::AppError, repo::Page,
    roommates::preferences::RoommatePreferences,
};

#[derive(Debug, Default, Deserialize)]
pub struct CreateRoommateRequest {
    /// Only read for anonymous callers and must name an existing account; a
    /// bearer token decides otherwise.
    pub user_id: Option<Uuid>,
    pub preferred_gender: Option<String>,
    pub max_rent: Option<f64>,
    #[serde(default, with = "iso_date::option")]
    pub move_in_date: Option<Date>,
    #[serde(alias = "description")]
    pub preferences: Option<String>,
}

impl CreateRoommateRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(rent) = self.max_rent {
            if !rent.is_finite() || rent < 0.0 {
                return Err(AppError::validation("max_rent must be a non-negative number"));
            }
        }
        Ok(())
    }
}

/// Query string of `GET /roommates`.
#[derive(Debug, Default, Deserialize)]
pub struct RoommateQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub user_id: Option<Uuid>,
}

impl RoommateQuery {
    pub fn page(&self) -> Result<Page, AppError> {
        Page::new(self.skip, self.limit)
    }

    pub fn filters(&self) -> Vec<Filter> {
        self.user_id
            .map(|id| Filter::Eq("user_id", Value::String(id.to_string())))
            .into_iter()
            .collect()
    }
}

/// Query string of `GET /roommates/matches`.
#[derive(Debug, Default, Deserialize)]
pub struct MatchQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl MatchQuery {
    pub fn page(&self) -> Result<Page, AppError> {
        Page::new(self.skip, self.limit)
    }
}

#[derive(Debug, Serialize)]
pub struct MatchedUser {
    pub id: Uuid,
    pub username: String,
}

/// One candidate roommate with their score against the caller.
#[derive(Debug, Serialize)]
pub struct RoommateMatch {
    pub user: MatchedUser,
    pub compatibility_score: i32,
    pub preferences: RoommatePreferences,
}
