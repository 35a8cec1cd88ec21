use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{
    dates::iso_date,
    db::Collection,
    dorms::{
        dto::{CreateDormRequest, UpdateDormRequest},
        geo::GeoPoint,
    },
    repo::Document,
};

/// Dorm listing document in the `dorms` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DormListing {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<GeoPoint>,
    pub price: f64,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(with = "iso_date")]
    pub available_from: Date,
    pub owner_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl DormListing {
    /// Builds a listing from an already validated request.
    pub fn from_request(id: Uuid, owner_id: Uuid, req: CreateDormRequest) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id,
            title: req.title.trim().to_string(),
            description: req.description,
            location: req.location.trim().to_string(),
            coordinates: req.coordinates,
            price: req.price,
            amenities: req.amenities,
            available_from: req.available_from,
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Document for DormListing {
    const COLLECTION: Collection = Collection {
        name: "dorms",
        unique: &[],
    };
    const KIND: &'static str = "Dorm";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Fields written by `PUT /dorms/{id}`; `None` leaves the stored value.
#[derive(Debug, Serialize)]
pub struct DormPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amenities: Option<Vec<String>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "iso_date::option"
    )]
    pub available_from: Option<Date>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl DormPatch {
    pub fn from_request(req: UpdateDormRequest) -> Self {
        Self {
            title: req.title.map(|t| t.trim().to_string()),
            description: req.description,
            location: req.location.map(|l| l.trim().to_string()),
            coordinates: req.coordinates,
            price: req.price,
            amenities: req.amenities,
            available_from: req.available_from,
            updated_at: OffsetDateTime::now_utc(),
        }
    }
}
