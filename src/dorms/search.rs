//! Natural-language dorm search: a chat model turns the user's query into
//! structured criteria, which are then applied to the listings.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::{
    db::Filter,
    dorms::{geo::GeoPoint, repo_types::DormListing},
};

pub const SEARCH_LIMIT: usize = 10;
pub const SEARCH_RADIUS_KM: f64 = 5.0;

pub const CRITERIA_PROMPT: &str = "You extract dorm search criteria from a student's query. \
Reply with one JSON object and nothing else, using only the fields the query mentions: \
\"max_price\" (number), \"min_price\" (number), \"amenities\" (array of strings such as \
\"wifi\" or \"gym\"), \"location\" (text such as a campus or street), \"coordinates\" \
({\"lat\": number, \"lng\": number}).";

lazy_static! {
    static ref JSON_OBJECT_RE: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
}

/// What the model understood from the query. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DormSearchCriteria {
    #[serde(alias = "maxPrice", skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(alias = "minPrice", skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    pub amenities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<GeoPoint>,
}

impl DormSearchCriteria {
    /// Reads the model's reply. Text around the JSON object is ignored and an
    /// unreadable reply yields no criteria.
    pub fn from_reply(reply: &str) -> Self {
        let parsed = serde_json::from_str::<Self>(reply.trim()).ok().or_else(|| {
            JSON_OBJECT_RE
                .find(reply)
                .and_then(|m| serde_json::from_str::<Self>(m.as_str()).ok())
        });
        match parsed {
            Some(criteria) => criteria.sanitized(),
            None => {
                debug!("search criteria reply was not JSON");
                Self::default()
            }
        }
    }

    /// Drops values that cannot be applied.
    fn sanitized(mut self) -> Self {
        let usable = |p: &f64| p.is_finite() && *p >= 0.0;
        self.max_price = self.max_price.filter(usable);
        self.min_price = self.min_price.filter(usable);
        self.amenities = self
            .amenities
            .into_iter()
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect();
        self.location = self
            .location
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        self.coordinates = self.coordinates.filter(|c| c.validate().is_ok());
        self
    }

    /// Price bounds, pushed down to the store.
    pub fn filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let Some(lo) = self.min_price {
            filters.push(Filter::Gte("price", json!(lo)));
        }
        if let Some(hi) = self.max_price {
            filters.push(Filter::Lte("price", json!(hi)));
        }
        filters
    }

    /// Checks the criteria the store cannot: amenities, place and distance.
    pub fn matches(&self, dorm: &DormListing) -> bool {
        let has_amenities = self.amenities.iter().all(|wanted| {
            dorm.amenities
                .iter()
                .any(|a| a.trim().eq_ignore_ascii_case(wanted))
        });
        if !has_amenities {
            return false;
        }
        match (&self.coordinates, &self.location) {
            (Some(center), _) => dorm
                .coordinates
                .is_some_and(|p| p.distance_km(center) <= SEARCH_RADIUS_KM),
            (None, Some(place)) => dorm.location.to_lowercase().contains(&place.to_lowercase()),
            (None, None) => true,
        }
    }
}

/// Message asking the model to present the results to the user.
pub fn summary_prompt(query: &str, dorms: &[DormListing]) -> String {
    if dorms.is_empty() {
        return format!(
            "A student searched for \"{query}\" and no dorm matched. \
             Suggest how they could broaden the search."
        );
    }
    let listing: Vec<String> = dorms
        .iter()
        .map(|d| format!("- {} in {} for {}", d.title, d.location, d.price))
        .collect();
    format!(
        "A student searched for \"{query}\". These dorms matched:\n{}\n\
         Summarise them briefly for the student.",
        listing.join("\n")
    )
}
