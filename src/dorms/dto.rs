use serde::{Deserialize, Serialize};
use serde_json::json;
use time::Date;

use crate::{
    chatbot::dto::MAX_QUERY_CHARS,
    dates::iso_date,
    db::Filter,
    dorms::{geo::GeoPoint, repo_types::DormListing, search::DormSearchCriteria},
    error::AppError,
    repo::Page,
};

#[derive(Debug, Deserialize)]
pub struct CreateDormRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    pub coordinates: Option<GeoPoint>,
    pub price: f64,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(with = "iso_date")]
    pub available_from: Date,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateDormRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub coordinates: Option<GeoPoint>,
    pub price: Option<f64>,
    pub amenities: Option<Vec<String>>,
    #[serde(default, with = "iso_date::option")]
    pub available_from: Option<Date>,
}

fn check_price(price: f64) -> Result<(), AppError> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::validation("price must be a non-negative number"));
    }
    Ok(())
}

fn check_text(name: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{name} must not be empty")));
    }
    Ok(())
}

impl CreateDormRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        check_text("title", &self.title)?;
        check_text("location", &self.location)?;
        if let Some(point) = &self.coordinates {
            point.validate()?;
        }
        check_price(self.price)
    }
}

impl UpdateDormRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(t) = &self.title {
            check_text("title", t)?;
        }
        if let Some(l) = &self.location {
            check_text("location", l)?;
        }
        if let Some(point) = &self.coordinates {
            point.validate()?;
        }
        if let Some(p) = self.price {
            check_price(p)?;
        }
        Ok(())
    }
}

/// Query string of `GET /dorms`.
#[derive(Debug, Default, Deserialize)]
pub struct DormQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl DormQuery {
    pub fn page(&self) -> Result<Page, AppError> {
        Page::new(self.skip, self.limit)
    }

    /// Inclusive price bounds.
    pub fn filters(&self) -> Result<Vec<Filter>, AppError> {
        if let (Some(lo), Some(hi)) = (self.min_price, self.max_price) {
            if lo > hi {
                return Err(AppError::validation("min_price must not exceed max_price"));
            }
        }
        let mut filters = Vec::new();
        if let Some(lo) = self.min_price {
            check_price(lo)?;
            filters.push(Filter::Gte("price", json!(lo)));
        }
        if let Some(hi) = self.max_price {
            check_price(hi)?;
            filters.push(Filter::Lte("price", json!(hi)));
        }
        Ok(filters)
    }
}

/// Body of `POST /ai/search-dorms`.
#[derive(Debug, Deserialize)]
pub struct SearchDormsRequest {
    pub query: String,
}

impl SearchDormsRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.query.trim().is_empty() {
            return Err(AppError::validation("query must not be empty"));
        }
        if self.query.chars().count() > MAX_QUERY_CHARS {
            return Err(AppError::validation(format!(
                "query must be at most {MAX_QUERY_CHARS} characters"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct SearchDormsResponse {
    pub dorms: Vec<DormListing>,
    pub criteria: DormSearchCriteria,
    pub response: String,
}
