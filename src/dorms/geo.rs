use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Equatorial radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6378.1;
pub const DEFAULT_RADIUS_KM: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn validate(&self) -> Result<(), AppError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(AppError::validation("lat must be between -90 and 90"));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(AppError::validation("lng must be between -180 and 180"));
        }
        Ok(())
    }

    /// Great-circle (haversine) distance in kilometres.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlng = (other.lng - self.lng).to_radians();
        let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
    }
}

pub fn check_radius(km: f64) -> Result<(), AppError> {
    if !km.is_finite() || km <= 0.0 {
        return Err(AppError::validation("distance must be a positive number of kilometres"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_zero_to_self_and_symmetric() {
        let a = GeoPoint { lat: 40.0, lng: -73.0 };
        let b = GeoPoint { lat: 40.1, lng: -73.2 };
        assert_eq!(a.distance_km(&a), 0.0);
        assert!((a.distance_km(&b) - b.distance_km(&a)).abs() < 1e-9);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let a = GeoPoint { lat: 0.0, lng: 0.0 };
        let b = GeoPoint { lat: 1.0, lng: 0.0 };
        let d = a.distance_km(&b);
        assert!((d - 111.3).abs() < 0.5, "got {d}");
    }

    #[test]
    fn out_of_range_points_are_rejected() {
        assert!(GeoPoint { lat: 91.0, lng: 0.0 }.validate().is_err());
        assert!(GeoPoint { lat: 0.0, lng: -180.5 }.validate().is_err());
        assert!(GeoPoint { lat: f64::NAN, lng: 0.0 }.validate().is_err());
        assert!(GeoPoint { lat: -90.0, lng: 180.0 }.validate().is_ok());
        assert!(check_radius(0.0).is_err());
        assert!(check_radius(2.5).is_ok());
    }
}
