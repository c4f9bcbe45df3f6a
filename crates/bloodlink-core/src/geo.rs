//! Geographic primitives: validated coordinates and great-circle distance.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Mean earth radius in kilometers, used by the haversine computation.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point on the earth's surface in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Builds a point, rejecting coordinates outside [-90, 90] / [-180, 180]
    /// (or non-finite values).
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite()
            || !longitude.is_finite()
            || !(-90.0..=90.0).contains(&latitude)
            || !(-180.0..=180.0).contains(&longitude)
        {
            return Err(CoreError::invalid_coordinates(latitude, longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Great-circle distance to `other` in kilometers (haversine formula,
    /// spherical-earth approximation).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + self.latitude.to_radians().cos()
                * other.latitude.to_radians().cos()
                * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }

    /// Inclusive radius check: a point exactly at `radius_km` is inside.
    pub fn within_radius(&self, other: &GeoPoint, radius_km: f64) -> bool {
        self.distance_km(other) <= radius_km
    }
}

/// Anything that may carry a location, for geospatial candidate selection.
/// Candidates without a location are excluded from matching, never treated
/// as distance zero.
pub trait Positioned {
    fn position(&self) -> Option<GeoPoint>;
}

impl Positioned for GeoPoint {
    fn position(&self) -> Option<GeoPoint> {
        Some(*self)
    }
}
