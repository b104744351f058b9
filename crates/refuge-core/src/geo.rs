//! Spherical geometry helpers.
//!
//! Radius queries follow the `$centerSphere` convention: a radius in
//! kilometres is converted to an angular radius by dividing by the Earth's
//! mean radius, and a point matches when its great-circle angle from the
//! center is within that angular radius.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::models::GeoPoint;

/// Earth's mean radius used for radius conversion, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6378.1;

/// Convert a radius in kilometres to an angular radius in radians.
pub fn angular_radius(radius_km: f64) -> f64 {
    radius_km / EARTH_RADIUS_KM
}

/// Central angle between two points in radians (haversine formula).
pub fn central_angle(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * h.sqrt().min(1.0).asin()
}

/// Great-circle distance in kilometres.
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    central_angle(a, b) * EARTH_RADIUS_KM
}

/// Whether `point` lies within `radius_km` of `center` on the sphere.
pub fn within_radius(center: &GeoPoint, point: &GeoPoint, radius_km: f64) -> bool {
    central_angle(center, point) <= angular_radius(radius_km)
}

/// Half-height of the latitude band that fully contains a radius query, in
/// degrees. Stores use it as a cheap index pre-filter before the exact test.
pub fn latitude_band_deg(radius_km: f64) -> f64 {
    angular_radius(radius_km).to_degrees()
}

/// A query rectangle in `(min_lat, min_lon, max_lat, max_lon)` order, the
/// order the geodata source expects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> anyhow::Result<Self> {
        if !(-90.0..=90.0).contains(&min_lat) || !(-90.0..=90.0).contains(&max_lat) {
            bail!("latitude out of range in bbox");
        }
        if !(-180.0..=180.0).contains(&min_lon) || !(-180.0..=180.0).contains(&max_lon) {
            bail!("longitude out of range in bbox");
        }
        if min_lat > max_lat || min_lon > max_lon {
            bail!("bbox minimum exceeds maximum");
        }
        Ok(Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        })
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lon..=self.max_lon).contains(&point.lon)
    }
}

impl FromStr for BoundingBox {
    type Err = anyhow::Error;

    /// Parses `"min_lat,min_lon,max_lat,max_lon"`.
    fn from_str(s: &str) -> anyhow::Result<Self> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .with_context(|| format!("invalid bbox '{}'", s))?;
        if parts.len() != 4 {
            bail!("bbox '{}' must have 4 comma-separated numbers", s);
        }
        Self::new(parts[0], parts[1], parts[2], parts[3])
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_lat, self.min_lon, self.max_lat, self.max_lon
        )
    }
}
