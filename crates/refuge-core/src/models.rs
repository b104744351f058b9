//! Core data models used throughout Refuge.
//!
//! Raw records ([`RawElement`], [`QuakeRecord`]) are what connectors hand to
//! the normalizer; [`Shelter`] and [`Disaster`] are the canonical entities
//! persisted by a [`Store`](crate::store::Store) and returned by retrieval.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point on the globe in `(longitude, latitude)` order, matching the
/// GeoJSON convention used by geospatial indexes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Bit-exact key for deduplication. Two points are the same entity only
    /// when both coordinates are numerically equal; no tolerance applies.
    /// `-0.0` folds into `0.0`, matching SQL equality.
    pub fn dedup_key(&self) -> (u64, u64) {
        ((self.lon + 0.0).to_bits(), (self.lat + 0.0).to_bits())
    }
}

/// Shelter classification, derived by the normalizer from source tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShelterType {
    #[serde(rename = "emergency")]
    Emergency,
    #[serde(rename = "temporary")]
    Temporary,
    #[serde(rename = "long-term")]
    LongTerm,
}

impl ShelterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShelterType::Emergency => "emergency",
            ShelterType::Temporary => "temporary",
            ShelterType::LongTerm => "long-term",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "emergency" => Some(ShelterType::Emergency),
            "temporary" => Some(ShelterType::Temporary),
            "long-term" => Some(ShelterType::LongTerm),
            _ => None,
        }
    }
}

impl fmt::Display for ShelterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical amenity tags a shelter may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Amenity {
    WheelchairAccessible,
    Internet,
    Restrooms,
    Water,
    Showers,
}

impl Amenity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Amenity::WheelchairAccessible => "wheelchair_accessible",
            Amenity::Internet => "internet",
            Amenity::Restrooms => "restrooms",
            Amenity::Water => "water",
            Amenity::Showers => "showers",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "wheelchair_accessible" => Some(Amenity::WheelchairAccessible),
            "internet" => Some(Amenity::Internet),
            "restrooms" => Some(Amenity::Restrooms),
            "water" => Some(Amenity::Water),
            "showers" => Some(Amenity::Showers),
            _ => None,
        }
    }
}

/// Contact details. Only constructed when at least one field is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ContactInfo {
    pub fn is_empty(&self) -> bool {
        self.phone.is_none() && self.website.is_none() && self.email.is_none()
    }
}

/// An emergency-shelter facility.
///
/// Deduplicated by [`location`](Shelter::location): two shelters with an
/// identical point are the same physical entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shelter {
    /// Identifier assigned by the source system (e.g. `"node/123"`).
    pub id: String,
    pub name: String,
    pub location: GeoPoint,
    pub address: Option<String>,
    pub shelter_type: ShelterType,
    pub capacity: Option<u32>,
    pub amenities: BTreeSet<Amenity>,
    pub contact_info: Option<ContactInfo>,
    /// Human-readable summary; the embedding input text.
    pub description: String,
    /// `None` until computed. An all-zero vector means "embedding
    /// unavailable" and never takes part in similarity ranking.
    #[serde(default, skip_serializing)]
    pub embedding: Option<Vec<f32>>,
}

/// Kind of disaster event. Only earthquakes are ingested today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisasterKind {
    Earthquake,
}

impl DisasterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisasterKind::Earthquake => "earthquake",
        }
    }
}

/// Severity bucket derived from magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }
}

/// A seismic event. Deduplicated by the `(time, place)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disaster {
    pub kind: DisasterKind,
    pub place: String,
    pub magnitude: f64,
    pub coordinates: GeoPoint,
    pub time: DateTime<Utc>,
    pub description: String,
    pub severity: Severity,
}

impl Disaster {
    pub fn dedup_key(&self) -> (i64, &str) {
        (self.time.timestamp_millis(), self.place.as_str())
    }
}

/// Geometry type of a raw geodata element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Node,
    Way,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Way => "way",
        }
    }
}

/// Raw tagged element produced by the shelter connector.
///
/// Area geometries arrive with their representative center already resolved
/// into `position`; an element with no resolvable point has `position: None`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawElement {
    pub kind: ElementKind,
    pub id: i64,
    pub position: Option<GeoPoint>,
    pub tags: BTreeMap<String, String>,
}

/// Raw seismic record produced by the seismic connector, with its place name
/// already resolved (reverse-geocoded or substituted).
#[derive(Debug, Clone, PartialEq)]
pub struct QuakeRecord {
    pub magnitude: f64,
    pub coordinates: GeoPoint,
    /// Event time in epoch milliseconds.
    pub time_ms: i64,
    pub place: String,
}

/// A shelter returned from retrieval, annotated with how it matched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShelterHit {
    #[serde(flatten)]
    pub shelter: Shelter,
    /// Similarity score (vector search only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Great-circle distance from the query point (geospatial search only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

/// A disaster returned from full-text search with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisasterHit {
    #[serde(flatten)]
    pub disaster: Disaster,
    pub score: f64,
}

/// Format a float the way the feed reports it: integral values keep one
/// decimal place (`5.0`), others use the shortest round-trip form (`4.25`).
pub fn format_decimal(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}
