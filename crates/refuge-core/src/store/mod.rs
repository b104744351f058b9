//! Storage abstraction for Refuge.
//!
//! The [`Store`] trait defines every read and write capability the
//! ingestion pipeline and the retrieval orchestrator need, over two logical
//! collections: shelters and disasters. Backends: SQLite (app crate) and
//! [`memory::InMemoryStore`].
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Disaster, DisasterHit, GeoPoint, Shelter, ShelterHit};

/// Collection sizes, for `refuge stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub shelters: i64,
    /// Shelters carrying a non-zero embedding.
    pub embedded_shelters: i64,
    pub disasters: i64,
    pub newest_disaster: Option<DateTime<Utc>>,
}

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Capability |
/// |--------|------------|
/// | [`insert_shelters`](Store::insert_shelters) | Upsert-with-dedup keyed by location |
/// | [`insert_disasters`](Store::insert_disasters) | Upsert-with-dedup keyed by `(time, place)` |
/// | [`search_disasters`](Store::search_disasters) | Full-text search over place + description |
/// | [`shelters_near`](Store::shelters_near) | Geospatial radius search |
/// | [`vector_search_shelters`](Store::vector_search_shelters) | Top-K similarity search |
/// | [`recent_disasters`](Store::recent_disasters) | Recency-window search |
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert shelters whose location is not already stored. Existence is
    /// checked for the whole batch before any row is written; duplicates
    /// inside the batch collapse to the first occurrence. Returns the number
    /// actually inserted.
    async fn insert_shelters(&self, shelters: &[Shelter]) -> Result<usize>;

    /// Insert disasters whose `(time, place)` is not already stored, with
    /// the same batch semantics as [`insert_shelters`](Store::insert_shelters).
    async fn insert_disasters(&self, disasters: &[Disaster]) -> Result<usize>;

    /// Full-text search over disasters, highest relevance first.
    async fn search_disasters(&self, query: &str, limit: i64) -> Result<Vec<DisasterHit>>;

    /// All shelters within `radius_km` of `center` on the sphere, nearest
    /// first, each annotated with its distance.
    async fn shelters_near(&self, center: GeoPoint, radius_km: f64) -> Result<Vec<ShelterHit>>;

    /// Top `limit` shelters by cosine similarity, each annotated with its
    /// score. Backends with approximate indexes examine `num_candidates`
    /// entries. Shelters without an embedding, or with the zero vector, never
    /// match.
    async fn vector_search_shelters(
        &self,
        query_vec: &[f32],
        limit: i64,
        num_candidates: i64,
    ) -> Result<Vec<ShelterHit>>;

    /// Disasters with `time >= since`, most recent first.
    async fn recent_disasters(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<Disaster>>;

    async fn stats(&self) -> Result<StoreStats>;
}

/// Keep the first shelter for each location and drop the rest.
pub fn unique_shelters(shelters: &[Shelter]) -> Vec<&Shelter> {
    let mut seen = HashSet::new();
    shelters
        .iter()
        .filter(|s| seen.insert(s.location.dedup_key()))
        .collect()
}

/// Keep the first disaster for each `(time, place)` and drop the rest.
pub fn unique_disasters(disasters: &[Disaster]) -> Vec<&Disaster> {
    let mut seen = HashSet::new();
    disasters
        .iter()
        .filter(|d| seen.insert(d.dedup_key()))
        .collect()
}

/// Sort shelter hits by score descending, keeping input order on ties.
pub(crate) fn sort_by_score_desc(hits: &mut [ShelterHit]) {
    hits.sort_by(|a, b| {
        b.score
            .unwrap_or(0.0)
            .partial_cmp(&a.score.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Sort shelter hits by distance ascending.
pub(crate) fn sort_by_distance(hits: &mut [ShelterHit]) {
    hits.sort_by(|a, b| {
        a.distance_km
            .unwrap_or(f64::INFINITY)
            .partial_cmp(&b.distance_km.unwrap_or(f64::INFINITY))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
