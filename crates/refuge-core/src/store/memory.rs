//! In-memory [`Store`] implementation for tests and embedded use.
//!
//! Uses `Vec`s behind `std::sync::RwLock`. Geospatial and vector search are
//! brute force; text search counts matched query terms over place and
//! description.

use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::embedding::{cosine_similarity, is_zero_vector};
use crate::geo::{distance_km, within_radius};
use crate::models::{Disaster, DisasterHit, GeoPoint, Shelter, ShelterHit};

use super::{
    sort_by_distance, sort_by_score_desc, unique_disasters, unique_shelters, Store, StoreStats,
};

/// In-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    shelters: RwLock<Vec<Shelter>>,
    disasters: RwLock<Vec<Disaster>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn as_hit(shelter: &Shelter) -> ShelterHit {
    ShelterHit {
        shelter: shelter.clone(),
        score: None,
        distance_km: None,
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_shelters(&self, shelters: &[Shelter]) -> Result<usize> {
        let mut stored = write(&self.shelters)?;
        let existing: HashSet<(u64, u64)> =
            stored.iter().map(|s| s.location.dedup_key()).collect();

        let fresh: Vec<Shelter> = unique_shelters(shelters)
            .into_iter()
            .filter(|s| !existing.contains(&s.location.dedup_key()))
            .cloned()
            .collect();
        let inserted = fresh.len();
        stored.extend(fresh);
        Ok(inserted)
    }

    async fn insert_disasters(&self, disasters: &[Disaster]) -> Result<usize> {
        let mut stored = write(&self.disasters)?;
        let existing: HashSet<(i64, String)> = stored
            .iter()
            .map(|d| (d.time.timestamp_millis(), d.place.clone()))
            .collect();

        let fresh: Vec<Disaster> = unique_disasters(disasters)
            .into_iter()
            .filter(|d| !existing.contains(&(d.time.timestamp_millis(), d.place.clone())))
            .cloned()
            .collect();
        let inserted = fresh.len();
        stored.extend(fresh);
        Ok(inserted)
    }

    async fn search_disasters(&self, query: &str, limit: i64) -> Result<Vec<DisasterHit>> {
        let query_lower = query.to_lowercase();
        let terms: Vec<&str> = query_lower.split_whitespace().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let stored = read(&self.disasters)?;
        let mut hits: Vec<DisasterHit> = stored
            .iter()
            .filter_map(|d| {
                let haystack = format!("{} {}", d.place, d.description).to_lowercase();
                let matches = terms.iter().filter(|t| haystack.contains(*t)).count();
                (matches > 0).then(|| DisasterHit {
                    disaster: d.clone(),
                    score: matches as f64,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.disaster.time.cmp(&a.disaster.time))
        });
        hits.truncate(limit.max(0) as usize);
        Ok(hits)
    }

    async fn shelters_near(&self, center: GeoPoint, radius_km: f64) -> Result<Vec<ShelterHit>> {
        let stored = read(&self.shelters)?;
        let mut hits: Vec<ShelterHit> = stored
            .iter()
            .filter(|s| within_radius(&center, &s.location, radius_km))
            .map(|s| ShelterHit {
                distance_km: Some(distance_km(&center, &s.location)),
                ..as_hit(s)
            })
            .collect();
        sort_by_distance(&mut hits);
        Ok(hits)
    }

    async fn vector_search_shelters(
        &self,
        query_vec: &[f32],
        limit: i64,
        _num_candidates: i64,
    ) -> Result<Vec<ShelterHit>> {
        let stored = read(&self.shelters)?;
        let mut hits: Vec<ShelterHit> = stored
            .iter()
            .filter_map(|s| {
                let embedding = s.embedding.as_deref().filter(|v| !is_zero_vector(v))?;
                Some(ShelterHit {
                    score: Some(cosine_similarity(query_vec, embedding) as f64),
                    ..as_hit(s)
                })
            })
            .collect();

        // Exact scan; every stored vector is a candidate.
        sort_by_score_desc(&mut hits);
        hits.truncate(limit.max(0) as usize);
        Ok(hits)
    }

    async fn recent_disasters(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<Disaster>> {
        let stored = read(&self.disasters)?;
        let mut recent: Vec<Disaster> = stored.iter().filter(|d| d.time >= since).cloned().collect();
        recent.sort_by(|a, b| b.time.cmp(&a.time));
        recent.truncate(limit.max(0) as usize);
        Ok(recent)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let shelters = read(&self.shelters)?;
        let disasters = read(&self.disasters)?;
        Ok(StoreStats {
            shelters: shelters.len() as i64,
            embedded_shelters: shelters
                .iter()
                .filter(|s| s.embedding.as_deref().is_some_and(|v| !is_zero_vector(v)))
                .count() as i64,
            disasters: disasters.len() as i64,
            newest_disaster: disasters.iter().map(|d| d.time).max(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DisasterKind, Severity, ShelterType};
    use chrono::Duration;
    use std::collections::BTreeSet;

    fn shelter(id: &str, lon: f64, lat: f64, embedding: Option<Vec<f32>>) -> Shelter {
        Shelter {
            id: id.to_string(),
            name: id.to_string(),
            location: GeoPoint::new(lon, lat),
            address: None,
            shelter_type: ShelterType::Temporary,
            capacity: None,
            amenities: BTreeSet::new(),
            contact_info: None,
            description: format!("{} is a temporary shelter", id),
            embedding,
        }
    }

    fn quake(place: &str, time: DateTime<Utc>) -> Disaster {
        Disaster {
            kind: DisasterKind::Earthquake,
            place: place.to_string(),
            magnitude: 4.2,
            coordinates: GeoPoint::new(0.0, 0.0),
            time,
            description: format!("Magnitude 4.2 earthquake occurred in {}", place),
            severity: Severity::Medium,
        }
    }

    #[tokio::test]
    async fn test_shelter_dedup_by_location() {
        let store = InMemoryStore::new();
        let batch = vec![
            shelter("a", -122.0, 37.0, None),
            shelter("b", -122.0, 37.0, None),
            shelter("c", -122.1, 37.0, None),
        ];
        assert_eq!(store.insert_shelters(&batch).await.unwrap(), 2);
        assert_eq!(store.insert_shelters(&batch).await.unwrap(), 0);
        assert_eq!(store.stats().await.unwrap().shelters, 2);

        let prime_meridian = vec![shelter("east", 0.0, 51.48, None)];
        assert_eq!(store.insert_shelters(&prime_meridian).await.unwrap(), 1);
        let signed = vec![shelter("west", -0.0, 51.48, None)];
        assert_eq!(store.insert_shelters(&signed).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_disaster_dedup_by_time_and_place() {
        let store = InMemoryStore::new();
        let t = Utc::now();
        let batch = vec![quake("Alaska", t), quake("Alaska", t), quake("Chile", t)];
        assert_eq!(store.insert_disasters(&batch).await.unwrap(), 2);
        assert_eq!(store.insert_disasters(&batch).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_vector_search_skips_zero_vectors() {
        let store = InMemoryStore::new();
        store
            .insert_shelters(&[
                shelter("near", 0.0, 0.0, Some(vec![1.0, 0.0])),
                shelter("far", 1.0, 0.0, Some(vec![0.0, 1.0])),
                shelter("zero", 2.0, 0.0, Some(vec![0.0, 0.0])),
                shelter("none", 3.0, 0.0, None),
            ])
            .await
            .unwrap();

        let hits = store
            .vector_search_shelters(&[1.0, 0.1], 10, 100)
            .await
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.shelter.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "far"]);
        assert!(hits[0].score.unwrap() > hits[1].score.unwrap());
        assert_eq!(store.stats().await.unwrap().embedded_shelters, 2);

        let top = store.vector_search_shelters(&[1.0, 0.1], 1, 100).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].shelter.id, "near");
    }

    #[tokio::test]
    async fn test_shelters_near_sorted_by_distance() {
        let store = InMemoryStore::new();
        store
            .insert_shelters(&[
                shelter("ten_km", 0.0, 0.09, None),
                shelter("one_km", 0.0, 0.009, None),
                shelter("far_away", 5.0, 5.0, None),
            ])
            .await
            .unwrap();

        let hits = store.shelters_near(GeoPoint::new(0.0, 0.0), 50.0).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.shelter.id.as_str()).collect();
        assert_eq!(ids, vec!["one_km", "ten_km"]);
        assert!(hits[0].distance_km.unwrap() < 1.1);
    }

    #[tokio::test]
    async fn test_text_search_ranks_by_matches() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store
            .insert_disasters(&[
                quake("Anchorage, Alaska", now),
                quake("Fairbanks, Alaska", now - Duration::hours(1)),
                quake("Santiago, Chile", now),
            ])
            .await
            .unwrap();

        let hits = store.search_disasters("anchorage alaska", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].disaster.place, "Anchorage, Alaska");
        assert!(store.search_disasters("   ", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_window_boundary() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let cutoff = now - Duration::hours(24);
        store
            .insert_disasters(&[
                quake("inside", cutoff + Duration::seconds(1)),
                quake("outside", cutoff - Duration::seconds(1)),
                quake("newest", now),
            ])
            .await
            .unwrap();

        let recent = store.recent_disasters(cutoff, 10).await.unwrap();
        let places: Vec<&str> = recent.iter().map(|d| d.place.as_str()).collect();
        assert_eq!(places, vec!["newest", "inside"]);
    }
}
