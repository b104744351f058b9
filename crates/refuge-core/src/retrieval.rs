//! Hybrid retrieval orchestrator.
//!
//! Given a question and an optional coordinate fix, assemble a
//! [`RetrievalContext`] from two independent branches:
//!
//! 1. **Recency** — disasters from the last `recent_hours`, always fetched.
//! 2. **Shelters** — geo-first, semantic-fallback:
//!    - with coordinates, a radius search; any hit ends the branch;
//!    - otherwise (or on zero hits) the question is embedded and a vector
//!      similarity search runs.
//!
//! The two branches run concurrently. Within the shelter branch the
//! strategies are sequential and the results are never merged. Store errors
//! degrade to an empty set with a logged cause.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::models::{Disaster, GeoPoint, ShelterHit};
use crate::store::Store;

/// Tunables for one retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalParams {
    pub recent_hours: i64,
    pub recent_limit: i64,
    pub radius_km: f64,
    pub vector_limit: i64,
    /// Candidate-set size for vector search, as a multiple of `vector_limit`.
    pub candidate_multiplier: i64,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            recent_hours: 24,
            recent_limit: 50,
            radius_km: 50.0,
            vector_limit: 10,
            candidate_multiplier: 10,
        }
    }
}

impl RetrievalParams {
    pub fn num_candidates(&self) -> i64 {
        self.vector_limit.saturating_mul(self.candidate_multiplier.max(1))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalRequest {
    pub question: String,
    pub location: Option<GeoPoint>,
}

impl RetrievalRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            location: None,
        }
    }

    pub fn at(mut self, lat: f64, lon: f64) -> Self {
        self.location = Some(GeoPoint::new(lon, lat));
        self
    }
}

/// The query coordinates echoed back in the context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QueryLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Which strategy produced `nearby_shelters`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShelterStrategy {
    Geo,
    Vector,
    /// The question could not be embedded; no shelter search ran.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalContext {
    pub recent_disasters: Vec<Disaster>,
    pub nearby_shelters: Vec<ShelterHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_location: Option<QueryLocation>,
    pub strategy: ShelterStrategy,
}

/// Start of a recency window `hours` long ending at `now`.
///
/// Saturates at the earliest representable instant, so an oversized
/// window covers everything instead of overflowing.
pub fn window_start(now: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
    Duration::try_hours(hours)
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Run a retrieval against the current time.
pub async fn retrieve(
    store: &dyn Store,
    embedder: &dyn EmbeddingProvider,
    request: &RetrievalRequest,
    params: &RetrievalParams,
) -> RetrievalContext {
    retrieve_at(store, embedder, request, params, Utc::now()).await
}

/// Run a retrieval with the recency window anchored at `now`.
pub async fn retrieve_at(
    store: &dyn Store,
    embedder: &dyn EmbeddingProvider,
    request: &RetrievalRequest,
    params: &RetrievalParams,
    now: DateTime<Utc>,
) -> RetrievalContext {
    let since = window_start(now, params.recent_hours);

    let (recent_disasters, (nearby_shelters, strategy)) = futures::join!(
        recent_branch(store, since, params.recent_limit),
        shelter_branch(store, embedder, request, params),
    );

    RetrievalContext {
        recent_disasters,
        nearby_shelters,
        query_location: request.location.map(|p| QueryLocation {
            latitude: p.lat,
            longitude: p.lon,
        }),
        strategy,
    }
}

async fn recent_branch(store: &dyn Store, since: DateTime<Utc>, limit: i64) -> Vec<Disaster> {
    match store.recent_disasters(since, limit).await {
        Ok(disasters) => disasters,
        Err(e) => {
            warn!(error = %e, "recent disaster lookup failed");
            Vec::new()
        }
    }
}

async fn shelter_branch(
    store: &dyn Store,
    embedder: &dyn EmbeddingProvider,
    request: &RetrievalRequest,
    params: &RetrievalParams,
) -> (Vec<ShelterHit>, ShelterStrategy) {
    if let Some(center) = request.location {
        match store.shelters_near(center, params.radius_km).await {
            Ok(hits) if !hits.is_empty() => {
                debug!(count = hits.len(), "geo search matched");
                return (hits, ShelterStrategy::Geo);
            }
            Ok(_) => debug!(radius_km = params.radius_km, "no shelters in radius"),
            Err(e) => warn!(error = %e, "geo shelter search failed"),
        }
    }

    let Some(query_vec) = embed_query(embedder, &request.question).await else {
        warn!("question embedding unavailable; skipping vector search");
        return (Vec::new(), ShelterStrategy::Unavailable);
    };

    let hits = match store
        .vector_search_shelters(&query_vec, params.vector_limit, params.num_candidates())
        .await
    {
        Ok(hits) => hits,
        Err(e) => {
            warn!(error = %e, "vector shelter search failed");
            Vec::new()
        }
    };
    (hits, ShelterStrategy::Vector)
}
