//! Embedding provider trait, batch contract, and vector utilities.
//!
//! Concrete providers (Gemini, OpenAI, Ollama) live in the `refuge` app
//! crate. This module owns the one rule every caller relies on:
//! [`generate_embeddings`] returns exactly one vector per input, in input
//! order, substituting a zero vector for any item the provider failed on.
//!
//! A zero vector means "embedding unavailable". It is never a semantic
//! vector: stores skip it during similarity search and retrieval treats it
//! as a failed query embedding.

use async_trait::async_trait;
use tracing::warn;

use crate::error::{SourceError, SourceResult};

/// Trait for embedding providers.
///
/// One call embeds one text. Providers do not cache or retry; a failure is
/// reported as a [`SourceError`] and handled by [`generate_embeddings`].
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-004"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `768`).
    fn dims(&self) -> usize;
    /// Embed a single text.
    async fn embed(&self, text: &str) -> SourceResult<Vec<f32>>;
}

/// Embed `texts` one request at a time, preserving order and length.
///
/// Per-item failures (including a vector of the wrong dimension) yield
/// [`zero_vector`] for that position; the batch itself never fails.
pub async fn generate_embeddings(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
) -> Vec<Vec<f32>> {
    let dims = provider.dims();
    let mut out = Vec::with_capacity(texts.len());

    for (i, text) in texts.iter().enumerate() {
        let vector = match provider.embed(text).await {
            Ok(v) if v.len() == dims => v,
            Ok(v) => {
                warn!(
                    index = i,
                    expected = dims,
                    got = v.len(),
                    "embedding has wrong dimension; using zero vector"
                );
                zero_vector(dims)
            }
            Err(e) => {
                warn!(index = i, error = %e, "embedding failed; using zero vector");
                zero_vector(dims)
            }
        };
        out.push(vector);
    }

    out
}

/// Embed a single query text through the batch contract.
///
/// Returns `None` when the provider failed (the batch produced a zero
/// vector), so the caller never searches with a placeholder.
pub async fn embed_query(provider: &dyn EmbeddingProvider, text: &str) -> Option<Vec<f32>> {
    generate_embeddings(provider, &[text.to_string()])
        .await
        .into_iter()
        .next()
        .filter(|v| !is_zero_vector(v))
}

pub fn zero_vector(dims: usize) -> Vec<f32> {
    vec![0.0; dims]
}

/// True for empty or all-zero vectors.
pub fn is_zero_vector(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}

/// A provider that always fails. Used when embeddings are not configured.
pub struct DisabledProvider {
    dims: usize,
}

impl DisabledProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, _text: &str) -> SourceResult<Vec<f32>> {
        Err(SourceError::Disabled("embedding provider"))
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing
/// a BLOB of `vec.len() × 4` bytes.
///
/// # Example
///
/// ```rust
/// use refuge_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors, vectors of
/// different lengths, or a zero-magnitude operand.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
