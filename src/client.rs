//! client.rs — the search capability the engine drives.
//!
//! The engine only needs one operation: a single k-NN query, optionally
//! returning the stored vectors of the hits (sessions need the top hit to
//! build their next query). Connection setup and collection admin live with
//! whoever implements the trait.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    dataset::{DataRow, Vector},
    errors::{LoadGenError, Result},
    recall::nearest_neighbors_sequential,
};

/// Ranked hits for one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    pub ids: Vec<i64>,
    /// Stored vectors aligned with `ids`, when requested and available.
    pub vectors: Option<Vec<Vector>>,
}

impl SearchResponse {
    /// Stored vector of the best hit, if the service returned one.
    pub fn top_vector(&self) -> Option<&[f32]> {
        self.vectors.as_ref()?.first().map(Vec::as_slice)
    }
}

/// Unified client for the service under test.
///
/// Implementations should watch `cancel` and return
/// `LoadGenError::Cancelled` once it fires; the engine never aborts a call.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(
        &self,
        query: &[f32],
        k: usize,
        with_vectors: bool,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse>;
}

/// Exact in-process "service": answers with the true nearest neighbours.
/// Useful as a reference SUT (recall is always 1.0) and in tests.
#[derive(Debug, Clone)]
pub struct BruteForceClient {
    rows: Arc<Vec<DataRow>>,
    dims: usize,
}

impl BruteForceClient {
    pub fn new(rows: Arc<Vec<DataRow>>) -> Self {
        let dims = rows.first().map(|r| r.vector.len()).unwrap_or(0);
        Self { rows, dims }
    }
}

#[async_trait]
impl SearchClient for BruteForceClient {
    async fn search(
        &self,
        query: &[f32],
        k: usize,
        with_vectors: bool,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse> {
        if cancel.is_cancelled() {
            return Err(LoadGenError::Cancelled);
        }
        if query.len() != self.dims {
            return Err(LoadGenError::DimensionMismatch { expected: self.dims, found: query.len() });
        }
        let hits = nearest_neighbors_sequential(query, &self.rows, k);
        let ids = hits.ids();
        let vectors = with_vectors.then(|| {
            // Ids come from the rows, so the lookup always succeeds.
            ids.iter()
                .filter_map(|id| self.rows.iter().find(|r| r.id == *id))
                .map(|r| r.vector.clone())
                .collect()
        });
        Ok(SearchResponse { ids, vectors })
    }
}
