//! Element queries: semantic similarity combined with structural filters.

use crate::errors::PipelineError;
use crate::index::{SearchFilters, SearchHit, SemanticIndex};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

fn default_k() -> usize {
    3
}

fn default_min_score() -> f32 {
    0.5
}

/// An `element.search` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    #[serde(default)]
    pub filters: SearchFilters,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            k: default_k(),
            min_score: default_min_score(),
            filters: SearchFilters::default(),
        }
    }
}

/// Run an element search against the index.
///
/// If nothing clears the score floor, the floor drops by 0.1 and the query
/// is retried exactly once. The embedding-level filters already restrict
/// clickability; the post-filter here keeps the guarantee even for hits
/// whose stored flag disagrees with the filter.
#[instrument(skip(index, request), fields(query = %request.query))]
pub async fn search_elements(
    index: &SemanticIndex,
    request: &SearchRequest,
) -> Result<Vec<SearchHit>, PipelineError> {
    if request.query.trim().is_empty() {
        return Err(PipelineError::InvalidInput("empty search query".into()));
    }

    let mut hits = index
        .search(&request.query, request.k, request.min_score, &request.filters)
        .await?;

    if hits.is_empty() && request.min_score > 0.0 {
        let relaxed = (request.min_score - 0.1).max(0.0);
        debug!(relaxed, "no hits, relaxing min score once");
        hits = index
            .search(&request.query, request.k, relaxed, &request.filters)
            .await?;
    }

    if request.filters.clickable_only {
        hits.retain(|hit| hit.element.clickable);
    }
    Ok(hits)
}
