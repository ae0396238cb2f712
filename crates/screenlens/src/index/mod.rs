//! Persistent semantic index: screens, elements and their embeddings, with
//! vector + filter search and a retention lifecycle.
//!
//! Writes are serialized per screen and committed in a single transaction,
//! so readers observe either the pre- or post-index state of a screen and
//! never a partially-indexed one.

pub mod retention;
pub mod search;
pub mod store;

pub use search::{SearchFilters, SearchHit};
pub use store::{ElementRecord, Store, StoreStats};

use crate::config::Config;
use crate::describe;
use crate::engine::Embedder;
use crate::errors::{PipelineError, StoreError};
use crate::types::{ScreenHeader, ScreenState};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Aggregate view returned by [`SemanticIndex::stats`].
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    #[serde(flatten)]
    pub store: StoreStats,
    /// Corrupt rows encountered (and quarantined) this process lifetime.
    pub corrupt_rows_seen: u64,
}

pub struct SemanticIndex {
    store: Arc<Store>,
    embedder: Arc<dyn Embedder>,
    config: Config,
    corrupt_seen: AtomicU64,
}

impl SemanticIndex {
    pub fn new(store: Store, embedder: Arc<dyn Embedder>, config: Config) -> Self {
        Self {
            store: Arc::new(store),
            embedder,
            config,
            corrupt_seen: AtomicU64::new(0),
        }
    }

    /// Open the index at the configured data directory.
    pub fn open(config: Config, embedder: Arc<dyn Embedder>) -> Result<Self, PipelineError> {
        let store = Store::open(config.index_path()).map_err(PipelineError::from)?;
        Ok(Self::new(store, embedder, config))
    }

    async fn run_store<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Store) -> Result<T, StoreError> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| StoreError::Backend(format!("store task failed: {e}")))?
    }

    /// Move corrupt rows aside and bump the metric.
    async fn quarantine(&self, screen_keys: Vec<String>, element_keys: Vec<String>) {
        let count = (screen_keys.len() + element_keys.len()) as u64;
        if count == 0 {
            return;
        }
        self.corrupt_seen.fetch_add(count, Ordering::Relaxed);
        let result = self
            .run_store(move |store| store.quarantine_rows(&screen_keys, &element_keys))
            .await;
        if let Err(e) = result {
            warn!(error = %e, "failed to quarantine corrupt rows");
        }
    }

    /// Texts to embed: one description per element that carries text.
    fn embed_inputs(state: &ScreenState) -> Vec<(String, String)> {
        let domain = state.url.as_deref().and_then(describe::domain_of);
        state
            .elements
            .iter()
            .filter(|e| !e.text.trim().is_empty())
            .map(|e| {
                (
                    e.id.clone(),
                    describe::node_description(e, &state.elements, &state.app, domain.as_deref()),
                )
            })
            .collect()
    }

    async fn embed_with_budget(
        &self,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, PipelineError> {
        let budget = Duration::from_millis(self.config.embed_timeout_ms);
        match tokio::time::timeout(budget, self.embedder.embed_batch(texts)).await {
            Ok(Ok(vectors)) if vectors.len() == texts.len() => Ok(vectors),
            Ok(Ok(vectors)) => Err(PipelineError::EmbedFailed(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            ))),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(PipelineError::EmbedFailed(format!(
                "embedding exceeded {}ms budget",
                self.config.embed_timeout_ms
            ))),
        }
    }

    /// Persist one screen state. Returns whether embeddings were written.
    ///
    /// Embedding failures degrade to an unembedded (but fully indexed)
    /// screen; only a store write failure is an error, and the transaction
    /// leaves no partial rows behind.
    #[instrument(skip(self, state), fields(screen_id = %state.id))]
    pub async fn index_screen_state(
        &self,
        state: &ScreenState,
        skip_embedding: bool,
    ) -> Result<bool, PipelineError> {
        let inputs = Self::embed_inputs(state);

        let mut vectors: HashMap<String, Vec<f32>> = HashMap::new();
        let mut embedded = false;
        if !skip_embedding && !inputs.is_empty() {
            let texts: Vec<String> = inputs.iter().map(|(_, t)| t.clone()).collect();
            match self.embed_with_budget(&texts).await {
                Ok(batch) => {
                    for ((element_id, _), vector) in inputs.iter().zip(batch) {
                        if vector.iter().all(|v| *v == 0.0) {
                            warn!(%element_id, "rejecting zero-magnitude embedding");
                            continue;
                        }
                        vectors.insert(element_id.clone(), vector);
                    }
                    embedded = true;
                }
                Err(e) => {
                    warn!(error = %e, "embedding failed, indexing without vectors");
                }
            }
        }

        let header = state.header();
        let rows: Vec<_> = state
            .elements
            .iter()
            .map(|e| (e.clone(), vectors.remove(&e.id)))
            .collect();
        self.run_store(move |store| store.put_screen(&header, &rows))
            .await
            .map_err(PipelineError::from)?;

        debug!(elements = state.elements.len(), embedded, "screen indexed");
        Ok(embedded)
    }

    /// Embed a previously indexed (unembedded) screen in place.
    pub async fn embed_screen(&self, state: &ScreenState) -> Result<(), PipelineError> {
        let inputs = Self::embed_inputs(state);
        if inputs.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = inputs.iter().map(|(_, t)| t.clone()).collect();
        let batch = self.embed_with_budget(&texts).await?;
        let vectors: Vec<(String, Vec<f32>)> = inputs
            .into_iter()
            .zip(batch)
            .filter(|(_, vector)| !vector.iter().all(|v| *v == 0.0))
            .map(|((element_id, _), vector)| (element_id, vector))
            .collect();
        let screen_id = state.id.clone();
        self.run_store(move |store| store.put_embeddings(&screen_id, &vectors))
            .await
            .map_err(PipelineError::from)?;
        Ok(())
    }

    /// Vector + filter search. The query is embedded exactly once.
    #[instrument(skip(self, filters))]
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        min_score: f32,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>, PipelineError> {
        let query_vector = self
            .embed_with_budget(&[query.to_string()])
            .await?
            .pop()
            .ok_or_else(|| PipelineError::EmbedFailed("no query vector".into()))?;

        let screen_filter = filters.screen_id.clone();
        let (headers, records, corrupt_screens, corrupt_elements) = self
            .run_store(move |store| {
                let (headers, corrupt_screens) = store.all_screens()?;
                let (records, corrupt_elements) = store.elements(screen_filter.as_deref())?;
                Ok((headers, records, corrupt_screens, corrupt_elements))
            })
            .await
            .map_err(PipelineError::from)?;
        self.quarantine(corrupt_screens, corrupt_elements).await;

        let headers: HashMap<String, ScreenHeader> =
            headers.into_iter().map(|h| (h.id.clone(), h)).collect();
        Ok(search::rank(
            &records,
            &headers,
            &query_vector,
            k,
            min_score,
            filters,
        ))
    }

    /// Remove all screens matching the predicate, atomically from the
    /// caller's point of view. Returns the number of screens removed.
    pub async fn purge<P>(&self, predicate: P) -> Result<u64, PipelineError>
    where
        P: Fn(&ScreenHeader) -> bool + Send + 'static,
    {
        let removed = self
            .run_store(move |store| {
                let (headers, corrupt) = store.all_screens()?;
                let mut ids: Vec<String> = headers
                    .into_iter()
                    .filter(|h| predicate(h))
                    .map(|h| h.id)
                    .collect();
                // Unreadable headers cannot be evaluated; purge them too.
                ids.extend(corrupt);
                let (screens, _) = store.delete_screens(&ids)?;
                Ok(screens)
            })
            .await
            .map_err(PipelineError::from)?;
        info!(removed, "purged screens");
        Ok(removed)
    }

    pub async fn stats(&self) -> Result<IndexStats, PipelineError> {
        let store = self
            .run_store(|store| store.stats())
            .await
            .map_err(PipelineError::from)?;
        Ok(IndexStats {
            store,
            corrupt_rows_seen: self.corrupt_seen.load(Ordering::Relaxed),
        })
    }

    /// One retention pass: drop screens past the age limit, then evict
    /// oldest screens while the element count exceeds the cap. Deletes run
    /// in batches to bound writer pause time.
    pub async fn retention_sweep(&self, now_ms: i64) -> Result<(u64, u64), PipelineError> {
        let cutoff = now_ms - self.config.retention_days * 24 * 60 * 60 * 1000;
        let max_elements = self.config.max_elements;
        let (screens, elements) = self
            .run_store(move |store| {
                let (mut headers, corrupt) = store.all_screens()?;
                headers.sort_by_key(|h| h.timestamp);

                let mut doomed: Vec<String> = corrupt;
                let mut live_elements: u64 = 0;
                for header in &headers {
                    if header.timestamp < cutoff {
                        doomed.push(header.id.clone());
                    } else {
                        live_elements += header.element_count;
                    }
                }
                // Oldest-first eviction until the element cap holds.
                for header in &headers {
                    if live_elements <= max_elements {
                        break;
                    }
                    if header.timestamp >= cutoff {
                        doomed.push(header.id.clone());
                        live_elements = live_elements.saturating_sub(header.element_count);
                    }
                }

                let mut screens_removed = 0u64;
                let mut elements_removed = 0u64;
                for batch in doomed.chunks(32) {
                    let (s, e) = store.delete_screens(batch)?;
                    screens_removed += s;
                    elements_removed += e;
                }
                Ok((screens_removed, elements_removed))
            })
            .await
            .map_err(PipelineError::from)?;
        if screens > 0 {
            info!(screens, elements, "retention sweep removed screens");
        }
        Ok((screens, elements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Embedder;
    use crate::types::{
        Bbox, DocType, Element, ElementSource, ElementType, ScreenDimensions, Structures, Zones,
    };
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Deterministic toy embedder: hashes characters into a small vector.
    struct MockEmbedder;

    #[async_trait]
    impl Embedder for MockEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
            Ok(texts.iter().map(|t| mock_vector(t)).collect())
        }
    }

    fn mock_vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; 8];
        for (i, c) in text.to_lowercase().chars().enumerate() {
            v[(c as usize + i) % 8] += 1.0;
        }
        v
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
            Err(PipelineError::EmbedFailed("model offline".into()))
        }
    }

    fn element(id: &str, text: &str, element_type: ElementType, clickable: bool) -> Element {
        Element {
            id: id.to_string(),
            element_type,
            text: text.to_string(),
            bbox: Bbox::new(10.0, 10.0, 120.0, 50.0),
            normalized_bbox: [3, 5, 41, 27],
            clickable,
            interactive: clickable,
            visible: true,
            confidence: 0.9,
            detection_confidence: 0.9,
            ocr_confidence: 0.9,
            parent_id: None,
            child_ids: Vec::new(),
            screen_region: "top-left".into(),
            attributes: Default::default(),
            source: ElementSource::Ocr,
        }
    }

    fn screen(id: &str, timestamp: i64, elements: Vec<Element>) -> ScreenState {
        ScreenState {
            id: id.to_string(),
            timestamp,
            app: "Chrome".into(),
            window_title: "Home".into(),
            url: Some("https://example.com".into()),
            screen_dimensions: ScreenDimensions::new(2880, 1800),
            elements,
            subtrees: Vec::new(),
            description: "Chrome window".into(),
            llm_context: String::new(),
            doc_type: DocType::Webpage,
            structures: Structures::default(),
            zones: Zones::default(),
        }
    }

    fn index(dir: &TempDir) -> SemanticIndex {
        let store = Store::open(dir.path().join("index.redb")).unwrap();
        SemanticIndex::new(store, Arc::new(MockEmbedder), Config::default())
    }

    #[tokio::test]
    async fn index_then_search_round_trip() {
        let dir = TempDir::new().unwrap();
        let idx = index(&dir);
        let state = screen(
            "s1",
            1000,
            vec![
                element("el-1", "Send", ElementType::Button, true),
                element("el-2", "Archive", ElementType::Button, true),
            ],
        );
        assert!(idx.index_screen_state(&state, false).await.unwrap());

        let hits = idx
            .search("send", 5, 0.0, &SearchFilters::default())
            .await
            .unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].screen.id, "s1");
    }

    #[tokio::test]
    async fn search_with_clickable_filter() {
        let dir = TempDir::new().unwrap();
        let idx = index(&dir);
        let state = screen(
            "s1",
            1000,
            vec![
                element("el-btn", "Send", ElementType::Button, true),
                element("el-head", "Send", ElementType::Heading, false),
            ],
        );
        idx.index_screen_state(&state, false).await.unwrap();

        let filters = SearchFilters {
            clickable_only: true,
            ..Default::default()
        };
        let hits = idx.search("send", 5, 0.0, &filters).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].element.id, "el-btn");
    }

    #[tokio::test]
    async fn skip_embedding_then_embed_later() {
        let dir = TempDir::new().unwrap();
        let idx = index(&dir);
        let state = screen("s1", 1000, vec![element("el-1", "Send", ElementType::Button, true)]);

        let embedded = idx.index_screen_state(&state, true).await.unwrap();
        assert!(!embedded);
        let hits = idx.search("send", 5, 0.0, &SearchFilters::default()).await.unwrap();
        assert!(hits.is_empty(), "unembedded screen must be invisible to search");

        idx.embed_screen(&state).await.unwrap();
        let hits = idx.search("send", 5, 0.0, &SearchFilters::default()).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn embed_failure_degrades_to_unembedded_index() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("index.redb")).unwrap();
        let idx = SemanticIndex::new(store, Arc::new(FailingEmbedder), Config::default());
        let state = screen("s1", 1000, vec![element("el-1", "Send", ElementType::Button, true)]);

        let embedded = idx.index_screen_state(&state, false).await.unwrap();
        assert!(!embedded);
        let stats = idx.stats().await.unwrap();
        assert_eq!(stats.store.screens, 1);
        assert_eq!(stats.store.embedded_elements, 0);
    }

    #[tokio::test]
    async fn purge_by_predicate() {
        let dir = TempDir::new().unwrap();
        let idx = index(&dir);
        for (id, app_ts) in [("s1", 1000), ("s2", 2000)] {
            let mut s = screen(id, app_ts, vec![element("el", "Send", ElementType::Button, true)]);
            s.elements[0].id = format!("el-{id}");
            idx.index_screen_state(&s, true).await.unwrap();
        }
        let removed = idx.purge(|h| h.timestamp < 1500).await.unwrap();
        assert_eq!(removed, 1);
        let stats = idx.stats().await.unwrap();
        assert_eq!(stats.store.screens, 1);
    }

    #[tokio::test]
    async fn retention_drops_old_screens() {
        let dir = TempDir::new().unwrap();
        let idx = index(&dir);
        let now = 10 * 24 * 60 * 60 * 1000i64; // day 10
        let old = screen("old", 1000, vec![element("el-a", "Send", ElementType::Button, true)]);
        let fresh = screen(
            "fresh",
            now - 1000,
            vec![element("el-b", "Send", ElementType::Button, true)],
        );
        idx.index_screen_state(&old, true).await.unwrap();
        idx.index_screen_state(&fresh, true).await.unwrap();

        let (screens, _) = idx.retention_sweep(now).await.unwrap();
        assert_eq!(screens, 1);
        let stats = idx.stats().await.unwrap();
        assert_eq!(stats.store.screens, 1);
        assert!(stats.store.oldest_timestamp.unwrap() >= now - 2000);
    }

    #[tokio::test]
    async fn retention_enforces_element_cap() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("index.redb")).unwrap();
        let config = Config {
            max_elements: 3,
            ..Default::default()
        };
        let idx = SemanticIndex::new(store, Arc::new(MockEmbedder), config);
        let now = 1_000_000i64;
        for (id, ts) in [("s1", now - 300), ("s2", now - 200), ("s3", now - 100)] {
            let mut s = screen(
                id,
                ts,
                vec![
                    element(&format!("el-{id}-a"), "Send", ElementType::Button, true),
                    element(&format!("el-{id}-b"), "Save", ElementType::Button, true),
                ],
            );
            s.timestamp = ts;
            idx.index_screen_state(&s, true).await.unwrap();
        }
        // 6 elements against a cap of 3: the two oldest screens must go.
        let (screens, elements) = idx.retention_sweep(now).await.unwrap();
        assert_eq!(screens, 2);
        assert_eq!(elements, 4);
        let stats = idx.stats().await.unwrap();
        assert_eq!(stats.store.screens, 1);
        assert_eq!(stats.store.elements, 2);
    }
}
