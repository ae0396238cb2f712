//! The construct-once service facade: wires the collaborators, the
//! analyzer, the semantic index and the retention sweeper together, and
//! exposes the operations the routing layer calls.

use crate::analyzer::{AnalyzeOptions, AnalyzeResult, Analyzer, DescribeResult};
use crate::cache::TwoTierCache;
use crate::config::Config;
use crate::context::Context;
use crate::engine::{Capturer, Embedder, OcrEngine};
use crate::errors::PipelineError;
use crate::index::{retention, IndexStats, SearchHit, SemanticIndex};
use crate::query::{search_elements, SearchRequest};
use crate::types::{ScreenDimensions, ScreenHeader, WindowInfo};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct ScreenIntelligence {
    analyzer: Analyzer,
    index: Arc<SemanticIndex>,
    sweeper_token: CancellationToken,
    sweeper: Option<tokio::task::JoinHandle<()>>,
}

impl ScreenIntelligence {
    /// Bootstrap the service with platform collaborators chosen by the
    /// caller. Opens the persistent index and starts the retention sweeper.
    pub fn start(
        capturer: Arc<dyn Capturer>,
        ocr_engine: Arc<dyn OcrEngine>,
        embedder: Arc<dyn Embedder>,
        config: Config,
    ) -> Result<Self, PipelineError> {
        let index = Arc::new(SemanticIndex::open(config.clone(), embedder)?);
        Ok(Self::assemble(capturer, ocr_engine, index, config, true))
    }

    /// Assemble around an existing index; used by tests and embedders that
    /// manage the store location themselves.
    pub fn with_index(
        capturer: Arc<dyn Capturer>,
        ocr_engine: Arc<dyn OcrEngine>,
        index: Arc<SemanticIndex>,
        config: Config,
    ) -> Self {
        Self::assemble(capturer, ocr_engine, index, config, false)
    }

    fn assemble(
        capturer: Arc<dyn Capturer>,
        ocr_engine: Arc<dyn OcrEngine>,
        index: Arc<SemanticIndex>,
        config: Config,
        spawn_sweeper: bool,
    ) -> Self {
        let cache = Arc::new(TwoTierCache::default());
        let sweeper_token = CancellationToken::new();
        let sweeper = spawn_sweeper.then(|| {
            retention::spawn_sweeper(
                index.clone(),
                cache.clone(),
                config.clone(),
                sweeper_token.clone(),
            )
        });
        let analyzer = Analyzer::new(capturer, ocr_engine, index.clone(), cache, config);
        info!("screen intelligence service started");
        Self {
            analyzer,
            index,
            sweeper_token,
            sweeper,
        }
    }

    pub async fn analyze(
        &self,
        window_info: Option<&WindowInfo>,
        opts: &AnalyzeOptions,
    ) -> AnalyzeResult {
        self.analyzer.analyze(window_info, opts).await
    }

    pub async fn describe(&self, window_info: Option<&WindowInfo>) -> DescribeResult {
        self.analyzer.describe(window_info).await
    }

    pub async fn generate_embeddings_for_cached(
        &self,
        screen_id: &str,
    ) -> Result<bool, PipelineError> {
        self.analyzer.generate_embeddings_for_cached(screen_id).await
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, PipelineError> {
        search_elements(&self.index, request).await
    }

    pub fn resolve_context(&self, windows: &[WindowInfo], dims: ScreenDimensions) -> Context {
        self.analyzer.resolve_context(windows, dims)
    }

    pub async fn purge<P>(&self, predicate: P) -> Result<u64, PipelineError>
    where
        P: Fn(&ScreenHeader) -> bool + Send + 'static,
    {
        self.index.purge(predicate).await
    }

    pub async fn stats(&self) -> Result<IndexStats, PipelineError> {
        self.index.stats().await
    }

    /// Stop the retention sweeper and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.sweeper_token.cancel();
        if let Some(handle) = self.sweeper.take() {
            let _ = handle.await;
        }
        info!("screen intelligence service stopped");
    }
}

impl Drop for ScreenIntelligence {
    fn drop(&mut self) {
        self.sweeper_token.cancel();
    }
}
