//! Pipeline orchestration: one capture in, one indexed `ScreenState` out.
//!
//! Stages run strictly in order (capture, OCR, classify, layout, tree,
//! describe, index) and every failure is stage-scoped: a dead capture or a
//! failed OCR run still produces a valid, empty screen state, with the
//! failure recorded in `notes` for downstream agents to check.

use crate::cache::TwoTierCache;
use crate::classify;
use crate::config::Config;
use crate::context::{resolve_context, Context};
use crate::describe;
use crate::engine::{Capturer, OcrEngine};
use crate::errors::PipelineError;
use crate::index::SemanticIndex;
use crate::layout::{self, LayoutContext};
use crate::ocr::{self, NormalizedOcr};
use crate::types::{
    Bbox, DocType, Element, IdAllocator, ScreenDimensions, ScreenState, Structures, Subtree,
    WindowInfo, Zones,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Options for one `analyze` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzeOptions {
    /// Intent that triggered the capture; recorded for diagnostics only.
    pub user_query: Option<String>,
    /// Cache the screen without computing embeddings.
    pub skip_embedding: bool,
    /// Skip element classification and tree building.
    pub skip_detection: bool,
    /// Apply the minimum capture interval.
    pub debounce: bool,
    /// Attach a downscaled base64 PNG of the capture to the response.
    pub include_preview: bool,
}

/// Wall-clock milliseconds spent in each stage.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTimings {
    pub capture_ms: u64,
    pub ocr_ms: u64,
    pub classify_ms: u64,
    pub layout_ms: u64,
    pub tree_ms: u64,
    pub describe_ms: u64,
    pub index_ms: u64,
    pub total_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeStats {
    pub word_count: usize,
    pub element_count: usize,
    pub subtree_count: usize,
    pub embedded: bool,
}

/// Response of one `analyze` call.
///
/// `success` is true even for degraded runs; agents must check `notes`
/// rather than element presence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    pub success: bool,
    /// True when debounce suppressed the capture entirely.
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_id: Option<String>,
    pub elements: Vec<Element>,
    pub subtrees: Vec<Subtree>,
    pub description: String,
    pub llm_context: String,
    pub doc_type: DocType,
    pub zones: Zones,
    pub stats: AnalyzeStats,
    pub timings: StageTimings,
    pub notes: Vec<String>,
    /// Base64 PNG preview, present when requested and the capture worked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

impl AnalyzeResult {
    fn skipped() -> Self {
        Self {
            success: true,
            skipped: true,
            screen_id: None,
            elements: Vec::new(),
            subtrees: Vec::new(),
            description: String::new(),
            llm_context: String::new(),
            doc_type: DocType::Webpage,
            zones: Zones::default(),
            stats: AnalyzeStats::default(),
            timings: StageTimings::default(),
            notes: vec!["debounced".to_string()],
            preview: None,
        }
    }
}

/// Simpler projection of an analysis, for `describe` calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_id: Option<String>,
    pub description: String,
    pub doc_type: DocType,
    pub element_count: usize,
    pub zones: Zones,
    pub notes: Vec<String>,
}

/// The pipeline orchestrator. Owns the collaborator seams and the two-tier
/// cache; one capture runs at a time per instance.
pub struct Analyzer {
    capturer: Arc<dyn Capturer>,
    ocr_engine: Arc<dyn OcrEngine>,
    index: Arc<SemanticIndex>,
    cache: Arc<TwoTierCache>,
    config: Config,
    last_capture_ms: Mutex<Option<i64>>,
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

impl Analyzer {
    pub fn new(
        capturer: Arc<dyn Capturer>,
        ocr_engine: Arc<dyn OcrEngine>,
        index: Arc<SemanticIndex>,
        cache: Arc<TwoTierCache>,
        config: Config,
    ) -> Self {
        Self {
            capturer,
            ocr_engine,
            index,
            cache,
            config,
            last_capture_ms: Mutex::new(None),
        }
    }

    pub fn cache(&self) -> &Arc<TwoTierCache> {
        &self.cache
    }

    pub fn index(&self) -> &Arc<SemanticIndex> {
        &self.index
    }

    /// Run the full pipeline for one capture.
    #[instrument(skip(self, window_info, opts))]
    pub async fn analyze(
        &self,
        window_info: Option<&WindowInfo>,
        opts: &AnalyzeOptions,
    ) -> AnalyzeResult {
        let total_start = Instant::now();
        let now = chrono::Utc::now().timestamp_millis();
        let mut notes: Vec<String> = Vec::new();
        let mut timings = StageTimings::default();

        if opts.debounce && !self.pass_debounce(now) {
            debug!("capture debounced");
            return AnalyzeResult::skipped();
        }

        // Capture.
        let stage = Instant::now();
        let bounds = window_info.map(|w| Bbox::new(w.x, w.y, w.x + w.w, w.y + w.h));
        let frame = match self.capturer.capture(bounds).await {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(error = %e, "capture failed");
                notes.push("capture_failed".to_string());
                None
            }
        };
        timings.capture_ms = elapsed_ms(stage);

        let preview = if opts.include_preview {
            frame.as_ref().and_then(|f| {
                f.to_base64_png(Some(crate::frame::DEFAULT_MAX_DIMENSION))
                    .map_err(|e| {
                        warn!(error = %e, "preview encoding failed");
                        notes.push("preview_failed".to_string());
                    })
                    .ok()
            })
        } else {
            None
        };

        let dims = frame
            .as_ref()
            .map(|f| ScreenDimensions::new(f.width, f.height))
            .unwrap_or(ScreenDimensions::new(
                self.config.canonical_screen.0,
                self.config.canonical_screen.1,
            ));

        // OCR.
        let stage = Instant::now();
        let normalized = match &frame {
            Some(frame) => {
                let budget = Duration::from_millis(self.config.ocr_timeout_ms);
                match tokio::time::timeout(budget, self.ocr_engine.analyze(frame)).await {
                    Ok(Ok(output)) => ocr::normalize(&output, &self.config),
                    Ok(Err(e)) => {
                        warn!(error = %e, "OCR failed");
                        notes.push("ocr_failed".to_string());
                        NormalizedOcr::default()
                    }
                    Err(_) => {
                        warn!(budget_ms = self.config.ocr_timeout_ms, "OCR exceeded budget");
                        notes.push("ocr_failed".to_string());
                        NormalizedOcr::default()
                    }
                }
            }
            None => NormalizedOcr::default(),
        };
        timings.ocr_ms = elapsed_ms(stage);
        let word_count = normalized.words.len();

        let mut ids = IdAllocator::new(now);

        // Classify.
        let stage = Instant::now();
        let classified: Vec<Element> = if opts.skip_detection {
            notes.push("detection_skipped".to_string());
            Vec::new()
        } else {
            normalized
                .words
                .iter()
                .map(|word| {
                    let c = classify::classify_word(word, Some(dims), &self.config);
                    classify::build_element(word, &c, ids.next_element())
                })
                .collect()
        };
        timings.classify_ms = elapsed_ms(stage);

        // Layout.
        let stage = Instant::now();
        let app = window_info.map(|w| w.app.as_str()).unwrap_or("");
        let title = window_info.map(|w| w.title.as_str()).unwrap_or("");
        let url = window_info.and_then(|w| w.url.as_deref());
        let lines = layout::build_lines(
            &normalized.text,
            &normalized.words,
            normalized.has_valid_bboxes,
        );
        let inference = layout::infer(
            &lines,
            &LayoutContext {
                app,
                window_title: title,
                url,
            },
            dims,
        );
        timings.layout_ms = elapsed_ms(stage);

        // Tree.
        let stage = Instant::now();
        let (elements, mut subtrees) = if opts.skip_detection {
            (Vec::new(), Vec::new())
        } else {
            crate::tree::build_tree(classified, &inference.structures, dims, &mut ids)
        };
        timings.tree_ms = elapsed_ms(stage);

        // Describe.
        let stage = Instant::now();
        let domain = url.and_then(describe::domain_of);
        for subtree in &mut subtrees {
            subtree.description = describe::subtree_description(subtree, &elements, app);
        }
        let description =
            describe::screen_description(app, title, domain.as_deref(), &elements, &subtrees);
        let llm_context = describe::llm_context(&elements);
        timings.describe_ms = elapsed_ms(stage);

        let state = ScreenState {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now,
            app: app.to_string(),
            window_title: title.to_string(),
            url: url.map(str::to_string),
            screen_dimensions: dims,
            elements,
            subtrees,
            description,
            llm_context,
            doc_type: inference.doc_type,
            structures: inference.structures,
            zones: inference.zones,
        };

        // Index. Embedding has its own budget inside the index; the outer
        // budget bounds the store write on top of it.
        let stage = Instant::now();
        let index_budget = Duration::from_millis(
            self.config.embed_timeout_ms + self.config.index_timeout_ms,
        );
        let embedded = match tokio::time::timeout(
            index_budget,
            self.index.index_screen_state(&state, opts.skip_embedding),
        )
        .await
        {
            Ok(Ok(embedded)) => embedded,
            Ok(Err(e)) => {
                warn!(error = %e, "index write failed");
                notes.push("index_write_failed".to_string());
                false
            }
            Err(_) => {
                warn!("index write exceeded budget");
                notes.push("index_write_failed".to_string());
                false
            }
        };
        timings.index_ms = elapsed_ms(stage);

        // The OCR tier is cached unconditionally; embeddings note their own
        // presence.
        self.cache.insert(state.clone(), now, embedded);

        timings.total_ms = elapsed_ms(total_start);
        info!(
            screen_id = %state.id,
            elements = state.elements.len(),
            words = word_count,
            doc_type = %state.doc_type,
            total_ms = timings.total_ms,
            "analysis complete"
        );

        AnalyzeResult {
            success: true,
            skipped: false,
            screen_id: Some(state.id.clone()),
            stats: AnalyzeStats {
                word_count,
                element_count: state.elements.len(),
                subtree_count: state.subtrees.len(),
                embedded,
            },
            elements: state.elements,
            subtrees: state.subtrees,
            description: state.description,
            llm_context: state.llm_context,
            doc_type: state.doc_type,
            zones: state.zones,
            timings,
            notes,
            preview,
        }
    }

    /// `describe` is `analyze` without embeddings, projected down.
    pub async fn describe(&self, window_info: Option<&WindowInfo>) -> DescribeResult {
        let opts = AnalyzeOptions {
            skip_embedding: true,
            ..Default::default()
        };
        let result = self.analyze(window_info, &opts).await;
        DescribeResult {
            screen_id: result.screen_id,
            description: result.description,
            doc_type: result.doc_type,
            element_count: result.stats.element_count,
            zones: result.zones,
            notes: result.notes,
        }
    }

    /// Embed a screen that was analyzed with `skip_embedding`. Succeeds only
    /// while the cache entry is younger than the stale limit; stale entries
    /// are evicted and rejected.
    #[instrument(skip(self))]
    pub async fn generate_embeddings_for_cached(
        &self,
        screen_id: &str,
    ) -> Result<bool, PipelineError> {
        let now = chrono::Utc::now().timestamp_millis();
        let entry = self
            .cache
            .take_fresh(screen_id, self.config.stale_cache_ms, now)?;
        if entry.has_embeddings {
            return Ok(true);
        }
        self.index.embed_screen(&entry.screen_state).await?;
        self.cache.mark_embedded(screen_id);
        info!(%screen_id, "cached screen embedded on demand");
        Ok(true)
    }

    /// Resolve which windows a capture pass should target.
    pub fn resolve_context(&self, windows: &[WindowInfo], dims: ScreenDimensions) -> Context {
        resolve_context(windows, dims, self.config.max_analyzed_windows)
    }

    fn pass_debounce(&self, now: i64) -> bool {
        let mut last = self.last_capture_ms.lock().expect("debounce lock");
        if let Some(prev) = *last {
            if now - prev < self.config.min_capture_interval_ms {
                return false;
            }
        }
        *last = Some(now);
        true
    }

    /// Structures detected for a cached screen, for diagnostics.
    pub fn cached_structures(&self, screen_id: &str) -> Option<Structures> {
        self.cache.get(screen_id).map(|e| e.screen_state.structures)
    }
}
