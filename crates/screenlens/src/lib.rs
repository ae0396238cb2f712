//! Local screen intelligence: capture in, queryable screen semantics out.
//!
//! This crate is the screen-understanding pipeline of a local screen
//! intelligence service. One capture (screenshot plus window metadata)
//! flows through OCR normalization, heuristic element classification,
//! layout inference, spatial tree construction and description generation,
//! and lands in a persistent semantic index that agents query by
//! natural-language intent.
//!
//! Platform concerns (screen capture, OCR binaries, embedding inference)
//! are capability traits chosen at bootstrap; see [`engine`].

use serde::{Deserialize, Serialize};

pub mod analyzer;
pub mod cache;
pub mod classify;
pub mod config;
pub mod context;
pub mod describe;
pub mod engine;
pub mod errors;
pub mod frame;
pub mod index;
pub mod layout;
pub mod ocr;
pub mod query;
pub mod service;
pub mod tree;
pub mod types;

pub use analyzer::{AnalyzeOptions, AnalyzeResult, AnalyzeStats, Analyzer, DescribeResult, StageTimings};
pub use cache::{CacheEntry, TwoTierCache};
pub use config::Config;
pub use context::{dedupe_windows, resolve_context, Context, ContextStrategy};
pub use engine::{Capturer, Embedder, OcrEngine, OcrOutput};
pub use errors::{PipelineError, StoreError};
pub use frame::{CapturedFrame, FrameError, DEFAULT_MAX_DIMENSION};
pub use index::{IndexStats, SearchFilters, SearchHit, SemanticIndex, Store, StoreStats};
pub use query::{search_elements, SearchRequest};
pub use service::ScreenIntelligence;
pub use tokio_util::sync::CancellationToken;
pub use types::{
    Bbox, DocType, Element, ElementSource, ElementType, ScreenDimensions, ScreenHeader,
    ScreenState, Structures, Subtree, WindowInfo, Word, Zone, Zones,
};

/// Version tag reported by the service surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
