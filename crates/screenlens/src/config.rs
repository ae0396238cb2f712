//! Pipeline configuration. All knobs live in one struct so the service can be
//! tuned from a single config file or left on defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Canonical screen dimensions used to normalize bboxes when the true
/// capture size is unknown.
pub const CANONICAL_SCREEN: (u32, u32) = (2880, 1800);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Words below this OCR confidence (percent, 0-100) are dropped.
    pub min_word_confidence: f32,
    /// Debounce window between captures, in milliseconds.
    pub min_capture_interval_ms: i64,
    /// Screens older than this are removed by the retention sweeper.
    pub retention_days: i64,
    /// Cadence of the retention sweeper.
    pub cleanup_interval_hours: u64,
    /// Hard cap on indexed elements; oldest screens are evicted beyond it.
    pub max_elements: u64,
    /// In-memory cache entries older than this reject on-demand embedding.
    pub stale_cache_ms: i64,
    /// Stage budget for the OCR engine call.
    pub ocr_timeout_ms: u64,
    /// Stage budget per embedding batch.
    pub embed_timeout_ms: u64,
    /// Stage budget for the index write.
    pub index_timeout_ms: u64,
    /// Fallback dimensions for bbox normalization.
    pub canonical_screen: (u32, u32),
    /// Cap on windows handed to the analyzer after dedup.
    pub max_analyzed_windows: usize,
    /// Depth cap when walking structured OCR payloads and UI trees.
    pub max_tree_depth: usize,
    /// Tesseract-style TSV row level accepted as a word.
    pub tsv_word_level: u32,
    /// Where the persistent index lives. `None` resolves to the platform
    /// data dir.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_word_confidence: 50.0,
            min_capture_interval_ms: 1000,
            retention_days: 3,
            cleanup_interval_hours: 2,
            max_elements: 1_000_000,
            stale_cache_ms: 60_000,
            ocr_timeout_ms: 5000,
            embed_timeout_ms: 2000,
            index_timeout_ms: 1000,
            canonical_screen: CANONICAL_SCREEN,
            max_analyzed_windows: 5,
            max_tree_depth: 100,
            tsv_word_level: 5,
            data_dir: None,
        }
    }
}

impl Config {
    /// Resolve the on-disk location of the index database file.
    pub fn index_path(&self) -> PathBuf {
        let base = self
            .data_dir
            .clone()
            .or_else(|| dirs::data_local_dir().map(|d| d.join("screenlens")))
            .unwrap_or_else(|| PathBuf::from(".screenlens"));
        base.join("index.redb")
    }
}
