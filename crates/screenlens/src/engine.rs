//! Collaborator seams consumed by the pipeline.
//!
//! The core never talks to a platform directly: screen capture, OCR and
//! embedding inference are capability traits chosen at bootstrap time.

use crate::errors::PipelineError;
use crate::frame::CapturedFrame;
use crate::types::Bbox;
use async_trait::async_trait;

/// Captures what the user currently sees.
///
/// Bounds coordinates are screen-absolute pixels; `None` captures the whole
/// primary display.
#[async_trait]
pub trait Capturer: Send + Sync {
    async fn capture(&self, bounds: Option<Bbox>) -> Result<CapturedFrame, PipelineError>;
}

/// Raw result of an OCR engine run, in any of the three shapes the
/// normalizer accepts.
#[derive(Debug, Clone, Default)]
pub struct OcrOutput {
    /// Shape (a): structured words with per-word bboxes, as engine-specific
    /// JSON. Walked depth-first by the normalizer.
    pub words: Option<serde_json::Value>,
    /// Shape (b): delimited tabular output, one row per recognized token.
    pub tsv: Option<String>,
    /// Shape (c): bulk recognized text, always present (possibly empty).
    pub text: String,
    /// Engine-level overall confidence in `[0, 1]`.
    pub confidence: f32,
    /// Which engine produced this ("tesseract", "vision", ...).
    pub source: String,
}

/// Runs text recognition over a captured frame.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn analyze(&self, frame: &CapturedFrame) -> Result<OcrOutput, PipelineError>;
}

/// Produces semantic embeddings for element and query text.
///
/// The vector length is fixed per process lifetime; the index infers it from
/// the first vector it stores.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| PipelineError::EmbedFailed("embedder returned no vector".into()))
    }
}
