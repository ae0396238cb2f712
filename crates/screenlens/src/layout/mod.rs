//! Layout inference: document-type detection, structural pattern extraction
//! and screen-zone partitioning.
//!
//! Detection operates on visual lines. When OCR produced real bboxes the
//! lines are reconstructed from word geometry (so structures keep a bbox);
//! otherwise they fall back to the engine's newline-split text.

pub mod doc_type;
pub mod structures;
pub mod zones;

pub use doc_type::detect_doc_type;
pub use structures::extract_structures;
pub use zones::derive_zones;

use crate::types::{Bbox, DocType, ScreenDimensions, Structures, Word, Zones};

/// One visual line of the screen.
#[derive(Debug, Clone)]
pub struct Line {
    pub index: usize,
    pub text: String,
    pub bbox: Option<Bbox>,
}

/// Result of one layout-inference pass.
#[derive(Debug, Clone)]
pub struct LayoutInference {
    pub doc_type: DocType,
    pub structures: Structures,
    pub zones: Zones,
}

/// Context the detector gets to look at beyond the text itself.
#[derive(Debug, Clone, Default)]
pub struct LayoutContext<'a> {
    pub app: &'a str,
    pub window_title: &'a str,
    pub url: Option<&'a str>,
}

/// Run the full layout pass: doc type, structures, zones.
pub fn infer(
    lines: &[Line],
    context: &LayoutContext<'_>,
    dims: ScreenDimensions,
) -> LayoutInference {
    let doc_type = detect_doc_type(lines, context);
    let structures = extract_structures(lines, context);
    let zones = derive_zones(&structures, dims);
    LayoutInference {
        doc_type,
        structures,
        zones,
    }
}

/// Build visual lines from OCR output.
///
/// With valid word bboxes, words are clustered into rows by vertical overlap
/// of their centers and ordered left-to-right; each line keeps the union
/// bbox. Without geometry, the engine text is split on newlines, trimmed,
/// empties dropped.
pub fn build_lines(text: &str, words: &[Word], has_valid_bboxes: bool) -> Vec<Line> {
    if !has_valid_bboxes || words.is_empty() {
        return text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .enumerate()
            .map(|(index, l)| Line {
                index,
                text: l.to_string(),
                bbox: None,
            })
            .collect();
    }

    let mut sorted: Vec<&Word> = words.iter().filter(|w| w.bbox.is_valid()).collect();
    sorted.sort_by(|a, b| {
        a.bbox
            .y1
            .partial_cmp(&b.bbox.y1)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Greedy row clustering: a word joins the current row while its vertical
    // center falls inside the row's running band.
    let mut rows: Vec<Vec<&Word>> = Vec::new();
    let mut band: Option<(f64, f64)> = None;
    for word in sorted {
        let cy = (word.bbox.y1 + word.bbox.y2) / 2.0;
        match band {
            Some((top, bottom)) if cy >= top && cy <= bottom => {
                rows.last_mut().expect("row exists").push(word);
                band = Some((top.min(word.bbox.y1), bottom.max(word.bbox.y2)));
            }
            _ => {
                band = Some((word.bbox.y1, word.bbox.y2));
                rows.push(vec![word]);
            }
        }
    }

    rows.into_iter()
        .enumerate()
        .map(|(index, mut row)| {
            row.sort_by(|a, b| {
                a.bbox
                    .x1
                    .partial_cmp(&b.bbox.x1)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let bbox = row
                .iter()
                .map(|w| w.bbox)
                .reduce(|acc, b| acc.union(&b));
            let text = row
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            Line { index, text, bbox }
        })
        .collect()
}
