//! OCR normalization: turns heterogeneous engine outputs into a canonical
//! word stream with bboxes and confidences.
//!
//! Three engine shapes are accepted, in preference order: structured JSON
//! words with per-word bboxes, tesseract-style delimited tabular output, and
//! bulk text with no geometry at all. Normalization never fails; when every
//! shape is unusable the result is an empty word list.

use crate::config::Config;
use crate::engine::OcrOutput;
use crate::types::{Bbox, Word};
use serde_json::Value;
use tracing::{debug, warn};

/// Canonical word stream produced from one OCR run.
#[derive(Debug, Clone, Default)]
pub struct NormalizedOcr {
    pub words: Vec<Word>,
    /// False when words carry synthetic all-zero bboxes (bulk-text fallback).
    pub has_valid_bboxes: bool,
    /// Full recognized text, used by layout inference.
    pub text: String,
}

/// Normalize one engine result into the canonical word stream.
pub fn normalize(output: &OcrOutput, config: &Config) -> NormalizedOcr {
    let min_confidence = config.min_word_confidence / 100.0;

    // Shape (a): structured JSON hierarchy.
    if let Some(structured) = &output.words {
        let words = walk_structured(structured, config.max_tree_depth);
        let words = filter_words(words, min_confidence);
        if !words.is_empty() {
            return finish(words, output);
        }
        debug!(source = %output.source, "structured OCR payload yielded no words");
    }

    // Shape (b): delimited tabular rows.
    if let Some(tsv) = &output.tsv {
        let words = parse_tabular(tsv, config.tsv_word_level);
        let words = filter_words(words, min_confidence);
        if !words.is_empty() {
            return finish(words, output);
        }
        debug!(source = %output.source, "tabular OCR payload yielded no words");
    }

    // Shape (c): bulk text, synthetic zero bboxes.
    if !output.text.trim().is_empty() {
        let words: Vec<Word> = output
            .text
            .split_whitespace()
            .map(|token| Word {
                text: token.to_string(),
                bbox: Bbox::default(),
                confidence: output.confidence.clamp(0.0, 1.0),
            })
            .collect();
        let words = filter_words(words, min_confidence);
        return NormalizedOcr {
            has_valid_bboxes: false,
            text: output.text.clone(),
            words,
        };
    }

    warn!(source = %output.source, "OCR output had no usable shape");
    NormalizedOcr::default()
}

fn finish(words: Vec<Word>, output: &OcrOutput) -> NormalizedOcr {
    let has_valid_bboxes = words.iter().any(|w| w.bbox.is_valid());
    let text = if output.text.trim().is_empty() {
        words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        output.text.clone()
    };
    NormalizedOcr {
        words,
        has_valid_bboxes,
        text,
    }
}

fn filter_words(words: Vec<Word>, min_confidence: f32) -> Vec<Word> {
    words
        .into_iter()
        .filter(|w| !w.text.trim().is_empty() && w.confidence >= min_confidence)
        .collect()
}

/// Container keys descended into, in hierarchy order. A level may be absent;
/// the walk keeps going until a `words` array (or a bare word object) shows
/// up.
const CONTAINER_KEYS: [&str; 4] = ["blocks", "paragraphs", "lines", "words"];

/// Depth-first walk over an engine-specific JSON hierarchy with an explicit
/// stack. Recursion is avoided so a pathological payload cannot blow the
/// call stack; depth is capped by config.
fn walk_structured(root: &Value, max_depth: usize) -> Vec<Word> {
    let mut words = Vec::new();
    let mut stack: Vec<(&Value, usize)> = vec![(root, 0)];

    while let Some((node, depth)) = stack.pop() {
        if depth > max_depth {
            warn!(depth, "structured OCR walk hit depth cap");
            continue;
        }
        match node {
            Value::Array(items) => {
                // Reverse so the left-to-right reading order survives the
                // LIFO stack.
                for item in items.iter().rev() {
                    stack.push((item, depth + 1));
                }
            }
            Value::Object(map) => {
                if let Some(word) = parse_word_object(map) {
                    words.push(word);
                    continue;
                }
                for key in CONTAINER_KEYS {
                    if let Some(child) = map.get(key) {
                        stack.push((child, depth + 1));
                    }
                }
            }
            _ => {}
        }
    }
    words
}

/// Parse one JSON object as a word if it carries text and no nested word
/// containers.
fn parse_word_object(map: &serde_json::Map<String, Value>) -> Option<Word> {
    if CONTAINER_KEYS.iter().any(|k| map.contains_key(*k)) {
        return None;
    }
    let text = map
        .get("text")
        .or_else(|| map.get("word"))
        .or_else(|| map.get("content"))
        .and_then(Value::as_str)?;

    let bbox = map
        .get("bbox")
        .or_else(|| map.get("box"))
        .or_else(|| map.get("bounding_box"))
        .or_else(|| map.get("boundingBox"))
        .and_then(parse_bbox_value)
        .unwrap_or_default();

    let confidence = map
        .get("confidence")
        .or_else(|| map.get("conf"))
        .and_then(Value::as_f64)
        .map(normalize_confidence)
        .unwrap_or(1.0);

    Some(Word {
        text: text.to_string(),
        bbox,
        confidence,
    })
}

/// Accepts `[x1,y1,x2,y2]`, `{x1,y1,x2,y2}` and `{x,y,width,height}`.
fn parse_bbox_value(value: &Value) -> Option<Bbox> {
    match value {
        Value::Array(items) if items.len() == 4 => {
            let mut coords = [0.0; 4];
            for (slot, item) in coords.iter_mut().zip(items) {
                *slot = item.as_f64()?;
            }
            Some(Bbox::from(coords))
        }
        Value::Object(map) => {
            let num = |k: &str| map.get(k).and_then(Value::as_f64);
            if let (Some(x1), Some(y1), Some(x2), Some(y2)) =
                (num("x1"), num("y1"), num("x2"), num("y2"))
            {
                return Some(Bbox::new(x1, y1, x2, y2));
            }
            let w = num("width").or_else(|| num("w"))?;
            let h = num("height").or_else(|| num("h"))?;
            let x = num("x").or_else(|| num("left"))?;
            let y = num("y").or_else(|| num("top"))?;
            Some(Bbox::new(x, y, x + w, y + h))
        }
        _ => None,
    }
}

/// Engines report confidence as either a fraction or a percentage.
fn normalize_confidence(raw: f64) -> f32 {
    let v = if raw > 1.0 { raw / 100.0 } else { raw };
    v.clamp(0.0, 1.0) as f32
}

/// Tesseract TSV columns: level, page, block, par, line, word, left, top,
/// width, height, conf, text.
fn parse_tabular(tsv: &str, word_level: u32) -> Vec<Word> {
    let mut words = Vec::new();
    for row in tsv.lines() {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let Ok(level) = cols[0].parse::<u32>() else {
            continue; // header row
        };
        if level != word_level {
            continue;
        }
        let parse = |s: &str| s.trim().parse::<f64>().ok();
        let (Some(left), Some(top), Some(width), Some(height), Some(conf)) = (
            parse(cols[6]),
            parse(cols[7]),
            parse(cols[8]),
            parse(cols[9]),
            parse(cols[10]),
        ) else {
            continue;
        };
        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }
        words.push(Word {
            text: text.to_string(),
            bbox: Bbox::new(left, top, left + width, top + height),
            confidence: normalize_confidence(conf),
        });
    }
    words
}
