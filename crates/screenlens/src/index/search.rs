//! Vector search: cosine ranking plus structural filters.

use crate::types::{Element, ElementType, ScreenHeader};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::store::ElementRecord;

/// Structural restrictions applied alongside semantic similarity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilters {
    /// Restrict to these element roles.
    pub types: Option<Vec<ElementType>>,
    /// Keep only elements whose `clickable` flag is set.
    pub clickable_only: bool,
    /// Restrict to screens captured from this app (case-insensitive).
    pub app_name: Option<String>,
    /// Restrict to one screen.
    pub screen_id: Option<String>,
}

/// One search result: the element, its similarity, and the owning screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub element: Element,
    pub score: f32,
    pub screen: ScreenHeader,
}

/// Cosine similarity; zero-magnitude operands score zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Rank candidate records against the query vector.
///
/// Ordering: similarity descending, ties broken by newer screen timestamp,
/// then by element id so identical inputs always return byte-identical
/// results.
pub fn rank(
    records: &[ElementRecord],
    headers: &HashMap<String, ScreenHeader>,
    query: &[f32],
    k: usize,
    min_score: f32,
    filters: &SearchFilters,
) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = records
        .iter()
        .filter_map(|record| {
            let embedding = record.embedding.as_deref()?;
            let header = headers.get(&record.screen_id)?;
            if !passes_filters(record, header, filters) {
                return None;
            }
            let score = cosine_similarity(query, embedding);
            if score < min_score {
                return None;
            }
            Some(SearchHit {
                element: record.element.clone(),
                score,
                screen: header.clone(),
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.screen.timestamp.cmp(&a.screen.timestamp))
            .then_with(|| a.element.id.cmp(&b.element.id))
    });
    hits.truncate(k);
    hits
}

fn passes_filters(record: &ElementRecord, header: &ScreenHeader, filters: &SearchFilters) -> bool {
    if let Some(screen_id) = &filters.screen_id {
        if &record.screen_id != screen_id {
            return false;
        }
    }
    if let Some(app) = &filters.app_name {
        if !header.app.eq_ignore_ascii_case(app) {
            return false;
        }
    }
    if filters.clickable_only && !record.element.clickable {
        return false;
    }
    if let Some(types) = &filters.types {
        if !types.contains(&record.element.element_type) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bbox, DocType, ElementSource, ScreenDimensions};

    fn header(id: &str, app: &str, timestamp: i64) -> ScreenHeader {
        ScreenHeader {
            id: id.to_string(),
            timestamp,
            app: app.to_string(),
            window_title: String::new(),
            url: None,
            screen_dimensions: ScreenDimensions::new(2880, 1800),
            doc_type: DocType::Webpage,
            description: String::new(),
            element_count: 0,
        }
    }

    fn record(
        screen_id: &str,
        element_id: &str,
        element_type: ElementType,
        clickable: bool,
        embedding: Option<Vec<f32>>,
    ) -> ElementRecord {
        ElementRecord {
            screen_id: screen_id.to_string(),
            element: Element {
                id: element_id.to_string(),
                element_type,
                text: "Send".into(),
                bbox: Bbox::new(0.0, 0.0, 100.0, 40.0),
                normalized_bbox: [0, 0, 34, 22],
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
            },
            embedding,
        }
    }

    fn headers(list: &[ScreenHeader]) -> HashMap<String, ScreenHeader> {
        list.iter().map(|h| (h.id.clone(), h.clone())).collect()
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn ranks_by_similarity() {
        let h = headers(&[header("s1", "Chrome", 1000)]);
        let records = vec![
            record("s1", "far", ElementType::Text, false, Some(vec![0.0, 1.0])),
            record("s1", "near", ElementType::Text, false, Some(vec![1.0, 0.1])),
        ];
        let hits = rank(&records, &h, &[1.0, 0.0], 5, 0.0, &SearchFilters::default());
        assert_eq!(hits[0].element.id, "near");
    }

    #[test]
    fn min_score_cuts_off() {
        let h = headers(&[header("s1", "Chrome", 1000)]);
        let records = vec![record(
            "s1",
            "orthogonal",
            ElementType::Text,
            false,
            Some(vec![0.0, 1.0]),
        )];
        let hits = rank(&records, &h, &[1.0, 0.0], 5, 0.5, &SearchFilters::default());
        assert!(hits.is_empty());
    }

    #[test]
    fn clickable_filter_keeps_only_buttons() {
        let h = headers(&[header("s1", "Chrome", 1000)]);
        let records = vec![
            record("s1", "button", ElementType::Button, true, Some(vec![1.0, 0.0])),
            record("s1", "heading", ElementType::Heading, false, Some(vec![1.0, 0.0])),
        ];
        let filters = SearchFilters {
            clickable_only: true,
            ..Default::default()
        };
        let hits = rank(&records, &h, &[1.0, 0.0], 5, 0.5, &filters);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].element.id, "button");
    }

    #[test]
    fn type_and_app_filters() {
        let h = headers(&[header("s1", "Chrome", 1000), header("s2", "Mail", 2000)]);
        let records = vec![
            record("s1", "a", ElementType::Button, true, Some(vec![1.0, 0.0])),
            record("s2", "b", ElementType::Button, true, Some(vec![1.0, 0.0])),
        ];
        let filters = SearchFilters {
            app_name: Some("mail".into()),
            types: Some(vec![ElementType::Button]),
            ..Default::default()
        };
        let hits = rank(&records, &h, &[1.0, 0.0], 5, 0.0, &filters);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].element.id, "b");
    }

    #[test]
    fn ties_break_by_newer_timestamp() {
        let h = headers(&[header("old", "Chrome", 1000), header("new", "Chrome", 2000)]);
        let records = vec![
            record("old", "a", ElementType::Text, false, Some(vec![1.0, 0.0])),
            record("new", "b", ElementType::Text, false, Some(vec![1.0, 0.0])),
        ];
        let hits = rank(&records, &h, &[1.0, 0.0], 5, 0.0, &SearchFilters::default());
        assert_eq!(hits[0].element.id, "b");
    }

    #[test]
    fn repeated_calls_are_identical() {
        let h = headers(&[header("s1", "Chrome", 1000)]);
        let records: Vec<ElementRecord> = (0..10)
            .map(|i| {
                record(
                    "s1",
                    &format!("el-{i}"),
                    ElementType::Text,
                    false,
                    Some(vec![1.0, i as f32 / 10.0]),
                )
            })
            .collect();
        let first = rank(&records, &h, &[1.0, 0.5], 5, 0.0, &SearchFilters::default());
        for _ in 0..5 {
            let again = rank(&records, &h, &[1.0, 0.5], 5, 0.0, &SearchFilters::default());
            let ids: Vec<&str> = again.iter().map(|hit| hit.element.id.as_str()).collect();
            let first_ids: Vec<&str> = first.iter().map(|hit| hit.element.id.as_str()).collect();
            assert_eq!(ids, first_ids);
        }
    }

    #[test]
    fn unembedded_records_never_match() {
        let h = headers(&[header("s1", "Chrome", 1000)]);
        let records = vec![record("s1", "bare", ElementType::Text, false, None)];
        let hits = rank(&records, &h, &[1.0, 0.0], 5, 0.0, &SearchFilters::default());
        assert!(hits.is_empty());
    }
}
