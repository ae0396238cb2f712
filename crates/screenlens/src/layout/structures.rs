//! Structural pattern extraction over visual lines.
//!
//! Detections run in a fixed order (tables, lists, navbars, headers, grids,
//! forms). Table/list/navbar/header lines are mutually exclusive: a line
//! claimed by one is never re-emitted by another. Grids and forms span
//! regions, so they only exclude lines already claimed by a table.

use super::{Line, LayoutContext};
use crate::types::{
    Bbox, CellType, FormStructure, GridStructure, HeaderLine, ListKind, ListStructure,
    NavbarPosition, NavbarStructure, Structures, TableCell, TableRow, TableStructure,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[$€£]\s?\d[\d,]*(\.\d+)?|\b\d[\d,]*\.\d{2}\b").expect("price regex"));
static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        \b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b
        | \b\d{4}-\d{2}-\d{2}\b
        | \b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\s+\d{1,2}\b",
    )
    .expect("date regex")
});
static YESNO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(yes|no|true|false)\b").expect("yes/no regex"));
static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d[\d,]*(\.\d+)?\b").expect("number regex"));
static PERCENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d+)?%$").expect("percent regex"));
static COLUMN_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("column split"));

static BULLET_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-*•‣◦]\s+\S").expect("bullet prefix"));
static NUMBERED_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,3}[.)]\s+\S").expect("numbered prefix"));
static LETTERED_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][.)]\s+\S").expect("lettered prefix"));

static CAPITALIZED_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+\b").expect("capitalized run"));
static TERMINAL_PUNCT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?;:]$").expect("terminal punct"));
static VIDEO_CARD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\b\d{1,2}:\d{2}(:\d{2})?\b|\b[\d.,]+[KM]?\s+views\b)").expect("video card")
});
static YOUTUBE_HOST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(youtube\.com|youtu\.be|vimeo\.com)").expect("youtube host"));

/// Lowercased navigation vocabulary used for navbar detection.
static NAV_VOCAB: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "home", "about", "contact", "services", "products", "blog", "support", "settings",
        "profile", "dashboard", "account", "menu", "more", "pricing", "features", "docs",
        "login", "signup", "help", "news", "careers", "shop", "store", "explore",
    ])
});

/// Words whose presence marks a form region.
static FORM_VOCAB: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "email", "password", "username", "name", "phone", "address", "city", "state", "zip",
        "country", "submit", "required", "optional", "field", "confirm",
    ])
});

/// Window of consecutive lines scanned for form-word clusters.
const FORM_WINDOW: usize = 6;

/// A row qualifies as tabular with >= 2 prices, >= 2 dates, >= 2 yes/no
/// tokens, or >= 3 numeric tokens.
pub fn is_table_row(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    if PRICE_RE.find_iter(text).count() >= 2 {
        return true;
    }
    if DATE_RE.find_iter(text).count() >= 2 {
        return true;
    }
    if YESNO_RE.find_iter(text).count() >= 2 {
        return true;
    }
    NUMBER_RE.find_iter(text).count() >= 3
}

fn classify_cell(text: &str) -> CellType {
    let trimmed = text.trim();
    if PRICE_RE.is_match(trimmed) && !PERCENT_RE.is_match(trimmed) {
        return CellType::Price;
    }
    if DATE_RE.is_match(trimmed) {
        return CellType::Date;
    }
    if YESNO_RE.is_match(trimmed) && trimmed.split_whitespace().count() == 1 {
        return CellType::Boolean;
    }
    if PERCENT_RE.is_match(trimmed) {
        return CellType::Percentage;
    }
    if NUMBER_RE.is_match(trimmed) && trimmed.chars().all(|c| !c.is_alphabetic()) {
        return CellType::Number;
    }
    CellType::Text
}

fn split_columns(text: &str) -> Vec<TableCell> {
    COLUMN_SPLIT_RE
        .split(text.trim())
        .filter(|c| !c.is_empty())
        .map(|c| TableCell {
            text: c.to_string(),
            cell_type: classify_cell(c),
        })
        .collect()
}

fn union_bbox(lines: &[Line], start: usize, end: usize) -> Option<Bbox> {
    lines[start..=end]
        .iter()
        .filter_map(|l| l.bbox)
        .reduce(|acc, b| acc.union(&b))
}

/// Extract all structural patterns from the lines.
pub fn extract_structures(lines: &[Line], context: &LayoutContext<'_>) -> Structures {
    let mut consumed: HashSet<usize> = HashSet::new();
    let mut table_lines: HashSet<usize> = HashSet::new();
    let mut structures = Structures::default();

    detect_tables(lines, &mut consumed, &mut table_lines, &mut structures);
    detect_lists(lines, &mut consumed, &mut structures);
    detect_navbars(lines, &mut consumed, &mut structures);
    detect_headers(lines, &mut consumed, &mut structures);
    detect_grids(lines, context, &table_lines, &mut structures);
    detect_forms(lines, &table_lines, &mut structures);

    structures
}

/// A table is a run of >= 2 adjacent table rows.
fn detect_tables(
    lines: &[Line],
    consumed: &mut HashSet<usize>,
    table_lines: &mut HashSet<usize>,
    out: &mut Structures,
) {
    let mut i = 0;
    while i < lines.len() {
        if !is_table_row(&lines[i].text) {
            i += 1;
            continue;
        }
        let start = i;
        while i < lines.len() && is_table_row(&lines[i].text) {
            i += 1;
        }
        let end = i - 1;
        if end - start + 1 >= 2 {
            let rows = lines[start..=end]
                .iter()
                .map(|l| TableRow {
                    cells: split_columns(&l.text),
                })
                .collect();
            for idx in start..=end {
                consumed.insert(lines[idx].index);
                table_lines.insert(lines[idx].index);
            }
            out.tables.push(TableStructure {
                start_line: lines[start].index,
                end_line: lines[end].index,
                rows,
                bbox: union_bbox(lines, start, end),
            });
        }
    }
}

fn list_kind(text: &str) -> Option<ListKind> {
    if BULLET_PREFIX_RE.is_match(text) {
        Some(ListKind::Bullet)
    } else if NUMBERED_PREFIX_RE.is_match(text) {
        Some(ListKind::Numbered)
    } else if LETTERED_PREFIX_RE.is_match(text) {
        Some(ListKind::Lettered)
    } else {
        None
    }
}

/// Lists are maximal runs of consecutive same-kind prefix lines; one run
/// per emitted list.
fn detect_lists(lines: &[Line], consumed: &mut HashSet<usize>, out: &mut Structures) {
    let mut i = 0;
    while i < lines.len() {
        if consumed.contains(&lines[i].index) {
            i += 1;
            continue;
        }
        let Some(kind) = list_kind(&lines[i].text) else {
            i += 1;
            continue;
        };
        let start = i;
        while i < lines.len()
            && !consumed.contains(&lines[i].index)
            && list_kind(&lines[i].text) == Some(kind)
        {
            i += 1;
        }
        let end = i - 1;
        if end - start + 1 >= 2 {
            for idx in start..=end {
                consumed.insert(lines[idx].index);
            }
            out.lists.push(ListStructure {
                start_line: lines[start].index,
                end_line: lines[end].index,
                kind,
                items: lines[start..=end].iter().map(|l| l.text.clone()).collect(),
                bbox: union_bbox(lines, start, end),
            });
        }
    }
}

fn navbar_position(index: usize, total: usize) -> NavbarPosition {
    if index < 5 {
        NavbarPosition::Top
    } else if total > 5 && index > total - 5 {
        NavbarPosition::Bottom
    } else {
        NavbarPosition::Middle
    }
}

/// A navbar line has >= 3 nav-vocabulary tokens, or >= 2 plus evidence of
/// links or capitalized runs.
fn detect_navbars(lines: &[Line], consumed: &mut HashSet<usize>, out: &mut Structures) {
    for line in lines {
        if consumed.contains(&line.index) {
            continue;
        }
        let tokens: Vec<String> = line
            .text
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .collect();
        let hits: Vec<&String> = tokens
            .iter()
            .filter(|t| NAV_VOCAB.contains(t.as_str()))
            .collect();
        let has_link = line.text.contains("http") || line.text.contains("www.");
        let capitalized_runs = CAPITALIZED_RUN_RE.find_iter(&line.text).count();
        if hits.len() >= 3 || (hits.len() >= 2 && (has_link || capitalized_runs >= 3)) {
            consumed.insert(line.index);
            out.navbars.push(NavbarStructure {
                line: line.index,
                items: hits.iter().map(|s| s.to_string()).collect(),
                position: navbar_position(line.index, lines.len()),
                bbox: line.bbox,
            });
        }
    }
}

/// Headers live in the first 10 lines: all-caps or early, short, no
/// terminal punctuation.
fn detect_headers(lines: &[Line], consumed: &mut HashSet<usize>, out: &mut Structures) {
    for line in lines.iter().take(10) {
        if consumed.contains(&line.index) {
            continue;
        }
        let text = line.text.trim();
        let word_count = text.split_whitespace().count();
        if word_count == 0 || word_count > 8 || TERMINAL_PUNCT_RE.is_match(text) {
            continue;
        }
        let has_alpha = text.chars().any(|c| c.is_alphabetic());
        if !has_alpha {
            continue;
        }
        let all_caps = text
            .chars()
            .filter(|c| c.is_alphabetic())
            .all(|c| c.is_uppercase());
        let early = line.index < 3;
        if !all_caps && !early {
            continue;
        }
        let level = match line.index {
            0 => 1,
            i if i < 3 => 2,
            _ => 3,
        };
        consumed.insert(line.index);
        out.headers.push(HeaderLine {
            line: line.index,
            text: text.to_string(),
            level,
            bbox: line.bbox,
        });
    }
}

/// Domain-specific grids. Currently: video-card runs on YouTube-like hosts.
/// Absence is never an error.
fn detect_grids(
    lines: &[Line],
    context: &LayoutContext<'_>,
    table_lines: &HashSet<usize>,
    out: &mut Structures,
) {
    let Some(url) = context.url else {
        return;
    };
    if !YOUTUBE_HOST_RE.is_match(url) {
        return;
    }
    let mut cells = Vec::new();
    let mut span: Option<(usize, usize)> = None;
    let mut bbox: Option<Bbox> = None;
    for line in lines {
        if table_lines.contains(&line.index) {
            continue;
        }
        if VIDEO_CARD_RE.is_match(&line.text) {
            cells.push(line.text.clone());
            span = Some(match span {
                Some((s, _)) => (s, line.index),
                None => (line.index, line.index),
            });
            bbox = match (bbox, line.bbox) {
                (Some(acc), Some(b)) => Some(acc.union(&b)),
                (None, b) => b,
                (acc, None) => acc,
            };
        }
    }
    if let Some((start, end)) = span {
        if cells.len() >= 2 {
            out.grids.push(GridStructure {
                kind: "video-cards".to_string(),
                start_line: start,
                end_line: end,
                cells,
                bbox,
            });
        }
    }
}

/// A form is a window of consecutive lines containing >= 2 distinct
/// form-vocabulary hits. Overlapping windows merge into one span.
fn detect_forms(lines: &[Line], table_lines: &HashSet<usize>, out: &mut Structures) {
    let mut spans: Vec<(usize, usize, Vec<String>)> = Vec::new();
    for window_start in 0..lines.len() {
        let window_end = (window_start + FORM_WINDOW).min(lines.len());
        let mut fields = Vec::new();
        for line in &lines[window_start..window_end] {
            if table_lines.contains(&line.index) {
                continue;
            }
            for token in line.text.split_whitespace() {
                let cleaned = token
                    .trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase();
                if FORM_VOCAB.contains(cleaned.as_str()) && !fields.contains(&cleaned) {
                    fields.push(cleaned);
                }
            }
        }
        if fields.len() >= 2 {
            let start = window_start;
            let end = window_end - 1;
            match spans.last_mut() {
                Some((_, prev_end, prev_fields)) if start <= *prev_end => {
                    *prev_end = end.max(*prev_end);
                    for f in fields {
                        if !prev_fields.contains(&f) {
                            prev_fields.push(f);
                        }
                    }
                }
                _ => spans.push((start, end, fields)),
            }
        }
    }
    for (start, end, fields) in spans {
        out.forms.push(FormStructure {
            start_line: lines[start].index,
            end_line: lines[end].index,
            fields,
            bbox: union_bbox(lines, start, end),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines_of(texts: &[&str]) -> Vec<Line> {
        texts
            .iter()
            .enumerate()
            .map(|(index, t)| Line {
                index,
                text: t.to_string(),
                bbox: None,
            })
            .collect()
    }

    fn ctx() -> LayoutContext<'static> {
        LayoutContext::default()
    }

    #[test]
    fn table_row_predicates() {
        assert!(is_table_row("Widget  $4.99  $5.99"));
        assert!(is_table_row("01/02/2024  03/04/2024"));
        assert!(is_table_row("yes  no  maybe"));
        assert!(is_table_row("10  20  30"));
        assert!(!is_table_row("just some words"));
        assert!(!is_table_row("only 2 numbers 7"));
    }

    #[test]
    fn detects_adjacent_table_run() {
        let lines = lines_of(&[
            "Product  Price  Sale",
            "Widget  $4.99  $3.99",
            "Gadget  $9.99  $7.99",
            "end of table",
        ]);
        let s = extract_structures(&lines, &ctx());
        assert_eq!(s.tables.len(), 1);
        let table = &s.tables[0];
        assert_eq!(table.start_line, 1);
        assert_eq!(table.end_line, 2);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].cells.len(), 3);
        assert_eq!(table.rows[0].cells[1].cell_type, CellType::Price);
    }

    #[test]
    fn single_table_row_is_not_a_table() {
        let lines = lines_of(&["Widget  $4.99  $5.99", "prose here"]);
        let s = extract_structures(&lines, &ctx());
        assert!(s.tables.is_empty());
    }

    #[test]
    fn cell_classification() {
        assert_eq!(classify_cell("$4.99"), CellType::Price);
        assert_eq!(classify_cell("01/02/2024"), CellType::Date);
        assert_eq!(classify_cell("yes"), CellType::Boolean);
        assert_eq!(classify_cell("42%"), CellType::Percentage);
        assert_eq!(classify_cell("1,234"), CellType::Number);
        assert_eq!(classify_cell("Widget"), CellType::Text);
    }

    #[test]
    fn detects_top_navbar() {
        let lines = lines_of(&["Home About Products Contact", "Welcome to the site everyone"]);
        let s = extract_structures(&lines, &ctx());
        assert_eq!(s.navbars.len(), 1);
        assert_eq!(s.navbars[0].position, NavbarPosition::Top);
        assert_eq!(s.navbars[0].items.len(), 4);
    }

    #[test]
    fn two_hits_need_extra_evidence() {
        let weak = lines_of(&["home about nothing else here at all"]);
        assert!(extract_structures(&weak, &ctx()).navbars.is_empty());
        let evidenced = lines_of(&["Home About Visit The New Page Here"]);
        assert_eq!(extract_structures(&evidenced, &ctx()).navbars.len(), 1);
    }

    #[test]
    fn bottom_navbar_position() {
        let mut texts = vec!["filler prose line that is long enough to stay plain text"; 12];
        texts.push("Home About Contact Careers");
        let lines = lines_of(&texts);
        let s = extract_structures(&lines, &ctx());
        assert_eq!(s.navbars.len(), 1);
        assert_eq!(s.navbars[0].position, NavbarPosition::Bottom);
    }

    #[test]
    fn detects_headers_in_first_lines() {
        let lines = lines_of(&[
            "QUARTERLY REPORT",
            "Revenue summary",
            "This is a full sentence that ends here.",
        ]);
        let s = extract_structures(&lines, &ctx());
        assert_eq!(s.headers.len(), 2);
        assert_eq!(s.headers[0].level, 1);
        assert_eq!(s.headers[1].level, 2);
    }

    #[test]
    fn all_caps_header_allowed_past_early_lines() {
        let lines = lines_of(&[
            "intro prose that is clearly a sentence with many words in it",
            "second prose line with quite a few words inside of it",
            "third prose line with quite a few words inside of it",
            "SECTION TWO",
        ]);
        let s = extract_structures(&lines, &ctx());
        assert_eq!(s.headers.len(), 1);
        assert_eq!(s.headers[0].text, "SECTION TWO");
        assert_eq!(s.headers[0].level, 3);
    }

    #[test]
    fn detects_bullet_list_run() {
        let lines = lines_of(&["- apples", "- oranges", "- pears", "prose"]);
        let s = extract_structures(&lines, &ctx());
        assert_eq!(s.lists.len(), 1);
        assert_eq!(s.lists[0].kind, ListKind::Bullet);
        assert_eq!(s.lists[0].items.len(), 3);
    }

    #[test]
    fn numbered_and_bullet_runs_are_separate_lists() {
        let lines = lines_of(&["1. first", "2. second", "- alpha", "- beta"]);
        let s = extract_structures(&lines, &ctx());
        assert_eq!(s.lists.len(), 2);
        assert_eq!(s.lists[0].kind, ListKind::Numbered);
        assert_eq!(s.lists[1].kind, ListKind::Bullet);
    }

    #[test]
    fn video_grid_requires_matching_host() {
        let texts = &["Intro to Rust  12:34", "1.2M views", "Another video 5:06"];
        let no_url = extract_structures(&lines_of(texts), &ctx());
        assert!(no_url.grids.is_empty());

        let context = LayoutContext {
            url: Some("https://www.youtube.com/feed"),
            ..Default::default()
        };
        let s = extract_structures(&lines_of(texts), &context);
        assert_eq!(s.grids.len(), 1);
        assert_eq!(s.grids[0].kind, "video-cards");
        assert_eq!(s.grids[0].cells.len(), 3);
    }

    #[test]
    fn detects_form_window() {
        let lines = lines_of(&["Create account", "Email", "Password", "Submit"]);
        let s = extract_structures(&lines, &ctx());
        assert_eq!(s.forms.len(), 1);
        assert!(s.forms[0].fields.contains(&"email".to_string()));
        assert!(s.forms[0].fields.contains(&"password".to_string()));
    }

    #[test]
    fn consumed_table_lines_do_not_become_lists() {
        // Numbered-looking rows that already belong to a table.
        let lines = lines_of(&["1. 10 20 30", "2. 40 50 60"]);
        let s = extract_structures(&lines, &ctx());
        assert_eq!(s.tables.len(), 1);
        assert!(s.lists.is_empty());
    }
}
