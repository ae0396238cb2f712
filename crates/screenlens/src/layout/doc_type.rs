//! Document/app-type detection.
//!
//! Ordered rule chain; the first rule that fires wins: known app, window
//! title, URL, visible filename extensions, structural ratios, text
//! signatures, `webpage` fallback.

use super::structures::is_table_row;
use super::{Line, LayoutContext};
use crate::types::DocType;
use once_cell::sync::Lazy;
use regex::Regex;

/// Known apps, keyed by the normalized (lowercase, non-alpha stripped) name.
/// Only entries with machine-observable classification value are carried.
static KNOWN_APPS: Lazy<Vec<(&'static str, DocType)>> = Lazy::new(|| {
    vec![
        ("microsoftexcel", DocType::Spreadsheet),
        ("excel", DocType::Spreadsheet),
        ("numbers", DocType::Spreadsheet),
        ("googlesheets", DocType::Spreadsheet),
        ("libreofficecalc", DocType::Spreadsheet),
        ("visualstudiocode", DocType::CodeEditor),
        ("vscode", DocType::CodeEditor),
        ("code", DocType::CodeEditor),
        ("xcode", DocType::CodeEditor),
        ("intellijidea", DocType::CodeEditor),
        ("sublimetext", DocType::CodeEditor),
        ("zed", DocType::CodeEditor),
        ("neovim", DocType::CodeEditor),
        ("terminal", DocType::Terminal),
        ("iterm", DocType::Terminal),
        ("alacritty", DocType::Terminal),
        ("kitty", DocType::Terminal),
        ("warp", DocType::Terminal),
        ("mail", DocType::Email),
        ("outlook", DocType::Email),
        ("microsoftoutlook", DocType::Email),
        ("thunderbird", DocType::Email),
        ("slack", DocType::Chat),
        ("discord", DocType::Chat),
        ("messages", DocType::Chat),
        ("telegram", DocType::Chat),
        ("whatsapp", DocType::Chat),
        ("signal", DocType::Chat),
        ("microsoftword", DocType::Document),
        ("word", DocType::Document),
        ("pages", DocType::Document),
        ("googledocs", DocType::Document),
        ("libreofficewriter", DocType::Document),
        ("obsidian", DocType::Markdown),
        ("typora", DocType::Markdown),
        ("things", DocType::TaskList),
        ("todoist", DocType::TaskList),
        ("reminders", DocType::TaskList),
        ("microsoftpowerpoint", DocType::Presentation),
        ("powerpoint", DocType::Presentation),
        ("keynote", DocType::Presentation),
        ("googleslides", DocType::Presentation),
        ("preview", DocType::Pdf),
        ("adobeacrobat", DocType::Pdf),
        ("acrobatreader", DocType::Pdf),
        ("skim", DocType::Pdf),
        ("vlc", DocType::Video),
        ("quicktimeplayer", DocType::Video),
        ("notion", DocType::Notes),
        ("evernote", DocType::Notes),
        ("onenote", DocType::Notes),
        ("bear", DocType::Notes),
        ("notes", DocType::Notes),
    ]
});

/// Window-title substrings, checked lowercased, in order.
static TITLE_HINTS: Lazy<Vec<(&'static str, DocType)>> = Lazy::new(|| {
    vec![
        (".xlsx", DocType::Spreadsheet),
        (".xls", DocType::Spreadsheet),
        (".csv", DocType::Spreadsheet),
        ("spreadsheet", DocType::Spreadsheet),
        (".md", DocType::Markdown),
        (".pdf", DocType::Pdf),
        (".pptx", DocType::Presentation),
        (".docx", DocType::Document),
        ("inbox", DocType::Email),
        ("compose", DocType::Email),
        ("playlist", DocType::Video),
    ]
});

/// URL host/path patterns, in order.
static URL_RULES: Lazy<Vec<(Regex, DocType)>> = Lazy::new(|| {
    let rule = |pattern: &str| Regex::new(pattern).expect("url rule regex");
    vec![
        (rule(r"docs\.google\.com/spreadsheets"), DocType::Spreadsheet),
        (rule(r"docs\.google\.com/document"), DocType::Document),
        (rule(r"docs\.google\.com/presentation"), DocType::Presentation),
        (rule(r"(youtube\.com|youtu\.be|vimeo\.com)"), DocType::Video),
        (rule(r"(mail\.google\.com|outlook\.(live|office)\.com)"), DocType::Email),
        (
            rule(r"(twitter\.com|x\.com|facebook\.com|instagram\.com|reddit\.com|linkedin\.com)"),
            DocType::SocialMedia,
        ),
        (rule(r"notion\.so"), DocType::Notes),
        (rule(r"(github\.com|gitlab\.com)"), DocType::CodeEditor),
        (rule(r"overleaf\.com"), DocType::Document),
    ]
});

static CODE_EXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\w+\.(rs|py|js|jsx|ts|tsx|go|java|c|cc|cpp|h|hpp|rb|swift|kt|sh|toml|yaml|yml)\b")
        .expect("code ext regex")
});
static DOC_EXT_RULES: Lazy<Vec<(Regex, DocType)>> = Lazy::new(|| {
    let rule = |pattern: &str| Regex::new(pattern).expect("doc ext regex");
    vec![
        (rule(r"\b\w+\.(xlsx|xls|csv)\b"), DocType::Spreadsheet),
        (rule(r"\b\w+\.md\b"), DocType::Markdown),
        (rule(r"\b\w+\.pdf\b"), DocType::Pdf),
    ]
});

static CODE_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^\s*(fn|let|const|var|if|else|for|while|def|class|struct|enum|impl|pub|use|import|from|return|function|async|await|match|\#include)\b
        | [;{}]\s*$
        | =>
        | ::",
    )
    .expect("code line regex")
});
static MD_HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s+\S").expect("md heading"));
static BULLET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([-*•‣◦]|\d+[.)])\s+\S").expect("bullet regex"));
static CHECKBOX_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([☐☑☒]|(- )?\[[ xX]\])\s*").expect("checkbox line regex"));

/// Signature sets: every pattern in the set must appear in the lowercased
/// screen text for the rule to fire.
static TEXT_SIGNATURES: Lazy<Vec<(Vec<&'static str>, DocType)>> = Lazy::new(|| {
    vec![
        (vec!["inbox", "compose"], DocType::Email),
        (vec!["subscribe", "views"], DocType::Video),
        (vec!["like", "follow", "share"], DocType::SocialMedia),
        (vec!["commit", "branch", "pull request"], DocType::CodeEditor),
    ]
});

/// Lowercase an app/window name and strip everything non-alphabetic.
fn normalize_app_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_lowercase()
}

/// Detect the document/app type. First matching rule wins.
pub fn detect_doc_type(lines: &[Line], context: &LayoutContext<'_>) -> DocType {
    // 1. Known-app table.
    let app = normalize_app_name(context.app);
    if !app.is_empty() {
        if let Some((_, doc_type)) = KNOWN_APPS.iter().find(|(name, _)| *name == app) {
            return *doc_type;
        }
    }

    // 2. Window-title substrings.
    let title = context.window_title.to_lowercase();
    if !title.is_empty() {
        if let Some((_, doc_type)) = TITLE_HINTS.iter().find(|(hint, _)| title.contains(hint)) {
            return *doc_type;
        }
    }

    // 3. URL rules.
    if let Some(url) = context.url {
        if let Some((_, doc_type)) = URL_RULES.iter().find(|(re, _)| re.is_match(url)) {
            return *doc_type;
        }
    }

    // 4. Visible filename extensions.
    let code_ext_hits: usize = lines
        .iter()
        .map(|l| CODE_EXT_RE.find_iter(&l.text).count())
        .sum();
    if code_ext_hits >= 2 {
        return DocType::CodeEditor;
    }
    for (re, doc_type) in DOC_EXT_RULES.iter() {
        let hits: usize = lines.iter().map(|l| re.find_iter(&l.text).count()).sum();
        if hits >= 2 {
            return *doc_type;
        }
    }

    // 5. Structural ratios.
    if !lines.is_empty() {
        let total = lines.len() as f64;
        let ratio = |count: usize| count as f64 / total;

        let code = lines.iter().filter(|l| CODE_LINE_RE.is_match(&l.text)).count();
        if ratio(code) > 0.3 {
            return DocType::CodeEditor;
        }
        let table = lines.iter().filter(|l| is_table_row(&l.text)).count();
        if ratio(table) > 0.5 {
            return DocType::Spreadsheet;
        }
        let headings = lines.iter().filter(|l| MD_HEADING_RE.is_match(&l.text)).count();
        let bullets = lines.iter().filter(|l| BULLET_RE.is_match(&l.text)).count();
        if ratio(headings) > 0.1 && ratio(bullets) > 0.3 {
            return DocType::Markdown;
        }
        let checkboxes = lines
            .iter()
            .filter(|l| CHECKBOX_LINE_RE.is_match(&l.text))
            .count();
        if ratio(checkboxes) > 0.2 {
            return DocType::TaskList;
        }
    }

    // 6. Text signatures: all patterns in a set must match.
    let full_text = lines
        .iter()
        .map(|l| l.text.to_lowercase())
        .collect::<Vec<_>>()
        .join("\n");
    for (patterns, doc_type) in TEXT_SIGNATURES.iter() {
        if patterns.iter().all(|p| full_text.contains(p)) {
            return *doc_type;
        }
    }

    // 7. Fallback.
    DocType::Webpage
}
