//! Heuristic element classification: OCR word -> role.
//!
//! Classification is a pure function of the word and the capture dimensions;
//! rules are ordered and the first match wins. Element ids are allocated by
//! the orchestrator, never here.

use crate::config::Config;
use crate::types::{screen_region, Bbox, Element, ElementSource, ElementType, ScreenDimensions, Word};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Full-string action words that mark a button (matched case-insensitively).
static ACTION_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "sign in",
        "sign up",
        "sign out",
        "log in",
        "log out",
        "login",
        "logout",
        "submit",
        "save",
        "cancel",
        "delete",
        "ok",
        "okay",
        "continue",
        "next",
        "back",
        "buy now",
        "add to cart",
        "checkout",
        "apply",
        "confirm",
        "send",
        "search",
        "close",
        "done",
        "get started",
        "learn more",
        "try now",
        "subscribe",
        "unsubscribe",
        "download",
        "upload",
        "install",
        "update",
        "upgrade",
        "accept",
        "decline",
        "retry",
        "refresh",
        "reply",
        "forward",
        "share",
        "copy",
        "paste",
        "undo",
        "redo",
    ])
});

/// Keywords that mark a dropdown when they are the entire text.
static DROPDOWN_WORDS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| HashSet::from(["select", "choose", "pick", "all", "any", "none"]));

const DROPDOWN_GLYPHS: [char; 4] = ['▼', '▽', '⌄', '˅'];
const CHECKBOX_GLYPHS: [char; 7] = ['✓', '✗', '☐', '☑', '☒', '◯', '●'];

/// macOS-style menu-bar entries; only match in the top strip of the screen.
static MENU_BAR_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "File",
        "Edit",
        "View",
        "Window",
        "Help",
        "Tools",
        "Format",
        "Insert",
        "Table",
        "Data",
        "Extensions",
        "Preferences",
    ])
});

/// Common web-navigation entries; position-independent.
static NAV_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "Home",
        "About",
        "Contact",
        "Services",
        "Products",
        "Blog",
        "Support",
        "Settings",
        "Profile",
        "Dashboard",
        "Account",
        "Menu",
        "More",
        "Tab",
        "Blocks",
        "Drive",
    ])
});

/// Form-field names that mark a label even without a trailing colon.
static FORM_FIELD_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "email",
        "e-mail",
        "password",
        "username",
        "name",
        "first name",
        "last name",
        "full name",
        "phone",
        "address",
        "city",
        "state",
        "zip",
        "country",
        "company",
        "subject",
        "message",
    ])
});

/// Extra keywords that make otherwise-plain text clickable.
static CLICKABLE_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "click",
        "click here",
        "download",
        "share",
        "view",
        "open",
        "browse",
        "explore",
        "start",
        "home",
        "about",
        "contact",
        "menu",
        "more",
        "next",
        "back",
        "previous",
    ])
});

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(https?://\S+|www\.\S+\.\S+)$").expect("url regex"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.+-]+@[\w-]+\.[\w.-]+$").expect("email regex"));
static CAPITALIZED_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][a-z]{2,12}$").expect("capitalized word regex"));
static BADGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d+)?(%|px|em|rem|pt|°|\$)?$").expect("badge regex"));

/// Button-like geometry: wide-ish, short-ish, and plausibly finger-sized.
fn has_button_geometry(bbox: &Bbox) -> bool {
    let (w, h) = (bbox.width(), bbox.height());
    if h <= 0.0 {
        return false;
    }
    let aspect = w / h;
    (1.5..=10.0).contains(&aspect) && (40.0..=300.0).contains(&w)
}

/// Result of classifying one word. Pure data; id-free.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub element_type: ElementType,
    pub clickable: bool,
    pub interactive: bool,
    pub detection_confidence: f32,
    pub normalized_bbox: [u16; 4],
    pub screen_region: String,
}

/// Assign a role to an OCR word from its text, geometry and screen position.
///
/// Same input always yields the same output; no global state is read.
pub fn classify_word(
    word: &Word,
    dims: Option<ScreenDimensions>,
    config: &Config,
) -> Classification {
    let dims = dims.unwrap_or(ScreenDimensions::new(
        config.canonical_screen.0,
        config.canonical_screen.1,
    ));
    let text = word.text.trim();
    let (element_type, mut detection_confidence) = classify_text(text, &word.bbox);

    // Button geometry strengthens an exact action-word hit without ever
    // demoting it.
    if element_type == ElementType::Button && has_button_geometry(&word.bbox) {
        detection_confidence = (detection_confidence + 0.05).min(1.0);
    }

    let clickable = is_clickable(text, element_type, &word.bbox);
    let interactive = clickable || element_type == ElementType::Input;
    let normalized_bbox = word.bbox.normalize(dims);

    Classification {
        element_type,
        clickable,
        interactive,
        detection_confidence,
        screen_region: screen_region(normalized_bbox),
        normalized_bbox,
    }
}

/// Ordered type rules; first match wins.
fn classify_text(text: &str, bbox: &Bbox) -> (ElementType, f32) {
    let lower = text.to_lowercase();
    let char_count = text.chars().count();
    let single_char = char_count == 1;

    // 1. Exact action-word match.
    if ACTION_WORDS.contains(lower.as_str()) {
        return (ElementType::Button, 0.9);
    }

    // 2. Dropdown glyph or keyword.
    if (single_char && text.chars().all(|c| DROPDOWN_GLYPHS.contains(&c)))
        || DROPDOWN_WORDS.contains(lower.as_str())
    {
        return (ElementType::Dropdown, 0.85);
    }

    // 3. Checkbox glyph.
    if single_char && text.chars().all(|c| CHECKBOX_GLYPHS.contains(&c)) {
        return (ElementType::Checkbox, 0.85);
    }

    // 4. URL or email.
    if URL_RE.is_match(text) || EMAIL_RE.is_match(text) {
        return (ElementType::Link, 0.9);
    }

    // 5. Menu item.
    let single_word = !text.contains(char::is_whitespace);
    if single_word && char_count <= 15 {
        let in_menu_strip = bbox.y1 < 50.0;
        if (MENU_BAR_WORDS.contains(text) && in_menu_strip)
            || NAV_WORDS.contains(text)
            || (CAPITALIZED_WORD_RE.is_match(text)
                && in_menu_strip
                && bbox.width() > 20.0
                && bbox.width() < 100.0)
        {
            return (ElementType::MenuItem, 0.8);
        }
    }

    // 6. Label.
    if text.ends_with(':') || FORM_FIELD_WORDS.contains(lower.as_str()) {
        return (ElementType::Label, 0.75);
    }

    // 7. Heading.
    let starts_capital = text.chars().next().is_some_and(|c| c.is_uppercase());
    let aspect = if bbox.height() > 0.0 {
        bbox.width() / bbox.height()
    } else {
        0.0
    };
    if char_count <= 60 && bbox.height() > 20.0 && starts_capital && aspect > 2.0 {
        return (ElementType::Heading, 0.7);
    }

    // 8. Icon.
    if char_count <= 3 && bbox.width() < 50.0 && bbox.height() < 50.0 {
        return (ElementType::Icon, 0.6);
    }

    // 9. Badge.
    if BADGE_RE.is_match(text) {
        return (ElementType::Badge, 0.7);
    }

    // 10. Default.
    (ElementType::Text, 0.5)
}

fn is_clickable(text: &str, element_type: ElementType, bbox: &Bbox) -> bool {
    if element_type.is_inherently_clickable() {
        return true;
    }
    let lower = text.to_lowercase();
    if CLICKABLE_WORDS.contains(lower.as_str()) {
        return true;
    }
    let word_count = text.split_whitespace().count();
    has_button_geometry(bbox) && (1..=3).contains(&word_count)
}

/// Assemble a full element from a classified word. The id comes from the
/// orchestrator's allocator so ids never collide across captures.
pub fn build_element(word: &Word, classification: &Classification, id: String) -> Element {
    Element {
        id,
        element_type: classification.element_type,
        text: word.text.trim().to_string(),
        bbox: word.bbox,
        normalized_bbox: classification.normalized_bbox,
        clickable: classification.clickable,
        interactive: classification.interactive,
        visible: true,
        confidence: (classification.detection_confidence + word.confidence) / 2.0,
        detection_confidence: classification.detection_confidence,
        ocr_confidence: word.confidence,
        parent_id: None,
        child_ids: Vec::new(),
        screen_region: classification.screen_region.clone(),
        attributes: Default::default(),
        source: ElementSource::Ocr,
    }
}
