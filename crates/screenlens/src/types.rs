//! Core data model for the screen-understanding pipeline.
//!
//! Everything here is a plain serde value type: words coming out of OCR,
//! classified elements, detected structures, zones, and the per-capture
//! `ScreenState` record that the semantic index owns once indexed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Upper bound of the canonical normalized coordinate range (inclusive).
pub const NORM_RANGE: f64 = 999.0;

/// Axis-aligned bounding box in absolute screen pixels.
///
/// Serialized as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Bbox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl From<[f64; 4]> for Bbox {
    fn from(v: [f64; 4]) -> Self {
        Self {
            x1: v[0],
            y1: v[1],
            x2: v[2],
            y2: v[3],
        }
    }
}

impl From<Bbox> for [f64; 4] {
    fn from(b: Bbox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

impl Bbox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// A bbox is valid when at least one coordinate is non-zero. All-zero
    /// boxes are the synthetic fallback for bulk-text OCR.
    pub fn is_valid(&self) -> bool {
        self.x1 != 0.0 || self.y1 != 0.0 || self.x2 != 0.0 || self.y2 != 0.0
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Non-strict spatial containment of `other` within `self`.
    pub fn contains(&self, other: &Bbox) -> bool {
        self.x1 <= other.x1 && self.y1 <= other.y1 && self.x2 >= other.x2 && self.y2 >= other.y2
    }

    /// Smallest box covering both operands.
    pub fn union(&self, other: &Bbox) -> Bbox {
        Bbox {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    /// Scale into the canonical 0..=999 integer range for the given screen.
    pub fn normalize(&self, dims: ScreenDimensions) -> [u16; 4] {
        let nx = |v: f64, d: u32| -> u16 {
            if d == 0 {
                return 0;
            }
            ((v / d as f64) * NORM_RANGE).round().clamp(0.0, NORM_RANGE) as u16
        };
        [
            nx(self.x1, dims.width),
            nx(self.y1, dims.height),
            nx(self.x2, dims.width),
            nx(self.y2, dims.height),
        ]
    }

    /// Inverse of [`Bbox::normalize`] for the same screen dimensions.
    pub fn denormalize(norm: [u16; 4], dims: ScreenDimensions) -> Bbox {
        let dn = |v: u16, d: u32| (v as f64 / NORM_RANGE) * d as f64;
        Bbox {
            x1: dn(norm[0], dims.width),
            y1: dn(norm[1], dims.height),
            x2: dn(norm[2], dims.width),
            y2: dn(norm[3], dims.height),
        }
    }
}

/// Pixel dimensions of a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenDimensions {
    pub width: u32,
    pub height: u32,
}

impl ScreenDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// One recognized word from OCR, in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub bbox: Bbox,
    /// In `[0, 1]`.
    pub confidence: f32,
}

/// Closed set of element roles the classifier can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementType {
    Button,
    Link,
    Input,
    Dropdown,
    Checkbox,
    MenuItem,
    Label,
    Heading,
    Icon,
    Badge,
    Text,
    Image,
    Table,
    List,
    Form,
    Container,
    Section,
    Dialog,
    Unknown,
}

impl ElementType {
    /// Roles that are inherently clickable.
    pub fn is_inherently_clickable(&self) -> bool {
        matches!(
            self,
            ElementType::Button
                | ElementType::Link
                | ElementType::Dropdown
                | ElementType::Checkbox
                | ElementType::MenuItem
                | ElementType::Icon
        )
    }

    /// Roles that can own a subtree of spatially contained elements.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            ElementType::Dialog | ElementType::Container | ElementType::Section
        )
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ElementType::Button => "button",
            ElementType::Link => "link",
            ElementType::Input => "input",
            ElementType::Dropdown => "dropdown",
            ElementType::Checkbox => "checkbox",
            ElementType::MenuItem => "menu-item",
            ElementType::Label => "label",
            ElementType::Heading => "heading",
            ElementType::Icon => "icon",
            ElementType::Badge => "badge",
            ElementType::Text => "text",
            ElementType::Image => "image",
            ElementType::Table => "table",
            ElementType::List => "list",
            ElementType::Form => "form",
            ElementType::Container => "container",
            ElementType::Section => "section",
            ElementType::Dialog => "dialog",
            ElementType::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Where an element came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ElementSource {
    #[default]
    Ocr,
    /// Synthesized from a detected layout structure (table, navbar, form).
    Layout,
}

/// A typed, spatially-located fragment of a ScreenState.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    /// Globally unique: `el-{seq}-{capture_ms}-{rand}`. Never collides
    /// across captures.
    pub id: String,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub text: String,
    pub bbox: Bbox,
    /// `bbox` scaled to the canonical 0..=999 range.
    pub normalized_bbox: [u16; 4],
    pub clickable: bool,
    pub interactive: bool,
    pub visible: bool,
    /// Combined confidence for downstream ranking.
    pub confidence: f32,
    pub detection_confidence: f32,
    pub ocr_confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub child_ids: Vec<String>,
    /// `"{top|middle|bottom}-{left|center|right}"` of the bbox center.
    pub screen_region: String,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub attributes: HashMap<String, String>,
    pub source: ElementSource,
}

/// A container element plus its spatial descendants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtree {
    pub id: String,
    #[serde(rename = "type")]
    pub subtree_type: ElementType,
    pub title: String,
    pub root_element_id: String,
    pub element_ids: Vec<String>,
    pub bbox: Bbox,
    pub description: String,
}

/// Top-level screen partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Screen partition into header/sidebar/main/footer. `main` is always
/// present; zones never overlap and together cover the screen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zones {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<Zone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sidebar: Option<Zone>,
    pub main: Zone,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<Zone>,
}

impl Default for Zone {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            w: 0.0,
            h: 0.0,
        }
    }
}

/// High-level classification of what the screen is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DocType {
    Spreadsheet,
    CodeEditor,
    Terminal,
    Email,
    Chat,
    Document,
    Markdown,
    TaskList,
    Presentation,
    Pdf,
    Video,
    SocialMedia,
    Notes,
    #[default]
    Webpage,
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocType::Spreadsheet => "spreadsheet",
            DocType::CodeEditor => "code-editor",
            DocType::Terminal => "terminal",
            DocType::Email => "email",
            DocType::Chat => "chat",
            DocType::Document => "document",
            DocType::Markdown => "markdown",
            DocType::TaskList => "task-list",
            DocType::Presentation => "presentation",
            DocType::Pdf => "pdf",
            DocType::Video => "video",
            DocType::SocialMedia => "social-media",
            DocType::Notes => "notes",
            DocType::Webpage => "webpage",
        };
        f.write_str(s)
    }
}

/// Per-cell value classification inside a detected table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CellType {
    Price,
    Date,
    Boolean,
    Number,
    Percentage,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCell {
    pub text: String,
    #[serde(rename = "type")]
    pub cell_type: CellType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStructure {
    pub start_line: usize,
    pub end_line: usize,
    pub rows: Vec<TableRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Bbox>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavbarPosition {
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavbarStructure {
    pub line: usize,
    pub items: Vec<String>,
    pub position: NavbarPosition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Bbox>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderLine {
    pub line: usize,
    pub text: String,
    pub level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Bbox>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListKind {
    Bullet,
    Numbered,
    Lettered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStructure {
    pub start_line: usize,
    pub end_line: usize,
    pub kind: ListKind,
    pub items: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Bbox>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridStructure {
    pub kind: String,
    pub start_line: usize,
    pub end_line: usize,
    pub cells: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Bbox>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormStructure {
    pub start_line: usize,
    pub end_line: usize,
    pub fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Bbox>,
}

/// Structural patterns extracted from the screen text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Structures {
    pub tables: Vec<TableStructure>,
    pub navbars: Vec<NavbarStructure>,
    pub lists: Vec<ListStructure>,
    pub grids: Vec<GridStructure>,
    pub forms: Vec<FormStructure>,
    pub headers: Vec<HeaderLine>,
}

impl Structures {
    pub fn counts(&self) -> HashMap<&'static str, usize> {
        HashMap::from([
            ("tables", self.tables.len()),
            ("navbars", self.navbars.len()),
            ("lists", self.lists.len()),
            ("grids", self.grids.len()),
            ("forms", self.forms.len()),
            ("headers", self.headers.len()),
        ])
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
            && self.navbars.is_empty()
            && self.lists.is_empty()
            && self.grids.is_empty()
            && self.forms.is_empty()
            && self.headers.is_empty()
    }
}

/// A visible window as reported by the window-listing collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowInfo {
    pub app: String,
    pub title: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub w: f64,
    #[serde(default)]
    pub h: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub url: Option<String>,
}

/// The immutable record produced by one capture's pipeline pass.
///
/// Mutation after construction is forbidden except for lazily added
/// embeddings, which live in the index rather than on this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenState {
    pub id: String,
    /// Epoch milliseconds, UTC.
    pub timestamp: i64,
    pub app: String,
    pub window_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub screen_dimensions: ScreenDimensions,
    pub elements: Vec<Element>,
    pub subtrees: Vec<Subtree>,
    pub description: String,
    pub llm_context: String,
    pub doc_type: DocType,
    pub structures: Structures,
    pub zones: Zones,
}

impl ScreenState {
    /// Lightweight header persisted in the `screens` table.
    pub fn header(&self) -> ScreenHeader {
        ScreenHeader {
            id: self.id.clone(),
            timestamp: self.timestamp,
            app: self.app.clone(),
            window_title: self.window_title.clone(),
            url: self.url.clone(),
            screen_dimensions: self.screen_dimensions,
            doc_type: self.doc_type,
            description: self.description.clone(),
            element_count: self.elements.len() as u64,
        }
    }
}

/// Persisted header row for a screen; what `search` attaches to hits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenHeader {
    pub id: String,
    pub timestamp: i64,
    pub app: String,
    pub window_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub screen_dimensions: ScreenDimensions,
    pub doc_type: DocType,
    pub description: String,
    pub element_count: u64,
}

/// Allocates element and subtree ids for one capture.
///
/// Ids embed the capture timestamp and a per-capture random suffix, so they
/// never collide across captures even when sequence numbers repeat.
#[derive(Debug)]
pub struct IdAllocator {
    capture_ms: i64,
    suffix: String,
    next_seq: u64,
}

impl IdAllocator {
    pub fn new(capture_ms: i64) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        Self {
            capture_ms,
            suffix,
            next_seq: 0,
        }
    }

    fn next(&mut self, prefix: &str) -> String {
        let seq = self.next_seq;
        self.next_seq += 1;
        format!("{prefix}-{seq}-{}-{}", self.capture_ms, self.suffix)
    }

    pub fn next_element(&mut self) -> String {
        self.next("el")
    }

    pub fn next_subtree(&mut self) -> String {
        self.next("st")
    }
}

/// Vertical band of the normalized screen (thirds of 0..=999).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalBand {
    Top,
    Middle,
    Bottom,
}

/// Horizontal band of the normalized screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalBand {
    Left,
    Center,
    Right,
}

/// Derive the `"{v}-{h}"` region label from a normalized bbox center.
pub fn screen_region(normalized_bbox: [u16; 4]) -> String {
    let cx = (normalized_bbox[0] as f64 + normalized_bbox[2] as f64) / 2.0;
    let cy = (normalized_bbox[1] as f64 + normalized_bbox[3] as f64) / 2.0;
    let v = if cy < NORM_RANGE / 3.0 {
        VerticalBand::Top
    } else if cy < 2.0 * NORM_RANGE / 3.0 {
        VerticalBand::Middle
    } else {
        VerticalBand::Bottom
    };
    let h = if cx < NORM_RANGE / 3.0 {
        HorizontalBand::Left
    } else if cx < 2.0 * NORM_RANGE / 3.0 {
        HorizontalBand::Center
    } else {
        HorizontalBand::Right
    };
    let v = match v {
        VerticalBand::Top => "top",
        VerticalBand::Middle => "middle",
        VerticalBand::Bottom => "bottom",
    };
    let h = match h {
        HorizontalBand::Left => "left",
        HorizontalBand::Center => "center",
        HorizontalBand::Right => "right",
    };
    format!("{v}-{h}")
}
