//! Semantic description generation.
//!
//! Emits the node/subtree/screen strings that get embedded, plus the
//! compact indented tree rendering handed to LLM agents. Same input always
//! produces the exact same string; ties order by element id.

use crate::types::{Element, ElementType, Subtree};
use std::collections::{BTreeMap, HashMap};

/// Node descriptions are capped at one line of this many characters.
const MAX_NODE_DESCRIPTION: usize = 512;

fn type_name(element_type: ElementType) -> String {
    let s = element_type.to_string();
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => s,
    }
}

/// Host part of a URL, used as the `at {domain}` segment.
pub fn domain_of(url: &str) -> Option<String> {
    let rest = url.split("://").nth(1).unwrap_or(url);
    let host = rest.split(['/', '?', '#']).next()?.trim();
    if host.is_empty() || !host.contains('.') {
        return None;
    }
    Some(host.trim_start_matches("www.").to_string())
}

/// Chain of ancestor labels from the root down to the immediate parent.
fn parent_path(element: &Element, by_id: &HashMap<&str, &Element>) -> Option<String> {
    let mut chain = Vec::new();
    let mut current = element.parent_id.as_deref();
    while let Some(id) = current {
        let Some(parent) = by_id.get(id) else { break };
        let label = if parent.text.trim().is_empty() {
            type_name(parent.element_type)
        } else {
            parent.text.trim().to_string()
        };
        chain.push(label);
        current = parent.parent_id.as_deref();
        if chain.len() >= 8 {
            break;
        }
    }
    if chain.is_empty() {
        return None;
    }
    chain.reverse();
    Some(chain.join(" > "))
}

/// One-line description of a single element, for embedding.
///
/// Shape: `{Type} "{text}" in {region} within {parent path} on {app} at
/// {domain} (clickable)`, with absent segments omitted.
pub fn node_description(
    element: &Element,
    elements: &[Element],
    app: &str,
    domain: Option<&str>,
) -> String {
    let by_id: HashMap<&str, &Element> = elements.iter().map(|e| (e.id.as_str(), e)).collect();

    let mut out = type_name(element.element_type);
    let text = element.text.trim();
    if !text.is_empty() {
        out.push_str(&format!(" \"{text}\""));
    }
    out.push_str(&format!(" in {}", element.screen_region));
    if let Some(path) = parent_path(element, &by_id) {
        out.push_str(&format!(" within {path}"));
    }
    if !app.is_empty() {
        out.push_str(&format!(" on {app}"));
    }
    if let Some(domain) = domain {
        out.push_str(&format!(" at {domain}"));
    }
    if element.clickable {
        out.push_str(" (clickable)");
    }

    let single_line = out.replace(['\n', '\r'], " ");
    if single_line.chars().count() > MAX_NODE_DESCRIPTION {
        single_line.chars().take(MAX_NODE_DESCRIPTION).collect()
    } else {
        single_line
    }
}

/// Count elements per type, descending, ties by type name.
fn top_type_counts(elements: &[&Element], top: usize) -> String {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for element in elements {
        *counts.entry(element.element_type.to_string()).or_default() += 1;
    }
    let mut pairs: Vec<(String, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    pairs
        .into_iter()
        .take(top)
        .map(|(name, count)| format!("{count} {name}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Description of one subtree.
pub fn subtree_description(subtree: &Subtree, elements: &[Element], app: &str) -> String {
    let members: Vec<&Element> = elements
        .iter()
        .filter(|e| subtree.element_ids.contains(&e.id))
        .collect();
    let interactive = members.iter().filter(|e| e.interactive).count();
    let counts = top_type_counts(&members, 3);

    let mut out = format!(
        "{} titled \"{}\" containing {}",
        type_name(subtree.subtree_type),
        subtree.title.trim(),
        if counts.is_empty() { "nothing".to_string() } else { counts },
    );
    out.push_str(&format!(" with {interactive} interactive elements"));
    if !app.is_empty() {
        out.push_str(&format!(" in {app}"));
    }
    out
}

/// Whole-screen description, for embedding and for agents' first glance.
pub fn screen_description(
    app: &str,
    window_title: &str,
    domain: Option<&str>,
    elements: &[Element],
    subtrees: &[Subtree],
) -> String {
    let mut out = if app.is_empty() {
        "Screen".to_string()
    } else {
        format!("{app} window")
    };
    if !window_title.trim().is_empty() {
        out.push_str(&format!(" showing \"{}\"", window_title.trim()));
    }
    if let Some(domain) = domain {
        out.push_str(&format!(" at {domain}"));
    }

    let mut region_types: Vec<String> = subtrees
        .iter()
        .map(|s| s.subtree_type.to_string())
        .collect();
    region_types.sort();
    region_types.dedup();
    if !region_types.is_empty() {
        out.push_str(&format!(" with {} regions", region_types.join("/")));
    }

    let count_of = |t: ElementType| elements.iter().filter(|e| e.element_type == t).count();
    out.push_str(&format!(
        " containing {} text, {} buttons, {} inputs",
        count_of(ElementType::Text),
        count_of(ElementType::Button),
        count_of(ElementType::Input),
    ));

    let mut actions: Vec<&Element> = elements
        .iter()
        .filter(|e| e.element_type == ElementType::Button && e.clickable && !e.text.trim().is_empty())
        .collect();
    actions.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    if !actions.is_empty() {
        let names: Vec<String> = actions
            .iter()
            .take(5)
            .map(|e| format!("\"{}\"", e.text.trim()))
            .collect();
        out.push_str(&format!(" including {}", names.join(", ")));
    }
    out
}

/// Compact indented rendering of the element tree for prompting.
///
/// Roots first, children indented beneath their parent, every element
/// carrying a stable 1-based index:
///
/// ```text
/// #1 [container] Home About (bounds: [0,0,900,40])
///   #2 [menu-item] Home (bounds: [10,5,80,30], clickable)
/// ```
pub fn llm_context(elements: &[Element]) -> String {
    let mut children: HashMap<Option<&str>, Vec<&Element>> = HashMap::new();
    for element in elements {
        children
            .entry(element.parent_id.as_deref())
            .or_default()
            .push(element);
    }
    for list in children.values_mut() {
        list.sort_by(|a, b| {
            a.bbox
                .y1
                .partial_cmp(&b.bbox.y1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    a.bbox
                        .x1
                        .partial_cmp(&b.bbox.x1)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.id.cmp(&b.id))
        });
    }

    let mut out = String::new();
    let mut next_index = 1u32;
    // Depth-first with an explicit stack; reversed so siblings render in
    // reading order.
    let mut stack: Vec<(&Element, usize)> = children
        .get(&None)
        .map(|roots| roots.iter().rev().map(|e| (*e, 0)).collect())
        .unwrap_or_default();

    while let Some((element, depth)) = stack.pop() {
        let indent = "  ".repeat(depth);
        let index = next_index;
        next_index += 1;

        let mut context_parts = Vec::new();
        if element.bbox.is_valid() {
            let b = element.bbox;
            context_parts.push(format!(
                "bounds: [{:.0},{:.0},{:.0},{:.0}]",
                b.x1, b.y1, b.x2, b.y2
            ));
        }
        if element.clickable {
            context_parts.push("clickable".to_string());
        }

        out.push_str(&format!("{indent}#{index} [{}]", element.element_type));
        if !element.text.trim().is_empty() {
            out.push_str(&format!(" {}", element.text.trim()));
        }
        if !context_parts.is_empty() {
            out.push_str(&format!(" ({})", context_parts.join(", ")));
        }
        out.push('\n');

        if let Some(kids) = children.get(&Some(element.id.as_str())) {
            for kid in kids.iter().rev() {
                stack.push((*kid, depth + 1));
            }
        }
    }
    out
}
