//! Context resolution: which windows should the analyzer look at.

use crate::types::{ScreenDimensions, WindowInfo};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// How the window set was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextStrategy {
    FullscreenApp,
    MultiWindow,
    FrontmostFallback,
    NoWindows,
}

/// Resolver output: the strategy, the primary window, and the deduplicated
/// window list (capped) the analyzer should run on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub strategy: ContextStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<WindowInfo>,
    pub windows: Vec<WindowInfo>,
}

/// Apps treated as browsers for URL-based dedup.
static BROWSER_APPS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "chrome", "google chrome", "firefox", "safari", "edge", "microsoft edge", "brave",
        "brave browser", "opera", "vivaldi", "arc",
    ])
});

fn is_browser(window: &WindowInfo) -> bool {
    BROWSER_APPS.contains(window.app.to_lowercase().as_str())
}

/// Single-window fullscreen heuristic.
fn is_fullscreen(window: &WindowInfo, dims: ScreenDimensions) -> bool {
    window.w >= 0.95 * dims.width as f64
        && window.h >= 0.90 * dims.height as f64
        && window.x <= 10.0
        && window.y <= 30.0
}

/// Multi-fragment fullscreen: several windows of one app that are each
/// full-width, near the top-left, and together cover most of the screen
/// height.
fn fullscreen_fragments(windows: &[WindowInfo], dims: ScreenDimensions) -> Option<Vec<WindowInfo>> {
    let first_app = &windows.first()?.app;
    let fragments: Vec<&WindowInfo> = windows
        .iter()
        .filter(|w| &w.app == first_app && w.w >= 0.95 * dims.width as f64 && w.x <= 10.0)
        .collect();
    if fragments.len() < 2 {
        return None;
    }
    // The stack has to start at the top of the screen.
    let top = fragments
        .iter()
        .map(|w| w.y)
        .fold(f64::INFINITY, f64::min);
    if top > 30.0 {
        return None;
    }
    let covered: f64 = fragments.iter().map(|w| w.h).sum();
    if covered >= 0.85 * dims.height as f64 {
        Some(fragments.into_iter().cloned().collect())
    } else {
        None
    }
}

/// Choose which windows the analyzer should run on. First matching rule
/// wins: fullscreen single window, multi-fragment fullscreen, multi-window,
/// no windows. A lone non-fullscreen window falls back to the frontmost
/// strategy.
pub fn resolve_context(
    windows: &[WindowInfo],
    dims: ScreenDimensions,
    max_windows: usize,
) -> Context {
    if windows.is_empty() {
        return Context {
            strategy: ContextStrategy::NoWindows,
            primary: None,
            windows: Vec::new(),
        };
    }

    let frontmost = &windows[0];
    if is_fullscreen(frontmost, dims) {
        debug!(app = %frontmost.app, "fullscreen window detected");
        return Context {
            strategy: ContextStrategy::FullscreenApp,
            primary: Some(frontmost.clone()),
            windows: vec![frontmost.clone()],
        };
    }

    if let Some(fragments) = fullscreen_fragments(windows, dims) {
        let primary = fragments
            .iter()
            .max_by(|a, b| a.h.partial_cmp(&b.h).unwrap_or(std::cmp::Ordering::Equal))
            .cloned();
        debug!(fragments = fragments.len(), "multi-fragment fullscreen detected");
        return Context {
            strategy: ContextStrategy::FullscreenApp,
            primary,
            windows: fragments,
        };
    }

    let deduped = dedupe_windows(windows, max_windows);
    if deduped.len() == 1 {
        return Context {
            strategy: ContextStrategy::FrontmostFallback,
            primary: deduped.first().cloned(),
            windows: deduped,
        };
    }
    Context {
        strategy: ContextStrategy::MultiWindow,
        primary: deduped.first().cloned(),
        windows: deduped,
    }
}

/// Deduplicate the window list for per-window analysis.
///
/// Browser windows with a URL dedupe by URL; browser windows with neither
/// URL nor title are discarded (chrome UI surfaces); everything else
/// dedupes by `(app, title)`. Frontmost order is preserved and the cap is
/// applied after dedup.
pub fn dedupe_windows(windows: &[WindowInfo], max_windows: usize) -> Vec<WindowInfo> {
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut seen_app_title: HashSet<(String, String)> = HashSet::new();
    let mut out = Vec::new();

    for window in windows {
        if is_browser(window) {
            match &window.url {
                Some(url) if !url.is_empty() => {
                    if !seen_urls.insert(url.clone()) {
                        continue;
                    }
                }
                _ => {
                    if window.title.trim().is_empty() {
                        debug!(app = %window.app, "discarding browser window without url or title");
                        continue;
                    }
                    if !seen_app_title
                        .insert((window.app.to_lowercase(), window.title.clone()))
                    {
                        continue;
                    }
                }
            }
        } else if !seen_app_title.insert((window.app.to_lowercase(), window.title.clone())) {
            continue;
        }
        out.push(window.clone());
        if out.len() >= max_windows {
            break;
        }
    }
    out
}
