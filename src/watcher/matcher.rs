//! Watch-list matcher
//!
//! Turns a freshly created banner element into the identity of the
//! watched app that produced it. Traversal is depth-first with a hard
//! depth bound; notification banners nest their text within a few
//! levels, so anything deeper is not banner content.

use super::element::UiElement;
use crate::core::watchlist::WatchedApp;

/// Maximum traversal depth; the root is depth 0.
pub const MAX_SCAN_DEPTH: usize = 4;

/// Find the first watched app whose display name occurs in the element
/// tree. At each node the title, value, and description are checked in
/// that order; within one attribute, earlier watch-list entries win.
/// Returns `None` when the depth bound is exhausted without a match.
pub fn find_match<'a>(
    root: &dyn UiElement,
    watch_list: &'a [WatchedApp],
) -> Option<&'a WatchedApp> {
    if watch_list.is_empty() {
        return None;
    }
    let needles: Vec<String> = watch_list
        .iter()
        .map(|app| app.display_name.to_lowercase())
        .collect();
    scan(root, watch_list, &needles, 0)
}

fn scan<'a>(
    element: &dyn UiElement,
    watch_list: &'a [WatchedApp],
    needles: &[String],
    depth: usize,
) -> Option<&'a WatchedApp> {
    if depth > MAX_SCAN_DEPTH {
        return None;
    }

    // Unreadable attributes come back as None and are skipped
    for text in [element.title(), element.value(), element.description()]
        .into_iter()
        .flatten()
    {
        if let Some(app) = match_text(&text, watch_list, needles) {
            return Some(app);
        }
    }

    for child in element.children() {
        if let Some(app) = scan(child.as_ref(), watch_list, needles, depth + 1) {
            return Some(app);
        }
    }

    None
}

fn match_text<'a>(
    text: &str,
    watch_list: &'a [WatchedApp],
    needles: &[String],
) -> Option<&'a WatchedApp> {
    let haystack = text.to_lowercase();
    watch_list
        .iter()
        .zip(needles)
        .find(|(_, needle)| haystack.contains(needle.as_str()))
        .map(|(app, _)| app)
}
