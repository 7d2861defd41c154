//! Cleaning policy

use serde::{Deserialize, Serialize};

/// Default recursion bound for cleaning
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Tags that are always removed together with their subtree
pub const REMOVED_TAGS: [&str; 14] = [
    "script", "style", "noscript", "meta", "link", "svg", "path", "iframe", "embed", "object",
    "applet", "canvas", "video", "audio",
];

/// Class fragments marking progress bars and loaders
pub const PROGRESS_CLASS_MARKERS: [&str; 3] = ["progress", "loader", "loading"];

/// Class fragments marking accessibility-only helpers
pub const A11Y_CLASS_MARKERS: [&str; 3] = ["a11y", "skip", "sr-only"];

/// Class fragments marking print-specific elements
pub const PRINT_CLASS_MARKERS: [&str; 2] = ["print", "unprintable"];

/// Class fragments that signal content and survive class reduction
pub const CONTENT_CLASS_MARKERS: [&str; 8] = [
    "content", "text", "title", "heading", "article", "section", "main", "body",
];

/// Configuration for structural cleaning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CleanPolicy {
    /// Drop progress bars and loaders
    pub remove_progress: bool,
    /// Drop accessibility-only helpers
    pub remove_a11y: bool,
    /// Drop print-only elements
    pub remove_print: bool,
    /// Reduce class lists to content-signal classes
    pub remove_css_classes: bool,
    /// Drop nodes that carry no text anywhere in their subtree
    pub preserve_text: bool,
    /// Nodes deeper than this are discarded
    pub max_depth: usize,
}

impl Default for CleanPolicy {
    fn default() -> Self {
        Self {
            remove_progress: true,
            remove_a11y: true,
            remove_print: true,
            remove_css_classes: true,
            preserve_text: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl CleanPolicy {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Whether any enabled removal category matches one of `classes`
    pub fn matches_removed_class(&self, classes: &[String]) -> bool {
        let categories: [(bool, &[&str]); 3] = [
            (self.remove_progress, &PROGRESS_CLASS_MARKERS),
            (self.remove_a11y, &A11Y_CLASS_MARKERS),
            (self.remove_print, &PRINT_CLASS_MARKERS),
        ];

        categories
            .iter()
            .filter(|(enabled, _)| *enabled)
            .any(|(_, markers)| {
                classes
                    .iter()
                    .any(|class| markers.iter().any(|marker| class.contains(marker)))
            })
    }
}

/// Whether a class name carries a content signal
pub fn is_content_class(class: &str) -> bool {
    CONTENT_CLASS_MARKERS
        .iter()
        .any(|marker| class.contains(marker))
}
