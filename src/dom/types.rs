//! DOM snapshot types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum number of distinct class names kept per snapshot
pub const MAX_CLASS_NAMES: usize = 100;

/// Attributes recorded on a captured element when present
pub const CAPTURED_ATTRIBUTES: [&str; 5] = ["href", "src", "alt", "title", "data-testid"];

/// One element of a captured page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomNode {
    /// Lower-cased tag name
    pub tag: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub classes: Vec<String>,

    /// The element's own text, trimmed and whitespace-collapsed
    #[serde(default)]
    pub text: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    /// Children in document order
    #[serde(default)]
    pub children: Vec<DomNode>,
}

impl DomNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            id: None,
            classes: Vec::new(),
            text: String::new(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classes = classes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_child(mut self, child: DomNode) -> Self {
        self.children.push(child);
        self
    }

    /// Number of nodes in this subtree, including self
    pub fn subtree_size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    /// Depth of the deepest descendant (a leaf has depth 0)
    pub fn max_depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            stack.extend(node.children.iter().map(|c| (c, depth + 1)));
        }
        deepest
    }
}

/// Optional page metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl PageMeta {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.keywords.is_none()
            && self.author.is_none()
            && self.language.is_none()
    }
}

/// One capture of a page
///
/// Snapshots are never mutated after capture; cleaning and correction
/// derive new values through the `with_*` methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub full_text: String,
    pub structure: Vec<DomNode>,
    /// Distinct class names in first-seen order
    pub all_classes: Vec<String>,
    #[serde(default, skip_serializing_if = "PageMeta::is_empty")]
    pub meta: PageMeta,
}

impl PageSnapshot {
    /// Total number of captured elements
    pub fn node_count(&self) -> usize {
        self.structure.iter().map(DomNode::subtree_size).sum()
    }

    /// UTF-8 size of the full text
    pub fn text_size_bytes(&self) -> usize {
        self.full_text.len()
    }

    /// Derive a snapshot with a replaced structure
    pub fn with_structure(&self, structure: Vec<DomNode>) -> Self {
        Self {
            structure,
            ..self.clone()
        }
    }

    /// Derive a snapshot with a replaced full text
    pub fn with_full_text(&self, full_text: impl Into<String>) -> Self {
        Self {
            full_text: full_text.into(),
            ..self.clone()
        }
    }
}

/// Collects distinct class names, keeping the first [`MAX_CLASS_NAMES`]
#[derive(Debug, Default)]
pub struct ClassCollector {
    seen: std::collections::HashSet<String>,
    ordered: Vec<String>,
}

impl ClassCollector {
    pub fn insert(&mut self, class: &str) {
        if self.ordered.len() >= MAX_CLASS_NAMES || self.seen.contains(class) {
            return;
        }
        self.seen.insert(class.to_string());
        self.ordered.push(class.to_string());
    }

    pub fn into_vec(self) -> Vec<String> {
        self.ordered
    }
}
