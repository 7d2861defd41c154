//! Structural cleaning of captured DOM trees
//!
//! All walks use explicit stacks; the depth bound is carried alongside each
//! node rather than in the call stack.

use serde::{Deserialize, Serialize};

use crate::dom::DomNode;

use super::policy::{is_content_class, CleanPolicy, REMOVED_TAGS};

/// A node of a cleaned tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanedNode {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
    /// Surviving classes; `None` when nothing survived reduction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<Vec<String>>,
    #[serde(default)]
    pub children: Vec<CleanedNode>,
}

impl CleanedNode {
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

    pub fn subtree_size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

impl From<CleanedNode> for DomNode {
    // Recursion here is bounded by the cleaning depth limit
    fn from(node: CleanedNode) -> Self {
        DomNode {
            tag: node.tag,
            id: node.id,
            classes: node.classes.unwrap_or_default(),
            text: node.text,
            attributes: Default::default(),
            children: node.children.into_iter().map(DomNode::from).collect(),
        }
    }
}

/// Read access shared by captured and cleaned trees
pub trait TextTree: Sized {
    fn own_text(&self) -> &str;
    fn child_nodes(&self) -> &[Self];
}

impl TextTree for DomNode {
    fn own_text(&self) -> &str {
        &self.text
    }

    fn child_nodes(&self) -> &[Self] {
        &self.children
    }
}

impl TextTree for CleanedNode {
    fn own_text(&self) -> &str {
        &self.text
    }

    fn child_nodes(&self) -> &[Self] {
        &self.children
    }
}

/// Whether `node` or a descendant at most `max_depth` levels below it has text
pub fn has_text_content<T: TextTree>(node: &T, max_depth: usize) -> bool {
    let mut stack = vec![(node, 0usize)];
    while let Some((current, depth)) = stack.pop() {
        if depth > max_depth {
            continue;
        }
        if !current.own_text().trim().is_empty() {
            return true;
        }
        stack.extend(current.child_nodes().iter().map(|c| (c, depth + 1)));
    }
    false
}

/// Node counts before and after cleaning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanStats {
    pub input_nodes: usize,
    pub retained_nodes: usize,
}

impl CleanStats {
    pub fn measure(input: &[DomNode], output: &[CleanedNode]) -> Self {
        Self {
            input_nodes: input.iter().map(DomNode::subtree_size).sum(),
            retained_nodes: output.iter().map(CleanedNode::subtree_size).sum(),
        }
    }
}

/// Prunes captured trees under a [`CleanPolicy`]
#[derive(Debug, Clone, Default)]
pub struct Cleaner {
    policy: CleanPolicy,
}

struct Frame<'a> {
    node: &'a DomNode,
    depth: usize,
    next_child: usize,
    children: Vec<CleanedNode>,
}

impl<'a> Frame<'a> {
    fn new(node: &'a DomNode, depth: usize) -> Self {
        Self {
            node,
            depth,
            next_child: 0,
            children: Vec::new(),
        }
    }
}

impl Cleaner {
    pub fn new(policy: CleanPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CleanPolicy {
        &self.policy
    }

    /// Whether `node` at `depth` is discarded with its whole subtree
    pub fn should_remove_element(&self, node: &DomNode, depth: usize) -> bool {
        if depth > self.policy.max_depth {
            return true;
        }
        if REMOVED_TAGS.contains(&node.tag.as_str()) {
            return true;
        }
        self.policy.matches_removed_class(&node.classes)
    }

    /// Clean a forest of captured roots, keeping document order
    pub fn clean(&self, roots: &[DomNode]) -> Vec<CleanedNode> {
        roots.iter().filter_map(|root| self.clean_root(root)).collect()
    }

    fn clean_root<'a>(&self, root: &'a DomNode) -> Option<CleanedNode> {
        if self.should_remove_element(root, 0) {
            return None;
        }

        let mut stack = vec![Frame::new(root, 0)];

        loop {
            let next = {
                let frame = stack.last_mut()?;
                let node: &'a DomNode = frame.node;
                let child = node.children.get(frame.next_child);
                frame.next_child += 1;
                child.map(|c| (c, frame.depth + 1))
            };

            match next {
                Some((child, depth)) => {
                    if !self.should_remove_element(child, depth) {
                        stack.push(Frame::new(child, depth));
                    }
                }
                None => {
                    let frame = stack.pop()?;
                    let finished = self.finish(frame);
                    match stack.last_mut() {
                        Some(parent) => parent.children.extend(finished),
                        None => return finished,
                    }
                }
            }
        }
    }

    /// Build the cleaned node once all of its children are done
    fn finish(&self, frame: Frame<'_>) -> Option<CleanedNode> {
        let node = frame.node;
        let text = node.text.trim().to_string();

        if self.policy.preserve_text && text.is_empty() {
            let remaining = self.policy.max_depth.saturating_sub(frame.depth + 1);
            let text_below = frame
                .children
                .iter()
                .any(|child| has_text_content(child, remaining));
            if !text_below {
                return None;
            }
        }

        Some(CleanedNode {
            tag: node.tag.clone(),
            id: node.id.clone(),
            text,
            classes: self.reduce_classes(&node.classes),
            children: frame.children,
        })
    }

    fn reduce_classes(&self, classes: &[String]) -> Option<Vec<String>> {
        let kept: Vec<String> = if self.policy.remove_css_classes {
            classes
                .iter()
                .filter(|class| is_content_class(class))
                .cloned()
                .collect()
        } else {
            classes.to_vec()
        };

        (!kept.is_empty()).then_some(kept)
    }
}

/// Lazy pre-order walk over the non-empty own texts of a cleaned forest
///
/// A clone resumes from the same position. Call [`clean_texts`] again to
/// start over.
#[derive(Clone)]
pub struct CleanTextIter<'a> {
    stack: Vec<&'a CleanedNode>,
}

impl<'a> Iterator for CleanTextIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            self.stack.extend(node.children.iter().rev());
            let text = node.text.trim();
            if !text.is_empty() {
                return Some(text);
            }
        }
        None
    }
}

/// Iterate the own texts of a cleaned forest in document order
pub fn clean_texts(forest: &[CleanedNode]) -> CleanTextIter<'_> {
    CleanTextIter {
        stack: forest.iter().rev().collect(),
    }
}

/// Newline-joined own texts of a cleaned forest in document order
pub fn extract_clean_text(forest: &[CleanedNode]) -> String {
    clean_texts(forest).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(levels: usize, text_at: impl Fn(usize) -> bool) -> DomNode {
        let mut node = DomNode::new("div").with_text(if text_at(levels - 1) { "leaf" } else { "" });
        for level in (0..levels - 1).rev() {
            let text = if text_at(level) { format!("level {}", level) } else { String::new() };
            node = DomNode::new("div").with_text(text).with_child(node);
        }
        node
    }

    #[test]
    fn test_parent_kept_for_text_bearing_child() {
        let tree = vec![DomNode::new("div").with_child(DomNode::new("p").with_text("Hello"))];
        let cleaned = Cleaner::default().clean(&tree);

        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].tag, "div");
        assert!(cleaned[0].text.is_empty());
        assert_eq!(extract_clean_text(&cleaned), "Hello");
    }

    #[test]
    fn test_depth_bound_on_deep_chain() {
        let tree = vec![chain(20, |_| true)];
        let cleaned = Cleaner::new(CleanPolicy::default().with_max_depth(10)).clean(&tree);

        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].max_depth(), 10);
        assert_eq!(cleaned[0].subtree_size(), 11);
    }

    #[test]
    fn test_text_only_beyond_bound_drops_chain() {
        let tree = vec![chain(20, |level| level == 19)];
        let cleaned = Cleaner::new(CleanPolicy::default().with_max_depth(10)).clean(&tree);

        assert!(cleaned.is_empty());
    }

    #[test]
    fn test_zero_depth_keeps_only_roots() {
        let tree = vec![chain(3, |_| true)];
        let cleaned = Cleaner::new(CleanPolicy::default().with_max_depth(0)).clean(&tree);

        assert_eq!(cleaned.len(), 1);
        assert!(cleaned[0].children.is_empty());
    }

    #[test]
    fn test_very_deep_chain_terminates() {
        let tree = vec![chain(1_500, |_| true)];
        let cleaned = Cleaner::default().clean(&tree);

        assert_eq!(cleaned[0].max_depth(), 10);
    }

    #[test]
    fn test_removed_tags_drop_subtree() {
        let tree = vec![
            DomNode::new("script").with_text("var x = 1;"),
            DomNode::new("div")
                .with_child(DomNode::new("svg").with_child(DomNode::new("text").with_text("icon")))
                .with_child(DomNode::new("p").with_text("Body")),
        ];
        let cleaned = Cleaner::default().clean(&tree);

        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].children.len(), 1);
        assert_eq!(cleaned[0].children[0].tag, "p");
    }

    #[test]
    fn test_class_categories_respect_flags() {
        let tree = vec![
            DomNode::new("div").with_classes(["loading-spinner"]).with_text("Loading..."),
            DomNode::new("a").with_classes(["skip-link"]).with_text("Skip to content"),
            DomNode::new("p").with_text("Article"),
        ];

        let cleaned = Cleaner::default().clean(&tree);
        assert_eq!(extract_clean_text(&cleaned), "Article");

        let lenient = Cleaner::new(CleanPolicy {
            remove_progress: false,
            remove_a11y: false,
            ..CleanPolicy::default()
        });
        assert_eq!(
            extract_clean_text(&lenient.clean(&tree)),
            "Loading...\nSkip to content\nArticle"
        );
    }

    #[test]
    fn test_class_reduction() {
        let tree = vec![DomNode::new("div")
            .with_classes(["main-content", "flex", "mt-4"])
            .with_text("x")
            .with_child(DomNode::new("span").with_classes(["badge"]).with_text("y"))];

        let cleaned = Cleaner::default().clean(&tree);
        assert_eq!(cleaned[0].classes, Some(vec!["main-content".to_string()]));
        assert_eq!(cleaned[0].children[0].classes, None);

        let keep_all = Cleaner::new(CleanPolicy {
            remove_css_classes: false,
            ..CleanPolicy::default()
        });
        let cleaned = keep_all.clean(&tree);
        assert_eq!(cleaned[0].classes.as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn test_empty_nodes_kept_without_preserve_text() {
        let tree = vec![DomNode::new("div").with_child(DomNode::new("br"))];

        assert!(Cleaner::default().clean(&tree).is_empty());

        let keep_empty = Cleaner::new(CleanPolicy {
            preserve_text: false,
            ..CleanPolicy::default()
        });
        let cleaned = keep_empty.clean(&tree);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].children[0].tag, "br");
    }

    #[test]
    fn test_empty_forest() {
        assert!(Cleaner::default().clean(&[]).is_empty());
        assert_eq!(extract_clean_text(&[]), "");
    }

    #[test]
    fn test_clean_text_is_document_ordered_and_restartable() {
        let tree = vec![
            DomNode::new("section")
                .with_text("  one ")
                .with_child(DomNode::new("p").with_text("two"))
                .with_child(DomNode::new("p").with_child(DomNode::new("em").with_text("three"))),
            DomNode::new("footer").with_text("four"),
        ];
        let cleaned = Cleaner::default().clean(&tree);

        let first: Vec<&str> = clean_texts(&cleaned).collect();
        let second: Vec<&str> = clean_texts(&cleaned).collect();
        assert_eq!(first, vec!["one", "two", "three", "four"]);
        assert_eq!(first, second);

        let mut iter = clean_texts(&cleaned);
        iter.next();
        let resumed: Vec<&str> = iter.clone().collect();
        assert_eq!(resumed, vec!["two", "three", "four"]);
    }

    #[test]
    fn test_has_text_content_is_depth_bounded() {
        let tree = chain(5, |level| level == 4);

        assert!(has_text_content(&tree, 4));
        assert!(!has_text_content(&tree, 3));
    }

    #[test]
    fn test_cleaning_does_not_touch_input() {
        let tree = vec![DomNode::new("div").with_classes(["flex"]).with_text("x")];
        let before = tree.clone();
        let _ = Cleaner::default().clean(&tree);
        assert_eq!(tree, before);
    }

    #[test]
    fn test_clean_stats_and_conversion() {
        let tree = vec![DomNode::new("div")
            .with_child(DomNode::new("script"))
            .with_child(DomNode::new("p").with_text("kept"))];
        let cleaned = Cleaner::default().clean(&tree);

        let stats = CleanStats::measure(&tree, &cleaned);
        assert_eq!(stats.input_nodes, 3);
        assert_eq!(stats.retained_nodes, 2);

        let restored: Vec<DomNode> = cleaned.into_iter().map(DomNode::from).collect();
        assert_eq!(restored[0].children[0].text, "kept");
    }
}
