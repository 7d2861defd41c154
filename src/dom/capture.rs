//! HTML capture using lol_html
//!
//! Streams the document through lol_html and rebuilds the element tree with
//! an explicit open-element stack, so capture depth never touches the call
//! stack. Start tags that imply an end tag (`li`, `p`, table cells and the
//! like) close the open sibling first; anything else left open is closed by
//! the nearest enclosing end tag.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use lol_html::html_content::EndTag;
use lol_html::{doc_text, element, rewrite_str, RewriteStrSettings};

use crate::error::CaptureError;

use super::types::{ClassCollector, DomNode, PageMeta, PageSnapshot, CAPTURED_ATTRIBUTES};

/// Elements whose text never counts as page text
const SILENT_TAGS: [&str; 6] = ["head", "title", "script", "style", "noscript", "template"];

/// Foreign content roots; a `title` inside these labels a graphic, not the page
const FOREIGN_TAGS: [&str; 2] = ["svg", "math"];

/// Start tags that close an open `p`
const CLOSES_PARAGRAPH: [&str; 34] = [
    "address", "article", "aside", "blockquote", "dd", "details", "dialog", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "hgroup", "hr", "li", "main", "menu", "nav", "ol", "p", "pre", "section", "table",
    "ul",
];

/// Elements a `p` cannot be implicitly closed across
const PARAGRAPH_SCOPE: [&str; 8] =
    ["button", "table", "td", "th", "caption", "html", "object", "template"];

type EndTagResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Capture a snapshot of an HTML document, stamped with the current time
pub fn capture_html(url: &str, html: &str) -> Result<PageSnapshot, CaptureError> {
    capture_html_at(url, html, Utc::now())
}

/// Capture a snapshot of an HTML document with an explicit timestamp
pub fn capture_html_at(
    url: &str,
    html: &str,
    timestamp: DateTime<Utc>,
) -> Result<PageSnapshot, CaptureError> {
    let builder = Rc::new(RefCell::new(TreeBuilder::default()));

    let on_element = Rc::clone(&builder);
    let on_text = Rc::clone(&builder);

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("*", move |el| {
                let tag = el.tag_name().to_ascii_lowercase();
                let mut node = DomNode::new(tag.as_str());

                node.id = el
                    .get_attribute("id")
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty());
                node.classes = el
                    .get_attribute("class")
                    .map(|c| c.split_whitespace().map(str::to_string).collect())
                    .unwrap_or_default();
                node.attributes = CAPTURED_ATTRIBUTES
                    .iter()
                    .filter_map(|name| el.get_attribute(name).map(|v| (name.to_string(), v)))
                    .collect::<BTreeMap<_, _>>();

                let serial = {
                    let mut builder = on_element.borrow_mut();
                    match tag.as_str() {
                        "html" => builder.meta.language = non_empty(el.get_attribute("lang")),
                        "meta" => builder.record_meta(
                            el.get_attribute("name").as_deref(),
                            el.get_attribute("content"),
                        ),
                        _ => {}
                    }
                    builder.open(node)
                };

                match el.end_tag_handlers() {
                    Some(handlers) => {
                        let on_end = Rc::clone(&on_element);
                        let handler: lol_html::EndTagHandler<'static> =
                            Box::new(move |_end: &mut EndTag<'_>| -> EndTagResult {
                                on_end.borrow_mut().close(serial);
                                Ok(())
                            });
                        handlers.push(handler);
                    }
                    // Void and self-closing elements never see an end tag
                    None => on_element.borrow_mut().close(serial),
                }

                Ok(())
            })],
            document_content_handlers: vec![doc_text!(move |chunk| {
                on_text
                    .borrow_mut()
                    .push_text(chunk.as_str(), chunk.last_in_text_node());
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| CaptureError::Parse(e.to_string()))?;

    let builder = std::mem::take(&mut *builder.borrow_mut());
    Ok(builder.finish(url, timestamp))
}

/// Decode entities and collapse whitespace runs to single spaces
fn normalize_text(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

struct OpenElement {
    serial: usize,
    node: DomNode,
    raw_text: String,
}

#[derive(Default)]
struct TreeBuilder {
    stack: Vec<OpenElement>,
    roots: Vec<DomNode>,
    next_serial: usize,
    title: String,
    title_serial: Option<usize>,
    page_text: String,
    classes: ClassCollector,
    meta: PageMeta,
}

impl TreeBuilder {
    fn open(&mut self, node: DomNode) -> usize {
        self.close_implied_by(&node.tag);

        for class in &node.classes {
            self.classes.insert(class);
        }

        let serial = self.next_serial;
        self.next_serial += 1;
        self.stack.push(OpenElement {
            serial,
            node,
            raw_text: String::new(),
        });
        serial
    }

    /// Close the element with `serial` and anything still open inside it
    fn close(&mut self, serial: usize) {
        if !self.stack.iter().any(|open| open.serial == serial) {
            return;
        }
        while let Some(open) = self.stack.pop() {
            let done = open.serial == serial;
            self.attach(open);
            if done {
                break;
            }
        }
    }

    /// Apply the end tags HTML lets authors omit before `tag` opens
    fn close_implied_by(&mut self, tag: &str) {
        if CLOSES_PARAGRAPH.contains(&tag) {
            self.close_innermost(&["p"], &PARAGRAPH_SCOPE);
        }
        match tag {
            "li" => self.close_innermost(&["li"], &["ul", "ol", "menu"]),
            "dt" | "dd" => self.close_innermost(&["dt", "dd"], &["dl"]),
            "option" => self.close_innermost(&["option"], &["select", "datalist", "optgroup"]),
            "optgroup" => {
                self.close_innermost(&["option"], &["select", "datalist", "optgroup"]);
                self.close_innermost(&["optgroup"], &["select"]);
            }
            "tr" => self.close_innermost(&["tr"], &["table", "thead", "tbody", "tfoot"]),
            "td" | "th" => self.close_innermost(&["td", "th"], &["tr", "table"]),
            "thead" | "tbody" | "tfoot" => {
                self.close_innermost(&["thead", "tbody", "tfoot"], &["table"])
            }
            _ => {}
        }
    }

    /// Close the innermost open element named in `tags`, unless a `boundary`
    /// element is open above it
    fn close_innermost(&mut self, tags: &[&str], boundary: &[&str]) {
        let found = self
            .stack
            .iter()
            .rev()
            .take_while(|open| !boundary.contains(&open.node.tag.as_str()))
            .find(|open| tags.contains(&open.node.tag.as_str()))
            .map(|open| open.serial);
        if let Some(serial) = found {
            self.close(serial);
        }
    }

    fn attach(&mut self, open: OpenElement) {
        let mut node = open.node;
        node.text = normalize_text(&open.raw_text);
        match self.stack.last_mut() {
            Some(parent) => parent.node.children.push(node),
            None => self.roots.push(node),
        }
    }

    fn push_text(&mut self, text: &str, last_in_node: bool) {
        let Some(current) = self.stack.last_mut() else {
            return;
        };

        current.raw_text.push_str(text);
        if last_in_node {
            current.raw_text.push(' ');
        }

        if current.node.tag == "title" {
            let serial = current.serial;
            let foreign = self
                .stack
                .iter()
                .any(|open| FOREIGN_TAGS.contains(&open.node.tag.as_str()));
            // Only the first document title names the page
            if !foreign && *self.title_serial.get_or_insert(serial) == serial {
                self.title.push_str(text);
            }
            return;
        }

        let silent = self
            .stack
            .iter()
            .any(|open| SILENT_TAGS.contains(&open.node.tag.as_str()));
        if !silent {
            self.page_text.push_str(text);
            if last_in_node {
                self.page_text.push(' ');
            }
        }
    }

    fn record_meta(&mut self, name: Option<&str>, content: Option<String>) {
        let content = non_empty(content);
        match name.map(str::to_ascii_lowercase).as_deref() {
            Some("description") => self.meta.description = content,
            Some("keywords") => self.meta.keywords = content,
            Some("author") => self.meta.author = content,
            _ => {}
        }
    }

    fn finish(mut self, url: &str, timestamp: DateTime<Utc>) -> PageSnapshot {
        while let Some(open) = self.stack.pop() {
            self.attach(open);
        }

        let title = normalize_text(&self.title);
        let full_text = normalize_text(&self.page_text);

        PageSnapshot {
            url: url.trim().to_string(),
            title,
            timestamp,
            full_text,
            structure: body_children(self.roots),
            all_classes: self.classes.into_vec(),
            meta: self.meta,
        }
    }
}

/// Select the body's children as the snapshot roots
fn body_children(roots: Vec<DomNode>) -> Vec<DomNode> {
    let mut fallback = Vec::new();

    for node in roots {
        match node.tag.as_str() {
            "body" => return node.children,
            "head" => {}
            "html" => {
                for child in node.children {
                    match child.tag.as_str() {
                        "body" => return child.children,
                        "head" => {}
                        _ => fallback.push(child),
                    }
                }
            }
            _ => fallback.push(node),
        }
    }

    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html lang="pt-BR">
  <head>
    <title>Caf&eacute; S&atilde;o Paulo</title>
    <meta name="description" content="Menu and hours">
    <style>.content { color: red }</style>
  </head>
  <body>
    <div id="main" class="content main-wrapper">
      <h1 class="title">Welcome</h1>
      <p>Open <b>every</b> day</p>
      <img src="/logo.png" alt="Logo">
      <a href="/menu" data-testid="menu-link" class="content">Menu</a>
    </div>
    <script>var ignored = "text";</script>
  </body>
</html>"#;

    #[test]
    fn test_capture_builds_body_tree() {
        let snapshot = capture_html("https://cafe.example/", PAGE).unwrap();

        assert_eq!(snapshot.structure.len(), 2);
        let main = &snapshot.structure[0];
        assert_eq!(main.tag, "div");
        assert_eq!(main.id.as_deref(), Some("main"));
        assert_eq!(main.classes, vec!["content", "main-wrapper"]);

        let tags: Vec<&str> = main.children.iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(tags, vec!["h1", "p", "img", "a"]);

        let paragraph = &main.children[1];
        assert_eq!(paragraph.text, "Open day");
        assert_eq!(paragraph.children[0].text, "every");

        assert_eq!(snapshot.structure[1].tag, "script");
    }

    #[test]
    fn test_capture_metadata_and_text() {
        let snapshot = capture_html("https://cafe.example/", PAGE).unwrap();

        assert_eq!(snapshot.title, "Café São Paulo");
        assert_eq!(snapshot.meta.language.as_deref(), Some("pt-BR"));
        assert_eq!(snapshot.meta.description.as_deref(), Some("Menu and hours"));
        assert_eq!(snapshot.full_text, "Welcome Open every day Menu");
        assert!(!snapshot.full_text.contains("ignored"));
        assert!(!snapshot.full_text.contains("color"));
    }

    #[test]
    fn test_capture_allow_listed_attributes() {
        let snapshot = capture_html("https://cafe.example/", PAGE).unwrap();
        let main = &snapshot.structure[0];

        let img = &main.children[2];
        assert_eq!(img.attributes.get("src").map(String::as_str), Some("/logo.png"));
        assert_eq!(img.attributes.get("alt").map(String::as_str), Some("Logo"));

        let link = &main.children[3];
        assert_eq!(link.attributes.get("data-testid").map(String::as_str), Some("menu-link"));
        assert!(!link.attributes.contains_key("class"));
    }

    #[test]
    fn test_class_set_is_deduplicated() {
        let snapshot = capture_html("https://cafe.example/", PAGE).unwrap();
        assert_eq!(snapshot.all_classes, vec!["content", "main-wrapper", "title"]);
    }

    fn child_tags(node: &DomNode) -> Vec<&str> {
        node.children.iter().map(|c| c.tag.as_str()).collect()
    }

    #[test]
    fn test_unclosed_elements_close_with_parent() {
        let html = "<body><ul><li>one<li>two<li>three</ul><p>after</p></body>";
        let snapshot = capture_html("https://example.com", html).unwrap();

        assert_eq!(snapshot.structure.len(), 2);
        let list = &snapshot.structure[0];
        assert_eq!(list.tag, "ul");
        assert_eq!(child_tags(list), vec!["li", "li", "li"]);
        let items: Vec<&str> = list.children.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(items, vec!["one", "two", "three"]);
        assert_eq!(list.max_depth(), 1);

        assert_eq!(snapshot.structure[1].tag, "p");
        assert_eq!(snapshot.structure[1].text, "after");
    }

    #[test]
    fn test_implied_paragraph_ends() {
        let html = "<body><p>one<p>two <b>bold</b><div>block</div></body>";
        let snapshot = capture_html("https://example.com", html).unwrap();

        let tags: Vec<&str> = snapshot.structure.iter().map(|n| n.tag.as_str()).collect();
        assert_eq!(tags, vec!["p", "p", "div"]);
        assert_eq!(snapshot.structure[1].text, "two");
        assert_eq!(child_tags(&snapshot.structure[1]), vec!["b"]);
        assert_eq!(snapshot.full_text, "one two bold block");
    }

    #[test]
    fn test_implied_table_and_list_ends() {
        let html = "<body>\
            <table><tr><td>a<td>b<tr><th>c<td>d</table>\
            <dl><dt>term<dd>one<dd>two</dl>\
            <select><option>x<optgroup><option>y<option>z</select>\
            </body>";
        let snapshot = capture_html("https://example.com", html).unwrap();

        let table = &snapshot.structure[0];
        assert_eq!(child_tags(table), vec!["tr", "tr"]);
        assert_eq!(child_tags(&table.children[0]), vec!["td", "td"]);
        assert_eq!(child_tags(&table.children[1]), vec!["th", "td"]);
        assert_eq!(table.max_depth(), 2);

        let list = &snapshot.structure[1];
        assert_eq!(child_tags(list), vec!["dt", "dd", "dd"]);

        let select = &snapshot.structure[2];
        assert_eq!(child_tags(select), vec!["option", "optgroup"]);
        assert_eq!(child_tags(&select.children[1]), vec!["option", "option"]);
    }

    #[test]
    fn test_nested_lists_keep_their_items() {
        let html = "<body><ul><li>outer<ul><li>inner a<li>inner b</ul><li>next</ul></body>";
        let snapshot = capture_html("https://example.com", html).unwrap();

        let list = &snapshot.structure[0];
        assert_eq!(child_tags(list), vec!["li", "li"]);
        assert_eq!(child_tags(&list.children[0].children[0]), vec!["li", "li"]);
    }

    #[test]
    fn test_inline_svg_title_is_not_page_title() {
        let html = "<head><title>Real Title</title></head>\
            <body><p>Body text long enough</p><svg><title>Close icon</title></svg></body>";
        let snapshot = capture_html("https://example.com", html).unwrap();

        assert_eq!(snapshot.title, "Real Title");
        assert!(!snapshot.full_text.contains("Close icon"));
    }

    #[test]
    fn test_only_first_document_title_counts() {
        let html = "<head><title>First</title><title>Second</title></head><body><p>x</p></body>";
        let snapshot = capture_html("https://example.com", html).unwrap();
        assert_eq!(snapshot.title, "First");
    }

    #[test]
    fn test_fragment_without_body() {
        let snapshot = capture_html("https://example.com", "<p>one</p><p>two</p>").unwrap();

        assert_eq!(snapshot.structure.len(), 2);
        assert_eq!(snapshot.full_text, "one two");
        assert!(snapshot.title.is_empty());
    }

    #[test]
    fn test_deep_nesting_does_not_recurse() {
        let depth = 2_000;
        let html = format!("{}deep{}", "<div>".repeat(depth), "</div>".repeat(depth));
        let snapshot = capture_html("https://example.com", &html).unwrap();

        assert_eq!(snapshot.full_text, "deep");
        assert_eq!(snapshot.node_count(), depth);
    }
}
