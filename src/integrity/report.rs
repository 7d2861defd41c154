//! Integrity comparison between a local document and its stored copy

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dom::{DomNode, PageMeta, PageSnapshot};

/// Largest tolerated difference in serialized size, in bytes
pub const SIZE_TOLERANCE_BYTES: usize = 100;

/// Fields that must match exactly between original and stored copy
pub const ESSENTIAL_FIELDS: [&str; 3] = ["url", "title", "timestamp"];

/// The JSON document written to the object store
///
/// Everything is optional or defaulted on the way in, so a stored copy that
/// lost fields still parses and the loss shows up as integrity issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Full page text
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub structure: Vec<DomNode>,
    #[serde(default)]
    pub all_classes: Vec<String>,
    #[serde(default, skip_serializing_if = "PageMeta::is_empty")]
    pub meta: PageMeta,
    /// Newline-joined text of the cleaned tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_text: Option<String>,
}

impl From<&PageSnapshot> for StoredDocument {
    fn from(snapshot: &PageSnapshot) -> Self {
        Self {
            url: Some(snapshot.url.clone()),
            title: Some(snapshot.title.clone()),
            timestamp: Some(snapshot.timestamp),
            content: snapshot.full_text.clone(),
            structure: snapshot.structure.clone(),
            all_classes: snapshot.all_classes.clone(),
            meta: snapshot.meta.clone(),
            clean_text: None,
        }
    }
}

impl StoredDocument {
    pub fn with_clean_text(mut self, clean_text: impl Into<String>) -> Self {
        self.clean_text = Some(clean_text.into());
        self
    }

    /// Length of the compact JSON encoding
    pub fn serialized_len(&self) -> usize {
        serde_json::to_vec(self).map(|bytes| bytes.len()).unwrap_or(0)
    }

    fn essential_field(&self, name: &str) -> Option<String> {
        match name {
            "url" => self.url.clone(),
            "title" => self.title.clone(),
            "timestamp" => self.timestamp.map(|t| t.to_rfc3339()),
            _ => None,
        }
    }
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeComparison {
    pub original_bytes: usize,
    pub uploaded_bytes: usize,
    pub difference: usize,
    pub matches: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextComparison {
    pub original_length: usize,
    pub uploaded_length: usize,
    pub matches: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureComparison {
    pub original_nodes: usize,
    pub uploaded_nodes: usize,
    pub matches: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassComparison {
    pub original_count: usize,
    pub uploaded_count: usize,
    pub missing: Vec<String>,
    pub unexpected: Vec<String>,
    pub matches: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldComparison {
    pub checked: Vec<String>,
    pub mismatched: Vec<String>,
    pub matches: bool,
}

/// Per-check comparison figures
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonStats {
    pub size: SizeComparison,
    pub text: TextComparison,
    pub structure: StructureComparison,
    pub classes: ClassComparison,
    pub fields: FieldComparison,
}

/// Audit result of one upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// True exactly when `issues` is empty
    pub valid: bool,
    pub issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ComparisonStats>,
}

impl IntegrityReport {
    /// Report for a stored copy that could not be read back
    pub fn unverified(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            issues: vec![reason.into()],
            stats: None,
        }
    }

    pub fn record_issue(&mut self, issue: impl Into<String>) {
        self.issues.push(issue.into());
        self.valid = false;
    }
}

/// Compare a document with its stored copy
///
/// Every check runs independently and contributes its own issue, so one
/// report lists all differences at once. Neither input is modified.
pub fn compare(original: &StoredDocument, uploaded: &StoredDocument) -> IntegrityReport {
    let mut issues = Vec::new();

    let size = compare_size(original, uploaded);
    if !size.matches {
        issues.push(format!(
            "Size mismatch: original {} bytes, uploaded {} bytes (difference {} bytes)",
            size.original_bytes, size.uploaded_bytes, size.difference
        ));
    }

    let text = TextComparison {
        original_length: original.content.chars().count(),
        uploaded_length: uploaded.content.chars().count(),
        matches: original.content == uploaded.content,
    };
    if !text.matches {
        issues.push(format!(
            "Text content differs: original {} characters, uploaded {} characters",
            text.original_length, text.uploaded_length
        ));
    }

    let structure = StructureComparison {
        original_nodes: original.structure.iter().map(DomNode::subtree_size).sum(),
        uploaded_nodes: uploaded.structure.iter().map(DomNode::subtree_size).sum(),
        matches: original.structure == uploaded.structure,
    };
    if !structure.matches {
        issues.push(format!(
            "Page structure differs: original {} nodes, uploaded {} nodes",
            structure.original_nodes, structure.uploaded_nodes
        ));
    }

    let classes = compare_classes(&original.all_classes, &uploaded.all_classes);
    if !classes.matches {
        issues.push(format!(
            "Class names differ: {} missing, {} unexpected",
            classes.missing.len(),
            classes.unexpected.len()
        ));
    }

    let fields = compare_fields(original, uploaded, &mut issues);

    IntegrityReport {
        valid: issues.is_empty(),
        issues,
        stats: Some(ComparisonStats {
            size,
            text,
            structure,
            classes,
            fields,
        }),
    }
}

/// Compare a snapshot with the stored copy of its document
pub fn compare_snapshot(original: &PageSnapshot, uploaded: &StoredDocument) -> IntegrityReport {
    compare(&StoredDocument::from(original), uploaded)
}

fn compare_size(original: &StoredDocument, uploaded: &StoredDocument) -> SizeComparison {
    let original_bytes = original.serialized_len();
    let uploaded_bytes = uploaded.serialized_len();
    let difference = original_bytes.abs_diff(uploaded_bytes);

    SizeComparison {
        original_bytes,
        uploaded_bytes,
        difference,
        matches: difference <= SIZE_TOLERANCE_BYTES,
    }
}

fn compare_classes(original: &[String], uploaded: &[String]) -> ClassComparison {
    let left: BTreeSet<&String> = original.iter().collect();
    let right: BTreeSet<&String> = uploaded.iter().collect();

    let missing: Vec<String> = left.difference(&right).map(|c| c.to_string()).collect();
    let unexpected: Vec<String> = right.difference(&left).map(|c| c.to_string()).collect();

    ClassComparison {
        original_count: left.len(),
        uploaded_count: right.len(),
        matches: missing.is_empty() && unexpected.is_empty(),
        missing,
        unexpected,
    }
}

fn compare_fields(
    original: &StoredDocument,
    uploaded: &StoredDocument,
    issues: &mut Vec<String>,
) -> FieldComparison {
    let mut mismatched = Vec::new();

    for field in ESSENTIAL_FIELDS {
        match (original.essential_field(field), uploaded.essential_field(field)) {
            (_, None) => {
                issues.push(format!("Field '{}' is missing from uploaded data", field));
                mismatched.push(field.to_string());
            }
            (expected, Some(actual)) if expected.as_deref() != Some(actual.as_str()) => {
                issues.push(format!("Field '{}' differs from original", field));
                mismatched.push(field.to_string());
            }
            _ => {}
        }
    }

    FieldComparison {
        checked: ESSENTIAL_FIELDS.iter().map(|f| f.to_string()).collect(),
        matches: mismatched.is_empty(),
        mismatched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn document() -> StoredDocument {
        StoredDocument {
            url: Some("https://example.com/article".into()),
            title: Some("Article".into()),
            timestamp: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
            content: "Some article text long enough".into(),
            structure: vec![DomNode::new("main")
                .with_classes(["main-content"])
                .with_child(DomNode::new("p").with_text("Some article text long enough"))],
            all_classes: vec!["main-content".into(), "post-title".into()],
            meta: PageMeta::default(),
            clean_text: None,
        }
    }

    #[test]
    fn test_identical_documents_are_valid() {
        let doc = document();
        let report = compare(&doc, &doc);

        assert!(report.valid);
        assert!(report.issues.is_empty());
        let stats = report.stats.unwrap();
        assert_eq!(stats.size.difference, 0);
        assert_eq!(stats.structure.original_nodes, 2);
    }

    #[test]
    fn test_snapshot_against_its_own_document() {
        let snapshot = PageSnapshot {
            url: "https://example.com".into(),
            title: "Example".into(),
            timestamp: Utc::now(),
            full_text: "Body text here".into(),
            structure: vec![DomNode::new("p").with_text("Body text here")],
            all_classes: vec![],
            meta: PageMeta::default(),
        };
        let stored = StoredDocument::from(&snapshot);

        assert!(compare_snapshot(&snapshot, &stored).valid);
    }

    #[test]
    fn test_text_mismatch_is_reported() {
        let original = StoredDocument {
            content: "x".repeat(50),
            ..document()
        };
        let uploaded = StoredDocument {
            content: "y".repeat(50),
            ..document()
        };

        let report = compare(&original, &uploaded);
        assert!(!report.valid);
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].starts_with("Text content differs"));
    }

    #[test]
    fn test_class_order_does_not_matter() {
        let original = document();
        let mut uploaded = document();
        uploaded.all_classes.reverse();

        let report = compare(&original, &uploaded);
        assert!(report.valid);
        assert!(report.stats.unwrap().classes.matches);
    }

    #[test]
    fn test_class_difference_lists_both_sides() {
        let original = document();
        let mut uploaded = document();
        uploaded.all_classes = vec!["main-content".into(), "sidebar".into()];

        let report = compare(&original, &uploaded);
        let classes = report.stats.unwrap().classes;
        assert_eq!(classes.missing, vec!["post-title".to_string()]);
        assert_eq!(classes.unexpected, vec!["sidebar".to_string()]);
    }

    #[test]
    fn test_size_tolerance() {
        let original = document();
        let mut uploaded = document();
        uploaded.clean_text = Some("a".repeat(40));

        let report = compare(&original, &uploaded);
        assert!(report.stats.as_ref().unwrap().size.matches);
        assert!(report.valid);

        uploaded.clean_text = Some("a".repeat(200));
        let report = compare(&original, &uploaded);
        assert!(!report.valid);
        assert!(report.issues[0].starts_with("Size mismatch"));
    }

    #[test]
    fn test_structure_mismatch() {
        let original = document();
        let mut uploaded = document();
        uploaded.structure[0].children.clear();

        let report = compare(&original, &uploaded);
        assert!(report
            .issues
            .iter()
            .any(|i| i.starts_with("Page structure differs")));
    }

    #[test]
    fn test_missing_and_changed_fields() {
        let original = document();
        let mut uploaded = document();
        uploaded.url = None;
        uploaded.title = Some("Other".into());

        let report = compare(&original, &uploaded);
        assert!(!report.valid);
        assert!(report
            .issues
            .contains(&"Field 'url' is missing from uploaded data".to_string()));
        assert!(report
            .issues
            .contains(&"Field 'title' differs from original".to_string()));
        assert_eq!(
            report.stats.unwrap().fields.mismatched,
            vec!["url".to_string(), "title".to_string()]
        );
    }

    #[test]
    fn test_partial_document_parses() {
        let uploaded: StoredDocument = serde_json::from_str(r#"{"content": "only text"}"#).unwrap();
        let report = compare(&document(), &uploaded);

        assert!(!report.valid);
        assert!(report.issues.len() >= 4);
    }

    #[test]
    fn test_compare_does_not_mutate() {
        let original = document();
        let uploaded = StoredDocument {
            content: "changed".into(),
            ..document()
        };
        let (before_a, before_b) = (original.clone(), uploaded.clone());
        let _ = compare(&original, &uploaded);

        assert_eq!(original, before_a);
        assert_eq!(uploaded, before_b);
    }

    #[test]
    fn test_unverified_and_record_issue() {
        let report = IntegrityReport::unverified("Stored object could not be read back");
        assert!(!report.valid);
        assert_eq!(report.issues.len(), 1);

        let mut report = compare(&document(), &document());
        assert!(report.valid);
        report.record_issue("Checksum mismatch");
        assert!(!report.valid);
        assert_eq!(report.issues, vec!["Checksum mismatch".to_string()]);
    }

    #[test]
    fn test_stored_document_json_shape() {
        let json = serde_json::to_value(document().with_clean_text("Some")).unwrap();

        assert!(json.get("allClasses").is_some());
        assert_eq!(json["cleanText"], "Some");
        assert!(json.get("meta").is_none());
    }
}
