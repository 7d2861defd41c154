//! Snapshot validation

use crate::error::CaptureError;

use super::types::PageSnapshot;

/// Minimum number of characters of page text for a usable snapshot
pub const MIN_TEXT_LENGTH: usize = 10;

/// Validate a captured snapshot
///
/// Every violation is collected so the caller sees all of them at once.
pub fn validate_page_data(snapshot: &PageSnapshot) -> Result<(), CaptureError> {
    let mut issues = Vec::new();

    if snapshot.url.trim().is_empty() {
        issues.push("URL is missing".to_string());
    }

    if snapshot.title.trim().is_empty() {
        issues.push("Title is missing".to_string());
    }

    let text_length = snapshot.full_text.chars().count();
    if text_length < MIN_TEXT_LENGTH {
        issues.push(format!(
            "Page text is too short ({} characters, minimum {})",
            text_length, MIN_TEXT_LENGTH
        ));
    }

    if snapshot.structure.is_empty() {
        issues.push("DOM structure is missing".to_string());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(CaptureError::Invalid(issues))
    }
}
