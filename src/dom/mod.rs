//! DOM snapshot model and capture
//!
//! - `types`: `DomNode` / `PageSnapshot` tree model
//! - `capture`: HTML to snapshot via lol_html
//! - `source`: where markup comes from (memory, disk, HTTP)
//! - `validation`: snapshot acceptance rules

mod capture;
mod source;
mod types;
mod validation;

pub use capture::{capture_html, capture_html_at};
pub use source::{capture, FilePage, HttpPage, PageSource, RawPage, StaticPage};
pub use types::*;
pub use validation::{validate_page_data, MIN_TEXT_LENGTH};
