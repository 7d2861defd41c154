//! Structural cleaning
//!
//! Prunes boilerplate elements (scripts, loaders, accessibility helpers,
//! print-only blocks), bounds depth, reduces classes to content signals and
//! drops subtrees without text.

mod policy;
mod structural;

pub use policy::{
    is_content_class, CleanPolicy, A11Y_CLASS_MARKERS, CONTENT_CLASS_MARKERS, DEFAULT_MAX_DEPTH,
    PRINT_CLASS_MARKERS, PROGRESS_CLASS_MARKERS, REMOVED_TAGS,
};
pub use structural::{
    clean_texts, extract_clean_text, has_text_content, CleanStats, CleanTextIter, CleanedNode,
    Cleaner, TextTree,
};
