//! Checksums and post-upload integrity comparison

mod checksum;
mod report;

pub use checksum::{sha256_hex, verify_sha256, EMPTY_SHA256};
pub use report::{
    compare, compare_snapshot, ClassComparison, ComparisonStats, FieldComparison,
    IntegrityReport, SizeComparison, StoredDocument, StructureComparison, TextComparison,
    ESSENTIAL_FIELDS, SIZE_TOLERANCE_BYTES,
};
