//! URL handling module
//!
//! This module provides snapshot-domain derivation, archive URL construction,
//! and normalization of references found inside archived documents.

mod archive;
mod domain;
mod normalize;

// Re-export main functions
pub use archive::{capture_url, raw_capture_url};
pub use domain::{derive_domain, is_internal_host};
pub use normalize::{resolve_reference, strip_archive_prefix};
