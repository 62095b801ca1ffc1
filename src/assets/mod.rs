//! Asset vocabulary and extraction
//!
//! This module defines the asset reference type shared by the extractor,
//! fetcher, and rewriter, plus the pure extraction passes over HTML and CSS.

mod extractor;
mod types;

pub use extractor::{extract_css_assets, extract_html_assets, extract_page_links};
pub use types::{AssetRef, AssetType};

use crate::url::is_internal_host;
use url::Url;

/// Computes the snapshot-relative path where an asset is materialized
///
/// Same-domain assets mirror their source path under `assets/`; third-party
/// assets live under `assets/external/{host}/`. The rewriter emits exactly
/// these paths, so rewritten references resolve inside the snapshot tree.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use wayback_archiver::assets::snapshot_relative_path;
///
/// let internal = Url::parse("http://example.com/img/logo.gif").unwrap();
/// assert_eq!(snapshot_relative_path(&internal, "example.com"), "assets/img/logo.gif");
///
/// let external = Url::parse("https://cdn.y.com/s.css").unwrap();
/// assert_eq!(snapshot_relative_path(&external, "example.com"), "assets/external/cdn.y.com/s.css");
/// ```
pub fn snapshot_relative_path(original: &Url, domain: &str) -> String {
    let host = original
        .host_str()
        .map(|h| h.to_lowercase())
        .unwrap_or_default();

    let mut path = original.path().trim_start_matches('/').to_string();
    if path.is_empty() {
        path = "index".to_string();
    }

    if is_internal_host(&host, domain) {
        format!("assets/{}", path)
    } else {
        format!("assets/external/{}/{}", host, path)
    }
}
