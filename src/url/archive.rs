use super::normalize::strip_archive_prefix;

/// Builds the archive capture URL for a page
///
/// The capture URL has the form `https://{host}/web/{ts}/{original}`. The
/// host may also be given as a full base URL with an explicit scheme. If
/// the given URL already points into the archive it is not wrapped a
/// second time; the embedded original URL is recovered first.
///
/// # Arguments
///
/// * `host` - The archive host (e.g. `web.archive.org`), or a base URL
/// * `timestamp` - The 14-digit capture timestamp
/// * `original` - The originally archived URL
///
/// # Examples
///
/// ```
/// use wayback_archiver::url::capture_url;
///
/// assert_eq!(
///     capture_url("web.archive.org", "20030115000000", "http://example.com/a.gif"),
///     "https://web.archive.org/web/20030115000000/http://example.com/a.gif"
/// );
/// ```
pub fn capture_url(host: &str, timestamp: &str, original: &str) -> String {
    let original = strip_archive_prefix(original);
    format!("{}/web/{}/{}", archive_base(host), timestamp, original)
}

/// Builds the raw capture URL for an asset
///
/// The `id_` modifier asks the archive for the original bytes without the
/// injected replay chrome.
pub fn raw_capture_url(host: &str, timestamp: &str, original: &str) -> String {
    let original = strip_archive_prefix(original);
    format!("{}/web/{}id_/{}", archive_base(host), timestamp, original)
}

/// Normalizes a configured host into a scheme-qualified base
fn archive_base(host: &str) -> String {
    if host.contains("://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", host)
    }
}
