use url::Url;

/// Strips an embedded archive replay prefix from a URL
///
/// Links and asset references found inside archived documents frequently
/// point back into the archive itself
/// (`https://web.archive.org/web/{ts}{modifier}/http://original/...`).
/// This recovers the originally archived URL; URLs without a replay prefix
/// are returned unchanged.
///
/// # Examples
///
/// ```
/// use wayback_archiver::url::strip_archive_prefix;
///
/// let wrapped = "https://web.archive.org/web/20030115000000/http://example.com/a.gif";
/// assert_eq!(strip_archive_prefix(wrapped), "http://example.com/a.gif");
///
/// assert_eq!(strip_archive_prefix("http://example.com/"), "http://example.com/");
/// ```
pub fn strip_archive_prefix(url: &str) -> String {
    // A replay prefix looks like `/web/{digits}{modifier}/http...`; requiring
    // the timestamp digits avoids mangling ordinary URLs with `/web/` paths.
    if let Some(web_idx) = url.find("/web/") {
        let after = &url[web_idx + 5..];
        let digits = after.bytes().take_while(|b| b.is_ascii_digit()).count();
        if digits >= 4 {
            if let Some(idx) = after.find("/http") {
                return after[idx + 1..].to_string();
            }
        }
    }
    url.to_string()
}

/// Resolves a raw reference against its document URL
///
/// Returns `None` for references the crawler never follows: empty strings,
/// fragment-only anchors, `data:` URIs, `javascript:`/`mailto:`/`tel:`
/// pseudo-links, unparseable references, and anything that does not resolve
/// to an HTTP(S) URL. Embedded archive prefixes are stripped from the
/// resolved result.
///
/// # Arguments
///
/// * `base` - The absolute document URL
/// * `reference` - The raw attribute value
pub fn resolve_reference(base: &Url, reference: &str) -> Option<Url> {
    let reference = reference.trim();

    if reference.is_empty() || reference.starts_with('#') {
        return None;
    }

    if reference.starts_with("data:")
        || reference.starts_with("javascript:")
        || reference.starts_with("mailto:")
        || reference.starts_with("tel:")
    {
        return None;
    }

    let resolved = base.join(reference).ok()?;
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }

    let unwrapped = strip_archive_prefix(resolved.as_str());
    let mut url = Url::parse(&unwrapped).ok()?;
    url.host_str()?;
    url.set_fragment(None);
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://example.com/dir/page.html").unwrap()
    }

    #[test]
    fn test_strip_prefix_with_modifier() {
        let wrapped = "https://web.archive.org/web/20030115000000im_/http://example.com/a.gif";
        assert_eq!(strip_archive_prefix(wrapped), "http://example.com/a.gif");
    }

    #[test]
    fn test_strip_prefix_https_original() {
        let wrapped = "https://web.archive.org/web/20030115000000/https://example.com/x";
        assert_eq!(strip_archive_prefix(wrapped), "https://example.com/x");
    }

    #[test]
    fn test_strip_prefix_plain_url_unchanged() {
        assert_eq!(
            strip_archive_prefix("http://example.com/web-design/"),
            "http://example.com/web-design/"
        );
    }

    #[test]
    fn test_strip_prefix_requires_timestamp_digits() {
        assert_eq!(
            strip_archive_prefix("http://example.com/web/pages/https-guide"),
            "http://example.com/web/pages/https-guide"
        );
    }

    #[test]
    fn test_resolve_relative() {
        let url = resolve_reference(&base(), "img/logo.gif").unwrap();
        assert_eq!(url.as_str(), "http://example.com/dir/img/logo.gif");
    }

    #[test]
    fn test_resolve_root_relative() {
        let url = resolve_reference(&base(), "/css/site.css").unwrap();
        assert_eq!(url.as_str(), "http://example.com/css/site.css");
    }

    #[test]
    fn test_resolve_absolute() {
        let url = resolve_reference(&base(), "https://cdn.other.com/s.js").unwrap();
        assert_eq!(url.as_str(), "https://cdn.other.com/s.js");
    }

    #[test]
    fn test_resolve_skips_empty_and_fragment() {
        assert!(resolve_reference(&base(), "").is_none());
        assert!(resolve_reference(&base(), "   ").is_none());
        assert!(resolve_reference(&base(), "#top").is_none());
    }

    #[test]
    fn test_resolve_skips_pseudo_schemes() {
        assert!(resolve_reference(&base(), "data:image/gif;base64,AAAA").is_none());
        assert!(resolve_reference(&base(), "javascript:void(0)").is_none());
        assert!(resolve_reference(&base(), "mailto:a@example.com").is_none());
        assert!(resolve_reference(&base(), "tel:+15551234").is_none());
    }

    #[test]
    fn test_resolve_unwraps_archive_prefix() {
        let wrapped = "https://web.archive.org/web/20030115000000/http://example.com/a.gif";
        let url = resolve_reference(&base(), wrapped).unwrap();
        assert_eq!(url.as_str(), "http://example.com/a.gif");
    }
}
