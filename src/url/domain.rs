use url::Url;

/// Derives the snapshot domain from a URL
///
/// The domain is the lowercase host with a leading `www.` stripped. This is
/// the key under which snapshot trees are grouped on disk.
///
/// # Arguments
///
/// * `url` - The URL to derive the domain from
///
/// # Returns
///
/// * `Some(String)` - The derived domain
/// * `None` - If the URL has no host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use wayback_archiver::url::derive_domain;
///
/// let url = Url::parse("https://www.example.com/path").unwrap();
/// assert_eq!(derive_domain(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(derive_domain(&url), Some("example.com".to_string()));
/// ```
pub fn derive_domain(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// Tests whether a host belongs to the snapshot's domain
///
/// Only exact equality against `domain` or `www.{domain}` counts as
/// internal; subdomains are external.
///
/// # Examples
///
/// ```
/// use wayback_archiver::url::is_internal_host;
///
/// assert!(is_internal_host("example.com", "example.com"));
/// assert!(is_internal_host("www.example.com", "example.com"));
/// assert!(!is_internal_host("cdn.example.com", "example.com"));
/// ```
pub fn is_internal_host(host: &str, domain: &str) -> bool {
    host == domain || host.strip_prefix("www.") == Some(domain)
}
