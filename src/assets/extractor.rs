//! Asset and link extraction
//!
//! Pure functions over document text: no I/O, no ordering guarantee beyond
//! "emit as found, deduplicate by absolute URL".

use crate::assets::types::{AssetRef, AssetType};
use crate::url::{is_internal_host, resolve_reference};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// `@import url(...)` and `@import "..."` forms
static CSS_IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)@import\s+(?:url\(\s*)?["']?([^"'()\s;]+)"#).expect("valid regex")
});

/// Any `url(...)` occurrence
static CSS_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)url\(\s*["']?([^"')]+?)["']?\s*\)"#).expect("valid regex"));

/// Accumulates references, deduplicating by absolute URL
struct RefCollector<'a> {
    base: &'a Url,
    domain: &'a str,
    source: String,
    seen: HashSet<String>,
    refs: Vec<AssetRef>,
}

impl<'a> RefCollector<'a> {
    fn new(base: &'a Url, domain: &'a str) -> Self {
        Self {
            base,
            domain,
            source: base.to_string(),
            seen: HashSet::new(),
            refs: Vec::new(),
        }
    }

    /// Resolves and records one raw reference; `kind` of None means
    /// classify by extension.
    fn push(&mut self, raw: &str, kind: Option<AssetType>) {
        let Some(url) = resolve_reference(self.base, raw) else {
            return;
        };
        if !self.seen.insert(url.to_string()) {
            return;
        }

        let kind = kind.unwrap_or_else(|| AssetType::classify(&url));
        let host = url.host_str().map(|h| h.to_lowercase()).unwrap_or_default();
        self.refs.push(AssetRef {
            is_external: !is_internal_host(&host, self.domain),
            url,
            kind,
            source: self.source.clone(),
        });
    }

    fn finish(self) -> Vec<AssetRef> {
        self.refs
    }
}

/// Extracts asset references from an HTML document
///
/// Scans stylesheet links, scripts, images (including the first `srcset`
/// entry), `<source>` elements (the parent tag drives the type), video and
/// audio sources, legacy `background` attributes, inline `style` attributes,
/// and `<style>` blocks.
///
/// # Arguments
///
/// * `html` - The raw document text
/// * `base` - The absolute document URL for resolving relative references
/// * `domain` - The snapshot domain, for the internal/external flag
pub fn extract_html_assets(html: &str, base: &Url, domain: &str) -> Vec<AssetRef> {
    let document = Html::parse_document(html);
    let mut out = RefCollector::new(base, domain);

    if let Ok(selector) = Selector::parse("link[href]") {
        for element in document.select(&selector) {
            if !rel_contains(&element, "stylesheet") {
                continue;
            }
            if let Some(href) = element.value().attr("href") {
                out.push(href, Some(AssetType::Css));
            }
        }
    }

    if let Ok(selector) = Selector::parse("script[src]") {
        for element in document.select(&selector) {
            if let Some(src) = element.value().attr("src") {
                out.push(src, Some(AssetType::Js));
            }
        }
    }

    if let Ok(selector) = Selector::parse("img") {
        for element in document.select(&selector) {
            if let Some(src) = element.value().attr("src") {
                out.push(src, Some(AssetType::Image));
            }
            if let Some(first) = element.value().attr("srcset").and_then(first_srcset_entry) {
                out.push(first, Some(AssetType::Image));
            }
        }
    }

    if let Ok(selector) = Selector::parse("source") {
        for element in document.select(&selector) {
            let kind = match parent_tag_name(&element).as_deref() {
                Some("video") => AssetType::Video,
                Some("audio") => AssetType::Audio,
                _ => AssetType::Image,
            };
            if let Some(src) = element.value().attr("src") {
                out.push(src, Some(kind));
            }
            if let Some(first) = element.value().attr("srcset").and_then(first_srcset_entry) {
                out.push(first, Some(kind));
            }
        }
    }

    if let Ok(selector) = Selector::parse("video[src]") {
        for element in document.select(&selector) {
            if let Some(src) = element.value().attr("src") {
                out.push(src, Some(AssetType::Video));
            }
        }
    }

    if let Ok(selector) = Selector::parse("audio[src]") {
        for element in document.select(&selector) {
            if let Some(src) = element.value().attr("src") {
                out.push(src, Some(AssetType::Audio));
            }
        }
    }

    // Legacy backgrounds: <body background=...>, <td background=...>
    if let Ok(selector) = Selector::parse("[background]") {
        for element in document.select(&selector) {
            if let Some(background) = element.value().attr("background") {
                out.push(background, Some(AssetType::Image));
            }
        }
    }

    // Inline style attributes with url(...) references
    if let Ok(selector) = Selector::parse("[style]") {
        for element in document.select(&selector) {
            if let Some(style) = element.value().attr("style") {
                for capture in CSS_URL_RE.captures_iter(style) {
                    out.push(capture[1].trim(), Some(AssetType::Image));
                }
            }
        }
    }

    // <style> blocks are scanned like stylesheets
    if let Ok(selector) = Selector::parse("style") {
        for element in document.select(&selector) {
            let css: String = element.text().collect();
            push_css_refs(&css, &mut out);
        }
    }

    out.finish()
}

/// Extracts asset references from a stylesheet
///
/// `@import` targets are reported as CSS; remaining `url(...)` occurrences
/// are classified by extension.
///
/// # Arguments
///
/// * `css` - The stylesheet text
/// * `base` - The absolute stylesheet URL
/// * `domain` - The snapshot domain
pub fn extract_css_assets(css: &str, base: &Url, domain: &str) -> Vec<AssetRef> {
    let mut out = RefCollector::new(base, domain);
    push_css_refs(css, &mut out);
    out.finish()
}

fn push_css_refs(css: &str, out: &mut RefCollector<'_>) {
    for capture in CSS_IMPORT_RE.captures_iter(css) {
        out.push(capture[1].trim(), Some(AssetType::Css));
    }
    for capture in CSS_URL_RE.captures_iter(css) {
        out.push(capture[1].trim(), None);
    }
}

/// Extracts same-domain page links for queue discovery
///
/// Scans `<a>`, `<link>`, `<img>` and `<script>` references, resolves them
/// against the page URL, strips embedded archive prefixes, and keeps only
/// URLs on the snapshot's own domain. Discovery expands one selection into
/// the full same-timestamp site.
pub fn extract_page_links(html: &str, base: &Url, domain: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    if let Ok(selector) = Selector::parse("a[href], link[href], img[src], script[src]") {
        for element in document.select(&selector) {
            let raw = element
                .value()
                .attr("href")
                .or_else(|| element.value().attr("src"));
            let Some(raw) = raw else { continue };

            let Some(url) = resolve_reference(base, raw) else {
                continue;
            };

            let host = url.host_str().map(|h| h.to_lowercase()).unwrap_or_default();
            if !is_internal_host(&host, domain) {
                continue;
            }

            if seen.insert(url.to_string()) {
                links.push(url.to_string());
            }
        }
    }

    links
}

/// First URL of a `srcset` attribute, if any
fn first_srcset_entry(srcset: &str) -> Option<&str> {
    srcset
        .split(',')
        .next()?
        .split_whitespace()
        .next()
        .filter(|s| !s.is_empty())
}

/// Lowercase tag name of the element's parent, if it is an element
fn parent_tag_name(element: &ElementRef<'_>) -> Option<String> {
    element
        .parent()
        .and_then(ElementRef::wrap)
        .map(|parent| parent.value().name().to_lowercase())
}

/// Whether the element's `rel` attribute contains the given token
fn rel_contains(element: &ElementRef<'_>, token: &str) -> bool {
    element
        .value()
        .attr("rel")
        .map(|rel| {
            rel.split_whitespace()
                .any(|part| part.eq_ignore_ascii_case(token))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://example.com/index.html").unwrap()
    }

    fn urls(refs: &[AssetRef]) -> Vec<String> {
        refs.iter().map(|r| r.url.to_string()).collect()
    }

    #[test]
    fn test_extract_stylesheet_link() {
        let html = r#"<link rel="stylesheet" href="/css/site.css">"#;
        let refs = extract_html_assets(html, &base(), "example.com");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, AssetType::Css);
        assert_eq!(refs[0].url.as_str(), "http://example.com/css/site.css");
        assert!(!refs[0].is_external);
    }

    #[test]
    fn test_non_stylesheet_link_ignored() {
        let html = r#"<link rel="canonical" href="http://example.com/canonical">"#;
        let refs = extract_html_assets(html, &base(), "example.com");
        assert!(refs.is_empty());
    }

    #[test]
    fn test_extract_script_and_img() {
        let html = r#"<script src="app.js"></script><img src="img/logo.gif">"#;
        let refs = extract_html_assets(html, &base(), "example.com");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].kind, AssetType::Js);
        assert_eq!(refs[1].kind, AssetType::Image);
    }

    #[test]
    fn test_extract_first_srcset_entry() {
        let html = r#"<img srcset="small.png 1x, large.png 2x">"#;
        let refs = extract_html_assets(html, &base(), "example.com");
        assert_eq!(urls(&refs), vec!["http://example.com/small.png"]);
    }

    #[test]
    fn test_source_type_follows_parent() {
        let html = r#"
            <video><source src="clip.mp4"></video>
            <audio><source src="track.mp3"></audio>
            <picture><source srcset="photo.webp"></picture>
        "#;
        let refs = extract_html_assets(html, &base(), "example.com");
        let kinds: Vec<_> = refs.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![AssetType::Video, AssetType::Audio, AssetType::Image]
        );
    }

    #[test]
    fn test_extract_background_attribute() {
        let html = r#"<body background="bg/tile.jpg"></body>"#;
        let refs = extract_html_assets(html, &base(), "example.com");
        assert_eq!(urls(&refs), vec!["http://example.com/bg/tile.jpg"]);
        assert_eq!(refs[0].kind, AssetType::Image);
    }

    #[test]
    fn test_extract_inline_style_url() {
        let html = r#"<div style="background-image: url('textures/stone.png')"></div>"#;
        let refs = extract_html_assets(html, &base(), "example.com");
        assert_eq!(urls(&refs), vec!["http://example.com/textures/stone.png"]);
    }

    #[test]
    fn test_extract_style_block() {
        let html = r#"<style>h1 { background: url(head.gif); }</style>"#;
        let refs = extract_html_assets(html, &base(), "example.com");
        assert_eq!(urls(&refs), vec!["http://example.com/head.gif"]);
    }

    #[test]
    fn test_dedup_by_absolute_url() {
        let html = r#"
            <img src="logo.gif">
            <img src="/logo.gif">
            <img src="http://example.com/logo.gif">
        "#;
        let refs = extract_html_assets(html, &base(), "example.com");
        // "logo.gif" resolves to /logo.gif against /index.html
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn test_skips_data_uri_and_fragment() {
        let html = r##"
            <img src="data:image/gif;base64,AAAA">
            <a href="#top">top</a>
            <img src="">
        "##;
        let refs = extract_html_assets(html, &base(), "example.com");
        assert!(refs.is_empty());
    }

    #[test]
    fn test_external_flag() {
        let html = r#"
            <img src="http://example.com/a.png">
            <img src="http://www.example.com/b.png">
            <img src="http://cdn.example.com/c.png">
            <img src="https://other.com/d.png">
        "#;
        let refs = extract_html_assets(html, &base(), "example.com");
        let flags: Vec<_> = refs.iter().map(|r| r.is_external).collect();
        assert_eq!(flags, vec![false, false, true, true]);
    }

    #[test]
    fn test_extract_css_imports_and_urls() {
        let css = r#"
            @import url("base.css");
            @import "fonts.css";
            body { background: url(img/bg.png); }
            @font-face { src: url('face.woff2'); }
        "#;
        let refs = extract_css_assets(css, &Url::parse("http://example.com/css/site.css").unwrap(), "example.com");
        let got: Vec<_> = refs.iter().map(|r| (r.url.to_string(), r.kind)).collect();
        assert_eq!(
            got,
            vec![
                ("http://example.com/css/base.css".to_string(), AssetType::Css),
                ("http://example.com/css/fonts.css".to_string(), AssetType::Css),
                ("http://example.com/css/img/bg.png".to_string(), AssetType::Image),
                ("http://example.com/css/face.woff2".to_string(), AssetType::Font),
            ]
        );
    }

    #[test]
    fn test_css_import_not_double_counted() {
        let css = r#"@import url("base.css");"#;
        let refs = extract_css_assets(css, &Url::parse("http://example.com/s.css").unwrap(), "example.com");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, AssetType::Css);
    }

    #[test]
    fn test_extract_page_links_same_domain_only() {
        let html = r#"
            <a href="/about.html">about</a>
            <a href="http://www.example.com/contact.html">contact</a>
            <a href="http://other.com/away.html">away</a>
            <img src="/logo.gif">
        "#;
        let links = extract_page_links(html, &base(), "example.com");
        assert_eq!(
            links,
            vec![
                "http://example.com/about.html",
                "http://www.example.com/contact.html",
                "http://example.com/logo.gif",
            ]
        );
    }

    #[test]
    fn test_extract_page_links_strips_archive_prefix() {
        let html = r#"<a href="https://web.archive.org/web/19991005123456/http://example.com/old.html">old</a>"#;
        let links = extract_page_links(html, &base(), "example.com");
        assert_eq!(links, vec!["http://example.com/old.html"]);
    }

    #[test]
    fn test_non_html_input_yields_nothing() {
        let refs = extract_html_assets("%PDF-1.4 not html at all", &base(), "example.com");
        assert!(refs.is_empty());
    }
}
