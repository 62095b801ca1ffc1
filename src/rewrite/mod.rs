//! Reference rewriting for local browsing
//!
//! Transforms asset references in archived documents into relative paths
//! that mirror the on-disk snapshot layout, so a snapshot tree browses
//! offline. HTML passes through a streaming rewriter that leaves every
//! non-matched byte untouched; stylesheets are rewritten textually.
//!
//! Mapping, relative to the snapshot root:
//! - same-domain asset at `/p` → `assets/p`
//! - external asset at host `H`, path `p` → `assets/external/H/p`
//!
//! Stylesheets live inside `assets/`, so their rewritten references carry a
//! single `../` prefix. `data:` URIs, fragment-only anchors, and
//! unparseable references pass through verbatim.

use crate::assets::snapshot_relative_path;
use crate::url::resolve_reference;
use crate::ArchiverError;
use lol_html::html_content::ContentType;
use lol_html::{element, text, HtmlRewriter, Settings};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::cell::RefCell;
use std::rc::Rc;
use url::Url;

static CSS_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)url\(\s*["']?([^"')]+?)["']?\s*\)"#).expect("valid regex"));

static CSS_IMPORT_QUOTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)@import\s+["']([^"']+)["']"#).expect("valid regex"));

/// Maps one raw reference to its snapshot-relative path
///
/// Returns `None` when the reference must be preserved verbatim.
fn rewrite_reference(raw: &str, base: &Url, domain: &str, from_css: bool) -> Option<String> {
    let url = resolve_reference(base, raw)?;
    let relative = snapshot_relative_path(&url, domain);
    if from_css {
        Some(format!("../{}", relative))
    } else {
        Some(relative)
    }
}

/// Rewrites asset references in an HTML document
///
/// Covers the same surface the extractor scans: stylesheet links, scripts,
/// images and `srcset` first entries, `<source>` elements, video/audio
/// sources, legacy `background` attributes, inline `style` attributes, and
/// `<style>` blocks. Attribute names, whitespace, and all other content are
/// emitted unchanged.
///
/// # Arguments
///
/// * `html` - The original document text
/// * `base` - The absolute document URL
/// * `domain` - The snapshot domain
pub fn rewrite_html(html: &str, base: &Url, domain: &str) -> Result<String, ArchiverError> {
    let mut output = Vec::with_capacity(html.len());

    let rewrite_attr = |attr: &str| {
        let base = base.clone();
        let domain = domain.to_string();
        let attr = attr.to_string();
        move |el: &mut lol_html::html_content::Element| {
            if let Some(value) = el.get_attribute(&attr) {
                if let Some(new) = rewrite_reference(&value, &base, &domain, false) {
                    el.set_attribute(&attr, &new)?;
                }
            }
            Ok(())
        }
    };

    let style_buffer: Rc<RefCell<String>> = Rc::new(RefCell::new(String::new()));
    let style_base = base.clone();
    let style_domain = domain.to_string();

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("link[href]", {
                    let base = base.clone();
                    let domain = domain.to_string();
                    move |el| {
                        let is_stylesheet = el
                            .get_attribute("rel")
                            .map(|rel| {
                                rel.split_whitespace()
                                    .any(|t| t.eq_ignore_ascii_case("stylesheet"))
                            })
                            .unwrap_or(false);
                        if is_stylesheet {
                            if let Some(href) = el.get_attribute("href") {
                                if let Some(new) = rewrite_reference(&href, &base, &domain, false) {
                                    el.set_attribute("href", &new)?;
                                }
                            }
                        }
                        Ok(())
                    }
                }),
                element!("script[src]", rewrite_attr("src")),
                element!("img[src]", rewrite_attr("src")),
                element!("img[srcset]", {
                    let base = base.clone();
                    let domain = domain.to_string();
                    move |el| {
                        if let Some(srcset) = el.get_attribute("srcset") {
                            if let Some(new) = rewrite_srcset(&srcset, &base, &domain) {
                                el.set_attribute("srcset", &new)?;
                            }
                        }
                        Ok(())
                    }
                }),
                element!("source[src]", rewrite_attr("src")),
                element!("source[srcset]", {
                    let base = base.clone();
                    let domain = domain.to_string();
                    move |el| {
                        if let Some(srcset) = el.get_attribute("srcset") {
                            if let Some(new) = rewrite_srcset(&srcset, &base, &domain) {
                                el.set_attribute("srcset", &new)?;
                            }
                        }
                        Ok(())
                    }
                }),
                element!("video[src]", rewrite_attr("src")),
                element!("audio[src]", rewrite_attr("src")),
                element!("*[background]", rewrite_attr("background")),
                element!("*[style]", {
                    let base = base.clone();
                    let domain = domain.to_string();
                    move |el| {
                        if let Some(style) = el.get_attribute("style") {
                            if style.contains("url(") {
                                let new = rewrite_css_text(&style, &base, &domain, false);
                                el.set_attribute("style", &new)?;
                            }
                        }
                        Ok(())
                    }
                }),
                text!("style", {
                    let buffer = style_buffer.clone();
                    move |chunk| {
                        buffer.borrow_mut().push_str(chunk.as_str());
                        if chunk.last_in_text_node() {
                            let css = buffer.borrow_mut().split_off(0);
                            let rewritten =
                                rewrite_css_text(&css, &style_base, &style_domain, false);
                            chunk.replace(&rewritten, ContentType::Html);
                        } else {
                            chunk.remove();
                        }
                        Ok(())
                    }
                }),
            ],
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );

    rewriter
        .write(html.as_bytes())
        .map_err(|e| ArchiverError::Rewrite(e.to_string()))?;
    rewriter
        .end()
        .map_err(|e| ArchiverError::Rewrite(e.to_string()))?;

    String::from_utf8(output).map_err(|e| ArchiverError::Rewrite(e.to_string()))
}

/// Rewrites asset references in a stylesheet
///
/// The stylesheet is assumed to live inside the snapshot's `assets/`
/// subtree, so every rewritten reference gains one `../` prefix.
///
/// # Arguments
///
/// * `css` - The stylesheet text
/// * `base` - The absolute stylesheet URL
/// * `domain` - The snapshot domain
pub fn rewrite_css(css: &str, base: &Url, domain: &str) -> String {
    rewrite_css_text(css, base, domain, true)
}

/// Shared CSS rewriting pass
///
/// Handles `url(...)` occurrences (which includes `@import url(...)`) and
/// the quoted `@import "..."` form.
fn rewrite_css_text(css: &str, base: &Url, domain: &str, from_css: bool) -> String {
    let pass1 = CSS_URL_RE.replace_all(css, |caps: &Captures<'_>| {
        match rewrite_reference(caps[1].trim(), base, domain, from_css) {
            Some(new) => format!("url({})", new),
            None => caps[0].to_string(),
        }
    });

    CSS_IMPORT_QUOTED_RE
        .replace_all(&pass1, |caps: &Captures<'_>| {
            match rewrite_reference(caps[1].trim(), base, domain, from_css) {
                Some(new) => format!("@import \"{}\"", new),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Rewrites the first entry of a `srcset` attribute
///
/// Only the first candidate is fetched, so only it is rewritten; the rest
/// of the attribute is preserved.
fn rewrite_srcset(srcset: &str, base: &Url, domain: &str) -> Option<String> {
    let mut parts = srcset.splitn(2, ',');
    let first = parts.next()?;
    let rest = parts.next();

    let mut tokens = first.split_whitespace();
    let url_token = tokens.next()?;
    let descriptor: Vec<&str> = tokens.collect();

    let new_url = rewrite_reference(url_token, base, domain, false)?;

    let mut rebuilt = new_url;
    if !descriptor.is_empty() {
        rebuilt.push(' ');
        rebuilt.push_str(&descriptor.join(" "));
    }
    if let Some(rest) = rest {
        rebuilt.push(',');
        rebuilt.push_str(rest);
    }
    Some(rebuilt)
}
