//! Link and image collection, resolved against the page URL.

use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

use sitesense_shared::ImageRecord;

/// Resolve `href` against `base`, rejecting fragment-only, `javascript:`,
/// and non-HTTP targets. The fragment is stripped from the result.
pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    if href.to_ascii_lowercase().starts_with("javascript:") {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved)
}

/// All `a[href]` targets, absolute and deduplicated in document order.
pub(crate) fn extract_links(doc: &Html, base: &Url) -> Vec<String> {
    let link_sel = Selector::parse("a[href]").expect("valid selector");
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for el in doc.select(&link_sel) {
        let Some(resolved) = el.value().attr("href").and_then(|h| resolve_href(base, h)) else {
            continue;
        };
        let s = resolved.to_string();
        if seen.insert(s.clone()) {
            links.push(s);
        }
    }

    links
}

/// All `img` elements with a resolvable source, deduplicated by `src`.
///
/// Lazy-loading attributes (`data-src`, `data-lazy-src`) are used when `src`
/// is missing or a data URI placeholder.
pub(crate) fn extract_images(doc: &Html, base: &Url) -> Vec<ImageRecord> {
    let img_sel = Selector::parse("img").expect("valid selector");
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for el in doc.select(&img_sel) {
        let attrs = el.value();
        let src = ["src", "data-src", "data-lazy-src"]
            .iter()
            .filter_map(|name| attrs.attr(name))
            .find(|v| !v.trim().is_empty() && !v.trim_start().starts_with("data:"));

        let Some(resolved) = src.and_then(|s| resolve_href(base, s)) else {
            continue;
        };
        let src = resolved.to_string();
        if !seen.insert(src.clone()) {
            continue;
        }

        images.push(ImageRecord {
            src,
            alt: attrs
                .attr("alt")
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string),
            width: attrs.attr("width").and_then(parse_dimension),
            height: attrs.attr("height").and_then(parse_dimension),
        });
    }

    images
}

/// Parse `"640"` or `"640px"`.
fn parse_dimension(raw: &str) -> Option<u32> {
    raw.trim().trim_end_matches("px").parse().ok()
}
