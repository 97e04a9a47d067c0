//! `<head>` metadata: meta tags, title, description, canonical, language.

use std::collections::BTreeMap;

use scraper::{Html, Selector};
use url::Url;

use crate::links::resolve_href;
use crate::text::element_text;

/// Collect every `name`/`property` → `content` meta pair plus derived keys
/// (`canonical`, `language`, `headings`).
pub(crate) fn extract_metadata(doc: &Html, base: &Url) -> BTreeMap<String, String> {
    let meta_sel = Selector::parse("meta[content]").expect("valid selector");
    let mut metadata = BTreeMap::new();

    for el in doc.select(&meta_sel) {
        let attrs = el.value();
        let Some(key) = attrs
            .attr("name")
            .or_else(|| attrs.attr("property"))
            .or_else(|| attrs.attr("itemprop"))
        else {
            continue;
        };
        let content = attrs.attr("content").unwrap_or_default().trim();
        if key.trim().is_empty() || content.is_empty() {
            continue;
        }
        // First occurrence wins, matching how browsers treat duplicate tags.
        metadata
            .entry(key.trim().to_ascii_lowercase())
            .or_insert_with(|| content.to_string());
    }

    let canonical_sel = Selector::parse(r#"link[rel="canonical"][href]"#).expect("valid selector");
    if let Some(canonical) = doc
        .select(&canonical_sel)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| resolve_href(base, href))
    {
        metadata.insert("canonical".into(), canonical.to_string());
    }

    let html_sel = Selector::parse("html[lang]").expect("valid selector");
    if let Some(lang) = doc
        .select(&html_sel)
        .next()
        .and_then(|el| el.value().attr("lang"))
        .map(str::trim)
        .filter(|l| !l.is_empty())
    {
        metadata.insert("language".into(), lang.to_string());
    }

    let heading_sel = Selector::parse("h1, h2, h3").expect("valid selector");
    let headings: Vec<String> = doc
        .select(&heading_sel)
        .map(|el| element_text(el, false))
        .filter(|h| !h.is_empty())
        .collect();
    if !headings.is_empty() {
        metadata.insert("headings".into(), headings.join("\n"));
    }

    metadata
}

/// `<title>`, falling back to `og:title`.
pub(crate) fn extract_title(doc: &Html, metadata: &BTreeMap<String, String>) -> String {
    let title_sel = Selector::parse("title").expect("valid selector");
    doc.select(&title_sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| metadata.get("og:title").cloned())
        .unwrap_or_default()
}

/// Meta description, falling back to `og:description`.
pub(crate) fn extract_description(metadata: &BTreeMap<String, String>) -> String {
    metadata
        .get("description")
        .or_else(|| metadata.get("og:description"))
        .cloned()
        .unwrap_or_default()
}
