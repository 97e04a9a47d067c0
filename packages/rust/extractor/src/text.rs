//! Visible-text collection and main-content isolation.

use std::collections::HashMap;

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

/// Elements whose text is never visible.
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// Page chrome excluded from main-text candidates.
const BOILERPLATE_TAGS: &[&str] = &[
    "nav", "header", "footer", "aside", "form", "button", "iframe", "select",
];

/// Class/id fragments that mark chrome regardless of tag.
const BOILERPLATE_HINTS: &[&str] = &[
    "sidebar", "menu", "breadcrumb", "cookie", "banner", "navbar", "footer", "header",
];

/// Tags that start a new line of text.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "li", "ul", "ol", "tr", "table", "br", "h1", "h2",
    "h3", "h4", "h5", "h6", "blockquote", "pre", "dd", "dt", "figcaption",
];

/// Semantic containers tried before paragraph clustering.
const MAIN_SELECTORS: &[&str] = &[
    "main",
    "article",
    r#"[role="main"]"#,
    "#content",
    ".content",
    ".main-content",
    ".entry-content",
    ".post",
];

/// A block needs at least this much text to count as "main".
const MIN_MAIN_CHARS: usize = 200;

/// Paragraphs shorter than this do not contribute to a block's score.
const MIN_PARAGRAPH_CHARS: usize = 20;

/// All visible text under `<body>` (or the whole document when there is no body).
pub(crate) fn visible_text(doc: &Html) -> String {
    let body_sel = Selector::parse("body").expect("valid selector");
    let root = doc
        .select(&body_sel)
        .next()
        .unwrap_or_else(|| doc.root_element());

    let mut out = String::new();
    collect_text(root, false, &mut out);
    normalize_whitespace(&out)
}

/// Best-effort main content text; empty when no confident block exists.
pub(crate) fn main_text(doc: &Html) -> String {
    for sel_str in MAIN_SELECTORS {
        let Ok(sel) = Selector::parse(sel_str) else {
            continue;
        };
        if let Some(el) = doc.select(&sel).next() {
            let text = element_text(el, true);
            if text.chars().count() >= MIN_MAIN_CHARS {
                return text;
            }
        }
    }

    densest_paragraph_block(doc).unwrap_or_default()
}

/// Parent element holding the most paragraph text.
fn densest_paragraph_block(doc: &Html) -> Option<String> {
    let p_sel = Selector::parse("p").expect("valid selector");
    let mut scores: HashMap<_, usize> = HashMap::new();

    for p in doc.select(&p_sel) {
        if has_boilerplate_ancestor(p) {
            continue;
        }
        let len = element_text(p, true).chars().count();
        if len < MIN_PARAGRAPH_CHARS {
            continue;
        }
        if let Some(parent) = p.parent().filter(|node| node.value().is_element()) {
            *scores.entry(parent.id()).or_default() += len;
        }
    }

    let (best_id, best_score) = scores.into_iter().max_by_key(|(_, score)| *score)?;
    if best_score < MIN_MAIN_CHARS {
        return None;
    }

    let node = doc.tree.get(best_id)?;
    ElementRef::wrap(node).map(|el| element_text(el, true))
}

/// Normalized text of one element.
pub(crate) fn element_text(el: ElementRef<'_>, skip_boilerplate: bool) -> String {
    let mut out = String::new();
    collect_text(el, skip_boilerplate, &mut out);
    normalize_whitespace(&out)
}

fn collect_text(el: ElementRef<'_>, skip_boilerplate: bool, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => {
                let name = element.name();
                if INVISIBLE_TAGS.contains(&name) {
                    continue;
                }
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                if skip_boilerplate && is_boilerplate(child_el) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push('\n');
                }
                collect_text(child_el, skip_boilerplate, out);
                if block {
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

fn is_boilerplate(el: ElementRef<'_>) -> bool {
    let element = el.value();
    if BOILERPLATE_TAGS.contains(&element.name()) {
        return true;
    }
    let marker = format!(
        "{} {}",
        element.id().unwrap_or_default(),
        element.attr("class").unwrap_or_default()
    )
    .to_ascii_lowercase();
    BOILERPLATE_HINTS.iter().any(|hint| marker.contains(hint))
}

fn has_boilerplate_ancestor(el: ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(is_boilerplate)
}

/// Collapse runs of spaces within lines and drop empty lines.
pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
