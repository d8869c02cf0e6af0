//! Mode-aware content extraction over rendered HTML.

use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;

use crate::error::{ExtractError, ExtractResult};
use crate::types::{ContentType, MonitorMode};

/// Ignore-list applied in TEXT_ONLY mode when the monitor has none.
pub const DEFAULT_IGNORE_SELECTORS: &[&str] = &[
    r#"[id*="cookie"]"#,
    r#"[class*="cookie"]"#,
    r#"[class*="consent"]"#,
    r#"[id*="consent"]"#,
    r#"[class*="modal"]"#,
    r#"[role="dialog"]"#,
];

lazy_static! {
    static ref NOISE: Selector = Selector::parse("script, style, noscript, svg, canvas").unwrap();
    static ref BODY: Selector = Selector::parse("body").unwrap();
}

/// Extracted content before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub content_type: ContentType,
    pub content: String,
}

/// Extract the tracked content from a page.
///
/// Script, style, noscript, svg and canvas elements are always removed.
/// Malformed ignore-list entries are skipped individually.
pub fn extract(
    html: &str,
    mode: MonitorMode,
    selector: Option<&str>,
    ignore_selectors: &[String],
) -> ExtractResult<Extracted> {
    let mut doc = Html::parse_document(html);
    remove_matching(&mut doc, &NOISE);

    match mode {
        MonitorMode::TextOnly => {
            if ignore_selectors.is_empty() {
                remove_all(&mut doc, DEFAULT_IGNORE_SELECTORS.iter().copied());
            } else {
                remove_all(&mut doc, ignore_selectors.iter().map(String::as_str));
            }
            let content = doc
                .select(&BODY)
                .next()
                .map(element_text)
                .unwrap_or_default();
            Ok(Extracted {
                content_type: ContentType::Text,
                content,
            })
        }
        MonitorMode::FullHtml => {
            let content = doc
                .select(&BODY)
                .next()
                .map(|body| body.html())
                .unwrap_or_default();
            Ok(Extracted {
                content_type: ContentType::Html,
                content,
            })
        }
        MonitorMode::Selector => {
            let raw = selector
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or(ExtractError::SelectorMissing)?;
            let primary = Selector::parse(raw).map_err(|_| ExtractError::InvalidSelector {
                selector: raw.to_string(),
            })?;

            remove_all(&mut doc, ignore_selectors.iter().map(String::as_str));

            let parts: Vec<String> = doc.select(&primary).map(element_text).collect();
            if parts.is_empty() {
                return Err(ExtractError::SelectorNotFound {
                    selector: raw.to_string(),
                });
            }
            Ok(Extracted {
                content_type: ContentType::Text,
                content: parts.join(" "),
            })
        }
    }
}

fn remove_all<'a>(doc: &mut Html, selectors: impl Iterator<Item = &'a str>) {
    for raw in selectors {
        match Selector::parse(raw) {
            Ok(selector) => remove_matching(doc, &selector),
            Err(e) => debug!(selector = raw, error = %e, "skipping invalid ignore selector"),
        }
    }
}

fn remove_matching(doc: &mut Html, selector: &Selector) {
    let ids: Vec<_> = doc.select(selector).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// Elements that start a new line of text when rendered.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "details", "dialog", "div", "dl",
    "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5",
    "h6", "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table",
    "td", "th", "tr", "ul",
];

/// Text of an element. Block boundaries become a space; inline markup
/// (`Pri<b>cing</b>`) joins without one.
fn element_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_text(el, &mut out);
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                let block = BLOCK_ELEMENTS.contains(&child.value().name());
                if block {
                    out.push(' ');
                }
                push_text(child, out);
                if block {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}
