//! Canonicalizes extracted content so that semantically identical captures
//! hash and diff identically.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Node, Selector};
use unicode_normalization::UnicodeNormalization;

use crate::types::MonitorMode;

lazy_static! {
    static ref ZERO_WIDTH: Regex = Regex::new(r"[\u{200B}-\u{200D}\u{FEFF}]").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref BODY: Selector = Selector::parse("body").unwrap();
}

/// Attributes that differ between otherwise identical renders: test hooks,
/// CSP nonces, SRI hashes and framework bookkeeping.
const RENDER_ATTRS: &[&str] = &[
    "data-reactroot",
    "data-reactid",
    "data-testid",
    "data-test",
    "data-cy",
    "nonce",
    "integrity",
    "ng-version",
];

const RENDER_ATTR_PREFIXES: &[&str] = &["data-v-", "_ngcontent-", "_nghost-"];

fn is_render_attr(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    RENDER_ATTRS.contains(&name.as_str())
        || RENDER_ATTR_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Normalize extracted content for the given mode.
///
/// Always normalizes line endings, strips zero-width characters, applies
/// NFC composition and trims. FULL_HTML content additionally loses comments
/// and render-only attributes. All modes collapse whitespace runs to a single
/// space. The result is a fixed point: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(input: &str, mode: MonitorMode) -> String {
    let base = base_normalize(input);
    let stripped = match mode {
        MonitorMode::FullHtml => strip_render_noise(&base),
        MonitorMode::TextOnly | MonitorMode::Selector => base,
    };
    collapse_whitespace(&stripped)
}

fn base_normalize(input: &str) -> String {
    let unified = input.replace("\r\n", "\n").replace('\r', "\n");
    let visible = ZERO_WIDTH.replace_all(&unified, "");
    visible.nfc().collect::<String>().trim().to_string()
}

/// Drop comments, script/style elements and render-only attributes from
/// the parsed document, then serialize the body.
fn strip_render_noise(html: &str) -> String {
    let mut doc = Html::parse_document(html);

    let mut detach = Vec::new();
    let mut scrub = Vec::new();
    for node in doc.tree.nodes() {
        match node.value() {
            Node::Comment(_) => detach.push(node.id()),
            Node::Element(el) if matches!(el.name(), "script" | "style") => detach.push(node.id()),
            Node::Element(el) if el.attrs().any(|(name, _)| is_render_attr(name)) => {
                scrub.push(node.id())
            }
            _ => {}
        }
    }

    for id in scrub {
        if let Some(mut node) = doc.tree.get_mut(id) {
            if let Node::Element(el) = node.value() {
                el.attrs.retain(|name, _| !is_render_attr(&name.local));
            }
        }
    }
    for id in detach {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }

    doc.select(&BODY)
        .next()
        .map(|body| body.html())
        .unwrap_or_default()
}

fn collapse_whitespace(input: &str) -> String {
    WHITESPACE.replace_all(input, " ").trim().to_string()
}
