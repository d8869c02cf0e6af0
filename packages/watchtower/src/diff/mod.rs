//! Word-level diff with semantic cleanup and HTML/plain/snippet renderings.
//!
//! Both inputs are split into words and single-space separators, diffed with
//! Myers, grouped into runs and cleaned up so that short equalities sitting
//! between two edits are folded into the edit. Concatenating the `Equal` and
//! `Delete` fragments reproduces the tokenized previous text; `Equal` and
//! `Insert` reproduce the next.

mod myers;
pub mod snippets;

use serde::{Deserialize, Serialize};

use myers::Edit;
pub use snippets::Snippets;

/// One fragment of a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffOp {
    Equal(String),
    Insert(String),
    Delete(String),
}

impl DiffOp {
    pub fn text(&self) -> &str {
        match self {
            DiffOp::Equal(t) | DiffOp::Insert(t) | DiffOp::Delete(t) => t,
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, DiffOp::Equal(_))
    }
}

/// Ordered diff between two normalized strings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiffResult {
    pub ops: Vec<DiffOp>,
}

impl DiffResult {
    /// Whether any fragment is an insertion or deletion.
    pub fn has_changes(&self) -> bool {
        self.ops.iter().any(DiffOp::is_change)
    }

    /// Inserted and deleted fragments in order.
    pub fn changed_fragments(&self) -> impl Iterator<Item = &str> {
        self.ops
            .iter()
            .filter(|op| op.is_change())
            .map(DiffOp::text)
    }

    /// Changed fragments joined by a single space.
    pub fn changed_text(&self) -> String {
        self.changed_fragments().collect::<Vec<_>>().join(" ")
    }

    /// Total characters across changed fragments.
    pub fn changed_chars(&self) -> usize {
        self.changed_fragments().map(|t| t.chars().count()).sum()
    }

    /// HTML rendering: `<ins>`/`<del>` around changes, all text escaped.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for op in &self.ops {
            let safe = escape_html(op.text());
            match op {
                DiffOp::Equal(_) => out.push_str(&safe),
                DiffOp::Insert(_) => {
                    out.push_str("<ins>");
                    out.push_str(&safe);
                    out.push_str("</ins>");
                }
                DiffOp::Delete(_) => {
                    out.push_str("<del>");
                    out.push_str(&safe);
                    out.push_str("</del>");
                }
            }
        }
        out
    }

    /// Plain rendering: `[[+inserted]]` and `[[-deleted]]`.
    pub fn to_plain(&self) -> String {
        self.ops
            .iter()
            .map(|op| match op {
                DiffOp::Equal(t) => t.clone(),
                DiffOp::Insert(t) => format!("[[+{}]]", t),
                DiffOp::Delete(t) => format!("[[-{}]]", t),
            })
            .collect()
    }

    /// Bounded before/after context around the first change.
    pub fn snippets(&self, prev: &str, next: &str, limit: usize) -> Snippets {
        snippets::extract(self, prev, next, limit)
    }
}

/// Escape text for inclusion in HTML bodies and attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Split into words with a single `" "` token between consecutive words.
pub fn tokenize(input: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    for (i, word) in input.split_whitespace().enumerate() {
        if i > 0 {
            tokens.push(" ");
        }
        tokens.push(word);
    }
    tokens
}

/// Word-level diff of two normalized strings.
pub fn diff_words(prev: &str, next: &str) -> DiffResult {
    let a = tokenize(prev);
    let b = tokenize(next);

    let mut segments: Vec<Segment> = Vec::new();
    for edit in myers::diff(&a, &b) {
        match edit {
            Edit::Equal(i) => push_same(&mut segments, a[i]),
            Edit::Delete(i) => push_change(&mut segments, a[i], ""),
            Edit::Insert(j) => push_change(&mut segments, "", b[j]),
        }
    }

    cleanup_semantic(&mut segments);

    let mut ops = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment {
            Segment::Same(text) => ops.push(DiffOp::Equal(text)),
            Segment::Changed { deleted, inserted } => {
                if !deleted.is_empty() {
                    ops.push(DiffOp::Delete(deleted));
                }
                if !inserted.is_empty() {
                    ops.push(DiffOp::Insert(inserted));
                }
            }
        }
    }
    DiffResult { ops }
}

/// A maximal run of equal tokens, or of changed tokens with deletions and
/// insertions gathered separately.
#[derive(Debug)]
enum Segment {
    Same(String),
    Changed { deleted: String, inserted: String },
}

fn push_same(segments: &mut Vec<Segment>, token: &str) {
    match segments.last_mut() {
        Some(Segment::Same(text)) => text.push_str(token),
        _ => segments.push(Segment::Same(token.to_string())),
    }
}

fn push_change(segments: &mut Vec<Segment>, deleted: &str, inserted: &str) {
    match segments.last_mut() {
        Some(Segment::Changed {
            deleted: d,
            inserted: i,
        }) => {
            d.push_str(deleted);
            i.push_str(inserted);
        }
        _ => segments.push(Segment::Changed {
            deleted: deleted.to_string(),
            inserted: inserted.to_string(),
        }),
    }
}

fn change_weight(segment: &Segment) -> Option<usize> {
    match segment {
        Segment::Changed { deleted, inserted } => {
            Some(deleted.chars().count().max(inserted.chars().count()))
        }
        Segment::Same(_) => None,
    }
}

/// Fold equalities that are no longer than the edits on both sides into a
/// single replacement, until no such equality remains.
fn cleanup_semantic(segments: &mut Vec<Segment>) {
    loop {
        let mut target = None;
        for i in 1..segments.len().saturating_sub(1) {
            let Segment::Same(text) = &segments[i] else {
                continue;
            };
            let len = text.chars().count();
            match (change_weight(&segments[i - 1]), change_weight(&segments[i + 1])) {
                (Some(before), Some(after)) if len <= before && len <= after => {
                    target = Some(i);
                    break;
                }
                _ => {}
            }
        }
        let Some(i) = target else {
            return;
        };

        let merged: Vec<Segment> = segments.drain(i - 1..=i + 1).collect();
        let mut deleted = String::new();
        let mut inserted = String::new();
        for segment in merged {
            match segment {
                Segment::Same(text) => {
                    deleted.push_str(&text);
                    inserted.push_str(&text);
                }
                Segment::Changed {
                    deleted: d,
                    inserted: ins,
                } => {
                    deleted.push_str(&d);
                    inserted.push_str(&ins);
                }
            }
        }
        segments.insert(i - 1, Segment::Changed { deleted, inserted });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side(result: &DiffResult, keep_insert: bool) -> String {
        result
            .ops
            .iter()
            .filter(|op| match op {
                DiffOp::Equal(_) => true,
                DiffOp::Insert(_) => keep_insert,
                DiffOp::Delete(_) => !keep_insert,
            })
            .map(DiffOp::text)
            .collect()
    }

    #[test]
    fn test_price_change() {
        let result = diff_words("Plan: $10/mo", "Plan: $12/mo");
        assert_eq!(
            result.ops,
            vec![
                DiffOp::Equal("Plan: ".into()),
                DiffOp::Delete("$10/mo".into()),
                DiffOp::Insert("$12/mo".into()),
            ]
        );
        assert_eq!(result.changed_text(), "$10/mo $12/mo");
        assert_eq!(result.changed_chars(), 12);
    }

    #[test]
    fn test_identical_has_no_changes() {
        let result = diff_words("same text here", "same text here");
        assert!(!result.has_changes());
        assert_eq!(result.ops, vec![DiffOp::Equal("same text here".into())]);
    }

    #[test]
    fn test_whitespace_differences_are_invisible() {
        let result = diff_words("Hello world", "  Hello \n\n world ");
        assert!(!result.has_changes());
    }

    #[test]
    fn test_semantic_cleanup_merges_short_equalities() {
        let result = diff_words("red fox jumps", "blue cat jumps");
        assert_eq!(
            result.ops,
            vec![
                DiffOp::Delete("red fox".into()),
                DiffOp::Insert("blue cat".into()),
                DiffOp::Equal(" jumps".into()),
            ]
        );
    }

    #[test]
    fn test_round_trip_both_sides() {
        let prev = "The quick brown fox jumps over the lazy dog";
        let next = "A quick red fox leaped over the very lazy dog today";
        let result = diff_words(prev, next);
        assert_eq!(side(&result, false), tokenize(prev).concat());
        assert_eq!(side(&result, true), tokenize(next).concat());
    }

    #[test]
    fn test_html_rendering_escapes() {
        let result = diff_words("a <b> & 'c'", "a <i> & \"c\"");
        let html = result.to_html();
        assert!(html.starts_with("a "));
        assert!(html.contains("<del>&lt;b&gt;</del>") || html.contains("<del>&lt;b&gt; "));
        assert!(html.contains("&amp;"));
        assert!(html.contains("&#039;c&#039;"));
        assert!(html.contains("&quot;c&quot;"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn test_plain_rendering() {
        let result = diff_words("Plan: $10/mo", "Plan: $12/mo");
        assert_eq!(result.to_plain(), "Plan: [[-$10/mo]][[+$12/mo]]");
    }

    #[test]
    fn test_op_serialization() {
        let json = serde_json::to_string(&DiffOp::Insert("x".into())).unwrap();
        assert_eq!(json, r#"{"op":"INSERT","text":"x"}"#);
    }
}
