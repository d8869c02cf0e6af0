use serde::{Deserialize, Serialize};

use super::{DiffOp, DiffResult};

/// Before/after excerpts for a notification.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Snippets {
    pub before: String,
    pub after: String,
}

/// Window of `limit` characters centred on the first change, taken from each
/// side. Without a change both sides fall back to their first `limit`
/// characters.
pub(super) fn extract(diff: &DiffResult, prev: &str, next: &str, limit: usize) -> Snippets {
    let mut offset = 0usize;
    let mut found = false;
    for op in &diff.ops {
        match op {
            DiffOp::Equal(text) => offset += text.chars().count(),
            _ => {
                found = true;
                break;
            }
        }
    }

    if !found {
        return Snippets {
            before: char_slice(prev, 0, limit),
            after: char_slice(next, 0, limit),
        };
    }

    let context = limit / 2;
    let start = offset.saturating_sub(context);
    let end = offset + context;
    Snippets {
        before: char_slice(prev, start, end),
        after: char_slice(next, start, end),
    }
}

fn char_slice(input: &str, start: usize, end: usize) -> String {
    input
        .chars()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect()
}
