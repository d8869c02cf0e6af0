//! Meaningful-change classifier.
//!
//! Ordered decision:
//! 1. whitespace-only difference is never meaningful
//! 2. configured keywords decide alone
//! 3. ANY_CHANGE accepts everything else
//! 4. timestamp/date churn is noise
//! 5. changes under the noise floor are noise unless they touch pricing;
//!    a tiny share of a large page is always noise
//! 6. anything left is meaningful

use lazy_static::lazy_static;
use regex::Regex;

use super::PRICING;
use crate::config::ClassifierConfig;
use crate::diff::DiffResult;
use crate::types::Sensitivity;

lazy_static! {
    static ref TIMESTAMP_WORD: Regex = Regex::new(
        r"(?ix)^(?:
            \d{1,4}[/-]\d{1,2}[/-]\d{1,4}
          | \d{1,2}:\d{2}(?::\d{2})?(?:am|pm)?
          | am | pm | a\.m\. | p\.m\.
          | [\d:./-]+
        )$"
    )
    .unwrap();
}

/// Everything the classifier looks at for one diff.
#[derive(Debug, Clone, Copy)]
pub struct ChangeInput<'a> {
    pub prev: &'a str,
    pub next: &'a str,
    pub diff: &'a DiffResult,
    pub sensitivity: Sensitivity,
    pub keywords: &'a [String],
}

/// Classifier outcome with the rule that decided it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    WhitespaceOnly,
    KeywordMatched,
    KeywordMissing,
    AnyChange,
    TimestampOnly,
    BelowNoiseFloor,
    BelowChangeRatio,
    Meaningful,
}

impl Verdict {
    pub fn is_meaningful(&self) -> bool {
        matches!(
            self,
            Verdict::KeywordMatched | Verdict::AnyChange | Verdict::Meaningful
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::WhitespaceOnly => "whitespace_only",
            Verdict::KeywordMatched => "keyword_matched",
            Verdict::KeywordMissing => "keyword_missing",
            Verdict::AnyChange => "any_change",
            Verdict::TimestampOnly => "timestamp_only",
            Verdict::BelowNoiseFloor => "below_noise_floor",
            Verdict::BelowChangeRatio => "below_change_ratio",
            Verdict::Meaningful => "meaningful",
        }
    }
}

/// Decide whether a diff is worth notifying about.
pub fn classify(input: &ChangeInput<'_>, config: &ClassifierConfig) -> Verdict {
    if strip_whitespace(input.prev) == strip_whitespace(input.next) {
        return Verdict::WhitespaceOnly;
    }

    let keywords: Vec<String> = input
        .keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    if !keywords.is_empty() {
        let hit = input.diff.changed_fragments().any(|fragment| {
            let lower = fragment.to_lowercase();
            keywords.iter().any(|k| lower.contains(k.as_str()))
        });
        return if hit {
            Verdict::KeywordMatched
        } else {
            Verdict::KeywordMissing
        };
    }

    if input.sensitivity == Sensitivity::AnyChange {
        return Verdict::AnyChange;
    }

    if is_timestamp_only(input.diff) {
        return Verdict::TimestampOnly;
    }

    let delta = input.diff.changed_chars();
    if delta < config.min_changed_chars && !PRICING.is_match(&input.diff.changed_text()) {
        return Verdict::BelowNoiseFloor;
    }
    let prev_len = input.prev.chars().count().max(1);
    if prev_len > config.large_page_chars
        && (delta as f64) / (prev_len as f64) < config.min_change_ratio
    {
        return Verdict::BelowChangeRatio;
    }

    Verdict::Meaningful
}

fn strip_whitespace(input: &str) -> String {
    input.chars().filter(|c| !c.is_whitespace()).collect()
}

fn is_timestamp_only(diff: &DiffResult) -> bool {
    let mut any = false;
    for fragment in diff.changed_fragments() {
        any = true;
        let all_timestamps = fragment.split_whitespace().all(|word| {
            let word = word.trim_matches(|c: char| matches!(c, ',' | ';' | '(' | ')' | '[' | ']'));
            !word.is_empty() && TIMESTAMP_WORD.is_match(word)
        });
        if !all_timestamps {
            return false;
        }
    }
    any
}
