//! Change classification, importance scoring and one-line summaries.

pub mod classify;
pub mod score;
pub mod summary;

use lazy_static::lazy_static;
use regex::Regex;

pub use classify::{classify, ChangeInput, Verdict};
pub use score::score_importance;
pub use summary::summarize;

lazy_static! {
    pub(crate) static ref PRICING: Regex = Regex::new(r"(?i)\b(?:pricing|plans?|free|trial)\b|[$€£¥]\s?\d").unwrap();
    pub(crate) static ref POLICY: Regex = Regex::new(r"(?i)\b(?:terms|privacy|polic(?:y|ies))\b").unwrap();
}
