use lazy_static::lazy_static;
use regex::Regex;

use super::{POLICY, PRICING};
use crate::diff::DiffResult;

lazy_static! {
    static ref HEADING: Regex = Regex::new(r"^[A-Z][A-Za-z0-9\s]{4,}$").unwrap();
}

/// Advisory importance of a change: +10 pricing, +5 legal/policy,
/// +3 when a changed fragment looks like a heading.
pub fn score_importance(diff: &DiffResult) -> i32 {
    let changed = diff.changed_text();
    let mut score = 0;

    if PRICING.is_match(&changed) {
        score += 10;
    }
    if POLICY.is_match(&changed) {
        score += 5;
    }
    if diff
        .changed_fragments()
        .any(|fragment| HEADING.is_match(fragment.trim()))
    {
        score += 3;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff_words;

    #[test]
    fn test_pricing_scores_ten() {
        let diff = diff_words("Plan: $10/mo", "Plan: $12/mo");
        assert_eq!(score_importance(&diff), 10);
    }

    #[test]
    fn test_policy_and_heading() {
        let diff = diff_words("Intro text.", "Intro text. Privacy Notice");
        assert_eq!(score_importance(&diff), 5 + 3);
    }

    #[test]
    fn test_plain_edit_scores_zero() {
        let diff = diff_words("the cat sat", "the dog sat");
        assert_eq!(score_importance(&diff), 0);
    }

    #[test]
    fn test_no_change_scores_zero() {
        let diff = diff_words("Pricing", "Pricing");
        assert_eq!(score_importance(&diff), 0);
    }
}
