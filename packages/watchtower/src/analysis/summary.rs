use super::PRICING;
use crate::diff::DiffResult;
use crate::types::MonitorMode;

pub const PRICING_SUMMARY: &str = "Pricing-related content changed.";
pub const SECTION_SUMMARY: &str = "Tracked section changed.";
pub const PAGE_SUMMARY: &str = "Page content changed.";

/// Fixed one-line description of a change.
pub fn summarize(mode: MonitorMode, diff: &DiffResult) -> &'static str {
    if PRICING.is_match(&diff.changed_text()) {
        PRICING_SUMMARY
    } else if mode == MonitorMode::Selector {
        SECTION_SUMMARY
    } else {
        PAGE_SUMMARY
    }
}
