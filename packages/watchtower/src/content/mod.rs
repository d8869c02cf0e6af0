//! Content extraction, normalization and hashing.
//!
//! ```text
//! rendered HTML ─► extract(mode) ─► normalize(mode) ─► content_hash
//! ```

pub mod extract;
pub mod hash;
pub mod normalize;

pub use extract::{extract, Extracted, DEFAULT_IGNORE_SELECTORS};
pub use hash::content_hash;
pub use normalize::normalize;
