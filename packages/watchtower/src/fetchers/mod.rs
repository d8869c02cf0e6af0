//! Page fetch strategies.
//!
//! ```text
//! FallbackFetcher
//!     ├─► BrowserFetcher (headless Chromium, rendered DOM + screenshot)
//!     └─► HttpFetcher    (plain GET, unrendered HTML)
//! ```

#[cfg(feature = "browser")]
pub mod browser;
pub mod fallback;
pub mod http;

#[cfg(feature = "browser")]
pub use browser::BrowserFetcher;
pub use fallback::FallbackFetcher;
pub use http::HttpFetcher;
