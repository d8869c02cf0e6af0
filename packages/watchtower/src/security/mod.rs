//! Outbound request safety checks.

pub mod url;

pub use self::url::UrlValidator;
