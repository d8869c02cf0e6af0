//! Storage backends.
//!
//! - [`MemoryStore`]: in-process, for tests and local runs
//! - [`PostgresStore`]: durable (requires the `postgres` feature)

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
