//! SQLite backend for the Tinsel group store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Conditional transitions run inside a
//! single transaction on that thread, which makes them atomic with respect to
//! every other write.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
