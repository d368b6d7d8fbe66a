//! SQLite backend for the ClearVu warehouse store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every dimension mutation executes
//! inside a single SQLite transaction on that thread, which is what makes
//! insert-if-absent and compare-and-swap atomic.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
