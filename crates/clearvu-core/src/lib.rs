//! Core types and trait definitions for the ClearVu sales warehouse.
//!
//! This crate is deliberately free of database dependencies. It defines the
//! operational records, the star-schema rows derived from them, the pure
//! calendar-dimension generator, and the [`store::WarehouseStore`] trait that
//! storage backends implement.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod date;
pub mod dimension;
pub mod error;
pub mod fact;
pub mod operational;
pub mod store;

pub use error::{Error, Result};
