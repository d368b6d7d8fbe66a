//! The `WarehouseStore` trait and its outcome types.
//!
//! The trait is implemented by storage backends (e.g.
//! `clearvu-store-sqlite`). The registry, versioning engine and assembler in
//! `clearvu-warehouse` depend on this abstraction, not on any concrete
//! backend.
//!
//! Backends only report infrastructure failures through `Self::Error`. The
//! two races the warehouse cares about (a concurrent first insert and a lost
//! compare-and-swap) are ordinary outcomes, so callers can tell them apart
//! without inspecting backend error types.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
  date::DateRow,
  dimension::{DimensionKind, DimensionRow},
  fact::FactRow,
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Result of [`WarehouseStore::insert_first_version`].
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
  Inserted,
  /// Another writer created the entity first; this is its current row.
  AlreadyPresent(DimensionRow),
}

/// Result of [`WarehouseStore::replace_current`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
  Swapped,
  /// The expected row was no longer current; nothing was written.
  Conflict,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a warehouse store backend.
///
/// Dimension rows change only through the two atomic operations
/// [`insert_first_version`](Self::insert_first_version) and
/// [`replace_current`](Self::replace_current). Date rows are upserted
/// wholesale; fact rows are append-only.
///
/// All methods return `Send` futures so the trait can be shared across
/// worker tasks in a multi-threaded runtime.
pub trait WarehouseStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Dimensions — reads ────────────────────────────────────────────────

  /// The row of `natural_id` flagged current, if any.
  fn current_version<'a>(
    &'a self,
    kind: DimensionKind,
    natural_id: &'a str,
  ) -> impl Future<Output = Result<Option<DimensionRow>, Self::Error>> + Send + 'a;

  /// The version whose `[effective_date, expiration_date)` contains `as_of`.
  fn version_as_of<'a>(
    &'a self,
    kind: DimensionKind,
    natural_id: &'a str,
    as_of: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<DimensionRow>, Self::Error>> + Send + 'a;

  /// Every version of `natural_id`, oldest first.
  fn versions<'a>(
    &'a self,
    kind: DimensionKind,
    natural_id: &'a str,
  ) -> impl Future<Output = Result<Vec<DimensionRow>, Self::Error>> + Send + 'a;

  // ── Dimensions — atomic writes ────────────────────────────────────────

  /// Insert `row` as the first version of its entity unless a current row
  /// for the same `(kind, natural_id)` already exists.
  fn insert_first_version(
    &self,
    row: DimensionRow,
  ) -> impl Future<Output = Result<InsertOutcome, Self::Error>> + Send + '_;

  /// Atomically expire `expected_current` at `expired_at` and insert
  /// `successor` — but only if `expected_current` is still the current row.
  fn replace_current(
    &self,
    expected_current: Uuid,
    expired_at: DateTime<Utc>,
    successor: DimensionRow,
  ) -> impl Future<Output = Result<SwapOutcome, Self::Error>> + Send + '_;

  // ── Date dimension ────────────────────────────────────────────────────

  /// Insert or overwrite date rows by `date_key`. Returns the row count.
  fn upsert_dates(
    &self,
    rows: Vec<DateRow>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn get_date(
    &self,
    date_key: u32,
  ) -> impl Future<Output = Result<Option<DateRow>, Self::Error>> + Send + '_;

  /// Date rows in `start..=end`, ordered by date.
  fn list_dates(
    &self,
    start: NaiveDate,
    end: NaiveDate,
  ) -> impl Future<Output = Result<Vec<DateRow>, Self::Error>> + Send + '_;

  /// Recompute the relative "is current …" flags of every stored date row
  /// against `reference`. Returns the number of rows touched.
  fn refresh_date_flags(
    &self,
    reference: NaiveDate,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Facts — append-only ───────────────────────────────────────────────

  fn append_fact(
    &self,
    fact: FactRow,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Append `facts` atomically: either every row is recorded or none is.
  fn append_facts(
    &self,
    facts: Vec<FactRow>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  fn get_fact(
    &self,
    fact_id: Uuid,
  ) -> impl Future<Output = Result<Option<FactRow>, Self::Error>> + Send + '_;

  /// All fact rows assembled from the source transaction `transaction_id`,
  /// in recording order.
  fn facts_for_transaction<'a>(
    &'a self,
    transaction_id: &'a str,
  ) -> impl Future<Output = Result<Vec<FactRow>, Self::Error>> + Send + 'a;
}
