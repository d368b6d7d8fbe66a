//! Error types for `clearvu-core`.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::{dimension::DimensionKind, fact::DimensionRole};

#[derive(Debug, Error)]
pub enum Error {
  /// Read-only resolution of a natural id that has never been seen.
  #[error("{kind} {natural_id:?} not found")]
  NotFound {
    kind:       DimensionKind,
    natural_id: String,
  },

  #[error("no {kind} version of {natural_id:?} covers {as_of}")]
  NoCoverage {
    kind:       DimensionKind,
    natural_id: String,
    as_of:      DateTime<Utc>,
  },

  #[error(
    "out-of-order update to {kind} {natural_id:?}: {effective_at} is not \
     after the current version's effective date {current_effective}"
  )]
  OutOfOrderUpdate {
    kind:              DimensionKind,
    natural_id:        String,
    effective_at:      DateTime<Utc>,
    current_effective: DateTime<Utc>,
  },

  /// Lost a compare-and-swap race; the caller should retry.
  #[error("{kind} {natural_id:?} was modified concurrently")]
  ConcurrentModification {
    kind:       DimensionKind,
    natural_id: String,
  },

  #[error("required {role} dimension {natural_id:?} could not be resolved")]
  DimensionNotFound {
    role:       DimensionRole,
    natural_id: String,
  },

  #[error("fact not found: {0}")]
  FactNotFound(uuid::Uuid),

  #[error("invalid measure: {0}")]
  InvalidMeasure(String),

  #[error("invalid value {value:?} for {field}")]
  InvalidEnumValue { field: &'static str, value: String },

  #[error("attributes for {supplied} supplied to the {expected} dimension")]
  KindMismatch {
    expected: DimensionKind,
    supplied: DimensionKind,
  },

  #[error("invalid {field}: {value:?}")]
  InvalidField { field: &'static str, value: String },

  #[error("invalid date range: {start} is after {end}")]
  InvalidDateRange { start: NaiveDate, end: NaiveDate },

  #[error("invalid configuration: {0}")]
  InvalidConfig(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// Backend failure, passed through unmodified.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
