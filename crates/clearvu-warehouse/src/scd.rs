//! SCD Type 2 versioning.
//!
//! A change never edits a version in place. The current row is expired at
//! the change timestamp and a successor row takes over from that instant,
//! both in one compare-and-swap at the store.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use clearvu_core::{
  Error, Result,
  dimension::{DimensionAttributes, DimensionKind},
  store::{SwapOutcome, WarehouseStore},
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::registry::{CreateOutcome, DimensionRegistry};

/// Result of [`ScdEngine::apply_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
  /// The entity had no current row; a first version was created.
  Created(Uuid),
  /// The attributes matched the current version; nothing was written.
  Unchanged(Uuid),
  Versioned { expired: Uuid, current: Uuid },
}

impl ChangeOutcome {
  /// The surrogate key that is current after the change.
  pub fn current_key(&self) -> Uuid {
    match *self {
      Self::Created(key) | Self::Unchanged(key) => key,
      Self::Versioned { current, .. } => current,
    }
  }
}

pub struct ScdEngine<S> {
  registry: DimensionRegistry<S>,
}

impl<S> Clone for ScdEngine<S> {
  fn clone(&self) -> Self {
    Self { registry: self.registry.clone() }
  }
}

impl<S: WarehouseStore> ScdEngine<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { registry: DimensionRegistry::new(store) }
  }

  pub(crate) fn from_registry(registry: DimensionRegistry<S>) -> Self {
    Self { registry }
  }

  /// Record that `natural_id` carries `new_attributes` from `effective_at`
  /// onwards.
  ///
  /// Fails with `OutOfOrderUpdate` when `effective_at` does not come after
  /// the current version's effective date, and with
  /// `ConcurrentModification` when another writer replaced the current
  /// version between our read and our swap. Neither failure writes
  /// anything; retrying is up to the caller.
  pub async fn apply_change(
    &self,
    kind: DimensionKind,
    natural_id: &str,
    new_attributes: DimensionAttributes,
    effective_at: DateTime<Utc>,
  ) -> Result<ChangeOutcome> {
    new_attributes.ensure_kind(kind)?;
    // Stored timestamps carry microseconds.
    let effective_at = effective_at.trunc_subsecs(6);
    let store = self.registry.store();

    let current = match store
      .current_version(kind, natural_id)
      .await
      .map_err(Error::store)?
    {
      Some(row) => row,
      None => {
        match self
          .registry
          .create_first_version(kind, natural_id, new_attributes.clone(), effective_at)
          .await?
        {
          CreateOutcome::Created(key) => return Ok(ChangeOutcome::Created(key)),
          CreateOutcome::Existing(row) => row,
        }
      }
    };

    if current.attributes == new_attributes {
      debug!(%kind, natural_id, key = %current.surrogate_key, "change is a no-op");
      return Ok(ChangeOutcome::Unchanged(current.surrogate_key));
    }

    if effective_at <= current.effective_date {
      return Err(Error::OutOfOrderUpdate {
        kind,
        natural_id: natural_id.to_owned(),
        effective_at,
        current_effective: current.effective_date,
      });
    }

    let successor = current.successor(new_attributes, effective_at);
    let expired = current.surrogate_key;
    let next = successor.surrogate_key;

    match store
      .replace_current(expired, effective_at, successor)
      .await
      .map_err(Error::store)?
    {
      SwapOutcome::Swapped => {
        info!(%kind, natural_id, %expired, current = %next, %effective_at, "versioned dimension");
        Ok(ChangeOutcome::Versioned { expired, current: next })
      }
      SwapOutcome::Conflict => Err(Error::ConcurrentModification {
        kind,
        natural_id: natural_id.to_owned(),
      }),
    }
  }
}
