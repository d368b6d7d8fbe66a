//! The dimension key registry.
//!
//! Maps natural ids to surrogate keys. Creation goes through the store's
//! insert-if-absent, so two workers racing on a new natural id end up with
//! a single row between them.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use clearvu_core::{
  Error, Result,
  dimension::{DimensionAttributes, DimensionKind, DimensionRow},
  store::{InsertOutcome, WarehouseStore},
};
use tracing::debug;
use uuid::Uuid;

use crate::scd::ScdEngine;

/// What happened when the registry tried to create a first version.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CreateOutcome {
  Created(Uuid),
  /// The entity already had a current row, possibly written by a
  /// concurrent creator.
  Existing(DimensionRow),
}

pub struct DimensionRegistry<S> {
  store: Arc<S>,
}

impl<S> Clone for DimensionRegistry<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store) }
  }
}

impl<S: WarehouseStore> DimensionRegistry<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub(crate) fn store(&self) -> &S { &self.store }

  /// Return the surrogate key of the current version of `natural_id`,
  /// creating or versioning the entity as needed.
  ///
  /// Unknown natural ids get a first version effective at `as_of`. Equal
  /// attributes are a no-op. Differing attributes are handed to
  /// [`ScdEngine::apply_change`] with `as_of` as the effective timestamp,
  /// which means its `OutOfOrderUpdate` and `ConcurrentModification`
  /// failures surface here unchanged.
  pub async fn resolve_or_create(
    &self,
    kind: DimensionKind,
    natural_id: &str,
    attributes: DimensionAttributes,
    as_of: DateTime<Utc>,
  ) -> Result<Uuid> {
    attributes.ensure_kind(kind)?;
    let as_of = as_of.trunc_subsecs(6);

    let current = match self
      .store
      .current_version(kind, natural_id)
      .await
      .map_err(Error::store)?
    {
      Some(row) => row,
      None => {
        match self
          .create_first_version(kind, natural_id, attributes.clone(), as_of)
          .await?
        {
          CreateOutcome::Created(key) => return Ok(key),
          CreateOutcome::Existing(row) => row,
        }
      }
    };

    if current.attributes == attributes {
      debug!(%kind, natural_id, key = %current.surrogate_key, "attributes unchanged");
      return Ok(current.surrogate_key);
    }

    ScdEngine::from_registry(self.clone())
      .apply_change(kind, natural_id, attributes, as_of)
      .await
      .map(|outcome| outcome.current_key())
  }

  /// The surrogate key of the current version.
  pub async fn resolve(&self, kind: DimensionKind, natural_id: &str) -> Result<Uuid> {
    self
      .store
      .current_version(kind, natural_id)
      .await
      .map_err(Error::store)?
      .map(|row| row.surrogate_key)
      .ok_or_else(|| Error::NotFound { kind, natural_id: natural_id.to_owned() })
  }

  /// The surrogate key of the version whose interval contains `as_of`.
  pub async fn resolve_as_of(
    &self,
    kind: DimensionKind,
    natural_id: &str,
    as_of: DateTime<Utc>,
  ) -> Result<Uuid> {
    if let Some(row) = self
      .store
      .version_as_of(kind, natural_id, as_of)
      .await
      .map_err(Error::store)?
    {
      return Ok(row.surrogate_key);
    }

    // Tell an unknown entity apart from a gap before its first version.
    let known = !self
      .store
      .versions(kind, natural_id)
      .await
      .map_err(Error::store)?
      .is_empty();
    if known {
      Err(Error::NoCoverage { kind, natural_id: natural_id.to_owned(), as_of })
    } else {
      Err(Error::NotFound { kind, natural_id: natural_id.to_owned() })
    }
  }

  /// Every version of `natural_id`, oldest first.
  pub async fn history(
    &self,
    kind: DimensionKind,
    natural_id: &str,
  ) -> Result<Vec<DimensionRow>> {
    self.store.versions(kind, natural_id).await.map_err(Error::store)
  }

  pub(crate) async fn create_first_version(
    &self,
    kind: DimensionKind,
    natural_id: &str,
    attributes: DimensionAttributes,
    as_of: DateTime<Utc>,
  ) -> Result<CreateOutcome> {
    attributes.ensure_kind(kind)?;
    let row = DimensionRow::first_version(natural_id, attributes, as_of.trunc_subsecs(6));
    let key = row.surrogate_key;

    match self.store.insert_first_version(row).await.map_err(Error::store)? {
      InsertOutcome::Inserted => {
        debug!(%kind, natural_id, %key, "created first version");
        Ok(CreateOutcome::Created(key))
      }
      InsertOutcome::AlreadyPresent(existing) => {
        debug!(
          %kind,
          natural_id,
          key = %existing.surrogate_key,
          "lost creation race; using existing row"
        );
        Ok(CreateOutcome::Existing(existing))
      }
    }
  }
}
