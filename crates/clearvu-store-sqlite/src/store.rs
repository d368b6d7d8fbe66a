//! [`SqliteStore`] — the SQLite implementation of [`WarehouseStore`].

use std::path::Path;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use clearvu_core::{
  date::{DateRow, year_week},
  dimension::{DimensionKind, DimensionRow},
  fact::FactRow,
  store::{InsertOutcome, SwapOutcome, WarehouseStore},
};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    DATE_COLUMNS, DIMENSION_COLUMNS, EncodedDimensionRow, FACT_COLUMNS, RawDateRow,
    RawDimensionRow, RawFact, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A warehouse store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted, and every
/// clone funnels into the same connection thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Close the underlying connection. Other clones of this store fail with
  /// a closed-connection error afterwards.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a dimension query expected to yield at most one row.
  async fn query_dimension_row(
    &self,
    sql: String,
    params: Vec<String>,
  ) -> Result<Option<DimensionRow>> {
    let raw: Option<RawDimensionRow> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &sql,
              rusqlite::params_from_iter(params.iter()),
              RawDimensionRow::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDimensionRow::into_row).transpose()
  }
}

// ─── WarehouseStore impl ─────────────────────────────────────────────────────

impl WarehouseStore for SqliteStore {
  type Error = crate::Error;

  // ── Dimensions — reads ────────────────────────────────────────────────────

  async fn current_version<'a>(
    &'a self,
    kind: DimensionKind,
    natural_id: &'a str,
  ) -> Result<Option<DimensionRow>> {
    self
      .query_dimension_row(
        format!(
          "SELECT {DIMENSION_COLUMNS} FROM dimension_rows
           WHERE kind = ?1 AND natural_id = ?2 AND is_current = 1"
        ),
        vec![kind.to_string(), natural_id.to_owned()],
      )
      .await
  }

  async fn version_as_of<'a>(
    &'a self,
    kind: DimensionKind,
    natural_id: &'a str,
    as_of: DateTime<Utc>,
  ) -> Result<Option<DimensionRow>> {
    self
      .query_dimension_row(
        format!(
          "SELECT {DIMENSION_COLUMNS} FROM dimension_rows
           WHERE kind = ?1 AND natural_id = ?2
             AND effective_date <= ?3
             AND (expiration_date IS NULL OR expiration_date > ?3)"
        ),
        vec![kind.to_string(), natural_id.to_owned(), encode_dt(as_of)],
      )
      .await
  }

  async fn versions<'a>(
    &'a self,
    kind: DimensionKind,
    natural_id: &'a str,
  ) -> Result<Vec<DimensionRow>> {
    let kind_str = kind.to_string();
    let natural_id = natural_id.to_owned();

    let raws: Vec<RawDimensionRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DIMENSION_COLUMNS} FROM dimension_rows
           WHERE kind = ?1 AND natural_id = ?2
           ORDER BY effective_date"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![kind_str, natural_id],
            RawDimensionRow::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDimensionRow::into_row).collect()
  }

  // ── Dimensions — atomic writes ────────────────────────────────────────────

  async fn insert_first_version(&self, row: DimensionRow) -> Result<InsertOutcome> {
    let encoded = EncodedDimensionRow::new(&row)?;

    // Taking the write lock up front makes check-then-insert atomic even
    // across processes; the partial unique index is the last line of defence.
    let existing: Option<RawDimensionRow> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing = tx
          .query_row(
            &format!(
              "SELECT {DIMENSION_COLUMNS} FROM dimension_rows
               WHERE kind = ?1 AND natural_id = ?2 AND is_current = 1"
            ),
            rusqlite::params![encoded.kind, encoded.natural_id],
            RawDimensionRow::from_row,
          )
          .optional()?;
        if existing.is_none() {
          encoded.insert(&tx)?;
        }
        tx.commit()?;
        Ok(existing)
      })
      .await?;

    match existing {
      None => Ok(InsertOutcome::Inserted),
      Some(raw) => {
        let current = raw.into_row()?;
        tracing::debug!(
          kind = %current.kind,
          natural_id = %current.natural_id,
          "first version already present"
        );
        Ok(InsertOutcome::AlreadyPresent(current))
      }
    }
  }

  async fn replace_current(
    &self,
    expected_current: Uuid,
    expired_at: DateTime<Utc>,
    successor: DimensionRow,
  ) -> Result<SwapOutcome> {
    let expected_str = encode_uuid(expected_current);
    let expired_str = encode_dt(expired_at);
    let encoded = EncodedDimensionRow::new(&successor)?;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let expired = tx.execute(
          "UPDATE dimension_rows
              SET is_current = 0, expiration_date = ?2
            WHERE surrogate_key = ?1 AND is_current = 1",
          rusqlite::params![expected_str, expired_str],
        )?;
        if expired != 1 {
          // Dropping the transaction rolls it back.
          return Ok(SwapOutcome::Conflict);
        }
        encoded.insert(&tx)?;
        tx.commit()?;
        Ok(SwapOutcome::Swapped)
      })
      .await?;

    if outcome == SwapOutcome::Conflict {
      tracing::debug!(%expected_current, "compare-and-swap lost");
    }
    Ok(outcome)
  }

  // ── Date dimension ────────────────────────────────────────────────────────

  async fn upsert_dates(&self, rows: Vec<DateRow>) -> Result<usize> {
    let encoded = rows
      .into_iter()
      .map(|row| {
        let json = serde_json::to_string(&row)?;
        Ok((row, json))
      })
      .collect::<Result<Vec<(DateRow, String)>>>()?;

    let count = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            // Upsert rather than REPLACE: facts reference date_key.
            "INSERT INTO dim_date (
               date_key, full_date, year, quarter, month, year_month, year_week,
               is_weekend, is_business_day,
               is_current_day, is_current_week, is_current_month,
               is_current_quarter, is_current_year, row_json
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT (date_key) DO UPDATE SET
               full_date          = excluded.full_date,
               year               = excluded.year,
               quarter            = excluded.quarter,
               month              = excluded.month,
               year_month         = excluded.year_month,
               year_week          = excluded.year_week,
               is_weekend         = excluded.is_weekend,
               is_business_day    = excluded.is_business_day,
               is_current_day     = excluded.is_current_day,
               is_current_week    = excluded.is_current_week,
               is_current_month   = excluded.is_current_month,
               is_current_quarter = excluded.is_current_quarter,
               is_current_year    = excluded.is_current_year,
               row_json           = excluded.row_json",
          )?;
          for (row, json) in &encoded {
            stmt.execute(rusqlite::params![
              row.date_key,
              row.date_string,
              row.year,
              row.quarter,
              row.month,
              row.year_month,
              row.year_week,
              row.is_weekend,
              row.is_business_day,
              row.is_current_day,
              row.is_current_week,
              row.is_current_month,
              row.is_current_quarter,
              row.is_current_year,
              json,
            ])?;
          }
        }
        tx.commit()?;
        Ok(encoded.len())
      })
      .await?;

    tracing::debug!(count, "date rows upserted");
    Ok(count)
  }

  async fn get_date(&self, date_key: u32) -> Result<Option<DateRow>> {
    let raw: Option<RawDateRow> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {DATE_COLUMNS} FROM dim_date WHERE date_key = ?1"),
              rusqlite::params![date_key],
              RawDateRow::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDateRow::into_row).transpose()
  }

  async fn list_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DateRow>> {
    let start_str = start.format("%Y-%m-%d").to_string();
    let end_str = end.format("%Y-%m-%d").to_string();

    let raws: Vec<RawDateRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DATE_COLUMNS} FROM dim_date
           WHERE full_date >= ?1 AND full_date <= ?2
           ORDER BY date_key"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![start_str, end_str], RawDateRow::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDateRow::into_row).collect()
  }

  async fn refresh_date_flags(&self, reference: NaiveDate) -> Result<usize> {
    let day = reference.format("%Y-%m-%d").to_string();
    let week = year_week(reference);
    let year = reference.year();
    let month = reference.month();
    let quarter = (month - 1) / 3 + 1;

    let touched = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE dim_date SET
             is_current_day     = (full_date = ?1),
             is_current_week    = (year_week = ?2),
             is_current_month   = (year = ?3 AND month = ?4),
             is_current_quarter = (year = ?3 AND quarter = ?5),
             is_current_year    = (year = ?3)",
          rusqlite::params![day, week, year, month, quarter],
        )?)
      })
      .await?;

    tracing::debug!(%reference, touched, "relative date flags refreshed");
    Ok(touched)
  }

  // ── Facts — append-only ───────────────────────────────────────────────────

  async fn append_fact(&self, fact: FactRow) -> Result<()> {
    let raw = RawFact::encode(&fact);

    self
      .conn
      .call(move |conn| {
        raw.insert(conn)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn append_facts(&self, facts: Vec<FactRow>) -> Result<usize> {
    let raws: Vec<RawFact> = facts.iter().map(RawFact::encode).collect();

    let count = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for raw in &raws {
          raw.insert(&tx)?;
        }
        tx.commit()?;
        Ok(raws.len())
      })
      .await?;

    tracing::debug!(count, "facts appended");
    Ok(count)
  }

  async fn get_fact(&self, fact_id: Uuid) -> Result<Option<FactRow>> {
    let id_str = encode_uuid(fact_id);

    let raw: Option<RawFact> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {FACT_COLUMNS} FROM fact_sales_payment WHERE fact_id = ?1"),
              rusqlite::params![id_str],
              RawFact::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawFact::into_fact).transpose()
  }

  async fn facts_for_transaction<'a>(&'a self, transaction_id: &'a str) -> Result<Vec<FactRow>> {
    let transaction_id = transaction_id.to_owned();

    let raws: Vec<RawFact> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {FACT_COLUMNS} FROM fact_sales_payment
           WHERE source_transaction_id = ?1
           ORDER BY rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![transaction_id], RawFact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFact::into_fact).collect()
  }
}
