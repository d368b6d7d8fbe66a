//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that lexical comparison in SQL matches
//! chronological order. Attribute snapshots and date rows are stored as
//! compact JSON. UUIDs are stored as hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use clearvu_core::{
  date::DateRow,
  dimension::{DimensionAttributes, DimensionKind, DimensionRow},
  fact::{DimensionKeys, FactRow, Measures, PaymentStatus, TransactionType},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enumerations ────────────────────────────────────────────────────────────

/// Decode a column holding the `Display` form of a strum enum.
pub fn decode_enum<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  s.parse().map_err(|_| Error::Decode {
    column,
    value: s.to_owned(),
  })
}

// ─── Dimension rows ──────────────────────────────────────────────────────────

pub const DIMENSION_COLUMNS: &str = "surrogate_key, kind, natural_id, attributes_json, \
                                     effective_date, expiration_date, is_current";

/// Column values of a [`DimensionRow`], ready to bind.
pub struct EncodedDimensionRow {
  pub surrogate_key:   String,
  pub kind:            String,
  pub natural_id:      String,
  pub attributes_json: String,
  pub effective_date:  String,
  pub expiration_date: Option<String>,
  pub is_current:      bool,
}

impl EncodedDimensionRow {
  pub fn new(row: &DimensionRow) -> Result<Self> {
    Ok(Self {
      surrogate_key:   encode_uuid(row.surrogate_key),
      kind:            row.kind.to_string(),
      natural_id:      row.natural_id.clone(),
      attributes_json: row.attributes.to_json()?.to_string(),
      effective_date:  encode_dt(row.effective_date),
      expiration_date: row.expiration_date.map(encode_dt),
      is_current:      row.is_current,
    })
  }

  pub fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
    conn.execute(
      &format!(
        "INSERT INTO dimension_rows ({DIMENSION_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
      ),
      rusqlite::params![
        self.surrogate_key,
        self.kind,
        self.natural_id,
        self.attributes_json,
        self.effective_date,
        self.expiration_date,
        self.is_current,
      ],
    )
  }
}

/// Raw strings read directly from a `dimension_rows` row.
pub struct RawDimensionRow {
  pub surrogate_key:   String,
  pub kind:            String,
  pub natural_id:      String,
  pub attributes_json: String,
  pub effective_date:  String,
  pub expiration_date: Option<String>,
  pub is_current:      bool,
}

impl RawDimensionRow {
  /// Read a row selected with [`DIMENSION_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      surrogate_key:   row.get(0)?,
      kind:            row.get(1)?,
      natural_id:      row.get(2)?,
      attributes_json: row.get(3)?,
      effective_date:  row.get(4)?,
      expiration_date: row.get(5)?,
      is_current:      row.get(6)?,
    })
  }

  pub fn into_row(self) -> Result<DimensionRow> {
    let kind: DimensionKind = decode_enum("kind", &self.kind)?;
    let data: serde_json::Value = serde_json::from_str(&self.attributes_json)?;

    Ok(DimensionRow {
      surrogate_key: decode_uuid(&self.surrogate_key)?,
      kind,
      natural_id: self.natural_id,
      attributes: DimensionAttributes::from_parts(kind, data)?,
      effective_date: decode_dt(&self.effective_date)?,
      expiration_date: self.expiration_date.as_deref().map(decode_dt).transpose()?,
      is_current: self.is_current,
    })
  }
}

// ─── Date rows ───────────────────────────────────────────────────────────────

pub const DATE_COLUMNS: &str = "row_json, is_current_day, is_current_week, \
                                is_current_month, is_current_quarter, is_current_year";

/// The stored JSON plus the authoritative relative-flag columns, which may
/// have been refreshed since the JSON was written.
pub struct RawDateRow {
  pub row_json:           String,
  pub is_current_day:     bool,
  pub is_current_week:    bool,
  pub is_current_month:   bool,
  pub is_current_quarter: bool,
  pub is_current_year:    bool,
}

impl RawDateRow {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      row_json:           row.get(0)?,
      is_current_day:     row.get(1)?,
      is_current_week:    row.get(2)?,
      is_current_month:   row.get(3)?,
      is_current_quarter: row.get(4)?,
      is_current_year:    row.get(5)?,
    })
  }

  pub fn into_row(self) -> Result<DateRow> {
    let mut row: DateRow = serde_json::from_str(&self.row_json)?;
    row.is_current_day = self.is_current_day;
    row.is_current_week = self.is_current_week;
    row.is_current_month = self.is_current_month;
    row.is_current_quarter = self.is_current_quarter;
    row.is_current_year = self.is_current_year;
    Ok(row)
  }
}

// ─── Fact rows ───────────────────────────────────────────────────────────────

pub const FACT_COLUMNS: &str = "fact_id, source_transaction_id, customer_key, product_key, \
   representative_key, date_key, supplier_key, quantity_sold, unit_price, \
   total_sales_amount, discount_amount, payment_amount, net_amount, \
   transaction_type, payment_method, payment_status, transaction_date, \
   payment_date, sales_id, payment_id, reverses, recorded_at";

/// Raw column values of a `fact_sales_payment` row.
pub struct RawFact {
  pub fact_id:               String,
  pub source_transaction_id: String,
  pub customer_key:          String,
  pub product_key:           String,
  pub representative_key:    String,
  pub date_key:              u32,
  pub supplier_key:          Option<String>,
  pub quantity_sold:         i64,
  pub unit_price:            f64,
  pub total_sales_amount:    f64,
  pub discount_amount:       f64,
  pub payment_amount:        f64,
  pub net_amount:            f64,
  pub transaction_type:      String,
  pub payment_method:        Option<String>,
  pub payment_status:        String,
  pub transaction_date:      String,
  pub payment_date:          Option<String>,
  pub sales_id:              Option<String>,
  pub payment_id:            Option<String>,
  pub reverses:              Option<String>,
  pub recorded_at:           String,
}

impl RawFact {
  pub fn encode(fact: &FactRow) -> Self {
    Self {
      fact_id:               encode_uuid(fact.fact_id),
      source_transaction_id: fact.source_transaction_id.clone(),
      customer_key:          encode_uuid(fact.keys.customer_key),
      product_key:           encode_uuid(fact.keys.product_key),
      representative_key:    encode_uuid(fact.keys.representative_key),
      date_key:              fact.keys.date_key,
      supplier_key:          fact.keys.supplier_key.map(encode_uuid),
      quantity_sold:         fact.measures.quantity_sold,
      unit_price:            fact.measures.unit_price,
      total_sales_amount:    fact.measures.total_sales_amount,
      discount_amount:       fact.measures.discount_amount,
      payment_amount:        fact.measures.payment_amount,
      net_amount:            fact.measures.net_amount,
      transaction_type:      fact.transaction_type.to_string(),
      payment_method:        fact.payment_method.clone(),
      payment_status:        fact.payment_status.to_string(),
      transaction_date:      encode_dt(fact.transaction_date),
      payment_date:          fact.payment_date.map(encode_dt),
      sales_id:              fact.sales_id.clone(),
      payment_id:            fact.payment_id.clone(),
      reverses:              fact.reverses.map(encode_uuid),
      recorded_at:           encode_dt(fact.recorded_at),
    }
  }

  /// Read a row selected with [`FACT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      fact_id:               row.get(0)?,
      source_transaction_id: row.get(1)?,
      customer_key:          row.get(2)?,
      product_key:           row.get(3)?,
      representative_key:    row.get(4)?,
      date_key:              row.get(5)?,
      supplier_key:          row.get(6)?,
      quantity_sold:         row.get(7)?,
      unit_price:            row.get(8)?,
      total_sales_amount:    row.get(9)?,
      discount_amount:       row.get(10)?,
      payment_amount:        row.get(11)?,
      net_amount:            row.get(12)?,
      transaction_type:      row.get(13)?,
      payment_method:        row.get(14)?,
      payment_status:        row.get(15)?,
      transaction_date:      row.get(16)?,
      payment_date:          row.get(17)?,
      sales_id:              row.get(18)?,
      payment_id:            row.get(19)?,
      reverses:              row.get(20)?,
      recorded_at:           row.get(21)?,
    })
  }

  pub fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
    conn.execute(
      &format!(
        "INSERT INTO fact_sales_payment ({FACT_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                 ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)"
      ),
      rusqlite::params![
        self.fact_id,
        self.source_transaction_id,
        self.customer_key,
        self.product_key,
        self.representative_key,
        self.date_key,
        self.supplier_key,
        self.quantity_sold,
        self.unit_price,
        self.total_sales_amount,
        self.discount_amount,
        self.payment_amount,
        self.net_amount,
        self.transaction_type,
        self.payment_method,
        self.payment_status,
        self.transaction_date,
        self.payment_date,
        self.sales_id,
        self.payment_id,
        self.reverses,
        self.recorded_at,
      ],
    )
  }

  pub fn into_fact(self) -> Result<FactRow> {
    let transaction_type: TransactionType =
      decode_enum("transaction_type", &self.transaction_type)?;
    let payment_status: PaymentStatus = decode_enum("payment_status", &self.payment_status)?;

    Ok(FactRow {
      fact_id: decode_uuid(&self.fact_id)?,
      source_transaction_id: self.source_transaction_id,
      keys: DimensionKeys {
        customer_key:       decode_uuid(&self.customer_key)?,
        product_key:        decode_uuid(&self.product_key)?,
        representative_key: decode_uuid(&self.representative_key)?,
        date_key:           self.date_key,
        supplier_key:       self.supplier_key.as_deref().map(decode_uuid).transpose()?,
      },
      measures: Measures {
        quantity_sold:      self.quantity_sold,
        unit_price:         self.unit_price,
        total_sales_amount: self.total_sales_amount,
        discount_amount:    self.discount_amount,
        payment_amount:     self.payment_amount,
        net_amount:         self.net_amount,
      },
      transaction_type,
      payment_method: self.payment_method,
      payment_status,
      transaction_date: decode_dt(&self.transaction_date)?,
      payment_date: self.payment_date.as_deref().map(decode_dt).transpose()?,
      sales_id: self.sales_id,
      payment_id: self.payment_id,
      reverses: self.reverses.as_deref().map(decode_uuid).transpose()?,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}
