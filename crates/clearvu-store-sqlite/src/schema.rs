//! SQL schema for the ClearVu SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Every version of every SCD Type 2 dimension entity.
-- Rows are only ever inserted, or expired exactly once.
CREATE TABLE IF NOT EXISTS dimension_rows (
    surrogate_key   TEXT PRIMARY KEY,
    kind            TEXT NOT NULL,   -- 'customer' | 'product' | 'representative' | 'supplier'
    natural_id      TEXT NOT NULL,
    attributes_json TEXT NOT NULL,   -- JSON payload of the attribute snapshot
    effective_date  TEXT NOT NULL,   -- fixed-width RFC 3339 UTC
    expiration_date TEXT,            -- NULL while open-ended
    is_current      INTEGER NOT NULL,
    CHECK (is_current IN (0, 1)),
    CHECK ((is_current = 1) = (expiration_date IS NULL)),
    CHECK (expiration_date IS NULL OR expiration_date > effective_date)
);

-- At most one current version per entity, whatever the interleaving.
CREATE UNIQUE INDEX IF NOT EXISTS dimension_rows_current_idx
    ON dimension_rows(kind, natural_id) WHERE is_current = 1;
CREATE INDEX IF NOT EXISTS dimension_rows_natural_idx
    ON dimension_rows(kind, natural_id, effective_date);

-- Calendar dimension. The full row lives in row_json; the queryable and
-- refreshable fields are mirrored as columns.
CREATE TABLE IF NOT EXISTS dim_date (
    date_key           INTEGER PRIMARY KEY,   -- YYYYMMDD
    full_date          TEXT NOT NULL UNIQUE,  -- YYYY-MM-DD
    year               INTEGER NOT NULL,
    quarter            INTEGER NOT NULL,
    month              INTEGER NOT NULL,
    year_month         TEXT NOT NULL,
    year_week          TEXT NOT NULL,
    is_weekend         INTEGER NOT NULL,
    is_business_day    INTEGER NOT NULL,
    is_current_day     INTEGER NOT NULL DEFAULT 0,
    is_current_week    INTEGER NOT NULL DEFAULT 0,
    is_current_month   INTEGER NOT NULL DEFAULT 0,
    is_current_quarter INTEGER NOT NULL DEFAULT 0,
    is_current_year    INTEGER NOT NULL DEFAULT 0,
    row_json           TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS dim_date_year_month_idx ON dim_date(year_month);
CREATE INDEX IF NOT EXISTS dim_date_business_idx   ON dim_date(is_business_day);

-- Facts are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS fact_sales_payment (
    fact_id               TEXT PRIMARY KEY,
    source_transaction_id TEXT NOT NULL,
    customer_key          TEXT NOT NULL REFERENCES dimension_rows(surrogate_key),
    product_key           TEXT NOT NULL REFERENCES dimension_rows(surrogate_key),
    representative_key    TEXT NOT NULL REFERENCES dimension_rows(surrogate_key),
    date_key              INTEGER NOT NULL REFERENCES dim_date(date_key),
    supplier_key          TEXT REFERENCES dimension_rows(surrogate_key),
    quantity_sold         INTEGER NOT NULL,
    unit_price            REAL NOT NULL,
    total_sales_amount    REAL NOT NULL,
    discount_amount       REAL NOT NULL,
    payment_amount        REAL NOT NULL,
    net_amount            REAL NOT NULL,
    transaction_type      TEXT NOT NULL,
    payment_method        TEXT,
    payment_status        TEXT NOT NULL,
    transaction_date      TEXT NOT NULL,
    payment_date          TEXT,
    sales_id              TEXT,
    payment_id            TEXT,
    reverses              TEXT REFERENCES fact_sales_payment(fact_id),
    recorded_at           TEXT NOT NULL,
    CHECK (transaction_type IN ('sale', 'payment', 'both')),
    CHECK (payment_status IN ('pending', 'completed', 'failed', 'cancelled'))
);

CREATE INDEX IF NOT EXISTS facts_transaction_idx ON fact_sales_payment(source_transaction_id);
CREATE INDEX IF NOT EXISTS facts_customer_idx    ON fact_sales_payment(customer_key);
CREATE INDEX IF NOT EXISTS facts_product_idx     ON fact_sales_payment(product_key);
CREATE INDEX IF NOT EXISTS facts_date_idx        ON fact_sales_payment(date_key);
CREATE INDEX IF NOT EXISTS facts_status_idx      ON fact_sales_payment(payment_status);

PRAGMA user_version = 1;
";
