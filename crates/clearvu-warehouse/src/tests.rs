//! End-to-end tests of the registry, versioning engine and assembler over an
//! in-memory `SqliteStore`.

use std::sync::{
  Arc,
  atomic::{AtomicI64, Ordering},
};

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use clearvu_core::{
  Error,
  date::HolidayCalendar,
  dimension::{
    CustomerAttributes, DimensionAttributes, DimensionKind, ProductAttributes, StockStatus,
    SupplierAttributes,
  },
  fact::{DimensionRole, PaymentStatus, Transaction, TransactionType},
  operational::{Customer, Payment, Product, Representative, Sale, Supplier},
  store::WarehouseStore,
};
use clearvu_store_sqlite::SqliteStore;

use crate::{ChangeOutcome, Warehouse, WarehouseConfig};

async fn warehouse() -> Warehouse<SqliteStore> {
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  Warehouse::new(Arc::new(store))
}

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

fn customer_record(id: &str, credit_limit: &str) -> Customer {
  Customer {
    customer_id:          id.into(),
    name:                 "John Doe".into(),
    email:                "john.doe@example.com".into(),
    credit_limit:         credit_limit.into(),
    discount:             "10%".into(),
    normal_payment_terms: "30 days".into(),
    region_code:          1,
    rep_code:             101,
    settle_terms:         "Net 30".into(),
    customer_category:    "Regular".into(),
  }
}

fn customer(credit_limit: &str) -> DimensionAttributes {
  CustomerAttributes::try_from(&customer_record("C001", credit_limit))
    .unwrap()
    .into()
}

fn product_record(id: &str, stock: i64) -> Product {
  Product {
    product_id:   id.into(),
    brand:        "Acme".into(),
    category:     "Hardware".into(),
    name:         "Bolt".into(),
    description:  "M8 bolt".into(),
    price:        "10".into(),
    stock,
    supplier_ids: vec!["S1".into()],
  }
}

fn representative_record(code: &str) -> Representative {
  Representative {
    rep_code:          code.into(),
    rep_description:   "North region".into(),
    commission_method: "percentage".into(),
    commission:        "5%".into(),
  }
}

fn supplier_record(id: &str) -> Supplier {
  Supplier {
    supplier_id:          id.into(),
    supplier_description: "Fasteners".into(),
    name:                 "Bolt Co".into(),
    contact_name:         "Sam Lee".into(),
    contact_email:        "sam@boltco.example".into(),
    phone:                "555-0100".into(),
    address:              "1 Dock Road".into(),
    city:                 "Leeds".into(),
    country:              "UK".into(),
    postal_code:          "LS1 1AA".into(),
    products_supplied:    12,
  }
}

fn transaction(id: &str, date: DateTime<Utc>) -> Transaction {
  Transaction {
    transaction_id:    id.into(),
    customer_id:       "C001".into(),
    product_id:        "P001".into(),
    representative_id: "R01".into(),
    supplier_id:       None,
    date,
    quantity:          3,
    unit_price:        10.0,
    discount_amount:   5.0,
    payment_amount:    0.0,
    payment_method:    None,
    payment_status:    "completed".into(),
    transaction_type:  "sale".into(),
    payment_date:      None,
    sales_id:          Some(id.into()),
    payment_id:        None,
  }
}

/// Customer, product and representative created on 2025-01-01, plus the
/// 2025 calendar.
async fn seeded() -> Warehouse<SqliteStore> {
  let w = warehouse().await;
  let start = at(2025, 1, 1);
  w.load_customer(&customer_record("C001", "5000"), start).await.unwrap();
  w.load_product(&product_record("P001", 50), start).await.unwrap();
  w.load_representative(&representative_record("R01"), start).await.unwrap();
  w.load_date_dimension(ymd(2025, 1, 1), ymd(2025, 12, 31), &HolidayCalendar::new(), ymd(2025, 6, 1))
    .await
    .unwrap();
  w
}

fn assert_contiguous(history: &[clearvu_core::dimension::DimensionRow]) {
  assert!(!history.is_empty());
  for pair in history.windows(2) {
    assert_eq!(pair[0].expiration_date, Some(pair[1].effective_date));
    assert!(!pair[0].is_current);
  }
  let last = history.last().unwrap();
  assert!(last.is_current);
  assert_eq!(last.expiration_date, None);
  assert_eq!(history.iter().filter(|r| r.is_current).count(), 1);
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn resolve_or_create_is_idempotent() {
  let w = warehouse().await;
  let registry = w.registry();

  let first = registry
    .resolve_or_create(DimensionKind::Customer, "C001", customer("5000"), at(2025, 1, 1))
    .await
    .unwrap();
  let again = registry
    .resolve_or_create(DimensionKind::Customer, "C001", customer("5000"), at(2025, 2, 1))
    .await
    .unwrap();

  assert_eq!(first, again);
  let history = registry.history(DimensionKind::Customer, "C001").await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].effective_date, at(2025, 1, 1));
}

#[tokio::test]
async fn resolve_or_create_versions_on_changed_attributes() {
  let w = warehouse().await;
  let registry = w.registry();

  let old = registry
    .resolve_or_create(DimensionKind::Customer, "C001", customer("5000"), at(2025, 1, 1))
    .await
    .unwrap();
  let new = registry
    .resolve_or_create(DimensionKind::Customer, "C001", customer("7500"), at(2025, 3, 1))
    .await
    .unwrap();

  assert_ne!(old, new);
  assert_eq!(registry.resolve(DimensionKind::Customer, "C001").await.unwrap(), new);

  let history = registry.history(DimensionKind::Customer, "C001").await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[0].surrogate_key, old);
  assert_eq!(history[0].expiration_date, Some(at(2025, 3, 1)));
  assert_contiguous(&history);
}

#[tokio::test]
async fn resolve_unknown_natural_id_is_not_found() {
  let w = warehouse().await;
  let err = w.registry().resolve(DimensionKind::Product, "P404").await.unwrap_err();
  assert!(matches!(
    err,
    Error::NotFound { kind: DimensionKind::Product, ref natural_id } if natural_id == "P404"
  ));
}

#[tokio::test]
async fn resolve_as_of_picks_the_covering_version() {
  let w = warehouse().await;
  let registry = w.registry();
  let v1 = registry
    .resolve_or_create(DimensionKind::Customer, "C001", customer("5000"), at(2025, 1, 1))
    .await
    .unwrap();
  let v2 = registry
    .resolve_or_create(DimensionKind::Customer, "C001", customer("7500"), at(2025, 3, 1))
    .await
    .unwrap();

  let lookup = |t| registry.resolve_as_of(DimensionKind::Customer, "C001", t);
  assert_eq!(lookup(at(2025, 1, 1)).await.unwrap(), v1);
  assert_eq!(lookup(at(2025, 2, 28)).await.unwrap(), v1);
  // Half-open: the boundary belongs to the successor.
  assert_eq!(lookup(at(2025, 3, 1)).await.unwrap(), v2);
  assert_eq!(lookup(at(2030, 1, 1)).await.unwrap(), v2);

  assert!(matches!(
    lookup(at(2024, 12, 31)).await,
    Err(Error::NoCoverage { kind: DimensionKind::Customer, .. })
  ));
  assert!(matches!(
    registry.resolve_as_of(DimensionKind::Customer, "C999", at(2025, 2, 1)).await,
    Err(Error::NotFound { .. })
  ));
}

#[tokio::test]
async fn attributes_of_the_wrong_kind_are_rejected() {
  let w = warehouse().await;
  let err = w
    .registry()
    .resolve_or_create(DimensionKind::Product, "P001", customer("5000"), at(2025, 1, 1))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::KindMismatch { expected: DimensionKind::Product, supplied: DimensionKind::Customer }
  ));
  assert!(
    w.registry()
      .history(DimensionKind::Product, "P001")
      .await
      .unwrap()
      .is_empty()
  );
}

#[tokio::test]
async fn concurrent_creation_leaves_a_single_row() {
  let w = warehouse().await;

  let mut handles = Vec::new();
  for i in 0..8 {
    let registry = w.registry();
    handles.push(tokio::spawn(async move {
      registry
        .resolve_or_create(DimensionKind::Customer, "C001", customer("5000"), at(2025, 1, 1 + i))
        .await
    }));
  }

  let mut keys = Vec::new();
  for handle in handles {
    keys.push(handle.await.unwrap());
  }

  // Whoever lost the race either saw equal attributes or versioned forward;
  // either way exactly one row is current.
  let history = w.registry().history(DimensionKind::Customer, "C001").await.unwrap();
  assert_eq!(history.len(), 1);
  let winner = history[0].surrogate_key;
  for key in keys {
    assert_eq!(key.unwrap(), winner);
  }
}

// ─── Versioning ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn apply_change_creates_unknown_entities() {
  let w = warehouse().await;
  let outcome = w
    .scd()
    .apply_change(DimensionKind::Customer, "C001", customer("5000"), at(2025, 1, 1))
    .await
    .unwrap();

  let ChangeOutcome::Created(key) = outcome else {
    panic!("expected Created, got {outcome:?}");
  };
  assert_eq!(w.registry().resolve(DimensionKind::Customer, "C001").await.unwrap(), key);
}

#[tokio::test]
async fn apply_change_with_identical_attributes_is_a_noop() {
  let w = warehouse().await;
  let scd = w.scd();
  let key = scd
    .apply_change(DimensionKind::Customer, "C001", customer("5000"), at(2025, 1, 1))
    .await
    .unwrap()
    .current_key();

  let outcome = scd
    .apply_change(DimensionKind::Customer, "C001", customer("5000"), at(2025, 6, 1))
    .await
    .unwrap();
  assert_eq!(outcome, ChangeOutcome::Unchanged(key));

  let history = w.registry().history(DimensionKind::Customer, "C001").await.unwrap();
  assert_eq!(history.len(), 1);
  assert!(history[0].is_current);
}

#[tokio::test]
async fn apply_change_expires_and_replaces() {
  let w = warehouse().await;
  let scd = w.scd();
  let first = scd
    .apply_change(DimensionKind::Customer, "C001", customer("5000"), at(2025, 1, 1))
    .await
    .unwrap()
    .current_key();

  let outcome = scd
    .apply_change(DimensionKind::Customer, "C001", customer("9000"), at(2025, 4, 1))
    .await
    .unwrap();
  let ChangeOutcome::Versioned { expired, current } = outcome else {
    panic!("expected Versioned, got {outcome:?}");
  };
  assert_eq!(expired, first);

  let history = w.registry().history(DimensionKind::Customer, "C001").await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[1].surrogate_key, current);
  assert_eq!(history[1].attributes, customer("9000"));
  assert_eq!(history[1].effective_date, at(2025, 4, 1));
  assert_contiguous(&history);
}

#[tokio::test]
async fn backdated_change_is_rejected_without_writing() {
  let w = warehouse().await;
  let scd = w.scd();
  scd
    .apply_change(DimensionKind::Customer, "C001", customer("5000"), at(2025, 1, 1))
    .await
    .unwrap();
  scd
    .apply_change(DimensionKind::Customer, "C001", customer("6000"), at(2025, 3, 1))
    .await
    .unwrap();
  let before = w.registry().history(DimensionKind::Customer, "C001").await.unwrap();

  for effective_at in [at(2025, 2, 1), at(2025, 3, 1)] {
    let err = scd
      .apply_change(DimensionKind::Customer, "C001", customer("7000"), effective_at)
      .await
      .unwrap_err();
    assert!(
      matches!(err, Error::OutOfOrderUpdate { current_effective, .. } if current_effective == at(2025, 3, 1)),
      "unexpected error: {err:?}"
    );
  }

  let after = w.registry().history(DimensionKind::Customer, "C001").await.unwrap();
  assert_eq!(before, after);
}

#[tokio::test]
async fn many_changes_keep_intervals_contiguous() {
  let w = warehouse().await;
  let scd = w.scd();
  for month in 1..=12 {
    let limit = (month * 1000).to_string();
    scd
      .apply_change(DimensionKind::Customer, "C001", customer(&limit), at(2025, month, 1))
      .await
      .unwrap();
  }

  let history = w.registry().history(DimensionKind::Customer, "C001").await.unwrap();
  assert_eq!(history.len(), 12);
  assert_contiguous(&history);
  for (i, row) in history.iter().enumerate() {
    assert_eq!(row.effective_date.month() as usize, i + 1);
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_keep_one_current_row() {
  let w = warehouse().await;
  w.scd()
    .apply_change(DimensionKind::Customer, "C001", customer("0"), at(2025, 1, 1))
    .await
    .unwrap();

  // Every attempt takes a fresh, strictly later timestamp, so a retry after
  // losing a race (or after a writer with a later timestamp got in first)
  // eventually lands.
  let clock = Arc::new(AtomicI64::new(1));
  let mut handles = Vec::new();
  for worker in 0..8_i64 {
    let scd = w.scd();
    let clock = Arc::clone(&clock);
    handles.push(tokio::spawn(async move {
      let mut conflicts = 0_u32;
      for round in 0..5_i64 {
        let limit = (worker * 100 + round + 1).to_string();
        loop {
          let tick = clock.fetch_add(1, Ordering::SeqCst);
          let effective_at = at(2025, 1, 1) + Duration::minutes(tick);
          match scd
            .apply_change(DimensionKind::Customer, "C001", customer(&limit), effective_at)
            .await
          {
            Ok(_) => break,
            Err(Error::ConcurrentModification { .. } | Error::OutOfOrderUpdate { .. }) => {
              conflicts += 1;
            }
            Err(e) => panic!("unexpected error: {e:?}"),
          }
        }
      }
      conflicts
    }));
  }
  for handle in handles {
    handle.await.unwrap();
  }

  let history = w.registry().history(DimensionKind::Customer, "C001").await.unwrap();
  assert_eq!(history.len(), 1 + 8 * 5);
  assert_contiguous(&history);
}

// ─── Date dimension ──────────────────────────────────────────────────────────

#[tokio::test]
async fn first_week_of_2025_loads_and_reloads() {
  let w = warehouse().await;
  let holidays: HolidayCalendar = [(ymd(2025, 1, 1), "New Year's Day")].into_iter().collect();

  let written = w
    .load_date_dimension(ymd(2025, 1, 1), ymd(2025, 1, 7), &holidays, ymd(2025, 1, 3))
    .await
    .unwrap();
  assert_eq!(written, 7);
  let again = w
    .load_date_dimension(ymd(2025, 1, 1), ymd(2025, 1, 7), &holidays, ymd(2025, 1, 3))
    .await
    .unwrap();
  assert_eq!(again, 7);

  let rows = w.store().list_dates(ymd(2025, 1, 1), ymd(2025, 1, 7)).await.unwrap();
  assert_eq!(rows.len(), 7);

  let new_year = &rows[0];
  assert_eq!(new_year.date_key, 20250101);
  assert_eq!(new_year.day_of_week, 3);
  assert!(!new_year.is_weekend);
  assert!(new_year.is_holiday);
  assert!(!new_year.is_business_day);
  assert_eq!(new_year.holiday_name.as_deref(), Some("New Year's Day"));

  let saturday = &rows[3];
  assert_eq!(saturday.full_date, ymd(2025, 1, 4));
  assert!(saturday.is_weekend);
  assert!(!saturday.is_business_day);

  assert!(rows[2].is_current_day);
  assert_eq!(rows.iter().filter(|r| r.is_current_day).count(), 1);
}

#[tokio::test]
async fn inverted_date_range_is_rejected() {
  let w = warehouse().await;
  let err = w
    .load_date_dimension(ymd(2025, 2, 1), ymd(2025, 1, 1), &HolidayCalendar::new(), ymd(2025, 1, 1))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidDateRange { .. }));
}

#[tokio::test]
async fn refreshing_flags_moves_the_current_day() {
  let w = warehouse().await;
  w.load_date_dimension(ymd(2025, 1, 1), ymd(2025, 3, 31), &HolidayCalendar::new(), ymd(2025, 1, 15))
    .await
    .unwrap();

  w.refresh_date_flags(ymd(2025, 3, 10)).await.unwrap();

  let old = w.store().get_date(20250115).await.unwrap().unwrap();
  let new = w.store().get_date(20250310).await.unwrap().unwrap();
  assert!(!old.is_current_day);
  assert!(!old.is_current_month);
  assert!(new.is_current_day);
  assert!(new.is_current_month);
  assert!(old.is_current_quarter && new.is_current_quarter);
}

// ─── Facts ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn assemble_computes_measures_and_persists() {
  let w = seeded().await;
  let assembler = w.assembler();

  let fact = assembler.assemble(&transaction("SL-1", at(2025, 3, 4))).await.unwrap();
  assert_eq!(fact.measures.total_sales_amount, 30.0);
  assert_eq!(fact.measures.net_amount, 25.0);
  assert_eq!(fact.transaction_type, TransactionType::Sale);
  assert_eq!(fact.payment_status, PaymentStatus::Completed);
  assert_eq!(fact.keys.date_key, 20250304);
  assert_eq!(fact.keys.supplier_key, None);

  let stored = assembler.facts_for_transaction("SL-1").await.unwrap();
  assert_eq!(stored.len(), 1);
  assert_eq!(stored[0].fact_id, fact.fact_id);
  assert_eq!(stored[0].measures, fact.measures);
}

#[tokio::test]
async fn oversized_discount_is_rejected_before_appending() {
  let w = seeded().await;
  let assembler = w.assembler();
  let tx = Transaction { discount_amount: 40.0, ..transaction("SL-2", at(2025, 3, 4)) };

  let err = assembler.assemble(&tx).await.unwrap_err();
  assert!(matches!(err, Error::InvalidMeasure(_)));
  assert!(assembler.facts_for_transaction("SL-2").await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_enum_values_are_rejected_first() {
  // No dimensions loaded: enum validation must fail before resolution does.
  let w = warehouse().await;
  let assembler = w.assembler();

  let tx = Transaction { payment_status: "refunded".into(), ..transaction("SL-3", at(2025, 3, 4)) };
  let err = assembler.assemble(&tx).await.unwrap_err();
  assert!(matches!(
    err,
    Error::InvalidEnumValue { field: "payment_status", ref value } if value == "refunded"
  ));

  let tx = Transaction { transaction_type: "refund".into(), ..transaction("SL-3", at(2025, 3, 4)) };
  assert!(matches!(
    assembler.assemble(&tx).await,
    Err(Error::InvalidEnumValue { field: "transaction_type", .. })
  ));
}

#[tokio::test]
async fn payment_without_amount_is_invalid() {
  let w = seeded().await;
  let tx = Transaction {
    transaction_type: "payment".into(),
    quantity: 0,
    unit_price: 0.0,
    discount_amount: 0.0,
    payment_amount: 0.0,
    ..transaction("PM-1", at(2025, 3, 4))
  };
  assert!(matches!(w.assembler().assemble(&tx).await, Err(Error::InvalidMeasure(_))));
}

#[tokio::test]
async fn historical_facts_reference_the_version_in_effect() {
  let w = seeded().await;
  let registry = w.registry();
  let january = registry.resolve(DimensionKind::Customer, "C001").await.unwrap();

  w.load_customer(&customer_record("C001", "9000"), at(2025, 3, 1)).await.unwrap();
  let march = registry.resolve(DimensionKind::Customer, "C001").await.unwrap();
  assert_ne!(january, march);

  // Loaded late, but dated before the change.
  let late = w.assembler().assemble(&transaction("SL-4", at(2025, 2, 14))).await.unwrap();
  assert_eq!(late.keys.customer_key, january);

  let current = w.assembler().assemble(&transaction("SL-5", at(2025, 3, 2))).await.unwrap();
  assert_eq!(current.keys.customer_key, march);
}

#[tokio::test]
async fn missing_required_dimensions_fail_assembly() {
  let w = seeded().await;
  let assembler = w.assembler();

  let tx = Transaction { customer_id: "C404".into(), ..transaction("SL-6", at(2025, 3, 4)) };
  assert!(matches!(
    assembler.assemble(&tx).await,
    Err(Error::DimensionNotFound { role: DimensionRole::Customer, ref natural_id }) if natural_id == "C404"
  ));

  // Every dimension exists, but none of them yet on this date.
  let tx = transaction("SL-7", at(2024, 12, 31));
  assert!(matches!(
    assembler.assemble(&tx).await,
    Err(Error::DimensionNotFound { role: DimensionRole::Customer, .. })
  ));

  let tx = Transaction { representative_id: "R99".into(), ..transaction("SL-8", at(2025, 3, 4)) };
  assert!(matches!(
    assembler.assemble(&tx).await,
    Err(Error::DimensionNotFound { role: DimensionRole::Representative, .. })
  ));

  for id in ["SL-6", "SL-7", "SL-8"] {
    assert!(assembler.facts_for_transaction(id).await.unwrap().is_empty());
  }
}

#[tokio::test]
async fn date_outside_the_calendar_fails_assembly() {
  let w = seeded().await;

  let err = w
    .assembler()
    .assemble(&transaction("SL-9", at(2026, 1, 5)))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::DimensionNotFound { role: DimensionRole::Date, ref natural_id } if natural_id == "20260105"
  ));
}

#[tokio::test]
async fn supplier_is_optional() {
  let w = seeded().await;
  let assembler = w.assembler();

  let tx = Transaction { supplier_id: Some("S404".into()), ..transaction("SL-10", at(2025, 3, 4)) };
  let fact = assembler.assemble(&tx).await.unwrap();
  assert_eq!(fact.keys.supplier_key, None);

  let supplier_key = w.load_supplier(&supplier_record("S1"), at(2025, 1, 1)).await.unwrap();
  let tx = Transaction { supplier_id: Some("S1".into()), ..transaction("SL-11", at(2025, 3, 4)) };
  let fact = assembler.assemble(&tx).await.unwrap();
  assert_eq!(fact.keys.supplier_key, Some(supplier_key));
}

#[tokio::test]
async fn reassembly_appends_a_duplicate() {
  let w = seeded().await;
  let assembler = w.assembler();
  let tx = transaction("SL-12", at(2025, 3, 4));

  let first = assembler.assemble(&tx).await.unwrap();
  let second = assembler.assemble(&tx).await.unwrap();
  assert_ne!(first.fact_id, second.fact_id);

  let stored = assembler.facts_for_transaction("SL-12").await.unwrap();
  assert_eq!(stored.len(), 2);
  assert_eq!(stored[0].fact_id, first.fact_id);
  assert_eq!(stored[1].fact_id, second.fact_id);
}

#[tokio::test]
async fn reversal_cancels_the_original() {
  let w = seeded().await;
  let assembler = w.assembler();
  let original = assembler.assemble(&transaction("SL-13", at(2025, 3, 4))).await.unwrap();

  let reversal = assembler.reverse(original.fact_id).await.unwrap();
  assert_eq!(reversal.reverses, Some(original.fact_id));
  assert_eq!(reversal.keys, original.keys);

  let stored = assembler.facts_for_transaction("SL-13").await.unwrap();
  assert_eq!(stored.len(), 2);
  let quantity: i64 = stored.iter().map(|f| f.measures.quantity_sold).sum();
  let total: f64 = stored.iter().map(|f| f.measures.total_sales_amount).sum();
  let net: f64 = stored.iter().map(|f| f.measures.net_amount).sum();
  assert_eq!(quantity, 0);
  assert_eq!(total, 0.0);
  assert_eq!(net, 0.0);
}

#[tokio::test]
async fn reversing_an_unknown_fact_fails() {
  let w = warehouse().await;
  let id = uuid::Uuid::new_v4();
  assert!(matches!(
    w.assembler().reverse(id).await,
    Err(Error::FactNotFound(missing)) if missing == id
  ));
}

#[tokio::test]
async fn overflowing_measures_are_not_recorded() {
  let w = seeded().await;
  let assembler = w.assembler();
  let tx = Transaction {
    quantity: i64::MAX,
    unit_price: 1e300,
    discount_amount: 0.0,
    ..transaction("SL-14", at(2025, 3, 4))
  };

  assert!(matches!(assembler.assemble(&tx).await, Err(Error::InvalidMeasure(_))));
  assert!(assembler.facts_for_transaction("SL-14").await.unwrap().is_empty());
}

#[tokio::test]
async fn dates_without_a_key_fail_cleanly() {
  let w = seeded().await;
  let assembler = w.assembler();
  let ancient = Utc.with_ymd_and_hms(-5, 3, 1, 0, 0, 0).unwrap();

  let err = assembler.assemble(&transaction("SL-15", ancient)).await.unwrap_err();
  assert!(matches!(err, Error::DimensionNotFound { .. }), "unexpected error: {err:?}");
  assert!(assembler.facts_for_transaction("SL-15").await.unwrap().is_empty());
}

#[tokio::test]
async fn prepare_records_nothing() {
  let w = seeded().await;
  let assembler = w.assembler();

  let fact = assembler.prepare(&transaction("SL-16", at(2025, 3, 4))).await.unwrap();
  assert_eq!(fact.measures.net_amount, 25.0);
  assert!(assembler.facts_for_transaction("SL-16").await.unwrap().is_empty());
}

// ─── Operational loads ───────────────────────────────────────────────────────

#[tokio::test]
async fn product_stock_changes_create_versions() {
  let w = warehouse().await;
  let healthy = w.load_product(&product_record("P001", 50), at(2025, 1, 1)).await.unwrap();
  let same = w.load_product(&product_record("P001", 50), at(2025, 1, 2)).await.unwrap();
  assert_eq!(healthy, same);

  let low = w.load_product(&product_record("P001", 3), at(2025, 2, 1)).await.unwrap();
  assert_ne!(healthy, low);

  let history = w.registry().history(DimensionKind::Product, "P001").await.unwrap();
  let statuses: Vec<_> = history
    .iter()
    .map(|row| match &row.attributes {
      DimensionAttributes::Product(ProductAttributes { stock_status, .. }) => *stock_status,
      other => panic!("unexpected attributes: {other:?}"),
    })
    .collect();
  assert_eq!(statuses, [StockStatus::InStock, StockStatus::LowStock]);
}

#[tokio::test]
async fn configured_low_stock_threshold_applies() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let config = WarehouseConfig { low_stock_threshold: 100, ..WarehouseConfig::default() };
  let w = Warehouse::with_config(Arc::new(store), &config).unwrap();

  w.load_product(&product_record("P001", 50), at(2025, 1, 1)).await.unwrap();
  let history = w.registry().history(DimensionKind::Product, "P001").await.unwrap();
  assert!(matches!(
    &history[0].attributes,
    DimensionAttributes::Product(p) if p.stock_status == StockStatus::LowStock
  ));
}

#[tokio::test]
async fn malformed_operational_records_are_rejected() {
  let w = warehouse().await;
  let mut supplier = supplier_record("S1");
  supplier.contact_email = "not-an-email".into();
  assert!(matches!(
    w.load_supplier(&supplier, at(2025, 1, 1)).await,
    Err(Error::InvalidField { field: "contact_email", .. })
  ));
  assert!(
    w.registry()
      .history(DimensionKind::Supplier, "S1")
      .await
      .unwrap()
      .is_empty()
  );
}

#[tokio::test]
async fn supplier_load_stores_snapshot() {
  let w = warehouse().await;
  w.load_supplier(&supplier_record("S1"), at(2025, 1, 1)).await.unwrap();
  let history = w.registry().history(DimensionKind::Supplier, "S1").await.unwrap();
  assert!(matches!(
    &history[0].attributes,
    DimensionAttributes::Supplier(SupplierAttributes { products_supplied: 12, .. })
  ));
}

#[tokio::test]
async fn sales_and_payments_ingest_as_facts() {
  let w = seeded().await;
  w.load_product(&product_record("P002", 20), at(2025, 1, 1)).await.unwrap();

  let sale = Sale {
    sales_id:          "SL-100".into(),
    product_ids:       vec!["P001".into(), "P002".into()],
    quantity:          2,
    price:             "7.50".into(),
    customer_id:       "C001".into(),
    representative_id: "R01".into(),
    sales_date:        "2025-03-04".into(),
    status:            "completed".into(),
  };
  let facts = w.ingest_sale(&sale).await.unwrap();
  assert_eq!(facts.len(), 2);
  assert!(facts.iter().all(|f| f.measures.net_amount == 15.0));
  assert_ne!(facts[0].keys.product_key, facts[1].keys.product_key);

  let payment = Payment {
    payment_id:        "PM-100".into(),
    customer_id:       "C001".into(),
    amount:            30,
    payment_date:      "2025-03-05T10:00:00Z".into(),
    payment_method:    "bank_transfer".into(),
    status:            "pending".into(),
    representative_id: "R01".into(),
    product_ids:       vec!["P001".into()],
  };
  let fact = w.ingest_payment(&payment).await.unwrap();
  assert_eq!(fact.transaction_type, TransactionType::Payment);
  assert_eq!(fact.payment_status, PaymentStatus::Pending);
  assert_eq!(fact.measures.payment_amount, 30.0);
  assert_eq!(fact.measures.total_sales_amount, 0.0);
  assert_eq!(fact.payment_method.as_deref(), Some("bank_transfer"));
}

#[tokio::test]
async fn failed_sale_line_leaves_the_sale_unrecorded() {
  let w = seeded().await;
  let mut sale = Sale {
    sales_id:          "SL-200".into(),
    product_ids:       vec!["P001".into(), "P404".into()],
    quantity:          1,
    price:             "10".into(),
    customer_id:       "C001".into(),
    representative_id: "R01".into(),
    sales_date:        "2025-03-04".into(),
    status:            "completed".into(),
  };

  let err = w.ingest_sale(&sale).await.unwrap_err();
  assert!(matches!(
    err,
    Error::DimensionNotFound { role: DimensionRole::Product, ref natural_id } if natural_id == "P404"
  ));
  let assembler = w.assembler();
  assert!(assembler.facts_for_transaction("SL-200").await.unwrap().is_empty());

  // Retrying the corrected sale records each line exactly once.
  sale.product_ids = vec!["P001".into()];
  w.ingest_sale(&sale).await.unwrap();
  assert_eq!(assembler.facts_for_transaction("SL-200").await.unwrap().len(), 1);
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn open_from_config_persists_across_reopen() {
  let path = std::env::temp_dir().join(format!("clearvu-{}.db", uuid::Uuid::new_v4()));
  let config = WarehouseConfig { store_path: path.clone(), ..WarehouseConfig::default() };

  let w = Warehouse::<SqliteStore>::open(&config).await.unwrap();
  let key = w.load_customer(&customer_record("C001", "5000"), at(2025, 1, 1)).await.unwrap();
  w.close().await.unwrap();

  let w = Warehouse::<SqliteStore>::open(&config).await.unwrap();
  assert_eq!(w.registry().resolve(DimensionKind::Customer, "C001").await.unwrap(), key);
  w.close().await.unwrap();

  for suffix in ["", "-wal", "-shm"] {
    let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
  }
}
