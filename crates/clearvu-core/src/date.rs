//! The calendar dimension.
//!
//! Date rows are never versioned. Every field is a pure function of the
//! calendar date, the holiday calendar and the fiscal-year start month, so
//! regenerating a range always yields identical rows. The only exception are
//! the "is current …" flags, which depend on a reference date and are
//! recomputed by [`refresh_relative_flags`] without regenerating anything.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Keys ────────────────────────────────────────────────────────────────────

/// Encode a date as its `YYYYMMDD` key; `None` outside the years 1–9999.
pub fn date_key(date: NaiveDate) -> Option<u32> {
  let year = u32::try_from(date.year()).ok().filter(|y| (1..=9999).contains(y))?;
  Some(year * 10_000 + date.month() * 100 + date.day())
}

/// The ISO week-based year and week of `date`, e.g. `"2025-W01"`.
pub fn year_week(date: NaiveDate) -> String {
  let iso = date.iso_week();
  format!("{}-W{:02}", iso.year(), iso.week())
}

/// Decode a `YYYYMMDD` key; `None` if it does not name a real date.
pub fn date_from_key(key: u32) -> Option<NaiveDate> {
  NaiveDate::from_ymd_opt((key / 10_000) as i32, (key / 100) % 100, key % 100)
}

// ─── Holiday calendar ────────────────────────────────────────────────────────

/// A mapping from date to holiday name. Dates not in the map are ordinary
/// days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayCalendar(BTreeMap<NaiveDate, String>);

impl HolidayCalendar {
  pub fn new() -> Self { Self::default() }

  pub fn insert(&mut self, date: NaiveDate, name: impl Into<String>) {
    self.0.insert(date, name.into());
  }

  pub fn holiday(&self, date: NaiveDate) -> Option<&str> {
    self.0.get(&date).map(String::as_str)
  }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl<S: Into<String>> FromIterator<(NaiveDate, S)> for HolidayCalendar {
  fn from_iter<I: IntoIterator<Item = (NaiveDate, S)>>(iter: I) -> Self {
    Self(iter.into_iter().map(|(d, n)| (d, n.into())).collect())
  }
}

// ─── Row ─────────────────────────────────────────────────────────────────────

/// One calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRow {
  /// `YYYYMMDD`.
  pub date_key:           u32,
  pub full_date:          NaiveDate,
  /// `YYYY-MM-DD`.
  pub date_string:        String,

  pub year:               i32,
  pub year_name:          String,

  pub quarter:            u32,
  /// `"Q1 2025"`.
  pub quarter_name:       String,
  /// `"2025-Q1"`.
  pub year_quarter:       String,

  pub month:              u32,
  pub month_name:         String,
  pub month_abbr:         String,
  /// `"2025-01"`.
  pub year_month:         String,
  /// `"January 2025"`.
  pub year_month_name:    String,

  /// ISO week number, 1–53.
  pub week_of_year:       u32,
  /// 1–5.
  pub week_of_month:      u32,
  /// ISO week-based year and week, `"2025-W01"`.
  pub year_week:          String,

  pub day_of_month:       u32,
  pub day_of_year:        u32,
  /// ISO numbering, Monday = 1.
  pub day_of_week:        u32,
  pub day_name:           String,
  pub day_abbr:           String,

  pub is_weekend:         bool,
  pub is_weekday:         bool,
  pub is_holiday:         bool,
  pub is_business_day:    bool,
  pub holiday_name:       Option<String>,

  pub fiscal_year:        i32,
  pub fiscal_quarter:     u32,
  pub fiscal_month:       u32,
  pub fiscal_week:        u32,

  pub is_current_day:     bool,
  pub is_current_week:    bool,
  pub is_current_month:   bool,
  pub is_current_quarter: bool,
  pub is_current_year:    bool,

  pub season:             Season,
}

impl DateRow {
  /// Recompute the "is current …" flags against `reference`.
  pub fn apply_reference(&mut self, reference: NaiveDate) {
    let date = self.full_date;
    let same_year = date.year() == reference.year();

    self.is_current_day = date == reference;
    self.is_current_week = date.iso_week() == reference.iso_week();
    self.is_current_month = same_year && date.month() == reference.month();
    self.is_current_quarter = same_year && quarter_of(date) == quarter_of(reference);
    self.is_current_year = same_year;
  }
}

/// Meteorological season, northern hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Season {
  Winter,
  Spring,
  Summer,
  Fall,
}

impl Season {
  pub fn of(month: u32) -> Self {
    match month {
      3..=5 => Self::Spring,
      6..=8 => Self::Summer,
      9..=11 => Self::Fall,
      _ => Self::Winter,
    }
  }
}

// ─── Generator ───────────────────────────────────────────────────────────────

/// Settings that shape derived fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateDimensionConfig {
  /// Month (1–12) in which the fiscal year begins. `1` means the fiscal
  /// year is the calendar year.
  pub fiscal_year_start_month: u32,
}

impl Default for DateDimensionConfig {
  fn default() -> Self { Self { fiscal_year_start_month: 1 } }
}

/// Builds [`DateRow`]s for a range of days.
#[derive(Debug, Clone, Default)]
pub struct DateDimensionGenerator {
  config: DateDimensionConfig,
}

impl DateDimensionGenerator {
  pub fn new(config: DateDimensionConfig) -> Result<Self> {
    if !(1..=12).contains(&config.fiscal_year_start_month) {
      return Err(Error::InvalidConfig(format!(
        "fiscal_year_start_month must be 1-12, got {}",
        config.fiscal_year_start_month
      )));
    }
    Ok(Self { config })
  }

  pub fn config(&self) -> DateDimensionConfig { self.config }

  /// One row per day in `start..=end`, with relative flags set against
  /// `reference_date`.
  pub fn generate(
    &self,
    start: NaiveDate,
    end: NaiveDate,
    holidays: &HolidayCalendar,
    reference_date: NaiveDate,
  ) -> Result<Vec<DateRow>> {
    // Keys are only well-formed for four-digit years.
    if start > end || start.year() < 1 || end.year() > 9999 {
      return Err(Error::InvalidDateRange { start, end });
    }

    start
      .iter_days()
      .take_while(|d| *d <= end)
      .map(|d| self.row(d, holidays, reference_date))
      .collect()
  }

  /// Build the row for a single day. Fails for dates without a key.
  pub fn row(
    &self,
    date: NaiveDate,
    holidays: &HolidayCalendar,
    reference_date: NaiveDate,
  ) -> Result<DateRow> {
    let key = date_key(date).ok_or(Error::InvalidDateRange { start: date, end: date })?;
    let year = date.year();
    let month = date.month();
    let quarter = quarter_of(date);
    let iso = date.iso_week();
    let weekday = date.weekday();

    let is_weekend = matches!(weekday, Weekday::Sat | Weekday::Sun);
    let holiday_name = holidays.holiday(date).map(str::to_owned);
    let is_holiday = holiday_name.is_some();

    let month_name = date.format("%B").to_string();
    let (fiscal_year, fiscal_month, fiscal_week) = self.fiscal(date);

    let mut row = DateRow {
      date_key: key,
      full_date: date,
      date_string: date.format("%Y-%m-%d").to_string(),

      year,
      year_name: year.to_string(),

      quarter,
      quarter_name: format!("Q{quarter} {year}"),
      year_quarter: format!("{year}-Q{quarter}"),

      month,
      month_abbr: date.format("%b").to_string(),
      year_month: date.format("%Y-%m").to_string(),
      year_month_name: format!("{month_name} {year}"),
      month_name,

      week_of_year: iso.week(),
      week_of_month: (date.day() - 1) / 7 + 1,
      year_week: year_week(date),

      day_of_month: date.day(),
      day_of_year: date.ordinal(),
      day_of_week: weekday.number_from_monday(),
      day_name: date.format("%A").to_string(),
      day_abbr: date.format("%a").to_string(),

      is_weekend,
      is_weekday: !is_weekend,
      is_holiday,
      is_business_day: !is_weekend && !is_holiday,
      holiday_name,

      fiscal_year,
      fiscal_quarter: (fiscal_month - 1) / 3 + 1,
      fiscal_month,
      fiscal_week,

      is_current_day: false,
      is_current_week: false,
      is_current_month: false,
      is_current_quarter: false,
      is_current_year: false,

      season: Season::of(month),
    };
    row.apply_reference(reference_date);
    Ok(row)
  }

  /// `(fiscal_year, fiscal_month, fiscal_week)`. A fiscal year is named
  /// after the calendar year in which it ends.
  fn fiscal(&self, date: NaiveDate) -> (i32, u32, u32) {
    let start_month = self.config.fiscal_year_start_month;
    let month = date.month();
    let fiscal_month = (month + 12 - start_month) % 12 + 1;

    let start_year = if month >= start_month { date.year() } else { date.year() - 1 };
    let fiscal_year = if start_month == 1 { start_year } else { start_year + 1 };

    let fiscal_start = NaiveDate::from_ymd_opt(start_year, start_month, 1)
      .unwrap_or(date);
    let fiscal_week = ((date - fiscal_start).num_days() / 7 + 1) as u32;

    (fiscal_year, fiscal_month, fiscal_week)
  }
}

/// Recompute only the relative "is current …" flags of already generated
/// rows.
pub fn refresh_relative_flags(rows: &mut [DateRow], reference_date: NaiveDate) {
  for row in rows {
    row.apply_reference(reference_date);
  }
}

fn quarter_of(date: NaiveDate) -> u32 { (date.month() - 1) / 3 + 1 }
