use chrono::NaiveDate;
use tracing::debug;

use crate::pipeline::cleaning::CleanSale;

/// Date layout the source files use, e.g. "09/13/2021".
pub const SALE_DATE_FORMAT: &str = "%m/%d/%Y";

/// A sale whose date text has been converted to a typed calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSale {
    pub town: String,
    pub property_type: String,
    pub sale_amount: f64,
    pub assessed_value: f64,
    pub sale_date: Option<NaiveDate>,
    pub year: Option<i32>,
}

/// How the date cell of one row was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOutcome {
    Parsed,
    /// The cell was already null.
    Missing,
    /// The cell held text the format did not match; the date became null.
    Unparseable,
}

/// Converts date text into `NaiveDate`. A cell that does not match the
/// format becomes a null date; it never fails the row or the run.
pub struct Normalizer;

impl Normalizer {
    pub fn normalize(&self, row: CleanSale) -> (NormalizedSale, DateOutcome) {
        let (sale_date, outcome) = match row.sale_date.as_deref() {
            None => (None, DateOutcome::Missing),
            Some(raw) => match NaiveDate::parse_from_str(raw.trim(), SALE_DATE_FORMAT) {
                Ok(date) => (Some(date), DateOutcome::Parsed),
                Err(_) => {
                    debug!(value = raw, "Sale date did not match format; kept as null");
                    (None, DateOutcome::Unparseable)
                }
            },
        };

        let normalized = NormalizedSale {
            town: row.town,
            property_type: row.property_type,
            sale_amount: row.sale_amount,
            assessed_value: row.assessed_value,
            sale_date,
            year: row.year,
        };
        (normalized, outcome)
    }
}
