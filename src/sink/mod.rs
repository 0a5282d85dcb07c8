// Destinations for pipeline output: PostgreSQL and an in-memory store.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{EtlError, Result};
use crate::pipeline::aggregate::YearlySales;
use crate::pipeline::categorize::CategorizedSale;
use crate::types::WriteMode;

pub use memory::InMemorySink;
pub use postgres::PostgresSink;

// Destination column names.
pub const SINK_COL_TOWN: &str = "Town";
pub const SINK_COL_PROPERTY_TYPE: &str = "PropertyType";
pub const SINK_COL_SALE_AMOUNT: &str = "SaleAmount";
pub const SINK_COL_ASSESSED_VALUE: &str = "AssessedValue";
pub const SINK_COL_SALE_DATE: &str = "SaleDate";
pub const SINK_COL_YEAR: &str = "Year";
pub const SINK_COL_PROPERTY_CATEGORY: &str = "PropertyCategory";
pub const SINK_COL_TOTAL_SALE_AMOUNT: &str = "TotalSaleAmount";

/// SQL type of a destination column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Double,
    Integer,
    Date,
}

/// One destination column.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkColumn {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub nullable: bool,
}

impl SinkColumn {
    fn required(name: &'static str, sql_type: SqlType) -> Self {
        Self { name, sql_type, nullable: false }
    }

    fn nullable(name: &'static str, sql_type: SqlType) -> Self {
        Self { name, sql_type, nullable: true }
    }
}

/// One cell value headed for the destination.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Double(f64),
    Integer(i32),
    Date(NaiveDate),
    Null,
}

impl SqlValue {
    fn from_opt_integer(value: Option<i32>) -> Self {
        value.map(SqlValue::Integer).unwrap_or(SqlValue::Null)
    }

    fn from_opt_date(value: Option<NaiveDate>) -> Self {
        value.map(SqlValue::Date).unwrap_or(SqlValue::Null)
    }
}

/// A fully materialized set of rows for one destination table.
#[derive(Debug, Clone)]
pub struct SinkBatch {
    pub columns: Vec<SinkColumn>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl SinkBatch {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Something that can persist a batch under a table name.
#[async_trait]
pub trait SinkWriter: Send + Sync {
    /// Write the batch, honoring the write mode. Overwrite replaces the
    /// table as one atomic step; append adds rows to what is already
    /// there. Returns the number of rows written.
    async fn write(&self, table: &str, batch: &SinkBatch, mode: WriteMode) -> Result<u64>;
}

/// Column layout of the per-sale destination table.
pub fn sale_columns() -> Vec<SinkColumn> {
    vec![
        SinkColumn::required(SINK_COL_TOWN, SqlType::Text),
        SinkColumn::required(SINK_COL_PROPERTY_TYPE, SqlType::Text),
        SinkColumn::required(SINK_COL_SALE_AMOUNT, SqlType::Double),
        SinkColumn::required(SINK_COL_ASSESSED_VALUE, SqlType::Double),
        SinkColumn::nullable(SINK_COL_SALE_DATE, SqlType::Date),
        SinkColumn::nullable(SINK_COL_YEAR, SqlType::Integer),
        SinkColumn::required(SINK_COL_PROPERTY_CATEGORY, SqlType::Text),
    ]
}

/// Column layout of the yearly totals table.
pub fn aggregate_columns() -> Vec<SinkColumn> {
    vec![
        SinkColumn::nullable(SINK_COL_YEAR, SqlType::Integer),
        SinkColumn::required(SINK_COL_TOTAL_SALE_AMOUNT, SqlType::Double),
    ]
}

pub fn batch_from_sales(sales: &[CategorizedSale]) -> SinkBatch {
    let rows = sales
        .iter()
        .map(|sale| {
            vec![
                SqlValue::Text(sale.town.clone()),
                SqlValue::Text(sale.property_type.clone()),
                SqlValue::Double(sale.sale_amount),
                SqlValue::Double(sale.assessed_value),
                SqlValue::from_opt_date(sale.sale_date),
                SqlValue::from_opt_integer(sale.year),
                SqlValue::Text(sale.property_category.clone()),
            ]
        })
        .collect();

    SinkBatch {
        columns: sale_columns(),
        rows,
    }
}

pub fn batch_from_aggregates(totals: &[YearlySales]) -> SinkBatch {
    let rows = totals
        .iter()
        .map(|group| {
            vec![
                SqlValue::from_opt_integer(group.year),
                SqlValue::Double(group.total_sale_amount),
            ]
        })
        .collect();

    SinkBatch {
        columns: aggregate_columns(),
        rows,
    }
}

/// Check a name against PostgreSQL identifier rules before it is quoted
/// into DDL.
pub fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(EtlError::Config(format!("{} name must not be empty", kind)));
    }
    if name.len() > 63 {
        return Err(EtlError::Config(format!(
            "{} name '{}' exceeds PostgreSQL's 63 byte identifier limit",
            kind, name
        )));
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap_or('_');
    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(EtlError::Config(format!(
            "{} name '{}' must start with a letter or underscore",
            kind, name
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(EtlError::Config(format!(
            "{} name '{}' may only contain letters, digits and underscores",
            kind, name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_sale() -> CategorizedSale {
        CategorizedSale {
            town: "Ansonia".to_string(),
            property_type: "Commercial".to_string(),
            sale_amount: 325000.0,
            assessed_value: 150500.0,
            sale_date: NaiveDate::from_ymd_opt(2021, 9, 13),
            year: Some(2021),
            property_category: "Commercial".to_string(),
        }
    }

    #[test]
    fn test_sale_batch_shape() {
        let batch = batch_from_sales(&[create_test_sale()]);
        assert_eq!(batch.columns.len(), 7);
        assert_eq!(batch.rows.len(), 1);
        assert_eq!(batch.rows[0].len(), batch.columns.len());
        assert_eq!(batch.rows[0][0], SqlValue::Text("Ansonia".to_string()));
        assert_eq!(batch.rows[0][6], SqlValue::Text("Commercial".to_string()));
    }

    #[test]
    fn test_null_year_and_date_become_sql_null() {
        let mut sale = create_test_sale();
        sale.sale_date = None;
        sale.year = None;

        let batch = batch_from_sales(&[sale]);
        assert_eq!(batch.rows[0][4], SqlValue::Null);
        assert_eq!(batch.rows[0][5], SqlValue::Null);
    }

    #[test]
    fn test_aggregate_batch_shape() {
        let totals = vec![
            YearlySales { year: None, total_sale_amount: 10.0 },
            YearlySales { year: Some(2020), total_sale_amount: 99.5 },
        ];

        let batch = batch_from_aggregates(&totals);
        assert_eq!(batch.columns.len(), 2);
        assert_eq!(batch.rows[0][0], SqlValue::Null);
        assert_eq!(batch.rows[1][0], SqlValue::Integer(2020));
        assert_eq!(batch.rows[1][1], SqlValue::Double(99.5));
    }

    #[test]
    fn test_identifier_rules() {
        assert!(validate_identifier("table", "realEstate").is_ok());
        assert!(validate_identifier("table", "_staging").is_ok());
        assert!(validate_identifier("table", "").is_err());
        assert!(validate_identifier("table", "9lives").is_err());
        assert!(validate_identifier("table", "bad-name").is_err());
        assert!(validate_identifier("table", "has space").is_err());
        assert!(validate_identifier("table", &"x".repeat(64)).is_err());
        assert!(validate_identifier("table", &"x".repeat(63)).is_ok());
    }
}
