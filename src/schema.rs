use std::collections::HashMap;

use crate::error::{EtlError, Result};

// Column names of the sales dataset, as they appear in the CSV header.
pub const COL_TOWN: &str = "Town";
pub const COL_PROPERTY_TYPE: &str = "PropertyType";
pub const COL_SALE_AMOUNT: &str = "SaleAmount";
pub const COL_ASSESSED_VALUE: &str = "AssessedValue";
pub const COL_SALE_DATE: &str = "SaleDate";
pub const COL_YEAR: &str = "Year";

// Columns that may appear in the file but are pruned at the source
// boundary and never reach a record.
pub const DROPPED_COLUMNS: [&str; 4] = [
    "Non Use Code",
    "Assessor Remarks",
    "OPM Remarks",
    "Location",
];

/// Semantic column types the source knows how to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Double,
    Integer,
    /// Raw date text; normalization parses it later.
    Date,
}

/// One declared column of the source dataset.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: &'static str,
    pub column_type: ColumnType,
    /// Droppable columns are tolerated in the header but never stored.
    pub droppable: bool,
}

impl Column {
    fn declared(name: &'static str, column_type: ColumnType) -> Self {
        Self { name, column_type, droppable: false }
    }

    fn droppable(name: &'static str) -> Self {
        Self { name, column_type: ColumnType::Text, droppable: true }
    }
}

/// The declared schema for a pipeline run.
///
/// Replaces header/type inference: the column set and types are fixed up
/// front, and the CSV header is validated against them before any record
/// is read. Read-only after construction.
#[derive(Debug, Clone)]
pub struct SourceSchema {
    pub columns: Vec<Column>,
}

impl SourceSchema {
    /// Validate a CSV header row against the declared schema.
    ///
    /// Every non-droppable column must be present; droppable columns may
    /// be absent (nothing to prune in that case). Returns the header
    /// position of each declared column found.
    pub fn validate_header(&self, header: &[&str]) -> Result<HeaderMap> {
        if header.is_empty() {
            return Err(EtlError::Schema("header row is empty".to_string()));
        }

        let mut positions: HashMap<&'static str, usize> = HashMap::new();
        let mut missing: Vec<&str> = Vec::new();

        for column in &self.columns {
            // First occurrence wins if the file repeats a column name.
            match header.iter().position(|h| h.trim() == column.name) {
                Some(idx) => {
                    positions.insert(column.name, idx);
                }
                None if column.droppable => {}
                None => missing.push(column.name),
            }
        }

        if !missing.is_empty() {
            return Err(EtlError::Schema(format!(
                "header is missing declared column(s): {}",
                missing.join(", ")
            )));
        }

        Ok(HeaderMap { positions })
    }
}

/// Header positions resolved for one file against the declared schema.
#[derive(Debug, Clone)]
pub struct HeaderMap {
    positions: HashMap<&'static str, usize>,
}

impl HeaderMap {
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }
}

/// The declared schema of the real estate sales dataset.
pub fn sale_schema() -> SourceSchema {
    SourceSchema {
        columns: vec![
            Column::declared(COL_TOWN, ColumnType::Text),
            Column::declared(COL_PROPERTY_TYPE, ColumnType::Text),
            Column::declared(COL_SALE_AMOUNT, ColumnType::Double),
            Column::declared(COL_ASSESSED_VALUE, ColumnType::Double),
            Column::declared(COL_SALE_DATE, ColumnType::Date),
            Column::declared(COL_YEAR, ColumnType::Integer),
            Column::droppable(DROPPED_COLUMNS[0]),
            Column::droppable(DROPPED_COLUMNS[1]),
            Column::droppable(DROPPED_COLUMNS[2]),
            Column::droppable(DROPPED_COLUMNS[3]),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_full_header() {
        let schema = sale_schema();
        let header = vec![
            "Town", "PropertyType", "SaleAmount", "AssessedValue", "SaleDate", "Year",
            "Non Use Code", "Assessor Remarks", "OPM Remarks", "Location",
        ];

        let map = schema.validate_header(&header).unwrap();
        assert_eq!(map.position(COL_TOWN), Some(0));
        assert_eq!(map.position(COL_YEAR), Some(5));
        assert_eq!(map.position("Location"), Some(9));
    }

    #[test]
    fn test_accepts_header_without_droppable_columns() {
        let schema = sale_schema();
        let header = vec![
            "Town", "PropertyType", "SaleAmount", "AssessedValue", "SaleDate", "Year",
        ];

        let map = schema.validate_header(&header).unwrap();
        assert_eq!(map.position(COL_SALE_AMOUNT), Some(2));
        assert_eq!(map.position("Location"), None);
    }

    #[test]
    fn test_rejects_missing_required_column() {
        let schema = sale_schema();
        let header = vec!["Town", "PropertyType", "AssessedValue", "SaleDate", "Year"];

        let err = schema.validate_header(&header).unwrap_err();
        match err {
            EtlError::Schema(msg) => assert!(msg.contains("SaleAmount")),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_empty_header() {
        let schema = sale_schema();
        assert!(schema.validate_header(&[]).is_err());
    }

    #[test]
    fn test_header_names_are_trimmed() {
        let schema = sale_schema();
        let header = vec![
            " Town ", "PropertyType", "SaleAmount", "AssessedValue", "SaleDate", "Year",
        ];

        let map = schema.validate_header(&header).unwrap();
        assert_eq!(map.position(COL_TOWN), Some(0));
    }
}
