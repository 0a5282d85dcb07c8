use crate::types::RawSale;

/// A sale that passed the completeness and range checks. The fields the
/// checks cover are no longer optional.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanSale {
    pub town: String,
    pub property_type: String,
    pub sale_amount: f64,
    pub assessed_value: f64,
    pub sale_date: Option<String>,
    pub year: Option<i32>,
}

/// Why the cleaner rejected a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Town, PropertyType or SaleAmount was null.
    MissingRequired,
    /// SaleAmount was not strictly positive, or AssessedValue was null
    /// or negative.
    OutOfRange,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::MissingRequired => "missing_required",
            DropReason::OutOfRange => "out_of_range",
        }
    }
}

/// Applies the row-level quality checks. Rows are checked independently,
/// so the survivors never depend on what else is in the batch.
pub struct Cleaner;

impl Cleaner {
    /// Completeness first, then ranges. A row missing a required field is
    /// reported as missing even when its values are also out of range.
    pub fn clean(&self, row: RawSale) -> Result<CleanSale, DropReason> {
        let town = row.town.ok_or(DropReason::MissingRequired)?;
        let property_type = row.property_type.ok_or(DropReason::MissingRequired)?;
        let sale_amount = match row.sale_amount {
            Some(value) if value > 0.0 => value,
            Some(_) => return Err(DropReason::OutOfRange),
            None => return Err(DropReason::MissingRequired),
        };
        // A null assessed value cannot satisfy the range predicate, so it
        // falls out here rather than in the completeness check.
        let assessed_value = match row.assessed_value {
            Some(value) if value >= 0.0 => value,
            _ => return Err(DropReason::OutOfRange),
        };

        Ok(CleanSale {
            town,
            property_type,
            sale_amount,
            assessed_value,
            sale_date: row.sale_date,
            year: row.year,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_row() -> RawSale {
        RawSale {
            town: Some("Bridgeport".to_string()),
            property_type: Some("Residential".to_string()),
            sale_amount: Some(250000.0),
            assessed_value: Some(180000.0),
            sale_date: Some("09/13/2020".to_string()),
            year: Some(2020),
        }
    }

    #[test]
    fn test_complete_row_survives() {
        let clean = Cleaner.clean(create_test_row()).unwrap();
        assert_eq!(clean.town, "Bridgeport");
        assert_eq!(clean.sale_amount, 250000.0);
        assert_eq!(clean.year, Some(2020));
    }

    #[test]
    fn test_null_town_is_missing_required() {
        let row = RawSale {
            town: None,
            ..create_test_row()
        };
        assert_eq!(Cleaner.clean(row), Err(DropReason::MissingRequired));
    }

    #[test]
    fn test_null_sale_amount_is_missing_required() {
        let row = RawSale {
            sale_amount: None,
            ..create_test_row()
        };
        assert_eq!(Cleaner.clean(row), Err(DropReason::MissingRequired));
    }

    #[test]
    fn test_zero_sale_amount_is_out_of_range() {
        let row = RawSale {
            sale_amount: Some(0.0),
            ..create_test_row()
        };
        assert_eq!(Cleaner.clean(row), Err(DropReason::OutOfRange));
    }

    #[test]
    fn test_negative_assessed_value_is_out_of_range() {
        let row = RawSale {
            assessed_value: Some(-1.0),
            ..create_test_row()
        };
        assert_eq!(Cleaner.clean(row), Err(DropReason::OutOfRange));
    }

    #[test]
    fn test_null_assessed_value_is_out_of_range() {
        let row = RawSale {
            assessed_value: None,
            ..create_test_row()
        };
        assert_eq!(Cleaner.clean(row), Err(DropReason::OutOfRange));
    }

    #[test]
    fn test_zero_assessed_value_survives() {
        let row = RawSale {
            assessed_value: Some(0.0),
            ..create_test_row()
        };
        assert!(Cleaner.clean(row).is_ok());
    }

    #[test]
    fn test_null_date_and_year_survive() {
        let row = RawSale {
            sale_date: None,
            year: None,
            ..create_test_row()
        };
        let clean = Cleaner.clean(row).unwrap();
        assert_eq!(clean.sale_date, None);
        assert_eq!(clean.year, None);
    }

    #[test]
    fn test_missing_required_wins_over_range() {
        let row = RawSale {
            town: None,
            sale_amount: Some(-5.0),
            ..create_test_row()
        };
        assert_eq!(Cleaner.clean(row), Err(DropReason::MissingRequired));
    }
}
