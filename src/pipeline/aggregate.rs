use std::collections::BTreeMap;

use serde::Serialize;

use crate::pipeline::categorize::CategorizedSale;

/// Total sale volume for one year group. A null year forms its own group
/// rather than being folded into any real year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlySales {
    pub year: Option<i32>,
    pub total_sale_amount: f64,
}

/// Sums sale amounts per year.
pub struct Aggregator;

impl Aggregator {
    /// Totals are accumulated in integer cents so the result cannot drift
    /// with the order rows arrive in. Groups come back sorted, null year
    /// first, then ascending.
    pub fn aggregate(&self, rows: &[CategorizedSale]) -> Vec<YearlySales> {
        let mut totals: BTreeMap<Option<i32>, i128> = BTreeMap::new();
        for row in rows {
            let cents = (row.sale_amount * 100.0).round() as i128;
            *totals.entry(row.year).or_insert(0) += cents;
        }

        totals
            .into_iter()
            .map(|(year, cents)| YearlySales {
                year,
                total_sale_amount: cents as f64 / 100.0,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_sale(year: Option<i32>, sale_amount: f64) -> CategorizedSale {
        CategorizedSale {
            town: "Danbury".to_string(),
            property_type: "Residential".to_string(),
            sale_amount,
            assessed_value: 100000.0,
            sale_date: None,
            year,
            property_category: "Residential".to_string(),
        }
    }

    #[test]
    fn test_groups_by_year() {
        let rows = vec![
            create_test_sale(Some(2020), 100.0),
            create_test_sale(Some(2021), 250.5),
            create_test_sale(Some(2020), 50.25),
        ];

        let totals = Aggregator.aggregate(&rows);
        assert_eq!(
            totals,
            vec![
                YearlySales { year: Some(2020), total_sale_amount: 150.25 },
                YearlySales { year: Some(2021), total_sale_amount: 250.5 },
            ]
        );
    }

    #[test]
    fn test_null_year_is_its_own_group() {
        let rows = vec![
            create_test_sale(None, 10.0),
            create_test_sale(Some(2020), 20.0),
            create_test_sale(None, 30.0),
        ];

        let totals = Aggregator.aggregate(&rows);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].year, None);
        assert_eq!(totals[0].total_sale_amount, 40.0);
        assert_eq!(totals[1].year, Some(2020));
    }

    #[test]
    fn test_total_does_not_depend_on_row_order() {
        let amounts = [0.1, 0.2, 0.3, 1000000.07, 42.42, 9999.99];
        let forward: Vec<_> = amounts
            .iter()
            .map(|&a| create_test_sale(Some(2019), a))
            .collect();
        let mut reversed = forward.clone();
        reversed.reverse();

        let a = Aggregator.aggregate(&forward);
        let b = Aggregator.aggregate(&reversed);
        assert_eq!(a, b);
    }

    #[test]
    fn test_cent_amounts_sum_exactly() {
        // 0.1 + 0.2 three times over; naive f64 addition would produce
        // 0.9000000000000001 style noise.
        let rows: Vec<_> = std::iter::repeat([0.1, 0.2])
            .take(3)
            .flatten()
            .map(|a| create_test_sale(Some(2022), a))
            .collect();

        let totals = Aggregator.aggregate(&rows);
        assert_eq!(totals[0].total_sale_amount, 0.9);
    }

    #[test]
    fn test_empty_input_yields_no_groups() {
        assert!(Aggregator.aggregate(&[]).is_empty());
    }
}
