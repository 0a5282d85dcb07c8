use chrono::NaiveDate;
use once_cell::sync::Lazy;

use crate::pipeline::normalize::NormalizedSale;
use crate::types::CategoryRule;

/// Label a sale receives when no rule matches its property type.
pub const DEFAULT_CATEGORY: &str = "Other";

/// Built-in rules, in evaluation order.
static DEFAULT_RULES: Lazy<Vec<CategoryRule>> = Lazy::new(|| {
    vec![
        CategoryRule::new("Residential", "Residential"),
        CategoryRule::new("Commercial", "Commercial"),
    ]
});

/// A sale carrying its derived property category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorizedSale {
    pub town: String,
    pub property_type: String,
    pub sale_amount: f64,
    pub assessed_value: f64,
    pub sale_date: Option<NaiveDate>,
    pub year: Option<i32>,
    pub property_category: String,
}

/// Assigns each sale a category from an ordered rule list. The first rule
/// whose pattern appears in the property type wins; the order of the list
/// is the only precedence there is.
pub struct Categorizer {
    rules: Vec<CategoryRule>,
}

impl Categorizer {
    /// Configured rules replace the built-in list; an empty configuration
    /// means the built-ins apply.
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        let rules = if rules.is_empty() {
            DEFAULT_RULES.clone()
        } else {
            rules
        };
        Self { rules }
    }

    pub fn categorize(&self, row: NormalizedSale) -> CategorizedSale {
        let property_category = self
            .rules
            .iter()
            .find(|rule| rule.matches(&row.property_type))
            .map(|rule| rule.label.clone())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        CategorizedSale {
            town: row.town,
            property_type: row.property_type,
            sale_amount: row.sale_amount,
            assessed_value: row.assessed_value,
            sale_date: row.sale_date,
            year: row.year,
            property_category,
        }
    }
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
