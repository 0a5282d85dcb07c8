use serde::{Deserialize, Serialize};

/// A raw sales record as read from the source file.
///
/// Every field may be null here; the cleaning stage establishes which
/// ones must not be. Within one run all records share the same column
/// schema (see `schema::sale_schema`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSale {
    pub town: Option<String>,
    pub property_type: Option<String>,
    pub sale_amount: Option<f64>,
    pub assessed_value: Option<f64>,
    /// Raw date text, `MM/DD/YYYY`. Normalization parses it.
    pub sale_date: Option<String>,
    pub year: Option<i32>,
}

/// An ordered (substring pattern, label) pair used to classify the
/// free-text `PropertyType` field. Matching is case-sensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRule {
    pub pattern: String,
    pub label: String,
}

impl CategoryRule {
    pub fn new(pattern: impl Into<String>, label: impl Into<String>) -> Self {
        Self { pattern: pattern.into(), label: label.into() }
    }

    pub fn matches(&self, property_type: &str) -> bool {
        property_type.contains(self.pattern.as_str())
    }
}

/// How a bulk load treats a destination table's prior contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Replace all existing rows, atomically from a reader's point of view.
    Overwrite,
    /// Add rows without removing existing ones.
    Append,
}

impl std::str::FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overwrite" => Ok(WriteMode::Overwrite),
            "append" => Ok(WriteMode::Append),
            other => Err(format!("unknown write mode '{}', expected 'overwrite' or 'append'", other)),
        }
    }
}

impl std::fmt::Display for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteMode::Overwrite => write!(f, "overwrite"),
            WriteMode::Append => write!(f, "append"),
        }
    }
}
