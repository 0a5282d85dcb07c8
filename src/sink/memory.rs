use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{EtlError, Result};
use crate::types::WriteMode;

use super::{SinkBatch, SinkColumn, SinkWriter, SqlValue};

/// Contents of one stored table.
#[derive(Debug, Clone)]
pub struct StoredTable {
    pub columns: Vec<SinkColumn>,
    pub rows: Vec<Vec<SqlValue>>,
}

/// A sink backed by a map, for tests and dry validation of the load path.
/// Append enforces the same column compatibility rule as the real
/// destination.
#[derive(Debug, Default, Clone)]
pub struct InMemorySink {
    tables: Arc<Mutex<HashMap<String, StoredTable>>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn table(&self, name: &str) -> Option<StoredTable> {
        self.tables.lock().await.get(name).cloned()
    }

    pub async fn row_count(&self, name: &str) -> usize {
        self.tables
            .lock()
            .await
            .get(name)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }

    pub async fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.lock().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl SinkWriter for InMemorySink {
    async fn write(&self, table: &str, batch: &SinkBatch, mode: WriteMode) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let written = batch.rows.len() as u64;

        match mode {
            WriteMode::Overwrite => {
                tables.insert(
                    table.to_string(),
                    StoredTable {
                        columns: batch.columns.clone(),
                        rows: batch.rows.clone(),
                    },
                );
            }
            WriteMode::Append => match tables.get_mut(table) {
                Some(existing) => {
                    if existing.columns != batch.columns {
                        return Err(EtlError::SchemaMismatch {
                            table: table.to_string(),
                            reason: "existing table has a different column layout".to_string(),
                        });
                    }
                    existing.rows.extend(batch.rows.iter().cloned());
                }
                None => {
                    tables.insert(
                        table.to_string(),
                        StoredTable {
                            columns: batch.columns.clone(),
                            rows: batch.rows.clone(),
                        },
                    );
                }
            },
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SqlType;

    fn create_test_batch(rows: Vec<Vec<SqlValue>>) -> SinkBatch {
        SinkBatch {
            columns: vec![
                SinkColumn { name: "Town", sql_type: SqlType::Text, nullable: false },
                SinkColumn { name: "Year", sql_type: SqlType::Integer, nullable: true },
            ],
            rows,
        }
    }

    fn row(town: &str, year: i32) -> Vec<SqlValue> {
        vec![SqlValue::Text(town.to_string()), SqlValue::Integer(year)]
    }

    #[tokio::test]
    async fn test_overwrite_replaces_rows() {
        let sink = InMemorySink::new();
        sink.write("t", &create_test_batch(vec![row("Ansonia", 2020), row("Bethel", 2020)]), WriteMode::Overwrite)
            .await
            .unwrap();
        sink.write("t", &create_test_batch(vec![row("Canton", 2021)]), WriteMode::Overwrite)
            .await
            .unwrap();

        assert_eq!(sink.row_count("t").await, 1);
        let stored = sink.table("t").await.unwrap();
        assert_eq!(stored.rows[0][0], SqlValue::Text("Canton".to_string()));
    }

    #[tokio::test]
    async fn test_append_accumulates_rows() {
        let sink = InMemorySink::new();
        sink.write("t", &create_test_batch(vec![row("Ansonia", 2020)]), WriteMode::Append)
            .await
            .unwrap();
        let written = sink
            .write("t", &create_test_batch(vec![row("Bethel", 2021)]), WriteMode::Append)
            .await
            .unwrap();

        assert_eq!(written, 1);
        assert_eq!(sink.row_count("t").await, 2);
    }

    #[tokio::test]
    async fn test_append_rejects_different_layout() {
        let sink = InMemorySink::new();
        sink.write("t", &create_test_batch(vec![row("Ansonia", 2020)]), WriteMode::Append)
            .await
            .unwrap();

        let other = SinkBatch {
            columns: vec![SinkColumn { name: "Town", sql_type: SqlType::Text, nullable: false }],
            rows: vec![vec![SqlValue::Text("Bethel".to_string())]],
        };
        let err = sink.write("t", &other, WriteMode::Append).await.unwrap_err();
        assert!(matches!(err, EtlError::SchemaMismatch { .. }));
        assert_eq!(sink.row_count("t").await, 1);
    }

    #[tokio::test]
    async fn test_tables_are_independent() {
        let sink = InMemorySink::new();
        sink.write("a", &create_test_batch(vec![row("Ansonia", 2020)]), WriteMode::Overwrite)
            .await
            .unwrap();
        sink.write("b", &create_test_batch(vec![row("Bethel", 2021)]), WriteMode::Overwrite)
            .await
            .unwrap();

        assert_eq!(sink.table_names().await, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(sink.row_count("a").await, 1);
        assert_eq!(sink.row_count("b").await, 1);
    }
}
