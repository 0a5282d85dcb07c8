use async_trait::async_trait;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, info};

use crate::config::SinkConfig;
use crate::error::{EtlError, Result};
use crate::types::WriteMode;

use super::{validate_identifier, SinkBatch, SinkColumn, SinkWriter, SqlType, SqlValue};

/// Rows per multi-value INSERT statement, to keep SQL size bounded.
const INSERT_CHUNK_SIZE: usize = 1000;

/// Suffix of the staging table an overwrite builds before the swap.
const STAGING_SUFFIX: &str = "__etl_staging";

/// Writes batches to PostgreSQL.
///
/// Overwrite loads into a staging table and then swaps it into the target
/// position; PostgreSQL DDL is transactional, so readers see either the
/// old table or the new one, never a partial load.
pub struct PostgresSink {
    config: SinkConfig,
}

impl PostgresSink {
    pub fn new(config: SinkConfig) -> Self {
        Self { config }
    }

    async fn connect(&self) -> Result<Client> {
        let (client, connection) = tokio_postgres::connect(&self.config.connection_string(), NoTls)
            .await
            .map_err(|e| EtlError::SinkUnavailable {
                target: self.config.target(),
                reason: e.to_string(),
            })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(client)
    }

    fn qualified(&self, table: &str) -> String {
        format!("\"{}\".\"{}\"", self.config.schema, table)
    }

    async fn ensure_schema(&self, client: &Client) -> Result<()> {
        let sql = format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", self.config.schema);
        client.execute(&sql, &[]).await?;
        Ok(())
    }

    async fn overwrite(&self, client: &Client, table: &str, batch: &SinkBatch) -> Result<u64> {
        let staging = format!("{}{}", table, STAGING_SUFFIX);
        validate_identifier("staging table", &staging)?;

        self.ensure_schema(client).await?;

        // Clear any staging table a failed earlier run left behind.
        let qualified_staging = self.qualified(&staging);
        let drop_staging = format!("DROP TABLE IF EXISTS {} CASCADE", qualified_staging);
        client.execute(&drop_staging, &[]).await?;

        let create = create_table_sql(&qualified_staging, &batch.columns, false);
        client.execute(&create, &[]).await?;

        let written = self.insert_rows(client, &qualified_staging, batch).await?;

        // DDL is transactional in PostgreSQL, so the swap is atomic.
        let qualified_target = self.qualified(table);
        client.execute("BEGIN", &[]).await?;
        let drop_target = format!("DROP TABLE IF EXISTS {} CASCADE", qualified_target);
        client.execute(&drop_target, &[]).await?;
        let rename = format!("ALTER TABLE {} RENAME TO \"{}\"", qualified_staging, table);
        client.execute(&rename, &[]).await?;
        client.execute("COMMIT", &[]).await?;

        info!(table = %qualified_target, rows = written, "Replaced destination table");
        Ok(written)
    }

    async fn append(&self, client: &Client, table: &str, batch: &SinkBatch) -> Result<u64> {
        self.ensure_schema(client).await?;

        let qualified = self.qualified(table);
        let create = create_table_sql(&qualified, &batch.columns, true);
        client.execute(&create, &[]).await?;

        self.check_table_compatibility(client, table, &batch.columns).await?;

        let written = self.insert_rows(client, &qualified, batch).await?;
        info!(table = %qualified, rows = written, "Appended to destination table");
        Ok(written)
    }

    /// Compare the live table layout against the columns we are about to
    /// insert. Append must never write into a table whose shape drifted.
    async fn check_table_compatibility(
        &self,
        client: &Client,
        table: &str,
        columns: &[SinkColumn],
    ) -> Result<()> {
        let existing = self.existing_columns(client, table).await?;

        for column in columns {
            let found = existing.iter().find(|(name, _)| name == column.name);
            match found {
                None => {
                    return Err(EtlError::SchemaMismatch {
                        table: table.to_string(),
                        reason: format!("existing table has no column \"{}\"", column.name),
                    });
                }
                Some((_, data_type)) if !pg_types_compatible(data_type, column.sql_type) => {
                    return Err(EtlError::SchemaMismatch {
                        table: table.to_string(),
                        reason: format!(
                            "column \"{}\" is {} in the existing table but {} is required",
                            column.name,
                            data_type,
                            ddl_type(column.sql_type)
                        ),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Column names and types as information_schema reports them.
    async fn existing_columns(&self, client: &Client, table: &str) -> Result<Vec<(String, String)>> {
        let rows = client
            .query(
                "SELECT column_name, data_type \
                 FROM information_schema.columns \
                 WHERE table_schema = $1 AND table_name = $2 \
                 ORDER BY ordinal_position",
                &[&self.config.schema, &table],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get::<_, String>(0), row.get::<_, String>(1)))
            .collect())
    }

    /// Multi-value INSERT in chunks. Returns the number of rows sent.
    async fn insert_rows(&self, client: &Client, qualified: &str, batch: &SinkBatch) -> Result<u64> {
        let column_list = batch
            .columns
            .iter()
            .map(|c| format!("\"{}\"", c.name))
            .collect::<Vec<_>>()
            .join(", ");

        let mut written = 0u64;
        for chunk in batch.rows.chunks(INSERT_CHUNK_SIZE) {
            let values = chunk
                .iter()
                .map(|row| {
                    let cells = row.iter().map(format_sql_value).collect::<Vec<_>>().join(", ");
                    format!("({})", cells)
                })
                .collect::<Vec<_>>()
                .join(", ");

            let statement = format!(
                "INSERT INTO {} ({}) VALUES {}",
                qualified, column_list, values
            );
            written += client.execute(&statement, &[]).await?;
            debug!(table = %qualified, rows = chunk.len(), "Inserted chunk");
        }

        Ok(written)
    }
}

#[async_trait]
impl SinkWriter for PostgresSink {
    async fn write(&self, table: &str, batch: &SinkBatch, mode: WriteMode) -> Result<u64> {
        validate_identifier("schema", &self.config.schema)?;
        validate_identifier("table", table)?;

        let client = self.connect().await?;
        match mode {
            WriteMode::Overwrite => self.overwrite(&client, table, batch).await,
            WriteMode::Append => self.append(&client, table, batch).await,
        }
    }
}

fn ddl_type(sql_type: SqlType) -> &'static str {
    match sql_type {
        SqlType::Text => "TEXT",
        SqlType::Double => "DOUBLE PRECISION",
        SqlType::Integer => "INTEGER",
        SqlType::Date => "DATE",
    }
}

fn create_table_sql(qualified: &str, columns: &[SinkColumn], if_not_exists: bool) -> String {
    let column_defs = columns
        .iter()
        .map(|column| {
            let nullability = if column.nullable { "" } else { " NOT NULL" };
            format!("\"{}\" {}{}", column.name, ddl_type(column.sql_type), nullability)
        })
        .collect::<Vec<_>>()
        .join(", ");

    let clause = if if_not_exists { "IF NOT EXISTS " } else { "" };
    format!("CREATE TABLE {}{} ({})", clause, qualified, column_defs)
}

/// Render one value as a SQL literal. Strings get embedded quotes doubled
/// and NUL bytes stripped; PostgreSQL rejects NUL in text. A non-finite
/// double has no SQL literal our column type accepts, so it becomes NULL.
fn format_sql_value(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Text(text) => {
            let cleaned = text.replace('\0', "").replace('\'', "''");
            format!("'{}'", cleaned)
        }
        SqlValue::Double(number) => {
            if number.is_finite() {
                number.to_string()
            } else {
                "NULL".to_string()
            }
        }
        SqlValue::Integer(number) => number.to_string(),
        SqlValue::Date(date) => format!("'{}'", date.format("%Y-%m-%d")),
    }
}

/// information_schema reports SQL-standard names ("double precision",
/// "character varying") while the DDL uses short forms. Normalize both
/// sides before comparing.
fn pg_types_compatible(info_schema_type: &str, sql_type: SqlType) -> bool {
    let normalized = match info_schema_type.to_lowercase().as_str() {
        "int" | "int4" | "integer" => "integer",
        "float8" | "double precision" => "double precision",
        "varchar" | "character varying" | "text" => "text",
        "date" => "date",
        _ => return false,
    };

    normalized == ddl_type(sql_type).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_format_text_escapes_quotes() {
        let value = SqlValue::Text("O'Brien's Lot".to_string());
        assert_eq!(format_sql_value(&value), "'O''Brien''s Lot'");
    }

    #[test]
    fn test_format_text_strips_nul_bytes() {
        let value = SqlValue::Text("bad\0byte".to_string());
        assert_eq!(format_sql_value(&value), "'badbyte'");
    }

    #[test]
    fn test_format_null_and_numbers() {
        assert_eq!(format_sql_value(&SqlValue::Null), "NULL");
        assert_eq!(format_sql_value(&SqlValue::Integer(2021)), "2021");
        assert_eq!(format_sql_value(&SqlValue::Double(1234.5)), "1234.5");
        assert_eq!(format_sql_value(&SqlValue::Double(f64::NAN)), "NULL");
        assert_eq!(format_sql_value(&SqlValue::Double(f64::INFINITY)), "NULL");
    }

    #[test]
    fn test_format_date_is_iso() {
        let date = NaiveDate::from_ymd_opt(2021, 9, 13).unwrap();
        assert_eq!(format_sql_value(&SqlValue::Date(date)), "'2021-09-13'");
    }

    #[test]
    fn test_create_table_sql() {
        let columns = vec![
            SinkColumn { name: "Town", sql_type: SqlType::Text, nullable: false },
            SinkColumn { name: "Year", sql_type: SqlType::Integer, nullable: true },
        ];

        let sql = create_table_sql("\"public\".\"realEstate\"", &columns, false);
        assert_eq!(
            sql,
            "CREATE TABLE \"public\".\"realEstate\" (\"Town\" TEXT NOT NULL, \"Year\" INTEGER)"
        );

        let sql = create_table_sql("\"public\".\"realEstate\"", &columns, true);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS"));
    }

    #[test]
    fn test_type_compatibility() {
        assert!(pg_types_compatible("double precision", SqlType::Double));
        assert!(pg_types_compatible("text", SqlType::Text));
        assert!(pg_types_compatible("character varying", SqlType::Text));
        assert!(pg_types_compatible("integer", SqlType::Integer));
        assert!(pg_types_compatible("date", SqlType::Date));
        assert!(!pg_types_compatible("bigint", SqlType::Integer));
        assert!(!pg_types_compatible("text", SqlType::Double));
    }
}
