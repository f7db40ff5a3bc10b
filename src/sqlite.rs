use crate::backend::{ConnectionConfig, DatabaseBackend, QueryResult, QueryRow};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Create a new SQLite backend with connection pool
    pub async fn new(url: &str) -> Result<Self> {
        Self::with_config(url, &ConnectionConfig::default()).await
    }

    pub async fn with_config(url: &str, config: &ConnectionConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(config.create_if_missing)
            .foreign_keys(config.foreign_keys)
            .busy_timeout(config.busy_timeout);

        // An in-memory database lives only as long as one of its connections.
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;

        debug!(url, max_connections = config.max_connections, "opened sqlite pool");

        Ok(Self { pool })
    }

    /// Create an in-memory SQLite database
    pub async fn memory() -> Result<Self> {
        Self::new("sqlite::memory:").await
    }

    /// Create a file-based SQLite database
    pub async fn file(path: &str) -> Result<Self> {
        Self::new(&format!("sqlite://{}", path)).await
    }

    /// Convert SQLite row to QueryRow, by the storage class of each value
    fn convert_row(row: &SqliteRow) -> Result<QueryRow> {
        let mut query_row = QueryRow::new();

        for column in row.columns() {
            let index = column.ordinal();
            let raw = row.try_get_raw(index)?;

            let value = if raw.is_null() {
                Value::Null
            } else {
                let type_name = raw.type_info().name().to_string();
                match type_name.as_str() {
                    "INTEGER" => Value::from(row.try_get::<i64, _>(index)?),
                    "REAL" => serde_json::Number::from_f64(row.try_get::<f64, _>(index)?)
                        .map(Value::Number)
                        .unwrap_or(Value::Null),
                    "BLOB" => Value::from(row.try_get::<Vec<u8>, _>(index)?),
                    _ => Value::String(row.try_get::<String, _>(index)?),
                }
            };

            query_row.insert(column.name().to_string(), value);
        }

        Ok(query_row)
    }

    fn bind_params<'q>(
        mut query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
        params: &[Value],
    ) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
        for param in params {
            query = match param {
                Value::Null => query.bind(None::<String>),
                Value::Bool(b) => query.bind(*b),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => query.bind(i),
                    None => query.bind(n.as_f64()),
                },
                Value::String(s) => query.bind(s.clone()),
                Value::Array(_) | Value::Object(_) => query.bind(param.to_string()),
            };
        }
        query
    }

    /// Get list of all tables
    pub async fn list_tables(&mut self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(Into::into))
            .collect()
    }

    /// Get table info
    pub async fn table_info(&mut self, table_name: &str) -> Result<Vec<ColumnInfo>> {
        let query = format!("PRAGMA table_info({})", table_name);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut columns = Vec::new();
        for row in rows {
            columns.push(ColumnInfo {
                cid: row.try_get::<i32, _>("cid")?,
                name: row.try_get::<String, _>("name")?,
                type_name: row.try_get::<String, _>("type")?,
                not_null: row.try_get::<i32, _>("notnull")? != 0,
                primary_key: row.try_get::<i32, _>("pk")? != 0,
            });
        }

        Ok(columns)
    }
}

/// Column information from PRAGMA table_info
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub cid: i32,
    pub name: String,
    pub type_name: String,
    pub not_null: bool,
    pub primary_key: bool,
}

#[async_trait]
impl DatabaseBackend for SqliteBackend {
    async fn connect(url: &str) -> Result<Self> {
        Self::new(url).await
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        debug!(sql, "execute");
        let result = sqlx::query(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn execute_with(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        debug!(sql, params = params.len(), "execute");
        let query = Self::bind_params(sqlx::query(sql), params);
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        debug!(sql, "query");
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;

        rows.iter().map(Self::convert_row).collect()
    }

    async fn query_scalar(&mut self, sql: &str) -> Result<i64> {
        debug!(sql, "query scalar");
        let value = sqlx::query_scalar::<_, i64>(sql).fetch_one(&self.pool).await?;
        Ok(value)
    }

    fn is_connected(&self) -> bool {
        !self.pool.is_closed()
    }

    async fn close(self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SqlType;
    use crate::types::ValueKind;

    #[tokio::test]
    async fn test_sqlite_memory() {
        let backend = SqliteBackend::memory().await;
        assert!(backend.is_ok());
        assert!(backend.unwrap().is_connected());
    }

    #[tokio::test]
    async fn test_sqlite_create_table() {
        let mut backend = SqliteBackend::memory().await.unwrap();

        backend
            .execute("CREATE TABLE test_table (id INTEGER, name VARCHAR NOT NULL, PRIMARY KEY (id))")
            .await
            .unwrap();

        let tables = backend.list_tables().await.unwrap();
        assert!(tables.contains(&"test_table".to_string()));

        let info = backend.table_info("test_table").await.unwrap();
        assert_eq!(info.len(), 2);
        assert!(info[0].primary_key);
        assert_eq!(info[1].type_name, "VARCHAR");
        assert!(info[1].not_null);
    }

    #[tokio::test]
    async fn test_sqlite_bound_insert_query() {
        let mut backend = SqliteBackend::memory().await.unwrap();

        backend
            .execute("CREATE TABLE users (id INTEGER, name VARCHAR, score REAL)")
            .await
            .unwrap();

        let affected = backend
            .execute_with(
                "INSERT INTO users (id, name, score) VALUES (?, ?, ?)",
                &[Value::from(1), Value::from("O'Reilly"), Value::from(2.5)],
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        backend
            .execute_with(
                "INSERT INTO users (id, name, score) VALUES (?, ?, ?)",
                &[Value::from(2), Value::Null, Value::from(f64::MAX)],
            )
            .await
            .unwrap();

        let results = backend.query("SELECT * FROM users ORDER BY id").await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].get_i64("id"), Some(1));
        assert_eq!(results[0].get_string("name"), Some("O'Reilly".to_string()));
        assert_eq!(results[0].get_f64("score"), Some(2.5));
        assert!(results[1].is_null("name"));
        assert_eq!(results[1].get_f64("score"), Some(f64::MAX));
    }

    #[tokio::test]
    async fn test_sqlite_query_scalar() {
        let mut backend = SqliteBackend::memory().await.unwrap();
        backend.execute("CREATE TABLE t (id INTEGER)").await.unwrap();
        backend.execute("INSERT INTO t (id) VALUES (1), (2), (3)").await.unwrap();

        assert_eq!(backend.query_scalar("SELECT COUNT(*) FROM t").await.unwrap(), 3);
        assert_eq!(backend.placeholder(2, ValueKind::Integer), "?");
        assert_eq!(backend.column_type(ValueKind::Real), SqlType::Real);
    }

    #[tokio::test]
    async fn test_sqlite_foreign_keys_enforced() {
        let mut backend = SqliteBackend::memory().await.unwrap();

        backend
            .execute("CREATE TABLE parent (id INTEGER, PRIMARY KEY (id))")
            .await
            .unwrap();
        backend
            .execute("CREATE TABLE child (id INTEGER, parent INTEGER, FOREIGN KEY (parent) REFERENCES parent(id))")
            .await
            .unwrap();

        let result = backend
            .execute("INSERT INTO child (id, parent) VALUES (1, 42)")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_sqlite_close() {
        let backend = SqliteBackend::memory().await.unwrap();
        assert!(backend.close().await.is_ok());
    }
}
