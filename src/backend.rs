use crate::error::Result;
use crate::schema::SqlType;
use crate::types::ValueKind;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Row from a query result
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRow {
    pub columns: HashMap<String, Value>,
}

impl QueryRow {
    pub fn new() -> Self {
        Self {
            columns: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: String, value: Value) {
        self.columns.insert(key, value);
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.columns.get(key)
    }

    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.try_get(key).ok().flatten()
    }

    /// Deserialize column `key`; `None` when the column is absent.
    pub fn try_get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        match self.columns.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.columns
            .get(key)
            .and_then(|v| v.as_str().map(String::from))
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.columns.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.columns.get(key).and_then(|v| v.as_f64())
    }

    pub fn is_null(&self, key: &str) -> bool {
        matches!(self.columns.get(key), Some(Value::Null))
    }
}

impl Default for QueryRow {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a query
pub type QueryResult = Vec<QueryRow>;

/// Connection settings shared by the backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub max_connections: u32,
    /// Enforce FOREIGN KEY clauses (SQLite only)
    pub foreign_keys: bool,
    /// Create the database file when missing (SQLite only)
    pub create_if_missing: bool,
    pub busy_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            foreign_keys: true,
            create_if_missing: true,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Database backend trait
#[async_trait]
pub trait DatabaseBackend: Send + Sync {
    /// Connect to the database
    async fn connect(url: &str) -> Result<Self>
    where
        Self: Sized;

    /// Execute a SQL statement (no results)
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Execute a SQL statement with bound parameters, in order
    async fn execute_with(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Query and return results
    async fn query(&mut self, sql: &str) -> Result<QueryResult>;

    /// Query a single integer, e.g. `SELECT COUNT(*) ...`
    async fn query_scalar(&mut self, sql: &str) -> Result<i64> {
        let rows = self.query(sql).await?;
        let value = rows
            .first()
            .and_then(|row| row.columns.values().next())
            .and_then(Value::as_i64);

        value.ok_or_else(|| {
            crate::error::QueryError::Query(format!("no integer result for: {}", sql))
        })
    }

    /// Bind marker for the 1-based parameter `index` of a `kind` column
    fn placeholder(&self, _index: usize, _kind: ValueKind) -> String {
        "?".to_string()
    }

    /// Column type emitted in CREATE TABLE for `kind`
    fn column_type(&self, kind: ValueKind) -> SqlType {
        SqlType::from(kind)
    }

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Close the connection
    async fn close(self) -> Result<()>
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_row_accessors() {
        let mut row = QueryRow::new();
        row.insert("id".to_string(), Value::from(7));
        row.insert("name".to_string(), Value::from("name 7"));
        row.insert("score".to_string(), Value::from(1.5));
        row.insert("surname".to_string(), Value::Null);

        assert_eq!(row.get_i64("id"), Some(7));
        assert_eq!(row.get::<i32>("id"), Some(7));
        assert_eq!(row.get_string("name"), Some("name 7".to_string()));
        assert_eq!(row.get_f64("score"), Some(1.5));
        assert!(row.is_null("surname"));
        assert!(!row.is_null("missing"));
        assert_eq!(row.value("missing"), None);
    }

    #[test]
    fn test_try_get_reports_type_errors() {
        let mut row = QueryRow::new();
        row.insert("name".to_string(), Value::from("name 7"));

        assert_eq!(row.try_get::<String>("name").unwrap(), Some("name 7".to_string()));
        assert_eq!(row.try_get::<i64>("missing").unwrap(), None);
        assert!(matches!(
            row.try_get::<i64>("name"),
            Err(crate::error::QueryError::Json(_))
        ));
        assert_eq!(row.get::<i64>("name"), None);
    }

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.max_connections, 5);
        assert!(config.foreign_keys);
        assert!(config.create_if_missing);
        assert_eq!(config.busy_timeout, Duration::from_secs(5));
    }
}
