use crate::backend::{ConnectionConfig, DatabaseBackend, QueryResult, QueryRow};
use crate::error::Result;
use crate::schema::SqlType;
use crate::types::ValueKind;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Postgres, Row, TypeInfo, ValueRef};
use tracing::debug;

pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    /// Create a new PostgreSQL backend with connection pool
    pub async fn new(url: &str) -> Result<Self> {
        Self::with_config(url, &ConnectionConfig::default()).await
    }

    pub async fn with_config(url: &str, config: &ConnectionConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.busy_timeout)
            .connect(url)
            .await?;

        debug!(max_connections = config.max_connections, "opened postgres pool");

        Ok(Self { pool })
    }

    /// Convert PostgreSQL row to QueryRow, by the declared column type
    fn convert_row(row: &PgRow) -> Result<QueryRow> {
        let mut query_row = QueryRow::new();

        for column in row.columns() {
            let index = column.ordinal();
            let raw = row.try_get_raw(index)?;

            let value = if raw.is_null() {
                Value::Null
            } else {
                match column.type_info().name() {
                    "INT2" => Value::from(row.try_get::<i16, _>(index)?),
                    "INT4" => Value::from(row.try_get::<i32, _>(index)?),
                    "INT8" => Value::from(row.try_get::<i64, _>(index)?),
                    "FLOAT4" => serde_json::Number::from_f64(f64::from(row.try_get::<f32, _>(index)?))
                        .map(Value::Number)
                        .unwrap_or(Value::Null),
                    "FLOAT8" => serde_json::Number::from_f64(row.try_get::<f64, _>(index)?)
                        .map(Value::Number)
                        .unwrap_or(Value::Null),
                    "BOOL" => Value::Bool(row.try_get::<bool, _>(index)?),
                    // CHAR(N) comes back blank-padded
                    "BPCHAR" => Value::String(
                        row.try_get::<String, _>(index)?
                            .trim_end_matches(' ')
                            .to_string(),
                    ),
                    _ => Value::String(row.try_get::<String, _>(index)?),
                }
            };

            query_row.insert(column.name().to_string(), value);
        }

        Ok(query_row)
    }

    fn bind_params<'q>(
        mut query: sqlx::query::Query<'q, Postgres, PgArguments>,
        params: &[Value],
    ) -> sqlx::query::Query<'q, Postgres, PgArguments> {
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
}

#[async_trait]
impl DatabaseBackend for PostgresBackend {
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

    /// `$n` cast to the column type, so a bound NULL is typed by its column
    fn placeholder(&self, index: usize, kind: ValueKind) -> String {
        format!("${}::{}", index, self.column_type(kind))
    }

    /// PostgreSQL `REAL` is single precision
    fn column_type(&self, kind: ValueKind) -> SqlType {
        match kind {
            ValueKind::Real => SqlType::Double,
            other => SqlType::from(other),
        }
    }

    fn is_connected(&self) -> bool {
        !self.pool.is_closed()
    }

    async fn close(self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
