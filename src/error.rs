use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueryError>;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Field not found: {table}.{field}")]
    FieldNotFound { table: String, field: String },

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("Type mapping error: {0}")]
    TypeMapping(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(any(feature = "sqlite", feature = "postgres"))]
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl QueryError {
    pub(crate) fn field_not_found(table: &str, field: &str) -> Self {
        QueryError::FieldNotFound {
            table: table.to_string(),
            field: field.to_string(),
        }
    }

    /// Whether the error came from the database collaborator rather than
    /// from statement generation.
    pub fn is_execution_error(&self) -> bool {
        match self {
            QueryError::Connection(_) => true,
            #[cfg(any(feature = "sqlite", feature = "postgres"))]
            QueryError::Sqlx(_) => true,
            _ => false,
        }
    }
}
