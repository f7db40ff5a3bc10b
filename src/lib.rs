//! tx2-persist - Declarative persistence for plain Rust structs
//!
//! tx2-persist maps structs to SQL tables from a one-line declaration. Field
//! placeholders generated by the declaration build typed expression trees,
//! which are validated against a closed grammar and then rendered as SQL or
//! registered as table constraints.
//!
//! # Architecture
//!
//! - **Type Metadata**: table name, ordered fields, offsets and value kinds per type
//! - **Expressions**: placeholders, literals and constraint tags combined into trees
//! - **Grammar**: query and configuration shapes checked before evaluation
//! - **Contexts**: one visitor renders predicates, another records constraints
//! - **Statements**: CREATE/DROP TABLE, INSERT and SELECT/COUNT builders
//! - **Backends**: SQLite and PostgreSQL through sqlx
//!
//! # Example
//!
//! ```rust,no_run
//! use tx2_persist::prelude::*;
//!
//! #[derive(Debug, Default)]
//! struct Person {
//!     id: i32,
//!     name: String,
//!     surname: String,
//! }
//!
//! declare_persistent!(Person => PersonFields { id, name, surname });
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     #[cfg(feature = "sqlite")]
//!     {
//!         let session = Session::<SqliteBackend>::connect("sqlite::memory:").await?;
//!
//!         let f = Person::fields();
//!         session
//!             .create_table_with(&[f.id.assign(primary_key()), f.name.assign(not_null())])
//!             .await?;
//!
//!         session
//!             .persist(&Person { id: 1, name: "Ada".into(), surname: "Lovelace".into() })
//!             .await?;
//!
//!         let people = query_from::<Person>()
//!             .where_clause(f.id.ge(1) & f.name.ne("Bob"))
//!             .order_by_desc([f.name])
//!             .objects(&session)
//!             .await?;
//!         println!("{:?}", people);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Backend Support
//!
//! Enable backends via Cargo features:
//!
//! ```toml
//! [dependencies]
//! tx2-persist = { version = "0.1", features = ["postgres", "sqlite"] }
//! ```

pub mod backend;
pub mod constraint;
pub mod context;
pub mod ddl;
pub mod dml;
pub mod dql;
pub mod error;
pub mod expr;
pub mod grammar;
pub mod meta;
pub mod pool;
pub mod schema;
pub mod session;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use backend::{ConnectionConfig, DatabaseBackend, QueryResult, QueryRow};
pub use constraint::{ConstraintStore, ForeignKeyRef};
pub use dql::{query_from, LogicalOp, QueryFrom, SortDirection};
pub use error::{QueryError, Result};
pub use expr::{foreign_key, not_null, primary_key, unique, ConstraintTag, Expr, Field, Literal};
pub use grammar::Grammar;
pub use meta::{FieldDescriptor, Persistent, TypeDescriptor};
pub use pool::{PooledSession, SessionPool};
pub use schema::{ColumnDef, SchemaRegistry, SqlType, TableSchema};
pub use session::Session;
pub use types::{FieldValue, FixedText, ValueKind};

/// Value type bound as a parameter and read back from rows.
pub use serde_json::Value;

#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;

/// Prelude for common imports
pub mod prelude {
    pub use crate::backend::{ConnectionConfig, DatabaseBackend, QueryResult, QueryRow};
    pub use crate::declare_persistent;
    pub use crate::dql::{query_from, QueryFrom};
    pub use crate::error::{QueryError, Result};
    pub use crate::expr::{foreign_key, not_null, primary_key, unique, Expr, Field};
    pub use crate::meta::Persistent;
    pub use crate::pool::{PooledSession, SessionPool};
    pub use crate::schema::SchemaRegistry;
    pub use crate::session::Session;
    pub use crate::types::FixedText;

    #[cfg(feature = "postgres")]
    pub use crate::postgres::PostgresBackend;

    #[cfg(feature = "sqlite")]
    pub use crate::sqlite::SqliteBackend;
}
