use crate::constraint::ConstraintStore;
use crate::context::{eval, ConfigContext};
use crate::error::{QueryError, Result};
use crate::expr::Expr;
use crate::grammar::{self, Grammar};
use crate::meta::{Persistent, TypeDescriptor};
use crate::types::ValueKind;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

/// SQL type mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Real,
    /// 8-byte float for backends whose `REAL` is single precision
    Double,
    Varchar,
    Char(usize),
}

impl SqlType {
    pub fn to_sql(&self) -> String {
        match self {
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::Real => "REAL".to_string(),
            SqlType::Double => "DOUBLE PRECISION".to_string(),
            SqlType::Varchar => "VARCHAR".to_string(),
            SqlType::Char(n) => format!("CHAR({})", n),
        }
    }
}

impl From<ValueKind> for SqlType {
    fn from(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Integer => SqlType::Integer,
            ValueKind::Real => SqlType::Real,
            ValueKind::Text => SqlType::Varchar,
            ValueKind::FixedText(n) => SqlType::Char(n),
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: SqlType,
    pub not_null: bool,
    pub unique: bool,
}

impl ColumnDef {
    pub fn to_sql(&self) -> String {
        let mut def = format!("{} {}", self.name, self.sql_type);

        if self.not_null {
            def.push_str(" NOT NULL");
        }

        if self.unique {
            def.push_str(" UNIQUE");
        }

        def
    }
}

/// Table-level foreign key clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDef {
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
}

/// Table schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyDef>,
}

impl TableSchema {
    /// Combine a type's fields with its registered constraints.
    pub fn from_descriptor<T>(descriptor: &TypeDescriptor<T>, store: &ConstraintStore) -> Self {
        Self::from_descriptor_with(descriptor, store, SqlType::from)
    }

    /// Like [`TableSchema::from_descriptor`], with `column_type` choosing
    /// the SQL type of each value kind.
    pub fn from_descriptor_with<T, F>(
        descriptor: &TypeDescriptor<T>,
        store: &ConstraintStore,
        column_type: F,
    ) -> Self
    where
        F: Fn(ValueKind) -> SqlType,
    {
        let columns = descriptor
            .fields()
            .iter()
            .map(|field| ColumnDef {
                name: field.name().to_string(),
                sql_type: column_type(field.kind()),
                not_null: store.is_not_null(field.name()),
                unique: store.is_unique(field.name()),
            })
            .collect();

        let foreign_keys = store
            .foreign_keys()
            .iter()
            .map(|(column, reference)| ForeignKeyDef {
                column: column.clone(),
                ref_table: reference.table.clone(),
                ref_column: reference.column.clone(),
            })
            .collect();

        Self {
            name: descriptor.table_name().to_string(),
            columns,
            primary_key: store.primary_key().to_vec(),
            foreign_keys,
        }
    }

    /// Generate CREATE TABLE SQL
    pub fn to_sql(&self) -> String {
        let mut defs: Vec<String> = self.columns.iter().map(ColumnDef::to_sql).collect();

        if !self.primary_key.is_empty() {
            defs.push(format!("PRIMARY KEY ({})", self.primary_key.join(", ")));
        }

        for fk in &self.foreign_keys {
            defs.push(format!(
                "FOREIGN KEY ({}) REFERENCES {}({})",
                fk.column, fk.ref_table, fk.ref_column
            ));
        }

        format!("CREATE TABLE IF NOT EXISTS {} ({})", self.name, defs.join(", "))
    }
}

/// Constraint stores of every configured type, keyed by `TypeId`.
///
/// Stores only grow. [`SchemaRegistry::reset`] is the single teardown point.
pub struct SchemaRegistry {
    stores: RwLock<HashMap<TypeId, ConstraintStore>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// Register configuration assignments for `T`.
    ///
    /// Every expression is validated before any is applied, so a rejected
    /// batch leaves the store untouched.
    pub fn configure<T: Persistent>(&self, exprs: &[Expr<T>]) -> Result<()> {
        let descriptor = T::descriptor();

        for expr in exprs {
            grammar::validate(expr.node(), Grammar::Configuration, descriptor.fields_number())?;
        }

        let mut stores = self.stores.write();
        let store = stores.entry(TypeId::of::<T>()).or_default();

        for expr in exprs {
            let mut ctx = ConfigContext::new(descriptor, store);
            if !eval(expr.node(), &mut ctx)? {
                return Err(QueryError::InvalidExpression(format!(
                    "configuration of {} was not applied",
                    descriptor.table_name()
                )));
            }
        }

        Ok(())
    }

    /// Snapshot of the constraints registered for `T`.
    pub fn constraints<T: Persistent>(&self) -> ConstraintStore {
        self.stores
            .read()
            .get(&TypeId::of::<T>())
            .cloned()
            .unwrap_or_default()
    }

    pub fn table_schema<T: Persistent>(&self) -> TableSchema {
        TableSchema::from_descriptor(T::descriptor(), &self.constraints::<T>())
    }

    pub fn create_table_sql<T: Persistent>(&self) -> Result<String> {
        crate::ddl::create_table::<T>(&self.constraints::<T>())
    }

    pub fn create_table_sql_with<T, F>(&self, column_type: F) -> Result<String>
    where
        T: Persistent,
        F: Fn(ValueKind) -> SqlType,
    {
        crate::ddl::create_table_with::<T, F>(&self.constraints::<T>(), column_type)
    }

    /// Number of types with a constraint store.
    pub fn configured_tables(&self) -> usize {
        self.stores.read().len()
    }

    /// Drop every registered constraint.
    pub fn reset(&self) {
        self.stores.write().clear();
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("configured_tables", &self.configured_tables())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{foreign_key, not_null, primary_key, unique};
    use crate::types::FixedText;

    #[derive(Debug, Default)]
    struct Player {
        id: i32,
        name: String,
        email: String,
        score: f64,
    }

    crate::declare_persistent!(Player => PlayerFields { id, name, email, score });

    #[derive(Debug, Default)]
    struct Badge {
        id: i32,
        player: i32,
        code: FixedText<4>,
    }

    crate::declare_persistent!(Badge => BadgeFields { id, player, code });

    #[test]
    fn test_schema_generation() {
        let registry = SchemaRegistry::new();
        let f = Player::fields();

        registry
            .configure(&[
                f.id.assign(primary_key()),
                f.name.assign(not_null()),
                f.email.assign(unique()),
            ])
            .unwrap();

        let ddl = registry.create_table_sql::<Player>().unwrap();
        assert_eq!(
            ddl,
            "CREATE TABLE IF NOT EXISTS Player (id INTEGER, name VARCHAR NOT NULL, \
             email VARCHAR UNIQUE, score REAL, PRIMARY KEY (id))"
        );
    }

    #[test]
    fn test_foreign_key_and_fixed_text() {
        let registry = SchemaRegistry::new();
        let badge = Badge::fields();
        let player = Player::fields();

        registry
            .configure(&[
                badge.id.assign(primary_key()),
                badge.player.assign(foreign_key(player.id)),
            ])
            .unwrap();

        let schema = registry.table_schema::<Badge>();
        assert_eq!(schema.columns[2].sql_type, SqlType::Char(4));
        assert!(schema
            .to_sql()
            .ends_with("code CHAR(4), PRIMARY KEY (id), FOREIGN KEY (player) REFERENCES Player(id))"));
    }

    #[test]
    fn test_configure_is_idempotent() {
        let registry = SchemaRegistry::new();
        let f = Player::fields();

        for _ in 0..2 {
            registry
                .configure(&[f.id.assign(primary_key()), f.name.assign(not_null())])
                .unwrap();
        }

        let store = registry.constraints::<Player>();
        assert_eq!(store.primary_key(), ["id".to_string()]);
        assert_eq!(store.not_null(), ["name".to_string()]);
    }

    #[test]
    fn test_invalid_batch_leaves_store_untouched() {
        let registry = SchemaRegistry::new();
        let f = Player::fields();

        let err = registry
            .configure(&[f.id.assign(primary_key()), f.name.eq("x")])
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidExpression(_)));
        assert!(registry.constraints::<Player>().is_empty());
        assert_eq!(registry.configured_tables(), 0);
    }

    #[test]
    fn test_reset() {
        let registry = SchemaRegistry::new();
        let f = Player::fields();
        registry.configure(&[f.id.assign(primary_key())]).unwrap();
        assert_eq!(registry.configured_tables(), 1);

        registry.reset();
        assert_eq!(registry.configured_tables(), 0);
        assert!(registry.constraints::<Player>().is_empty());
    }

    #[test]
    fn test_sql_type_mapping() {
        assert_eq!(SqlType::from(ValueKind::Integer).to_sql(), "INTEGER");
        assert_eq!(SqlType::from(ValueKind::Real).to_sql(), "REAL");
        assert_eq!(SqlType::from(ValueKind::Text).to_sql(), "VARCHAR");
        assert_eq!(SqlType::from(ValueKind::FixedText(6)).to_sql(), "CHAR(6)");
    }
}
