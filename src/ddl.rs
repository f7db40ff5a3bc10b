//! Table definition statements.

use crate::constraint::ConstraintStore;
use crate::error::Result;
use crate::meta::Persistent;
use crate::schema::{SqlType, TableSchema};
use crate::types::ValueKind;

/// `CREATE TABLE IF NOT EXISTS` for `T` with the given constraints.
pub fn create_table<T: Persistent>(store: &ConstraintStore) -> Result<String> {
    create_table_with::<T, _>(store, SqlType::from)
}

/// [`create_table`] with a backend-specific column type per value kind.
pub fn create_table_with<T, F>(store: &ConstraintStore, column_type: F) -> Result<String>
where
    T: Persistent,
    F: Fn(ValueKind) -> SqlType,
{
    let descriptor = T::descriptor();
    descriptor.check_members()?;
    Ok(TableSchema::from_descriptor_with(descriptor, store, column_type).to_sql())
}

pub fn drop_table<T: Persistent>() -> String {
    format!("DROP TABLE IF EXISTS {}", T::descriptor().table_name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Person {
        id: i32,
        name: String,
    }

    crate::declare_persistent!(Person => PersonFields { id, name });

    #[test]
    fn test_create_without_constraints() {
        let sql = create_table::<Person>(&ConstraintStore::new()).unwrap();
        assert_eq!(sql, "CREATE TABLE IF NOT EXISTS Person (id INTEGER, name VARCHAR)");
    }

    #[test]
    fn test_composite_primary_key() {
        let mut store = ConstraintStore::new();
        store.add_primary_key("id");
        store.add_primary_key("name");
        store.add_not_null("name");

        let sql = create_table::<Person>(&store).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS Person (id INTEGER, name VARCHAR NOT NULL, PRIMARY KEY (id, name))"
        );
    }

    #[test]
    fn test_backend_column_types() {
        let sql = create_table_with::<Person, _>(&ConstraintStore::new(), |kind| match kind {
            ValueKind::Integer => SqlType::Integer,
            _ => SqlType::Char(8),
        })
        .unwrap();
        assert_eq!(sql, "CREATE TABLE IF NOT EXISTS Person (id INTEGER, name CHAR(8))");
    }

    #[test]
    fn test_drop_table() {
        assert_eq!(drop_table::<Person>(), "DROP TABLE IF EXISTS Person");
    }
}
