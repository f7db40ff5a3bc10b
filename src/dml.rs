//! Data manipulation statements.

use crate::meta::Persistent;
use crate::types::ValueKind;
use serde_json::Value;

/// An INSERT with its bound parameters, in field order.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Build the INSERT for `object`. `placeholder` renders the bind marker for a
/// 1-based parameter position and the value kind of its column.
pub fn insert<T, P>(object: &T, placeholder: P) -> InsertStatement
where
    T: Persistent,
    P: Fn(usize, ValueKind) -> String,
{
    let descriptor = T::descriptor();
    let columns = descriptor.member_names();
    let markers: Vec<String> = descriptor
        .fields()
        .iter()
        .enumerate()
        .map(|(position, field)| placeholder(position + 1, field.kind()))
        .collect();

    InsertStatement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            descriptor.table_name(),
            columns.join(", "),
            markers.join(", ")
        ),
        params: descriptor.values_of(object),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Person {
        id: i32,
        name: String,
        surname: String,
    }

    crate::declare_persistent!(Person => PersonFields { id, name, surname });

    fn person() -> Person {
        Person {
            id: 3,
            name: "name 3".to_string(),
            surname: String::new(),
        }
    }

    #[test]
    fn test_insert_question_marks() {
        let stmt = insert(&person(), |_, _| "?".to_string());
        assert_eq!(stmt.sql, "INSERT INTO Person (id, name, surname) VALUES (?, ?, ?)");
        assert_eq!(
            stmt.params,
            vec![Value::from(3), Value::from("name 3"), Value::Null]
        );
    }

    #[test]
    fn test_insert_numbered_markers() {
        let stmt = insert(&person(), |i, _| format!("${}", i));
        assert!(stmt.sql.ends_with("VALUES ($1, $2, $3)"));
    }

    #[test]
    fn test_insert_markers_see_column_kinds() {
        let stmt = insert(&person(), |i, kind| match kind {
            ValueKind::Integer => format!("${}::INTEGER", i),
            _ => format!("${}::VARCHAR", i),
        });
        assert!(stmt
            .sql
            .ends_with("VALUES ($1::INTEGER, $2::VARCHAR, $3::VARCHAR)"));
    }
}
