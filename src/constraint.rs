use crate::error::Result;
use serde::Serialize;
use serde_json::Value;

/// Column referenced by a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
}

/// Constraints accumulated for one persistent type.
///
/// Every collection keeps insertion order and set semantics: adding a
/// constraint twice has no effect. Nothing is ever removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConstraintStore {
    not_null: Vec<String>,
    unique: Vec<String>,
    primary_key: Vec<String>,
    foreign_keys: Vec<(String, ForeignKeyRef)>,
}

fn insert_unique(set: &mut Vec<String>, field: &str) -> bool {
    if set.iter().any(|f| f == field) {
        return false;
    }
    set.push(field.to_string());
    true
}

impl ConstraintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_not_null(&mut self, field: &str) -> bool {
        insert_unique(&mut self.not_null, field)
    }

    pub fn add_unique(&mut self, field: &str) -> bool {
        insert_unique(&mut self.unique, field)
    }

    pub fn add_primary_key(&mut self, field: &str) -> bool {
        insert_unique(&mut self.primary_key, field)
    }

    /// Register `field -> table(column)`. A field keeps its first reference.
    pub fn add_foreign_key(&mut self, field: &str, table: &str, column: &str) -> bool {
        if self.foreign_key(field).is_some() {
            return false;
        }
        self.foreign_keys.push((
            field.to_string(),
            ForeignKeyRef {
                table: table.to_string(),
                column: column.to_string(),
            },
        ));
        true
    }

    pub fn not_null(&self) -> &[String] {
        &self.not_null
    }

    pub fn unique(&self) -> &[String] {
        &self.unique
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn foreign_keys(&self) -> &[(String, ForeignKeyRef)] {
        &self.foreign_keys
    }

    pub fn foreign_key(&self, field: &str) -> Option<&ForeignKeyRef> {
        self.foreign_keys
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, reference)| reference)
    }

    pub fn is_not_null(&self, field: &str) -> bool {
        self.not_null.iter().any(|f| f == field)
    }

    pub fn is_unique(&self, field: &str) -> bool {
        self.unique.iter().any(|f| f == field)
    }

    pub fn is_primary_key(&self, field: &str) -> bool {
        self.primary_key.iter().any(|f| f == field)
    }

    /// The registered constraints as a JSON object, for inspection and logs.
    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn is_empty(&self) -> bool {
        self.not_null.is_empty()
            && self.unique.is_empty()
            && self.primary_key.is_empty()
            && self.foreign_keys.is_empty()
    }
}
