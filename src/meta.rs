//! Static metadata of persistent types.
//!
//! A struct becomes persistent through [`declare_persistent!`](crate::declare_persistent),
//! which implements [`Persistent`] and records, in declaration order, the name,
//! byte offset, value kind and typed accessors of every member. The metadata is
//! built on first access and never changes afterwards.

use crate::backend::QueryRow;
use crate::error::{QueryError, Result};
use crate::types::ValueKind;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Reads a field's current value.
pub type Getter<T> = fn(&T) -> Value;

/// Writes a database value into a field.
pub type Setter<T> = fn(&mut T, &Value) -> Result<()>;

/// A struct declared persistent.
pub trait Persistent: Sized + 'static {
    /// Placeholder set generated by the declaration, one member per field.
    type Fields: Copy;

    fn descriptor() -> &'static TypeDescriptor<Self>;

    fn fields() -> Self::Fields;
}

/// Strip any `a::b::` qualification from a type path.
pub fn table_name_of(type_name: &str) -> &str {
    type_name.rsplit("::").next().unwrap_or(type_name).trim()
}

/// Metadata of a single persistent field.
pub struct FieldDescriptor<T> {
    name: &'static str,
    offset: usize,
    kind: ValueKind,
    getter: Getter<T>,
    setter: Setter<T>,
}

impl<T> FieldDescriptor<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn get(&self, object: &T) -> Value {
        (self.getter)(object)
    }

    pub fn set(&self, object: &mut T, value: &Value) -> Result<()> {
        (self.setter)(object, value)
    }
}

impl<T> fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("offset", &self.offset)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Metadata of a persistent type: table name and ordered fields.
pub struct TypeDescriptor<T> {
    type_name: &'static str,
    table_name: &'static str,
    declared_members: usize,
    fields: Vec<FieldDescriptor<T>>,
}

impl<T> TypeDescriptor<T> {
    pub fn builder(type_name: &'static str, declared_members: usize) -> TypeDescriptorBuilder<T> {
        TypeDescriptorBuilder {
            type_name,
            declared_members,
            fields: Vec::with_capacity(declared_members),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table_name(&self) -> &'static str {
        self.table_name
    }

    /// Number of members named in the declaration.
    pub fn fields_number(&self) -> usize {
        self.declared_members
    }

    pub fn fields(&self) -> &[FieldDescriptor<T>] {
        &self.fields
    }

    pub fn member_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    pub fn field_at(&self, index: usize) -> Option<&FieldDescriptor<T>> {
        self.fields.get(index)
    }

    pub fn field(&self, name: &str) -> Result<&FieldDescriptor<T>> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| QueryError::field_not_found(self.table_name, name))
    }

    pub fn field_position(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| QueryError::field_not_found(self.table_name, name))
    }

    pub fn field_offset(&self, name: &str) -> Result<usize> {
        self.field(name).map(|f| f.offset)
    }

    pub fn field_value_kind(&self, name: &str) -> Result<ValueKind> {
        self.field(name).map(|f| f.kind)
    }

    /// Verify the recorded fields agree with the declaration.
    pub fn check_members(&self) -> Result<()> {
        if self.fields.len() != self.declared_members {
            return Err(QueryError::Schema(format!(
                "{} declares {} members but {} fields were registered",
                self.type_name,
                self.declared_members,
                self.fields.len()
            )));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name) {
                return Err(QueryError::Schema(format!(
                    "{} registers field {} more than once",
                    self.type_name, field.name
                )));
            }
        }

        Ok(())
    }

    /// Current value of every field, in declaration order.
    pub fn values_of(&self, object: &T) -> Vec<Value> {
        self.fields.iter().map(|f| f.get(object)).collect()
    }

    /// Build an object from a result row, column by field name.
    pub fn from_row(&self, row: &QueryRow) -> Result<T>
    where
        T: Default,
    {
        let mut object = T::default();
        for field in &self.fields {
            let value = row
                .columns
                .get(field.name)
                .ok_or_else(|| QueryError::field_not_found(self.table_name, field.name))?;
            field.set(&mut object, value)?;
        }
        Ok(object)
    }
}

impl<T> fmt::Debug for TypeDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.type_name)
            .field("table_name", &self.table_name)
            .field("fields", &self.fields)
            .finish()
    }
}

pub struct TypeDescriptorBuilder<T> {
    type_name: &'static str,
    declared_members: usize,
    fields: Vec<FieldDescriptor<T>>,
}

impl<T> TypeDescriptorBuilder<T> {
    pub fn field(
        mut self,
        name: &'static str,
        offset: usize,
        kind: ValueKind,
        getter: Getter<T>,
        setter: Setter<T>,
    ) -> Self {
        self.fields.push(FieldDescriptor {
            name,
            offset,
            kind,
            getter,
            setter,
        });
        self
    }

    pub fn build(self) -> TypeDescriptor<T> {
        TypeDescriptor {
            type_name: self.type_name,
            table_name: table_name_of(self.type_name),
            declared_members: self.declared_members,
            fields: self.fields,
        }
    }
}

/// Declare a struct persistent.
///
/// ```rust
/// use tx2_persist::declare_persistent;
///
/// #[derive(Debug, Default)]
/// struct Person {
///     id: i32,
///     name: String,
/// }
///
/// declare_persistent!(Person => pub PersonFields { id, name });
/// ```
///
/// `Person::fields()` then returns a `PersonFields` whose members are the
/// placeholders used in query and configuration expressions.
///
/// The placeholder struct is the `Fields` type of a trait impl, so it must be
/// at least as visible as the persistent type: a `pub` struct needs
/// `pub PersonFields`.
#[macro_export]
macro_rules! declare_persistent {
    ($ty:ty => $vis:vis $fields:ident { $($field:ident),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy)]
        #[allow(dead_code)]
        $vis struct $fields {
            $(pub $field: $crate::expr::Field<$ty>,)+
        }

        impl $crate::meta::Persistent for $ty {
            type Fields = $fields;

            fn descriptor() -> &'static $crate::meta::TypeDescriptor<Self> {
                static DESCRIPTOR: ::std::sync::OnceLock<$crate::meta::TypeDescriptor<$ty>> =
                    ::std::sync::OnceLock::new();

                DESCRIPTOR.get_or_init(|| {
                    $crate::meta::TypeDescriptor::<$ty>::builder(
                        stringify!($ty),
                        [$(stringify!($field)),+].len(),
                    )
                    $(
                        .field(
                            stringify!($field),
                            ::core::mem::offset_of!($ty, $field),
                            $crate::types::kind_of(|object: &$ty| &object.$field),
                            |object: &$ty| $crate::types::FieldValue::to_value(&object.$field),
                            |object: &mut $ty, value: &$crate::Value| -> $crate::error::Result<()> {
                                object.$field = $crate::types::FieldValue::from_value(value)?;
                                Ok(())
                            },
                        )
                    )+
                    .build()
                })
            }

            #[allow(unused_assignments)]
            fn fields() -> Self::Fields {
                let mut index = 0usize;
                $fields {
                    $(
                        $field: {
                            let field = $crate::expr::Field::new(index);
                            index += 1;
                            field
                        },
                    )+
                }
            }
        }
    };
}
