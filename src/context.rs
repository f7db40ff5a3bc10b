//! Evaluation contexts over expression trees.
//!
//! [`eval`] walks a tree and dispatches each node to an [`EvalContext`].
//! [`QueryContext`] renders a predicate as SQL text; [`ConfigContext`]
//! registers constraints into a [`ConstraintStore`]. Trees are expected to be
//! validated against the matching [`Grammar`](crate::grammar::Grammar) first;
//! both contexts still reject nodes they cannot interpret.

use crate::constraint::ConstraintStore;
use crate::error::{QueryError, Result};
use crate::expr::{BinaryOp, ConstraintTag, Literal, Node};
use crate::meta::TypeDescriptor;

/// Visitor invoked by [`eval`] for each node kind.
pub trait EvalContext {
    type Output;

    fn field(&mut self, index: usize) -> Result<Self::Output>;

    fn literal(&mut self, literal: &Literal) -> Result<Self::Output>;

    fn constraint(&mut self, tag: &ConstraintTag) -> Result<Self::Output>;

    fn binary(&mut self, op: BinaryOp, left: &Node, right: &Node) -> Result<Self::Output>;
}

/// Evaluate `node` in `ctx`.
pub fn eval<C>(node: &Node, ctx: &mut C) -> Result<C::Output>
where
    C: EvalContext + ?Sized,
{
    match node {
        Node::Field(index) => ctx.field(*index),
        Node::Literal(literal) => ctx.literal(literal),
        Node::Constraint(tag) => ctx.constraint(tag),
        Node::Binary { op, left, right } => ctx.binary(*op, left, right),
    }
}

/// Quote a text literal, doubling embedded single quotes.
pub fn quote_text(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn field_name<T>(descriptor: &TypeDescriptor<T>, index: usize) -> Result<&'static str> {
    descriptor.field_at(index).map(|f| f.name()).ok_or_else(|| {
        QueryError::InvalidExpression(format!(
            "placeholder {} is outside the fields of {}",
            index,
            descriptor.table_name()
        ))
    })
}

/// Renders a query predicate as a SQL fragment.
pub struct QueryContext<'a, T> {
    descriptor: &'a TypeDescriptor<T>,
}

impl<'a, T> QueryContext<'a, T> {
    pub fn new(descriptor: &'a TypeDescriptor<T>) -> Self {
        Self { descriptor }
    }
}

impl<T> EvalContext for QueryContext<'_, T> {
    type Output = String;

    fn field(&mut self, index: usize) -> Result<String> {
        field_name(self.descriptor, index).map(str::to_string)
    }

    fn literal(&mut self, literal: &Literal) -> Result<String> {
        Ok(match literal {
            Literal::Integer(i) => i.to_string(),
            Literal::Unsigned(u) => u.to_string(),
            Literal::Text(s) => quote_text(s),
        })
    }

    fn constraint(&mut self, tag: &ConstraintTag) -> Result<String> {
        Err(QueryError::InvalidExpression(format!(
            "constraint {:?} cannot appear in a query",
            tag
        )))
    }

    fn binary(&mut self, op: BinaryOp, left: &Node, right: &Node) -> Result<String> {
        match op {
            BinaryOp::Assign => Err(QueryError::InvalidExpression(
                "assignment cannot appear in a query".to_string(),
            )),
            _ => {
                let left = eval(left, self)?;
                let right = eval(right, self)?;
                Ok(format!("{} {} {}", left, op, right))
            }
        }
    }
}

/// Registers constraints from a single configuration assignment.
///
/// The field named on the left of the assignment is held in a slot that the
/// constraint on the right reads, so each assignment needs its own context.
pub struct ConfigContext<'a, T> {
    descriptor: &'a TypeDescriptor<T>,
    store: &'a mut ConstraintStore,
    field_name: Option<&'static str>,
}

impl<'a, T> ConfigContext<'a, T> {
    pub fn new(descriptor: &'a TypeDescriptor<T>, store: &'a mut ConstraintStore) -> Self {
        Self {
            descriptor,
            store,
            field_name: None,
        }
    }

    fn current_field(&self) -> Result<&'static str> {
        self.field_name.ok_or_else(|| {
            QueryError::InvalidExpression("constraint has no target field".to_string())
        })
    }
}

impl<T> EvalContext for ConfigContext<'_, T> {
    type Output = bool;

    fn field(&mut self, index: usize) -> Result<bool> {
        self.field_name = Some(field_name(self.descriptor, index)?);
        Ok(true)
    }

    fn literal(&mut self, literal: &Literal) -> Result<bool> {
        Err(QueryError::InvalidExpression(format!(
            "literal {:?} cannot appear in a configuration",
            literal
        )))
    }

    fn constraint(&mut self, tag: &ConstraintTag) -> Result<bool> {
        let field = self.current_field()?;
        let table = self.descriptor.table_name();

        match tag {
            ConstraintTag::NotNull => {
                self.store.add_not_null(field);
            }
            ConstraintTag::Unique => {
                self.store.add_unique(field);
            }
            ConstraintTag::PrimaryKey => {
                self.store.add_primary_key(field);
            }
            ConstraintTag::ForeignKey(reference) => {
                let column = reference.column().ok_or_else(|| {
                    QueryError::InvalidExpression(format!(
                        "foreign key placeholder {} is outside the fields of {}",
                        reference.index(),
                        reference.table()
                    ))
                })?;
                self.store.add_foreign_key(field, reference.table(), column);
            }
        }

        tracing::trace!(table, field, constraint = ?tag, "registered constraint");
        Ok(true)
    }

    fn binary(&mut self, op: BinaryOp, left: &Node, right: &Node) -> Result<bool> {
        match op {
            BinaryOp::Assign => {
                let l = eval(left, self)?;
                let r = eval(right, self)?;
                Ok(l & r)
            }
            _ => Err(QueryError::InvalidExpression(format!(
                "operator {} cannot appear in a configuration",
                op
            ))),
        }
    }
}
