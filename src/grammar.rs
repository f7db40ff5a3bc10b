//! The closed grammar accepted by the evaluation contexts.
//!
//! Query grammar:
//!
//! ```text
//! query  := field <op> literal | query AND query
//! op     := = | <> | > | < | >= | <=
//! ```
//!
//! Configuration grammar:
//!
//! ```text
//! config := field = constraint
//! ```
//!
//! Field placeholders must index into the owner's fields and foreign-key
//! references must resolve to a column of the referenced type.

use crate::error::{QueryError, Result};
use crate::expr::{BinaryOp, ConstraintTag, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    Query,
    Configuration,
}

/// Whether `node` conforms to `grammar` for a type with `field_count` fields.
pub fn matches(node: &Node, grammar: Grammar, field_count: usize) -> bool {
    validate(node, grammar, field_count).is_ok()
}

/// Check `node` against `grammar`, reporting the first offending shape.
pub fn validate(node: &Node, grammar: Grammar, field_count: usize) -> Result<()> {
    match grammar {
        Grammar::Query => validate_query(node, field_count),
        Grammar::Configuration => validate_configuration(node, field_count),
    }
}

fn invalid(reason: impl Into<String>) -> QueryError {
    QueryError::InvalidExpression(reason.into())
}

fn validate_field(node: &Node, field_count: usize) -> Result<()> {
    match node {
        Node::Field(index) if *index < field_count => Ok(()),
        Node::Field(index) => Err(invalid(format!(
            "placeholder {} is outside the {} declared fields",
            index, field_count
        ))),
        other => Err(invalid(format!("expected a field placeholder, found {:?}", other))),
    }
}

fn validate_query(node: &Node, field_count: usize) -> Result<()> {
    match node {
        Node::Binary { op, left, right } if op.is_comparison() => {
            validate_field(left, field_count)?;
            match right.as_ref() {
                Node::Literal(_) => Ok(()),
                other => Err(invalid(format!(
                    "comparison expects a literal on the right, found {:?}",
                    other
                ))),
            }
        }
        Node::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => {
            validate_query(left, field_count)?;
            validate_query(right, field_count)
        }
        Node::Binary { op, .. } => Err(invalid(format!("operator {} is not allowed in a query", op))),
        other => Err(invalid(format!("{:?} is not a query predicate", other))),
    }
}

fn validate_configuration(node: &Node, field_count: usize) -> Result<()> {
    match node {
        Node::Binary {
            op: BinaryOp::Assign,
            left,
            right,
        } => {
            validate_field(left, field_count)?;
            match right.as_ref() {
                Node::Constraint(ConstraintTag::ForeignKey(reference)) if reference.column().is_none() => {
                    Err(invalid(format!(
                        "foreign key placeholder {} is outside the fields of {}",
                        reference.index(),
                        reference.table()
                    )))
                }
                Node::Constraint(_) => Ok(()),
                other => Err(invalid(format!(
                    "assignment expects a constraint on the right, found {:?}",
                    other
                ))),
            }
        }
        other => Err(invalid(format!(
            "{:?} is not a configuration assignment",
            other
        ))),
    }
}
