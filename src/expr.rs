//! Field placeholders and expression trees.
//!
//! Expressions are built at the call site from the placeholders of a
//! persistent type:
//!
//! ```rust
//! use tx2_persist::prelude::*;
//!
//! #[derive(Debug, Default)]
//! struct Person {
//!     id: i32,
//!     name: String,
//! }
//!
//! declare_persistent!(Person => PersonFields { id, name });
//!
//! let f = Person::fields();
//! let predicate = f.id.eq(20) & f.name.eq("name 20");
//! let constraint = f.id.assign(primary_key());
//! # let _ = (predicate, constraint);
//! ```
//!
//! Trees are validated against a [`Grammar`](crate::grammar::Grammar) before
//! they are evaluated.

use crate::meta::Persistent;
use std::fmt;
use std::marker::PhantomData;
use std::ops::BitAnd;

/// Placeholder for field `index` of the persistent type `T`.
pub struct Field<T> {
    index: usize,
    _owner: PhantomData<fn() -> T>,
}

impl<T> Field<T> {
    #[doc(hidden)]
    pub const fn new(index: usize) -> Self {
        Self {
            index,
            _owner: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    fn compare(self, op: BinaryOp, literal: Literal) -> Expr<T> {
        Expr::from_node(Node::binary(op, Node::Field(self.index), Node::Literal(literal)))
    }

    pub fn eq(self, value: impl Into<Literal>) -> Expr<T> {
        self.compare(BinaryOp::Eq, value.into())
    }

    pub fn ne(self, value: impl Into<Literal>) -> Expr<T> {
        self.compare(BinaryOp::Ne, value.into())
    }

    pub fn gt(self, value: impl Into<Literal>) -> Expr<T> {
        self.compare(BinaryOp::Gt, value.into())
    }

    pub fn lt(self, value: impl Into<Literal>) -> Expr<T> {
        self.compare(BinaryOp::Lt, value.into())
    }

    pub fn ge(self, value: impl Into<Literal>) -> Expr<T> {
        self.compare(BinaryOp::Ge, value.into())
    }

    pub fn le(self, value: impl Into<Literal>) -> Expr<T> {
        self.compare(BinaryOp::Le, value.into())
    }

    /// Configuration assignment `field = constraint`.
    pub fn assign(self, constraint: ConstraintTag) -> Expr<T> {
        Expr::from_node(Node::binary(
            BinaryOp::Assign,
            Node::Field(self.index),
            Node::Constraint(constraint),
        ))
    }
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Field<T> {}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Field({})", self.index)
    }
}

/// Literal leaf of a query expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Integer(i64),
    /// Unsigned values that may not fit in `i64`
    Unsigned(u64),
    Text(String),
}

macro_rules! impl_integer_literal {
    ($($t:ty),+) => {
        $(
            impl From<$t> for Literal {
                fn from(value: $t) -> Self {
                    Literal::Integer(i64::from(value))
                }
            }
        )+
    };
}

impl_integer_literal!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Literal {
    fn from(value: u64) -> Self {
        Literal::Unsigned(value)
    }
}

impl From<usize> for Literal {
    fn from(value: usize) -> Self {
        Literal::Unsigned(value as u64)
    }
}

impl From<isize> for Literal {
    fn from(value: isize) -> Self {
        Literal::Integer(value as i64)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Integer(i64::from(value))
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Text(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Text(value)
    }
}

impl From<&String> for Literal {
    fn from(value: &String) -> Self {
        Literal::Text(value.clone())
    }
}

/// Column referenced by a foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    table: &'static str,
    column: Option<&'static str>,
    index: usize,
}

impl Reference {
    pub fn table(&self) -> &'static str {
        self.table
    }

    /// `None` when the placeholder index is outside the referenced type.
    pub fn column(&self) -> Option<&'static str> {
        self.column
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// Constraint leaf of a configuration expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintTag {
    NotNull,
    Unique,
    PrimaryKey,
    ForeignKey(Reference),
}

pub fn not_null() -> ConstraintTag {
    ConstraintTag::NotNull
}

pub fn unique() -> ConstraintTag {
    ConstraintTag::Unique
}

pub fn primary_key() -> ConstraintTag {
    ConstraintTag::PrimaryKey
}

/// Reference `field` of another persistent type.
pub fn foreign_key<U: Persistent>(field: Field<U>) -> ConstraintTag {
    let descriptor = U::descriptor();
    ConstraintTag::ForeignKey(Reference {
        table: descriptor.table_name(),
        column: descriptor.field_at(field.index()).map(|f| f.name()),
        index: field.index(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    And,
    Assign,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Gt | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Le
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Eq => write!(f, "="),
            BinaryOp::Ne => write!(f, "<>"),
            BinaryOp::Gt => write!(f, ">"),
            BinaryOp::Lt => write!(f, "<"),
            BinaryOp::Ge => write!(f, ">="),
            BinaryOp::Le => write!(f, "<="),
            BinaryOp::And => write!(f, "AND"),
            BinaryOp::Assign => write!(f, ":="),
        }
    }
}

/// Untyped expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Field(usize),
    Literal(Literal),
    Constraint(ConstraintTag),
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    pub fn binary(op: BinaryOp, left: Node, right: Node) -> Self {
        Node::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

/// Expression tree over the fields of `T`.
pub struct Expr<T> {
    node: Node,
    _owner: PhantomData<fn() -> T>,
}

impl<T> Expr<T> {
    pub fn from_node(node: Node) -> Self {
        Self {
            node,
            _owner: PhantomData,
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn into_node(self) -> Node {
        self.node
    }

    pub fn and(self, other: Expr<T>) -> Expr<T> {
        Expr::from_node(Node::binary(BinaryOp::And, self.node, other.node))
    }
}

impl<T> BitAnd for Expr<T> {
    type Output = Expr<T>;

    fn bitand(self, rhs: Expr<T>) -> Expr<T> {
        self.and(rhs)
    }
}

impl<T> Clone for Expr<T> {
    fn clone(&self) -> Self {
        Expr::from_node(self.node.clone())
    }
}

impl<T> fmt::Debug for Expr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expr").field(&self.node).finish()
    }
}
