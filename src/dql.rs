//! SELECT and COUNT queries over persistent types.

use crate::backend::DatabaseBackend;
use crate::context::{eval, QueryContext};
use crate::error::Result;
use crate::expr::{Expr, Field, Node};
use crate::grammar::{self, Grammar};
use crate::meta::Persistent;
use crate::session::Session;
use std::fmt;
use std::marker::PhantomData;

/// Logical operators for combining conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::And => write!(f, "AND"),
            LogicalOp::Or => write!(f, "OR"),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// ORDER BY clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: usize,
    pub direction: SortDirection,
}

/// Query over the table of `T`.
///
/// Predicates are kept as trees and rendered by [`QueryFrom::build`], which
/// validates each of them first. `conjunction` and `disjunction` append to
/// the filter textually, in call order, without regrouping.
pub struct QueryFrom<T> {
    filters: Vec<(Option<LogicalOp>, Node)>,
    order_by: Vec<OrderBy>,
    limit: Option<usize>,
    offset: Option<usize>,
    _owner: PhantomData<fn() -> T>,
}

/// Start a query over the table of `T`.
pub fn query_from<T: Persistent>() -> QueryFrom<T> {
    QueryFrom::new()
}

impl<T: Persistent> QueryFrom<T> {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            _owner: PhantomData,
        }
    }

    /// Set the WHERE predicate, replacing any previous filter.
    pub fn where_clause(mut self, expr: Expr<T>) -> Self {
        self.filters.clear();
        self.filters.push((None, expr.into_node()));
        self
    }

    /// Append `AND <predicate>`. Acts as `where_clause` on an empty filter.
    pub fn conjunction(self, expr: Expr<T>) -> Self {
        self.append(LogicalOp::And, expr)
    }

    /// Append `OR <predicate>`. Acts as `where_clause` on an empty filter.
    pub fn disjunction(self, expr: Expr<T>) -> Self {
        self.append(LogicalOp::Or, expr)
    }

    fn append(mut self, op: LogicalOp, expr: Expr<T>) -> Self {
        let op = if self.filters.is_empty() { None } else { Some(op) };
        self.filters.push((op, expr.into_node()));
        self
    }

    pub fn order_by(mut self, field: Field<T>, direction: SortDirection) -> Self {
        self.order_by.push(OrderBy {
            field: field.index(),
            direction,
        });
        self
    }

    /// Add ascending ORDER BY on each field, in order
    pub fn order_by_asc(self, fields: impl IntoIterator<Item = Field<T>>) -> Self {
        fields
            .into_iter()
            .fold(self, |query, field| query.order_by(field, SortDirection::Asc))
    }

    /// Add descending ORDER BY on each field, in order
    pub fn order_by_desc(self, fields: impl IntoIterator<Item = Field<T>>) -> Self {
        fields
            .into_iter()
            .fold(self, |query, field| query.order_by(field, SortDirection::Desc))
    }

    /// Set LIMIT
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set OFFSET
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn has_limit(&self) -> bool {
        self.limit.is_some()
    }

    fn where_sql(&self) -> Result<String> {
        let descriptor = T::descriptor();
        let mut sql = String::new();

        for (op, node) in &self.filters {
            grammar::validate(node, Grammar::Query, descriptor.fields_number())?;
            let predicate = eval(node, &mut QueryContext::new(descriptor))?;

            match op {
                None => sql.push_str(" WHERE "),
                Some(op) => sql.push_str(&format!(" {} ", op)),
            }
            sql.push_str(&predicate);
        }

        Ok(sql)
    }

    fn order_sql(&self) -> Result<String> {
        if self.order_by.is_empty() {
            return Ok(String::new());
        }

        let descriptor = T::descriptor();
        let mut clauses = Vec::with_capacity(self.order_by.len());
        for order in &self.order_by {
            let column = eval(&Node::Field(order.field), &mut QueryContext::new(descriptor))?;
            clauses.push(format!("{} {}", column, order.direction));
        }

        Ok(format!(" ORDER BY {}", clauses.join(", ")))
    }

    /// Build the SELECT statement
    pub fn build(&self) -> Result<String> {
        let descriptor = T::descriptor();
        let mut sql = format!(
            "SELECT {} FROM {}",
            descriptor.member_names().join(", "),
            descriptor.table_name()
        );

        sql.push_str(&self.where_sql()?);
        sql.push_str(&self.order_sql()?);

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        Ok(sql)
    }

    /// Build the COUNT statement; ordering and paging are ignored.
    pub fn build_count(&self) -> Result<String> {
        let mut sql = format!("SELECT COUNT(*) FROM {}", T::descriptor().table_name());
        sql.push_str(&self.where_sql()?);
        Ok(sql)
    }

    /// Every matching row as an object.
    pub async fn objects<B>(&self, session: &Session<B>) -> Result<Vec<T>>
    where
        T: Default,
        B: DatabaseBackend,
    {
        session.objects(self).await
    }

    /// First matching row, if any.
    pub async fn object<B>(&self, session: &Session<B>) -> Result<Option<T>>
    where
        T: Default,
        B: DatabaseBackend,
    {
        session.object(self).await
    }

    pub async fn count<B>(&self, session: &Session<B>) -> Result<i64>
    where
        B: DatabaseBackend,
    {
        session.count(self).await
    }
}

impl<T: Persistent> Default for QueryFrom<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for QueryFrom<T> {
    fn clone(&self) -> Self {
        Self {
            filters: self.filters.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
            _owner: PhantomData,
        }
    }
}

impl<T> fmt::Debug for QueryFrom<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryFrom")
            .field("filters", &self.filters)
            .field("order_by", &self.order_by)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish()
    }
}
