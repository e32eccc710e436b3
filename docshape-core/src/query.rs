//! Query specifications.
//!
//! Queries are [`Expr`] trees built with the [`Filter`] helpers, rendered into driver
//! filter documents by [`render_filter`], or derived from loosely typed host values by
//! [`Converter::identity_query`].
//!
//! # Example
//!
//! ```ignore
//! use docshape_core::{convert::Converter, host::{HostMap, HostValue}, query::Filter};
//!
//! let by_id = Converter::new().identity_query(&HostValue::from(5))?;
//! assert_eq!(by_id, Filter::eq("_id", 5));
//!
//! let expr = Filter::eq("status", "active").and(Filter::gt("age", 18));
//! ```

use bson::{Bson, Document, doc};

use crate::{
    convert::Converter,
    error::{ConversionError, ConversionResult},
    host::HostValue,
};

/// The reserved identity field.
pub const ID_FIELD: &str = "_id";

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to (exact match).
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Field value is one of the values of an array.
    In,
    /// Field value is none of the values of an array.
    Nin,
}

impl FieldOp {
    /// The driver operator name.
    pub fn operator(self) -> &'static str {
        match self {
            FieldOp::Eq => "$eq",
            FieldOp::Ne => "$ne",
            FieldOp::Gt => "$gt",
            FieldOp::Gte => "$gte",
            FieldOp::Lt => "$lt",
            FieldOp::Lte => "$lte",
            FieldOp::In => "$in",
            FieldOp::Nin => "$nin",
        }
    }
}

/// A filter expression for matching documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOT of an expression.
    Not(Box<Expr>),
    /// Checks if a field exists or doesn't exist.
    Exists(String, bool),
    /// Field comparison expression.
    Field {
        field: String,
        op: FieldOp,
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    ///
    /// If this expression is already an OR, the other expression is appended.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression.
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

/// Constructors for filter expressions.
pub struct Filter;

impl Filter {
    /// Matches documents whose field equals `value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// Matches documents whose field differs from `value`, including those lacking it.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    /// Field strictly greater than `value`.
    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    /// Field greater than or equal to `value`.
    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    /// Field strictly less than `value`.
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    /// Field less than or equal to `value`.
    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Matches documents whose field equals any of `values`.
    pub fn any_of(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Bson>>) -> Expr {
        let values = values.into_iter().map(Into::into).collect::<Vec<Bson>>();
        Expr::field(field.into(), FieldOp::In, Bson::Array(values))
    }

    /// Matches documents whose field equals none of `values`.
    pub fn none_of(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Bson>>) -> Expr {
        let values = values.into_iter().map(Into::into).collect::<Vec<Bson>>();
        Expr::field(field.into(), FieldOp::Nin, Bson::Array(values))
    }

    /// Matches documents that have the field, even when it is null.
    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    /// Matches documents without the field.
    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    /// All of `exprs` must match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// At least one of `exprs` must match.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    /// Equality on the identity field.
    pub fn id(value: impl Into<Bson>) -> Expr {
        Filter::eq(ID_FIELD, value)
    }
}

/// Visits a filter expression tree.
pub trait QueryVisitor {
    type Output;
    type Error;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error>;
    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, *op, value),
        }
    }
}

/// Renders filter expressions into driver filter documents.
pub struct FilterRenderer;

impl QueryVisitor for FilterRenderer {
    type Output = Document;
    type Error = ConversionError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    // `$not` only applies to operator expressions, so a negated filter renders as `$nor`.
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        match (op, value) {
            (FieldOp::Eq, _) => Ok(doc! { field: value.clone() }),
            (FieldOp::In | FieldOp::Nin, Bson::Array(_)) => Ok(doc! {
                field: { op.operator(): value.clone() },
            }),
            (FieldOp::In | FieldOp::Nin, other) => Err(ConversionError::InvalidQueryObjectType(format!(
                "{} requires an array, found {:?}",
                op.operator(),
                other.element_type()
            ))),
            _ => Ok(doc! {
                field: { op.operator(): value.clone() },
            }),
        }
    }
}

/// Renders a filter expression into a driver filter document.
pub fn render_filter(expr: &Expr) -> ConversionResult<Document> {
    FilterRenderer.visit_expr(expr)
}

impl<'f> Converter<'f> {
    /// Derives an identity query from a host value.
    ///
    /// - a recognised query passes through unchanged;
    /// - document-shaped values (mappings, property bags, views, documents) must carry
    ///   `_id` and yield an equality match on it, otherwise
    ///   [`ConversionError::MissingIdentity`];
    /// - a bare scalar is taken as the identity value itself.
    ///
    /// Null, sequences and other specification objects are
    /// [`ConversionError::InvalidQueryObjectType`].
    pub fn identity_query(&self, value: &HostValue) -> ConversionResult<Expr> {
        match value {
            HostValue::Query(expr) => Ok(expr.clone()),
            HostValue::Null | HostValue::Bson(Bson::Null) => Err(invalid_query(value)),
            HostValue::Seq(_)
            | HostValue::Array(_)
            | HostValue::Bson(Bson::Array(_))
            | HostValue::Update(_)
            | HostValue::Projection(_) => Err(invalid_query(value)),
            HostValue::Map(_)
            | HostValue::Object(_)
            | HostValue::Document(_)
            | HostValue::Bson(Bson::Document(_)) => self.identity_of_document(value),
            HostValue::Opaque(object) if object.properties().is_some() => {
                self.identity_of_document(value)
            }
            scalar => Ok(Filter::id(self.to_bson(scalar)?)),
        }
    }

    fn identity_of_document(&self, value: &HostValue) -> ConversionResult<Expr> {
        let document = self.to_document(None, value, None)?;
        let id = document
            .borrow()
            .get(ID_FIELD)
            .cloned()
            .ok_or_else(|| ConversionError::MissingIdentity(ID_FIELD.to_string()))?;
        Ok(Filter::id(id))
    }
}

fn invalid_query(value: &HostValue) -> ConversionError {
    ConversionError::InvalidQueryObjectType(value.type_name())
}
