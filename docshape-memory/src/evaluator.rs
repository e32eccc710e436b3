//! Filter evaluation against in-memory documents.
//!
//! Field paths may be dotted (`address.city`, `tags.0`). Equality and membership on an
//! array field match when any element matches, the way a document database does.

use std::cmp::Ordering;

use bson::{Binary, Bson, Document, datetime::DateTime, oid::ObjectId};

use docshape_core::{
    error::{StoreError, StoreResult},
    query::{Expr, FieldOp, QueryVisitor},
};

/// Comparable view of a document value.
///
/// Numbers of every width compare as `f64`. Values of different kinds order by kind,
/// so a sort over mixed fields is still total.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Number(f64),
    String(&'a str),
    Document(Vec<(&'a str, Comparable<'a>)>),
    Array(Vec<Comparable<'a>>),
    Binary(&'a Binary),
    ObjectId(ObjectId),
    Bool(bool),
    DateTime(DateTime),
    /// Any other value, compared by its raw representation.
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(f64::from(*value)),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) | Bson::Symbol(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Binary(value) => Comparable::Binary(value),
            Bson::Array(items) => Comparable::Array(items.iter().map(Comparable::from).collect()),
            Bson::Document(document) => Comparable::Document(
                document
                    .iter()
                    .map(|(key, value)| (key.as_str(), Comparable::from(value)))
                    .collect(),
            ),
            other => Comparable::Other(other),
        }
    }
}

impl Comparable<'_> {
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Document(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Binary(_) => 5,
            Comparable::ObjectId(_) => 6,
            Comparable::Bool(_) => 7,
            Comparable::DateTime(_) => 8,
            Comparable::Other(_) => 9,
        }
    }

    /// Orders values of the same kind; `None` for different kinds or unordered values.
    fn compare_same_kind(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => Some(a.cmp(b)),
            (Comparable::Bool(a), Comparable::Bool(b)) => Some(a.cmp(b)),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => Some(a.cmp(b)),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => Some(a.bytes().cmp(&b.bytes())),
            (Comparable::Binary(a), Comparable::Binary(b)) => Some(
                a.bytes
                    .len()
                    .cmp(&b.bytes.len())
                    .then_with(|| u8::from(a.subtype).cmp(&u8::from(b.subtype)))
                    .then_with(|| a.bytes.cmp(&b.bytes)),
            ),
            (Comparable::Array(a), Comparable::Array(b)) => {
                for (left, right) in a.iter().zip(b) {
                    match left.total_cmp(right) {
                        Ordering::Equal => continue,
                        other => return Some(other),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            (Comparable::Document(a), Comparable::Document(b)) => {
                for ((left_key, left), (right_key, right)) in a.iter().zip(b) {
                    match left_key.cmp(right_key).then_with(|| left.total_cmp(right)) {
                        Ordering::Equal => continue,
                        other => return Some(other),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            (Comparable::Other(a), Comparable::Other(b)) => (a == b).then_some(Ordering::Equal),
            _ => None,
        }
    }

    /// Total order used for sorting: by kind first, then by value.
    pub(crate) fn total_cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.compare_same_kind(other).unwrap_or(Ordering::Equal))
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.compare_same_kind(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare_same_kind(other)
    }
}

/// Resolves a dotted path inside a document. Numeric segments index into arrays.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let first = document.get(segments.next()?)?;

    segments.try_fold(first, |current, segment| match current {
        Bson::Document(inner) => inner.get(segment),
        Bson::Array(items) => segment.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    })
}

/// Evaluates filter expressions against one document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> StoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Evaluates an optional filter; no filter matches everything.
    pub fn matches(document: &Document, filter: Option<&Expr>) -> StoreResult<bool> {
        match filter {
            Some(expr) => DocumentEvaluator::new(document).evaluate(expr),
            None => Ok(true),
        }
    }

    fn equals(field_value: Option<&Bson>, value: &Bson) -> bool {
        let expected = Comparable::from(value);
        match field_value {
            // A missing field equals null.
            None => expected == Comparable::Null,
            Some(field_value) => {
                let actual = Comparable::from(field_value);
                if actual == expected {
                    return true;
                }
                match actual {
                    Comparable::Array(items) => items.iter().any(|item| *item == expected),
                    _ => false,
                }
            }
        }
    }

    fn ordered(field_value: Option<&Bson>, value: &Bson, accept: fn(Ordering) -> bool) -> bool {
        let Some(field_value) = field_value else {
            return false;
        };

        let expected = Comparable::from(value);
        let hit = |actual: &Comparable<'_>| actual.partial_cmp(&expected).is_some_and(accept);

        match Comparable::from(field_value) {
            Comparable::Array(items) if !matches!(expected, Comparable::Array(_)) => {
                items.iter().any(hit)
            }
            actual => hit(&actual),
        }
    }
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = StoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let field_value = lookup(self.document, field);

        match op {
            FieldOp::Eq => Ok(Self::equals(field_value, value)),
            FieldOp::Ne => Ok(!Self::equals(field_value, value)),
            FieldOp::Gt => Ok(Self::ordered(field_value, value, Ordering::is_gt)),
            FieldOp::Gte => Ok(Self::ordered(field_value, value, Ordering::is_ge)),
            FieldOp::Lt => Ok(Self::ordered(field_value, value, Ordering::is_lt)),
            FieldOp::Lte => Ok(Self::ordered(field_value, value, Ordering::is_le)),
            FieldOp::In | FieldOp::Nin => {
                let Bson::Array(candidates) = value else {
                    return Err(StoreError::InvalidDocument(format!(
                        "{} requires an array of values",
                        op.operator()
                    )));
                };
                let found = candidates
                    .iter()
                    .any(|candidate| Self::equals(field_value, candidate));
                Ok(if op == FieldOp::In { found } else { !found })
            }
        }
    }
}
