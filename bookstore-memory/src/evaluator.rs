//! Query expression evaluation for in-memory document filtering.
//!
//! This module provides the evaluation engine for filter expressions and the
//! ordering used for sorting, over BSON documents.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document, datetime::DateTime};

use bookstore_core::{
    query::{Expr, FieldOp, QueryVisitor},
    error::{DocumentStoreError, DocumentStoreResult},
};


/// Comparable representation of BSON values.
///
/// Integers and floats are normalized to f64 so `Int32(10)` equals `Double(10.0)`.
/// `Null` (also used for missing fields and unsupported types) orders before
/// every other value, matching how MongoDB sorts missing fields first.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null,
        }
    }
}

impl<'a> Comparable<'a> {
    /// Reads `field` from a document, treating a missing field as `Null`.
    pub(crate) fn of_field(document: &'a Bson, field: &str) -> Self {
        document
            .as_document()
            .and_then(|doc| doc.get(field))
            .map(Comparable::from)
            .unwrap_or(Comparable::Null)
    }

    /// Total order used for sorting: `Null` first, then values of the same
    /// kind by their natural order; values of different kinds compare equal.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Ordering::Equal,
            (Comparable::Null, _) => Ordering::Less,
            (_, Comparable::Null) => Ordering::Greater,
            _ => self.partial_cmp(other).unwrap_or(Ordering::Equal),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}


pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Bson) -> DocumentStoreResult<Self> {
        document
            .as_document()
            .map(|document| Self { document })
            .ok_or_else(|| DocumentStoreError::InvalidDocument("Expected document".into()))
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Returns whether `document` matches `expr`.
    pub fn matches(document: &Bson, expr: &Expr) -> DocumentStoreResult<bool> {
        DocumentEvaluator::new(document)?.evaluate(expr)
    }
}

fn contains_value(values: &Bson, needle: &Comparable<'_>) -> DocumentStoreResult<bool> {
    match values {
        Bson::Array(values) => Ok(
            values
                .iter()
                .any(|value| &Comparable::from(value) == needle)
        ),
        _ => Err(DocumentStoreError::InvalidQuery(
            "AnyOf/NoneOf operators require an array value".to_string(),
        )),
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

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
        Ok(self.document.get(field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let field_value = self
            .document
            .get(field)
            .map(Comparable::from)
            .unwrap_or(Comparable::Null);

        match op {
            FieldOp::Eq => Ok(field_value == Comparable::from(value)),
            FieldOp::Ne => Ok(field_value != Comparable::from(value)),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                match field_value.partial_cmp(&Comparable::from(value)) {
                    Some(ordering) => Ok(match op {
                        FieldOp::Gt => ordering == Ordering::Greater,
                        FieldOp::Gte => ordering != Ordering::Less,
                        FieldOp::Lt => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    }),
                    None => Ok(false),
                }
            },
            FieldOp::AnyOf => contains_value(value, &field_value),
            FieldOp::NoneOf => Ok(!contains_value(value, &field_value)?),
        }
    }
}

/// Fields constrained by a top-level equality, directly or inside an `And`.
///
/// Used to decide whether an index can serve a query.
pub(crate) fn equality_fields(expr: &Expr) -> Vec<&str> {
    match expr {
        Expr::Field { field, op: FieldOp::Eq, .. } => vec![field.as_str()],
        Expr::And(exprs) => exprs.iter().flat_map(equality_fields).collect(),
        _ => Vec::new(),
    }
}
