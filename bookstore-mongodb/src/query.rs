//! Query translation from bookstore filter expressions to MongoDB query syntax.

use bson::{Document, Bson, doc};

use bookstore_core::{
    document::ID_FIELD,
    query::{QueryVisitor, Expr, FieldOp, Projection, Sort},
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Stored name of `field`; the record identifier lives in `_id`.
pub(crate) fn field_path(field: &str) -> &str {
    if field == ID_FIELD { "_id" } else { field }
}

/// Translates filter expressions into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    pub fn translate(expr: &Expr) -> DocumentStoreResult<Document> {
        MongoQueryTranslator.visit_expr(expr)
    }

    /// Translates an optional filter; `None` matches every document.
    pub fn translate_filter(filter: Option<&Expr>) -> DocumentStoreResult<Document> {
        filter
            .map(Self::translate)
            .transpose()
            .map(Option::unwrap_or_default)
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

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

    // `$not` is only valid on a field; `$nor` negates a whole expression.
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field_path(field): { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field_path(field): match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::AnyOf | FieldOp::NoneOf if !matches!(value, Bson::Array(_)) => {
                    return Err(DocumentStoreError::InvalidQuery(
                        "AnyOf/NoneOf operators require an array value".to_string(),
                    ));
                },
                FieldOp::AnyOf => doc! { "$in": value },
                FieldOp::NoneOf => doc! { "$nin": value },
            }
        })
    }
}

/// `{ field: 1 }` for ascending, `{ field: -1 }` for descending.
pub(crate) fn sort_document(sort: &Sort) -> Document {
    doc! { field_path(&sort.field): sort.direction.as_i32() }
}

/// Inclusion projection; `_id` is suppressed unless the identifier is requested.
pub(crate) fn projection_document(projection: &Projection) -> Document {
    let mut document = doc! { "_id": 0 };
    for field in &projection.fields {
        document.insert(field_path(field), 1);
    }
    document
}
