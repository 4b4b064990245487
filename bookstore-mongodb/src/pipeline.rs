//! Aggregation pipeline translation to MongoDB stage documents.

use bson::{Bson, Document, doc};

use bookstore_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    pipeline::{Accumulator, Operand, OperandVisitor, Pipeline, ProjectField, Stage},
};

use crate::query::{MongoQueryTranslator, sort_document};


/// Translates operands into aggregation expressions (`"$field"`, `{ "$floor": ... }`).
pub(crate) struct MongoOperandTranslator;

impl MongoOperandTranslator {
    pub fn translate(operand: &Operand) -> DocumentStoreResult<Bson> {
        MongoOperandTranslator.visit_operand(operand)
    }
}

impl OperandVisitor for MongoOperandTranslator {
    type Output = Bson;
    type Error = DocumentStoreError;

    fn visit_field(&mut self, field: &str) -> Result<Self::Output, Self::Error> {
        if field.is_empty() {
            return Err(DocumentStoreError::InvalidQuery("Field path must not be empty".to_string()));
        }

        Ok(Bson::String(format!("${}", field)))
    }

    fn visit_literal(&mut self, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(match value {
            // Strings would otherwise be read as field paths.
            Bson::String(_) => Bson::Document(doc! { "$literal": value }),
            other => other.clone(),
        })
    }

    fn visit_floor(&mut self, inner: &Operand) -> Result<Self::Output, Self::Error> {
        Ok(Bson::Document(doc! { "$floor": self.visit_operand(inner)? }))
    }

    fn visit_divide(&mut self, left: &Operand, right: &Operand) -> Result<Self::Output, Self::Error> {
        Ok(Bson::Document(doc! {
            "$divide": [self.visit_operand(left)?, self.visit_operand(right)?],
        }))
    }

    fn visit_multiply(&mut self, left: &Operand, right: &Operand) -> Result<Self::Output, Self::Error> {
        Ok(Bson::Document(doc! {
            "$multiply": [self.visit_operand(left)?, self.visit_operand(right)?],
        }))
    }
}

fn accumulator_document(accumulator: &Accumulator) -> DocumentStoreResult<Document> {
    let (op, operand) = match accumulator {
        Accumulator::Avg(operand) => ("$avg", operand),
        Accumulator::Sum(operand) => ("$sum", operand),
        Accumulator::Min(operand) => ("$min", operand),
        Accumulator::Max(operand) => ("$max", operand),
    };

    Ok(doc! { op: MongoOperandTranslator::translate(operand)? })
}

fn stage_document(stage: &Stage) -> DocumentStoreResult<Document> {
    Ok(match stage {
        Stage::Match(expr) => doc! { "$match": MongoQueryTranslator::translate(expr)? },
        Stage::Group { key, accumulators } => {
            let mut group = doc! { "_id": MongoOperandTranslator::translate(key)? };
            for (name, accumulator) in accumulators {
                if name == "_id" {
                    return Err(DocumentStoreError::InvalidQuery(
                        "Accumulator name `_id` is reserved for the group key".to_string(),
                    ));
                }
                group.insert(name.clone(), accumulator_document(accumulator)?);
            }
            doc! { "$group": group }
        },
        Stage::Sort(sort) => doc! { "$sort": sort_document(sort) },
        Stage::Skip(n) => doc! { "$skip": *n as i64 },
        Stage::Limit(n) => doc! { "$limit": *n as i64 },
        Stage::Project(spec) => {
            let mut project = Document::new();
            for (name, field) in &spec.fields {
                match field {
                    ProjectField::Include => project.insert(name.clone(), 1),
                    ProjectField::Computed(operand) => {
                        project.insert(name.clone(), MongoOperandTranslator::translate(operand)?)
                    },
                };
            }
            if !spec.include_id {
                project.insert("_id", 0);
            }
            doc! { "$project": project }
        },
    })
}

/// Translates every stage of `pipeline`, in order.
pub(crate) fn translate_pipeline(pipeline: &Pipeline) -> DocumentStoreResult<Vec<Document>> {
    pipeline
        .stages
        .iter()
        .map(stage_document)
        .collect()
}
