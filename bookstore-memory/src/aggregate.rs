//! Aggregation pipeline execution over in-memory documents.

use bson::{Bson, Document};

use bookstore_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    pipeline::{Accumulator, Operand, OperandVisitor, Pipeline, ProjectField, ProjectSpec, Stage},
    query::{Sort, SortDirection},
};

use crate::evaluator::{Comparable, DocumentEvaluator};


/// Evaluates operands against one document.
///
/// Missing fields and `null` propagate through arithmetic as `null`.
pub(crate) struct OperandEvaluator<'a> {
    document: &'a Document,
}

impl<'a> OperandEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(document: &'a Document, operand: &Operand) -> DocumentStoreResult<Bson> {
        OperandEvaluator::new(document).visit_operand(operand)
    }
}

enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn from_bson(value: &Bson, op: &str) -> DocumentStoreResult<Option<Self>> {
        match value {
            Bson::Null => Ok(None),
            Bson::Int32(v) => Ok(Some(Number::Int(*v as i64))),
            Bson::Int64(v) => Ok(Some(Number::Int(*v))),
            Bson::Double(v) => Ok(Some(Number::Float(*v))),
            other => Err(DocumentStoreError::InvalidQuery(format!(
                "{} only supports numeric types, got {:?}",
                op,
                other.element_type()
            ))),
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            Number::Int(v) => *v as f64,
            Number::Float(v) => *v,
        }
    }
}

/// Narrows integers to `Int32` when they fit, as MongoDB does.
fn int_to_bson(value: i64) -> Bson {
    i32::try_from(value)
        .map(Bson::Int32)
        .unwrap_or(Bson::Int64(value))
}

impl<'a> OperandVisitor for OperandEvaluator<'a> {
    type Output = Bson;
    type Error = DocumentStoreError;

    fn visit_field(&mut self, field: &str) -> Result<Self::Output, Self::Error> {
        Ok(self.document.get(field).cloned().unwrap_or(Bson::Null))
    }

    fn visit_literal(&mut self, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(value.clone())
    }

    fn visit_floor(&mut self, inner: &Operand) -> Result<Self::Output, Self::Error> {
        let value = self.visit_operand(inner)?;

        Ok(match Number::from_bson(&value, "$floor")? {
            None => Bson::Null,
            Some(Number::Int(_)) => value,
            Some(Number::Float(v)) => Bson::Double(v.floor()),
        })
    }

    fn visit_divide(&mut self, left: &Operand, right: &Operand) -> Result<Self::Output, Self::Error> {
        let left = self.visit_operand(left)?;
        let right = self.visit_operand(right)?;

        match (Number::from_bson(&left, "$divide")?, Number::from_bson(&right, "$divide")?) {
            (Some(left), Some(right)) => {
                if right.as_f64() == 0.0 {
                    return Err(DocumentStoreError::InvalidQuery("can't $divide by zero".to_string()));
                }
                Ok(Bson::Double(left.as_f64() / right.as_f64()))
            },
            _ => Ok(Bson::Null),
        }
    }

    fn visit_multiply(&mut self, left: &Operand, right: &Operand) -> Result<Self::Output, Self::Error> {
        let left = self.visit_operand(left)?;
        let right = self.visit_operand(right)?;

        Ok(match (Number::from_bson(&left, "$multiply")?, Number::from_bson(&right, "$multiply")?) {
            (Some(Number::Int(a)), Some(Number::Int(b))) => match a.checked_mul(b) {
                Some(product) => int_to_bson(product),
                None => Bson::Double(a as f64 * b as f64),
            },
            (Some(a), Some(b)) => Bson::Double(a.as_f64() * b.as_f64()),
            _ => Bson::Null,
        })
    }
}


/// Running state of one accumulator within one group.
enum AccumulatorState {
    Avg { total: f64, count: u64 },
    Sum { int: i64, float: f64, is_float: bool },
    Min(Option<Bson>),
    Max(Option<Bson>),
}

impl AccumulatorState {
    fn new(accumulator: &Accumulator) -> Self {
        match accumulator {
            Accumulator::Avg(_) => AccumulatorState::Avg { total: 0.0, count: 0 },
            Accumulator::Sum(_) => AccumulatorState::Sum { int: 0, float: 0.0, is_float: false },
            Accumulator::Min(_) => AccumulatorState::Min(None),
            Accumulator::Max(_) => AccumulatorState::Max(None),
        }
    }

    fn push(&mut self, value: Bson) {
        match self {
            AccumulatorState::Avg { total, count } => {
                if let Ok(Some(number)) = Number::from_bson(&value, "$avg") {
                    *total += number.as_f64();
                    *count += 1;
                }
            },
            AccumulatorState::Sum { int, float, is_float } => {
                match Number::from_bson(&value, "$sum") {
                    Ok(Some(Number::Int(v))) => match int.checked_add(v) {
                        Some(sum) => *int = sum,
                        None => {
                            *is_float = true;
                            *float += v as f64;
                        },
                    },
                    Ok(Some(Number::Float(v))) => {
                        *is_float = true;
                        *float += v;
                    },
                    _ => {},
                }
            },
            AccumulatorState::Min(current) => {
                if value != Bson::Null {
                    let replace = current
                        .as_ref()
                        .map(|cur| Comparable::from(&value).sort_cmp(&Comparable::from(cur)).is_lt())
                        .unwrap_or(true);
                    if replace {
                        *current = Some(value);
                    }
                }
            },
            AccumulatorState::Max(current) => {
                if value != Bson::Null {
                    let replace = current
                        .as_ref()
                        .map(|cur| Comparable::from(&value).sort_cmp(&Comparable::from(cur)).is_gt())
                        .unwrap_or(true);
                    if replace {
                        *current = Some(value);
                    }
                }
            },
        }
    }

    fn finish(self) -> Bson {
        match self {
            AccumulatorState::Avg { count: 0, .. } => Bson::Null,
            AccumulatorState::Avg { total, count } => Bson::Double(total / count as f64),
            AccumulatorState::Sum { int, float, is_float: true } => Bson::Double(int as f64 + float),
            AccumulatorState::Sum { int, .. } => int_to_bson(int),
            AccumulatorState::Min(value) | AccumulatorState::Max(value) => value.unwrap_or(Bson::Null),
        }
    }
}

fn accumulator_operand(accumulator: &Accumulator) -> &Operand {
    match accumulator {
        Accumulator::Avg(op) | Accumulator::Sum(op) | Accumulator::Min(op) | Accumulator::Max(op) => op,
    }
}

fn as_document(document: &Bson) -> DocumentStoreResult<&Document> {
    document
        .as_document()
        .ok_or_else(|| DocumentStoreError::InvalidDocument("Expected document".into()))
}

/// Groups documents by key, preserving the order in which keys first appear.
fn group(
    documents: Vec<Bson>,
    key: &Operand,
    accumulators: &[(String, Accumulator)],
) -> DocumentStoreResult<Vec<Bson>> {
    let mut groups: Vec<(Bson, Vec<AccumulatorState>)> = Vec::new();

    for document in &documents {
        let document = as_document(document)?;
        let group_key = OperandEvaluator::evaluate(document, key)?;

        let position = groups
            .iter()
            .position(|(existing, _)| Comparable::from(existing) == Comparable::from(&group_key));
        let index = match position {
            Some(index) => index,
            None => {
                groups.push((
                    group_key,
                    accumulators
                        .iter()
                        .map(|(_, acc)| AccumulatorState::new(acc))
                        .collect(),
                ));
                groups.len() - 1
            },
        };

        for ((_, accumulator), state) in accumulators.iter().zip(groups[index].1.iter_mut()) {
            state.push(OperandEvaluator::evaluate(document, accumulator_operand(accumulator))?);
        }
    }

    Ok(
        groups
            .into_iter()
            .map(|(key, states)| {
                let mut output = Document::new();
                output.insert("_id", key);
                for ((name, _), state) in accumulators.iter().zip(states) {
                    output.insert(name.clone(), state.finish());
                }
                Bson::Document(output)
            })
            .collect()
    )
}

fn project(documents: Vec<Bson>, spec: &ProjectSpec) -> DocumentStoreResult<Vec<Bson>> {
    documents
        .iter()
        .map(|document| {
            let document = as_document(document)?;
            let mut output = Document::new();

            if spec.include_id {
                if let Some(id) = document.get("_id") {
                    output.insert("_id", id.clone());
                }
            }

            for (name, field) in &spec.fields {
                match field {
                    ProjectField::Include => {
                        if let Some(value) = document.get(name) {
                            output.insert(name.clone(), value.clone());
                        }
                    },
                    ProjectField::Computed(operand) => {
                        output.insert(name.clone(), OperandEvaluator::evaluate(document, operand)?);
                    },
                }
            }

            Ok(Bson::Document(output))
        })
        .collect()
}

/// Stable sort on one field; missing fields sort first in ascending order.
pub(crate) fn sort_documents(documents: &mut [Bson], sort: &Sort) {
    documents.sort_by(|a, b| {
        let left = Comparable::of_field(a, &sort.field);
        let right = Comparable::of_field(b, &sort.field);

        match sort.direction {
            SortDirection::Asc => left.sort_cmp(&right),
            SortDirection::Desc => right.sort_cmp(&left),
        }
    });
}

/// Runs every stage of `pipeline` in order.
pub(crate) fn run_pipeline(documents: Vec<Bson>, pipeline: &Pipeline) -> DocumentStoreResult<Vec<Bson>> {
    pipeline
        .stages
        .iter()
        .try_fold(documents, |documents, stage| match stage {
            Stage::Match(expr) => {
                let mut kept = Vec::with_capacity(documents.len());
                for document in documents {
                    if DocumentEvaluator::matches(&document, expr)? {
                        kept.push(document);
                    }
                }
                Ok(kept)
            },
            Stage::Group { key, accumulators } => group(documents, key, accumulators),
            Stage::Sort(sort) => {
                let mut documents = documents;
                sort_documents(&mut documents, sort);
                Ok(documents)
            },
            Stage::Skip(n) => Ok(documents.into_iter().skip(*n).collect()),
            Stage::Limit(n) => Ok(documents.into_iter().take(*n).collect()),
            Stage::Project(spec) => project(documents, spec),
        })
}
