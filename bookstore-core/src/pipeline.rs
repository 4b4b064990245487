//! Aggregation pipeline construction.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s applied server-side to a
//! collection. Group stages emit one document per distinct key with the key
//! stored under `_id`, followed by one field per accumulator.
//!
//! # Example
//!
//! ```ignore
//! use bookstore_core::pipeline::{Accumulator, Operand, Pipeline, ProjectSpec};
//! use bookstore_core::query::Sort;
//!
//! // Books per decade, oldest first.
//! let pipeline = Pipeline::builder()
//!     .group(
//!         Operand::field("published_year").divide(10).floor(),
//!         [("count", Accumulator::count())],
//!     )
//!     .project(
//!         ProjectSpec::new()
//!             .compute("decade", Operand::field("_id").multiply(10))
//!             .include("count")
//!             .exclude_id(),
//!     )
//!     .sort(Sort::asc("decade"))
//!     .build();
//! ```

use bson::Bson;

use crate::{
    error::DocumentStoreError,
    query::{Expr, Sort},
};

/// An arithmetic expression evaluated per document inside a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// The value of a field of the current document.
    Field(String),
    /// A constant.
    Literal(Bson),
    /// Largest integer less than or equal to the inner value.
    Floor(Box<Operand>),
    /// Left divided by right.
    Divide(Box<Operand>, Box<Operand>),
    /// Left multiplied by right.
    Multiply(Box<Operand>, Box<Operand>),
}

impl Operand {
    pub fn field(name: impl Into<String>) -> Self {
        Operand::Field(name.into())
    }

    pub fn literal(value: impl Into<Bson>) -> Self {
        Operand::Literal(value.into())
    }

    pub fn floor(self) -> Self {
        Operand::Floor(Box::new(self))
    }

    pub fn divide(self, divisor: impl Into<Operand>) -> Self {
        Operand::Divide(Box::new(self), Box::new(divisor.into()))
    }

    pub fn multiply(self, factor: impl Into<Operand>) -> Self {
        Operand::Multiply(Box::new(self), Box::new(factor.into()))
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Operand::literal(value)
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Operand::literal(value)
    }
}

/// Per-group reduction.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Arithmetic mean of the numeric values; non-numeric values are ignored.
    Avg(Operand),
    /// Sum of the numeric values.
    Sum(Operand),
    /// Smallest value.
    Min(Operand),
    /// Largest value.
    Max(Operand),
}

impl Accumulator {
    /// Counts the documents in each group (`$sum: 1`).
    pub fn count() -> Self {
        Accumulator::Sum(Operand::literal(1))
    }

    pub fn avg(operand: impl Into<Operand>) -> Self {
        Accumulator::Avg(operand.into())
    }

    pub fn sum(operand: impl Into<Operand>) -> Self {
        Accumulator::Sum(operand.into())
    }
}

impl From<&str> for Operand {
    fn from(field: &str) -> Self {
        Operand::field(field)
    }
}

/// One output field of a project stage.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectField {
    /// Copy the field through unchanged.
    Include,
    /// Compute the field from an operand.
    Computed(Operand),
}

/// Shape of a project stage's output documents.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSpec {
    /// Output fields in order.
    pub fields: Vec<(String, ProjectField)>,
    /// Whether `_id` is carried through.
    pub include_id: bool,
}

impl ProjectSpec {
    pub fn new() -> Self {
        Self { fields: Vec::new(), include_id: true }
    }

    pub fn include(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), ProjectField::Include));
        self
    }

    pub fn compute(mut self, field: impl Into<String>, operand: Operand) -> Self {
        self.fields.push((field.into(), ProjectField::Computed(operand)));
        self
    }

    pub fn exclude_id(mut self) -> Self {
        self.include_id = false;
        self
    }
}

impl Default for ProjectSpec {
    fn default() -> Self {
        Self::new()
    }
}

/// A single pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keep only documents matching the filter.
    Match(Expr),
    /// Group documents by key and reduce each group.
    Group {
        key: Operand,
        accumulators: Vec<(String, Accumulator)>,
    },
    /// Order documents by one field.
    Sort(Sort),
    /// Drop the first `n` documents.
    Skip(usize),
    /// Keep at most `n` documents.
    Limit(usize),
    /// Reshape documents.
    Project(ProjectSpec),
}

/// An ordered sequence of stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    stages: Vec<Stage>,
}

impl PipelineBuilder {
    pub fn filter(mut self, expr: Expr) -> Self {
        self.stages.push(Stage::Match(expr));
        self
    }

    pub fn group<I, S>(mut self, key: Operand, accumulators: I) -> Self
    where
        I: IntoIterator<Item = (S, Accumulator)>,
        S: Into<String>,
    {
        self.stages.push(Stage::Group {
            key,
            accumulators: accumulators
                .into_iter()
                .map(|(name, acc)| (name.into(), acc))
                .collect(),
        });
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.stages.push(Stage::Sort(sort));
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.stages.push(Stage::Skip(n));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.stages.push(Stage::Limit(n));
        self
    }

    pub fn project(mut self, spec: ProjectSpec) -> Self {
        self.stages.push(Stage::Project(spec));
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline { stages: self.stages }
    }
}

/// Walks an operand tree; the counterpart of [`QueryVisitor`](crate::query::QueryVisitor)
/// for pipeline arithmetic.
pub trait OperandVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_field(&mut self, field: &str) -> Result<Self::Output, Self::Error>;
    fn visit_literal(&mut self, value: &Bson) -> Result<Self::Output, Self::Error>;
    fn visit_floor(&mut self, inner: &Operand) -> Result<Self::Output, Self::Error>;
    fn visit_divide(&mut self, left: &Operand, right: &Operand) -> Result<Self::Output, Self::Error>;
    fn visit_multiply(&mut self, left: &Operand, right: &Operand) -> Result<Self::Output, Self::Error>;

    fn visit_operand(&mut self, operand: &Operand) -> Result<Self::Output, Self::Error> {
        match operand {
            Operand::Field(field) => self.visit_field(field),
            Operand::Literal(value) => self.visit_literal(value),
            Operand::Floor(inner) => self.visit_floor(inner),
            Operand::Divide(left, right) => self.visit_divide(left, right),
            Operand::Multiply(left, right) => self.visit_multiply(left, right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decade_bucket_operand_nests_in_call_order() {
        let op = Operand::field("published_year").divide(10).floor();

        assert_eq!(
            op,
            Operand::Floor(Box::new(Operand::Divide(
                Box::new(Operand::Field("published_year".into())),
                Box::new(Operand::Literal(Bson::Int32(10))),
            )))
        );
    }

    #[test]
    fn count_is_sum_of_one() {
        assert_eq!(Accumulator::count(), Accumulator::Sum(Operand::Literal(Bson::Int32(1))));
    }

    #[test]
    fn builder_keeps_stage_order() {
        let pipeline = Pipeline::builder()
            .group(Operand::field("author"), [("count", Accumulator::count())])
            .sort(Sort::desc("count"))
            .limit(1)
            .build();

        assert_eq!(pipeline.stages.len(), 3);
        assert!(matches!(pipeline.stages[0], Stage::Group { .. }));
        assert_eq!(pipeline.stages[1], Stage::Sort(Sort::desc("count")));
        assert_eq!(pipeline.stages[2], Stage::Limit(1));
    }

    #[test]
    fn project_spec_includes_id_unless_excluded() {
        assert!(ProjectSpec::new().include_id);
        assert!(!ProjectSpec::new().include("count").exclude_id().include_id);
    }
}
