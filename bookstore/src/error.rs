//! Runner error type.
//!
//! Store errors are wrapped with the operation that produced them, grouped by
//! kind: connection failures, write failures, and read or aggregation failures.

use bookstore_core::error::{DocumentStoreError, DocumentStoreResult};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to connect to the store: {0}")]
    Connect(#[source] DocumentStoreError),
    #[error("Write failed ({operation}): {source}")]
    Write {
        operation: &'static str,
        source: DocumentStoreError,
    },
    #[error("Read failed ({operation}): {source}")]
    Read {
        operation: &'static str,
        source: DocumentStoreError,
    },
    #[error("Failed to render explain output: {0}")]
    Render(#[from] serde_json::Error),
}

pub type RunnerResult<T> = Result<T, RunnerError>;

/// Attaches the failing operation to a store error.
pub(crate) trait OperationContext<T> {
    fn writing(self, operation: &'static str) -> RunnerResult<T>;
    fn reading(self, operation: &'static str) -> RunnerResult<T>;
}

impl<T> OperationContext<T> for DocumentStoreResult<T> {
    fn writing(self, operation: &'static str) -> RunnerResult<T> {
        self.map_err(|source| RunnerError::Write { operation, source })
    }

    fn reading(self, operation: &'static str) -> RunnerResult<T> {
        self.map_err(|source| RunnerError::Read { operation, source })
    }
}
