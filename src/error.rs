//! Error taxonomy shared by the core and the store client.
//!
//! The core never deals in HTTP status codes. The boundary in `api` decides
//! what each kind means for a read or a write.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Caller input is missing or unusable.
    #[error("{0}")]
    Validation(String),
    /// The store answered, but there is nothing to project.
    #[error("{0}")]
    NotFound(String),
    /// Transport or statement failure reported by the store.
    #[error("{0}")]
    Store(String),
    /// The store refused a write that clashes with the table definition.
    #[error("{0}")]
    Conflict(String),
    /// A row did not match its field-order contract.
    #[error("row decode failed: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for PipelineError {
    fn from(value: reqwest::Error) -> Self {
        Self::Store(value.to_string())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
