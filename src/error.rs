use thiserror::Error;

use crate::db::DbError;

/// Failures surfaced by the link engine's entry points.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("{0}")]
    Validation(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Not allowed")]
    Forbidden,
    /// Unknown code, or a code whose stored target is not a usable URL.
    #[error("Link not found")]
    NotFound,
    #[error("No free code found after {attempts} attempts")]
    AllocationExhausted { attempts: u32 },
    #[error(transparent)]
    Store(#[from] DbError),
}
