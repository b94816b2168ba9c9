//! # AppError
//!
//! Centralized error handling for the linklocal workflow engine.
//! Every engine operation either returns the updated entity or exactly one of these kinds.

use thiserror::Error;

/// The primary error type for all ll-core operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Malformed or missing input (e.g., empty description, rating of 6).
    /// The message is user-correctable and shown verbatim.
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced entity does not exist (e.g., Offer, ServiceRequest)
    #[error("{kind} not found with ID {id}")]
    NotFound { kind: &'static str, id: String },

    /// Actor lacks the role or ownership the operation needs
    #[error("permission denied: {0}")]
    Authorization(String),

    /// Operation is not legal in the entity's current lifecycle state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Lost a race against a concurrent writer; the caller may retry
    #[error("conflict: {0}")]
    Conflict(String),

    /// Infrastructure failure (e.g., document store unreachable, corrupt document)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound { kind, id: id.into() }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        AppError::InvalidState(msg.into())
    }
}

/// Gateway ports report failures as `anyhow::Error`; inside the engine they are infrastructure faults.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("document encoding: {err}"))
    }
}

/// A specialized Result type for linklocal logic.
pub type Result<T> = std::result::Result<T, AppError>;
