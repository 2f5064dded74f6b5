//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including identifier parsing and validation failures.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The string is not a recognised permanent identifier
    #[error("Invalid permanent identifier: {0}")]
    InvalidPid(String),

    /// Unknown data directory kind
    #[error("Invalid directory kind: {0}")]
    InvalidKind(String),

    /// Unknown task state name
    #[error("Invalid task state: {0}")]
    InvalidTaskState(String),

    /// Unknown timeline metric or resolution
    #[error("Invalid timeline parameter: {0}")]
    InvalidTimeline(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}
