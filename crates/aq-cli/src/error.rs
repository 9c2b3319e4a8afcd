//! CLI error types.

use aq_protocol_saml::{AttributeQueryError, SamlError};
use thiserror::Error;

/// CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// SAML error.
    #[error(transparent)]
    Saml(#[from] SamlError),

    /// Attribute query failed.
    #[error(transparent)]
    Query(#[from] AttributeQueryError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// CLI result type.
pub type CliResult<T> = Result<T, CliError>;
