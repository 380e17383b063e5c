//! Error types for the language service.
//!
//! Schema and document problems are reported as diagnostics, never as
//! errors. What remains are contract violations by the host.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("the language service was used before settings were supplied")]
    NotConfigured,

    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
