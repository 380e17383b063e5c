//! Error types for schema loading.
//!
//! Data-shape problems (unreachable schemas, broken `$ref`s, invalid JSON)
//! never surface as `Err` from the store or registry: they are folded into
//! the `errors` list of a [`crate::SchemaDocument`] or
//! [`crate::ResolvedSchema`]. The types here cover the injected fetch
//! capability and malformed caller input.

use thiserror::Error;

/// Failure reported by a [`crate::SchemaFetcher`].
///
/// The `Display` text becomes the schema-level error message, so variants
/// keep it short: the caller already knows which schema was requested.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Schema not found: {0}")]
    NotFound(String),

    #[error("Unable to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Errors raised for malformed caller input.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Invalid schema contributions: {0}")]
    InvalidContributions(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
