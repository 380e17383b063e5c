//! Error types for YAML parsing with source locations.

use crate::SourceInfo;
use thiserror::Error;

/// Result type alias for yamlscope-yaml operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during single-document YAML parsing.
///
/// Stream parsing ([`crate::parse_stream`]) never returns these; it records
/// them as [`crate::Problem`]s on the affected document instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// YAML syntax error
    #[error("Parse error: {message}")]
    ParseError {
        message: String,
        location: Option<SourceInfo>,
    },

    /// The input contained no YAML document
    #[error("No YAML document found")]
    Empty,
}

impl Error {
    /// Source location of the error, if known.
    pub fn location(&self) -> Option<&SourceInfo> {
        match self {
            Error::ParseError { location, .. } => location.as_ref(),
            Error::Empty => None,
        }
    }
}
