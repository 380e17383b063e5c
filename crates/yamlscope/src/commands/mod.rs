//! Command implementations for the yamlscope CLI
//!
//! Each command module handles the CLI interface and delegates to
//! yamlscope-service or yamlscope-schema for the actual work.

pub mod schema;
pub mod validate;
