//! # yamlscope-yaml
//!
//! YAML parsing with source location tracking for editor tooling.
//!
//! This crate turns a text buffer into a [`DocumentStream`]: one
//! [`ParsedDocument`] per `---`-separated YAML document. Every node of each
//! document is a [`YamlNode`], which wraps a `yaml-rust2::Yaml` value together
//! with the byte range it occupies in the buffer. Syntax errors and warnings
//! (such as unresolved tags) are collected per document rather than returned
//! as errors, so a broken second document never hides the first.
//!
//! ## Example
//!
//! ```rust
//! use yamlscope_yaml::{parse_stream, ParseOptions};
//!
//! let stream = parse_stream("name: a\n---\nage: 1\n", &ParseOptions::default());
//! assert_eq!(stream.len(), 2);
//!
//! let first = stream.documents()[0].root().unwrap();
//! let name = first.get_hash_value("name").unwrap();
//! assert_eq!(name.source_info.offset, 6);
//! ```

mod document;
mod error;
mod line_index;
mod node;
mod options;
mod parser;
mod source_info;

pub use document::{DocumentStream, ParsedDocument, Problem, ProblemSeverity};
pub use error::{Error, Result};
pub use line_index::{LineIndex, Location};
pub use node::{NodeKind, YamlHashEntry, YamlNode};
pub use options::{CustomTag, ParseOptions, TagKind, YamlVersion};
pub use parser::{parse, parse_stream};
pub use source_info::SourceInfo;
