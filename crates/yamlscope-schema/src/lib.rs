//! # yamlscope-schema
//!
//! JSON Schema registry, `$ref` resolution and schema matching for YAML
//! documents.
//!
//! - [`SchemaStore`] caches raw and resolved schemas per normalized
//!   [`SchemaId`], fetching each at most once through an injected
//!   [`SchemaFetcher`].
//! - [`SchemaRegistry`] maps resources to schemas through `fileMatch`
//!   patterns and `$schema` hints, combining several matches with `allOf`.
//! - [`resolve`] merges every `$ref` into an arena [`SchemaTree`]; cycles
//!   are cut silently.
//! - [`validate`] and [`matching_schemas`] walk a parsed document alongside
//!   a resolved schema.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use yamlscope_schema::{SchemaRegistry, SchemaStore, ValidationOptions, validate_stream};
//! use yamlscope_yaml::{parse_stream, ParseOptions};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let registry = SchemaRegistry::new(Arc::new(SchemaStore::new(None)));
//! registry.register_external_schema(
//!     "S1",
//!     &["*.yaml".to_string()],
//!     Some(json!({"properties": {"p": {"type": "number"}}})),
//! );
//!
//! let schema = registry.get_schema_for_resource("a.yaml", None).await.unwrap();
//! let stream = parse_stream("p: hello", &ParseOptions::default());
//! let problems = validate_stream(&stream, &schema, ValidationOptions::default());
//! assert_eq!(problems[0][0].message, "Incorrect type. Expected \"number\".");
//! # });
//! ```

pub mod error;
pub mod identifier;
pub mod pattern;
pub mod problem;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod tree;
pub mod validator;

pub use error::{FetchError, Result, SchemaError};
pub use identifier::{COMBINED_SCHEME, PathResolver, SchemaId, UrlPathResolver, is_absolute_uri};
pub use pattern::FilePatternAssociation;
pub use problem::{ProblemKind, ValidationProblem};
pub use registry::{SchemaContributions, SchemaRegistry};
pub use resolver::{ResolvedSchema, resolve};
pub use store::{SchemaDocument, SchemaFetcher, SchemaHandle, SchemaStore};
pub use tree::{Keyword, NodeId, SchemaNode, SchemaTree};
pub use validator::{
    MatchedSchema, ValidationOptions, matching_schemas, validate, validate_stream,
};
