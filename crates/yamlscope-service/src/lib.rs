//! Transport-agnostic YAML language service.
//!
//! This crate turns the schema engine of `yamlscope-schema` into the
//! editor-facing operations a host needs, without any protocol
//! dependencies.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     ValidationPipeline                       │
//! │   (open/change/close, debounce, version check, publishing)   │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        ServiceHost                           │
//! │        (lazy LanguageService, idle reclamation)              │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      LanguageService                         │
//! │ (validation, hover, completion, symbols over SchemaRegistry) │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use yamlscope_service::{Document, LanguageService, LanguageSettings, SchemaConfiguration};
//! use serde_json::json;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let service = LanguageService::new(None);
//! service.configure(LanguageSettings {
//!     schemas: vec![SchemaConfiguration {
//!         uri: "S1".into(),
//!         file_match: vec!["*.yaml".into()],
//!         schema: Some(json!({"properties": {"p": {"type": "number"}}})),
//!     }],
//!     ..LanguageSettings::default()
//! });
//!
//! let doc = Document::new("a.yaml", "p: hello", 1);
//! let diagnostics = service.do_validation(&doc).await.unwrap();
//! assert_eq!(diagnostics.len(), 1);
//! # });
//! ```

pub mod document;
pub mod error;
pub mod host;
pub mod language_service;
pub mod pipeline;
pub mod settings;
pub mod types;

pub use document::{Document, DocumentStore};
pub use error::{Result, ServiceError};
pub use host::{IDLE_CHECK_INTERVAL, ServiceHost};
pub use language_service::LanguageService;
pub use pipeline::{DiagnosticSink, ValidationPipeline, ValidationState};
pub use settings::{LanguageSettings, SchemaConfiguration};
pub use types::{
    CompletionItem, CompletionItemKind, Diagnostic, DiagnosticSeverity, DocumentSymbol, Hover,
    Position, Range, SymbolKind,
};
