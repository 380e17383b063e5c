//! Command-line front end for yamlscope.
//!
//! The binary wires [`fetcher::FileFetcher`] into the language service and
//! exposes two commands: `validate` and `schema`.

pub mod commands;
pub mod fetcher;

pub use fetcher::FileFetcher;
