//! `yamlscope schema`: print a schema with every `$ref` resolved.

use crate::fetcher::{FileFetcher, schema_uri};
use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use yamlscope_schema::{SchemaRegistry, SchemaStore};

/// Resolved JSON of the schema plus its resolution errors.
pub async fn resolve(argument: &str) -> Result<(Value, Vec<String>)> {
    let uri = schema_uri(argument)?;
    let registry = SchemaRegistry::new(Arc::new(SchemaStore::new(Some(Arc::new(FileFetcher)))));
    registry.register_external_schema(&uri, &[], None);
    let resolved = registry
        .get_resolved_schema(&uri)
        .await
        .with_context(|| format!("schema {uri} is not registered"))?;
    Ok((resolved.to_value(), resolved.errors().to_vec()))
}

/// Execute the command. Returns whether resolution reported errors.
pub async fn execute(argument: &str) -> Result<bool> {
    let (schema, errors) = resolve(argument).await?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    for error in &errors {
        eprintln!("error: {error}");
    }
    Ok(!errors.is_empty())
}
