//! Schema registry: which schemas govern which resources.

use crate::error::Result;
use crate::identifier::SchemaId;
use crate::pattern::FilePatternAssociation;
use crate::resolver::ResolvedSchema;
use crate::store::SchemaStore;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;
use yamlscope_yaml::ParsedDocument;

/// Schemas and associations that survive [`SchemaRegistry::clear_all`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaContributions {
    #[serde(default)]
    pub schemas: IndexMap<String, Value>,
    /// File pattern to schema ids.
    #[serde(default)]
    pub schema_associations: IndexMap<String, Vec<String>>,
}

impl SchemaContributions {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    associations: IndexMap<String, FilePatternAssociation>,
    registered: IndexSet<SchemaId>,
    contributions: SchemaContributions,
}

impl RegistryState {
    fn associate(&mut self, pattern: &str, id: SchemaId) {
        self.associations
            .entry(pattern.to_string())
            .or_insert_with(|| FilePatternAssociation::new(pattern))
            .add_schema(id);
    }

    fn apply_contributed_associations(&mut self) {
        let contributions = std::mem::take(&mut self.contributions);
        for id in contributions.schemas.keys() {
            self.registered.insert(SchemaId::new(id));
        }
        for (pattern, ids) in &contributions.schema_associations {
            for id in ids {
                self.associate(pattern, SchemaId::new(id));
            }
        }
        self.contributions = contributions;
    }
}

/// Maps resources to schemas through file patterns and `$schema` hints.
#[derive(Debug)]
pub struct SchemaRegistry {
    store: Arc<SchemaStore>,
    state: RwLock<RegistryState>,
}

impl SchemaRegistry {
    pub fn new(store: Arc<SchemaStore>) -> Self {
        Self {
            store,
            state: RwLock::new(RegistryState::default()),
        }
    }

    pub fn store(&self) -> &Arc<SchemaStore> {
        &self.store
    }

    fn read_state(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `uri` for every pattern in `file_patterns`.
    ///
    /// A pattern already associated with other schemas keeps them; the new
    /// schema is added after them.
    pub fn register_external_schema(
        &self,
        uri: &str,
        file_patterns: &[String],
        content: Option<Value>,
    ) -> SchemaId {
        let id = SchemaId::new(uri);
        {
            let mut state = self.write_state();
            for pattern in file_patterns {
                state.associate(pattern, id.clone());
            }
            state.registered.insert(id.clone());
        }
        self.store.register_schema(id.clone(), content);
        id
    }

    /// Replace the statically contributed schemas and associations.
    pub fn set_schema_contributions(&self, contributions: SchemaContributions) {
        self.store.clear_contributions();
        for (id, schema) in &contributions.schemas {
            self.store.contribute_schema(SchemaId::new(id), schema.clone());
        }
        let mut state = self.write_state();
        state.contributions = contributions;
        state.apply_contributed_associations();
        debug!(
            schemas = state.contributions.schemas.len(),
            associations = state.contributions.schema_associations.len(),
            "schema contributions set"
        );
    }

    /// The contributions last set through [`Self::set_schema_contributions`].
    pub fn schema_contributions(&self) -> SchemaContributions {
        self.read_state().contributions.clone()
    }

    /// Forget every registered schema and association except contributions.
    pub fn clear_all(&self) {
        self.store.clear_all();
        let mut state = self.write_state();
        state.associations.clear();
        state.registered.clear();
        state.apply_contributed_associations();
    }

    /// Resolved schema of a known identifier.
    pub async fn get_resolved_schema(&self, uri: &str) -> Option<Arc<ResolvedSchema>> {
        let id = SchemaId::new(uri);
        if !self.store.contains(&id) {
            return None;
        }
        Some(self.store.get_resolved(&id).await)
    }

    /// Schema governing `resource`.
    ///
    /// A string `$schema` property on the document's root mapping wins.
    /// Otherwise every matching pattern contributes its schemas; several
    /// schemas are combined under one `allOf` of references.
    pub async fn get_schema_for_resource(
        &self,
        resource: &str,
        document: Option<&ParsedDocument>,
    ) -> Option<Arc<ResolvedSchema>> {
        if let Some(hint) = document.and_then(schema_hint) {
            let target = if hint.starts_with('.') {
                self.store.path_resolver().resolve(&hint, resource)
            } else {
                hint
            };
            let id = SchemaId::new(&target);
            debug!(resource, uri = %id, "using $schema hint");
            self.store.get_or_add(&id);
            return Some(self.store.get_resolved(&id).await);
        }

        let ids = self.matching_schema_ids(resource);
        match ids.as_slice() {
            [] => None,
            [single] => Some(self.store.get_resolved(single).await),
            many => {
                let combined = SchemaId::combined(resource);
                let content = json!({
                    "allOf": many.iter().map(|id| json!({"$ref": id.as_str()})).collect::<Vec<_>>()
                });
                let current = self
                    .store
                    .handle(&combined)
                    .is_some_and(|handle| handle.inline_content() == Some(&content));
                if !current {
                    debug!(resource, count = many.len(), "combining matched schemas");
                    self.store.register_schema(combined.clone(), Some(content));
                }
                Some(self.store.get_resolved(&combined).await)
            }
        }
    }

    /// Union of the schemas of every pattern matching `resource`, in
    /// registration order.
    pub fn matching_schema_ids(&self, resource: &str) -> Vec<SchemaId> {
        let state = self.read_state();
        let mut ids: IndexSet<SchemaId> = IndexSet::new();
        for association in state.associations.values() {
            if association.matches(resource) {
                ids.extend(association.schema_ids().iter().cloned());
            }
        }
        ids.into_iter().collect()
    }

    /// Invalidate a changed schema resource. Returns whether it was known.
    pub fn on_resource_changed(&self, uri: &str) -> bool {
        self.store.invalidate(&SchemaId::new(uri))
    }

    /// Registered and contributed schema ids, optionally only those with the
    /// given URI scheme. Combined schemas are never listed.
    pub fn registered_schema_ids(&self, scheme: Option<&str>) -> Vec<SchemaId> {
        self.read_state()
            .registered
            .iter()
            .filter(|id| !id.is_combined())
            .filter(|id| scheme.is_none_or(|wanted| id.scheme() == Some(wanted)))
            .cloned()
            .collect()
    }
}

fn schema_hint(document: &ParsedDocument) -> Option<String> {
    let value = document.root()?.get_hash_value("$schema")?;
    value.yaml.as_str().map(str::to_string)
}
