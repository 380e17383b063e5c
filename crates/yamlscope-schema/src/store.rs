//! Schema store: fetch-once caches of raw and resolved schemas.
//!
//! Every [`SchemaId`] maps to at most one [`SchemaHandle`]. A handle caches
//! the fetched [`SchemaDocument`] and the [`ResolvedSchema`] derived from it
//! in `OnceCell`s, so concurrent callers share one fetch. Invalidation swaps
//! in fresh cells; callers already holding the old cells finish against them.

use crate::error::FetchError;
use crate::identifier::{PathResolver, SchemaId, UrlPathResolver};
use crate::resolver::{self, ResolvedSchema};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Raw schema content plus the problems met while loading it.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDocument {
    pub id: SchemaId,
    /// `{}` when loading failed.
    pub content: Value,
    pub errors: Vec<String>,
}

impl SchemaDocument {
    pub fn new(id: SchemaId, content: Value) -> Self {
        Self {
            id,
            content,
            errors: Vec::new(),
        }
    }

    fn failed(id: SchemaId, message: String) -> Self {
        Self {
            id,
            content: Value::Object(Default::default()),
            errors: vec![message],
        }
    }
}

/// Injected capability that retrieves schema text by URI.
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<String, FetchError>;
}

#[derive(Debug, Default)]
struct HandleCells {
    unresolved: OnceCell<Arc<SchemaDocument>>,
    resolved: OnceCell<Arc<ResolvedSchema>>,
}

/// Cache entry for one schema identifier.
#[derive(Debug)]
pub struct SchemaHandle {
    id: SchemaId,
    inline: Option<Value>,
    cells: Mutex<Arc<HandleCells>>,
}

impl SchemaHandle {
    fn new(id: SchemaId, inline: Option<Value>) -> Self {
        let cells = Self::fresh_cells(&id, inline.as_ref());
        Self {
            id,
            inline,
            cells: Mutex::new(Arc::new(cells)),
        }
    }

    fn fresh_cells(id: &SchemaId, inline: Option<&Value>) -> HandleCells {
        let seeded = inline.map(|content| Arc::new(SchemaDocument::new(id.clone(), content.clone())));
        HandleCells {
            unresolved: OnceCell::new_with(seeded),
            resolved: OnceCell::new(),
        }
    }

    pub fn id(&self) -> &SchemaId {
        &self.id
    }

    /// Inline content the handle was registered with, if any.
    pub fn inline_content(&self) -> Option<&Value> {
        self.inline.as_ref()
    }

    fn cells(&self) -> Arc<HandleCells> {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop both cached documents. Inline content is re-seeded at once.
    fn clear(&self) {
        let fresh = Self::fresh_cells(&self.id, self.inline.as_ref());
        *self.cells.lock().unwrap_or_else(PoisonError::into_inner) = Arc::new(fresh);
    }

    /// Drop the resolved schema but keep the fetched document.
    fn clear_resolved(&self) {
        let mut guard = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        let unresolved = guard.unresolved.get().cloned();
        *guard = Arc::new(HandleCells {
            unresolved: OnceCell::new_with(unresolved),
            resolved: OnceCell::new(),
        });
    }

    fn resolved_dependency_on(&self, id: &SchemaId) -> bool {
        self.cells()
            .resolved
            .get()
            .is_some_and(|resolved| resolved.dependencies().contains(id))
    }
}

/// Owner of every [`SchemaHandle`].
pub struct SchemaStore {
    fetcher: Option<Arc<dyn SchemaFetcher>>,
    path_resolver: Arc<dyn PathResolver>,
    handles: RwLock<HashMap<SchemaId, Arc<SchemaHandle>>>,
    /// Handles that survive [`SchemaStore::clear_all`].
    contributed: RwLock<HashMap<SchemaId, Arc<SchemaHandle>>>,
}

impl std::fmt::Debug for SchemaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaStore")
            .field("has_fetcher", &self.fetcher.is_some())
            .field("handles", &self.read_handles().len())
            .finish()
    }
}

impl Default for SchemaStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SchemaStore {
    /// A store fetching through `fetcher`. Without one, every schema that is
    /// not registered inline fails to load.
    pub fn new(fetcher: Option<Arc<dyn SchemaFetcher>>) -> Self {
        Self::with_path_resolver(fetcher, Arc::new(UrlPathResolver))
    }

    pub fn with_path_resolver(
        fetcher: Option<Arc<dyn SchemaFetcher>>,
        path_resolver: Arc<dyn PathResolver>,
    ) -> Self {
        Self {
            fetcher,
            path_resolver,
            handles: RwLock::new(HashMap::new()),
            contributed: RwLock::new(HashMap::new()),
        }
    }

    pub fn path_resolver(&self) -> &dyn PathResolver {
        self.path_resolver.as_ref()
    }

    fn read_handles(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<SchemaId, Arc<SchemaHandle>>> {
        self.handles.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_handles(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<SchemaId, Arc<SchemaHandle>>> {
        self.handles.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a schema.
    ///
    /// With inline content the handle is replaced and its document is
    /// available without a fetch. Without content an existing fetched handle
    /// is kept (its caches stay warm); an existing inline handle is replaced
    /// by one that fetches.
    pub fn register_schema(&self, id: SchemaId, inline: Option<Value>) -> Arc<SchemaHandle> {
        let mut handles = self.write_handles();
        if inline.is_none()
            && let Some(existing) = handles.get(&id)
            && existing.inline.is_none()
        {
            return existing.clone();
        }
        debug!(uri = %id, inline = inline.is_some(), "registering schema");
        let handle = Arc::new(SchemaHandle::new(id.clone(), inline));
        handles.insert(id, handle.clone());
        handle
    }

    /// Register a schema that survives [`SchemaStore::clear_all`].
    pub fn contribute_schema(&self, id: SchemaId, content: Value) -> Arc<SchemaHandle> {
        let handle = Arc::new(SchemaHandle::new(id.clone(), Some(content)));
        self.contributed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), handle.clone());
        self.write_handles().insert(id, handle.clone());
        handle
    }

    /// Forget every contributed schema. Registered handles stay.
    pub fn clear_contributions(&self) {
        self.contributed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Existing handle for `id`, or a new fetching one.
    pub fn get_or_add(&self, id: &SchemaId) -> Arc<SchemaHandle> {
        if let Some(handle) = self.read_handles().get(id) {
            return handle.clone();
        }
        self.write_handles()
            .entry(id.clone())
            .or_insert_with(|| Arc::new(SchemaHandle::new(id.clone(), None)))
            .clone()
    }

    pub fn contains(&self, id: &SchemaId) -> bool {
        self.read_handles().contains_key(id)
    }

    pub fn handle(&self, id: &SchemaId) -> Option<Arc<SchemaHandle>> {
        self.read_handles().get(id).cloned()
    }

    /// Raw schema document, fetched at most once per invalidation epoch.
    ///
    /// Never fails: load problems are returned in
    /// [`SchemaDocument::errors`] with empty content.
    pub async fn get_unresolved(&self, id: &SchemaId) -> Arc<SchemaDocument> {
        let handle = self.get_or_add(id);
        let cells = handle.cells();
        self.unresolved_in(&handle, &cells).await
    }

    async fn unresolved_in(&self, handle: &SchemaHandle, cells: &HandleCells) -> Arc<SchemaDocument> {
        cells
            .unresolved
            .get_or_init(|| async { Arc::new(self.load(&handle.id).await) })
            .await
            .clone()
    }

    /// Schema with every `$ref` merged, cached per identifier.
    pub async fn get_resolved(&self, id: &SchemaId) -> Arc<ResolvedSchema> {
        let handle = self.get_or_add(id);
        let cells = handle.cells();
        if let Some(resolved) = cells.resolved.get() {
            debug!(uri = %id, "resolved schema cache hit");
            return resolved.clone();
        }
        cells
            .resolved
            .get_or_init(|| async {
                debug!(uri = %id, "resolving schema");
                let document = self.unresolved_in(&handle, &cells).await;
                let resolved = resolver::resolve(self, &document).await;
                if !resolved.errors().is_empty() {
                    debug!(uri = %id, count = resolved.errors().len(), "schema resolved with errors");
                }
                Arc::new(resolved)
            })
            .await
            .clone()
    }

    /// Clear the caches of `id` and of every resolved schema that pulled it
    /// in through a `$ref`. The mapping entry itself stays.
    ///
    /// Returns whether `id` was a known handle.
    pub fn invalidate(&self, id: &SchemaId) -> bool {
        let handles: Vec<Arc<SchemaHandle>> = self.read_handles().values().cloned().collect();
        let mut known = false;
        for handle in handles {
            if &handle.id == id {
                handle.clear();
                known = true;
            } else if handle.resolved_dependency_on(id) {
                debug!(uri = %handle.id, dependency = %id, "dropping dependent resolved schema");
                handle.clear_resolved();
            }
        }
        if known {
            debug!(uri = %id, "schema invalidated");
        }
        known
    }

    /// Drop every handle, then re-seed the contributed ones.
    pub fn clear_all(&self) {
        let contributed = self
            .contributed
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut handles = self.write_handles();
        handles.clear();
        for (id, handle) in contributed.iter() {
            handle.clear();
            handles.insert(id.clone(), handle.clone());
        }
        debug!(kept = handles.len(), "cleared schema store");
    }

    async fn load(&self, id: &SchemaId) -> SchemaDocument {
        let display = id.display_name();
        let Some(fetcher) = &self.fetcher else {
            return SchemaDocument::failed(
                id.clone(),
                format!("Unable to load schema from '{display}'. No schema request service available"),
            );
        };

        debug!(uri = %id, "fetching schema");
        let text = match fetcher.fetch(id.as_str()).await {
            Ok(text) => text,
            Err(err) => {
                warn!(uri = %id, error = %err, "schema fetch failed");
                return SchemaDocument::failed(id.clone(), err.to_string());
            }
        };

        if text.trim().is_empty() {
            return SchemaDocument::failed(
                id.clone(),
                format!("Unable to load schema from '{display}': No content."),
            );
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(content) => SchemaDocument::new(id.clone(), content),
            Err(err) => {
                warn!(uri = %id, error = %err, "schema content is not JSON");
                SchemaDocument::failed(
                    id.clone(),
                    format!(
                        "Unable to parse content from '{display}': Parse error at line {} column {}.",
                        err.line(),
                        err.column()
                    ),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MapFetcher {
        entries: HashMap<String, String>,
        calls: AtomicUsize,
    }

    impl MapFetcher {
        fn new(entries: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                entries: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SchemaFetcher for MapFetcher {
        async fn fetch(&self, uri: &str) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entries
                .get(uri)
                .cloned()
                .ok_or_else(|| FetchError::NotFound(uri.to_string()))
        }
    }

    #[tokio::test]
    async fn test_missing_fetcher_message() {
        let store = SchemaStore::new(None);
        let doc = store.get_unresolved(&SchemaId::new("https://x.org/a.json")).await;
        assert_eq!(
            doc.errors,
            vec!["Unable to load schema from 'https://x.org/a.json'. No schema request service available"]
        );
        assert_eq!(doc.content, json!({}));
    }

    #[tokio::test]
    async fn test_load_error_messages() {
        let fetcher = MapFetcher::new(&[("https://x.org/empty.json", "  "), ("https://x.org/bad.json", "{\n  \"a\": }")]);
        let store = SchemaStore::new(Some(fetcher));

        let empty = store.get_unresolved(&SchemaId::new("https://x.org/empty.json")).await;
        assert_eq!(empty.errors, vec!["Unable to load schema from 'https://x.org/empty.json': No content."]);

        let bad = store.get_unresolved(&SchemaId::new("https://x.org/bad.json")).await;
        assert_eq!(
            bad.errors,
            vec!["Unable to parse content from 'https://x.org/bad.json': Parse error at line 2 column 8."]
        );

        let missing = store.get_unresolved(&SchemaId::new("https://x.org/none.json")).await;
        assert_eq!(missing.errors, vec!["Schema not found: https://x.org/none.json"]);
    }

    #[tokio::test]
    async fn test_fetch_once_until_invalidated() {
        let fetcher = MapFetcher::new(&[("https://x.org/a.json", r#"{"type": "string"}"#)]);
        let store = SchemaStore::new(Some(fetcher.clone()));
        let id = SchemaId::new("https://x.org/a.json");

        store.get_resolved(&id).await;
        store.get_resolved(&id).await;
        store.get_unresolved(&id).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        assert!(store.invalidate(&id));
        store.get_resolved(&id).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert!(!store.invalidate(&SchemaId::new("https://x.org/other.json")));
    }

    #[tokio::test]
    async fn test_inline_schema_needs_no_fetch() {
        let store = SchemaStore::new(None);
        let id = SchemaId::new("S1");
        store.register_schema(id.clone(), Some(json!({"type": "number"})));
        let doc = store.get_unresolved(&id).await;
        assert!(doc.errors.is_empty());
        assert_eq!(doc.content, json!({"type": "number"}));

        store.invalidate(&id);
        assert_eq!(store.get_unresolved(&id).await.content, json!({"type": "number"}));
    }

    #[tokio::test]
    async fn test_register_replaces_inline_content() {
        let store = SchemaStore::new(None);
        let id = SchemaId::new("S1");
        store.register_schema(id.clone(), Some(json!({"type": "number"})));
        store.get_resolved(&id).await;
        store.register_schema(id.clone(), Some(json!({"type": "string"})));
        let resolved = store.get_resolved(&id).await;
        assert_eq!(resolved.to_value(), json!({"type": "string"}));
    }

    #[tokio::test]
    async fn test_clear_all_keeps_contributions() {
        let store = SchemaStore::new(None);
        store.contribute_schema(SchemaId::new("builtin"), json!({"type": "object"}));
        store.register_schema(SchemaId::new("user"), Some(json!({})));

        store.clear_all();
        assert!(store.contains(&SchemaId::new("builtin")));
        assert!(!store.contains(&SchemaId::new("user")));
        let doc = store.get_unresolved(&SchemaId::new("builtin")).await;
        assert_eq!(doc.content, json!({"type": "object"}));
    }

    #[tokio::test]
    async fn test_invalidate_drops_dependents() {
        let fetcher = MapFetcher::new(&[("https://x.org/b.json", r#"{"type": "string"}"#)]);
        let store = SchemaStore::new(Some(fetcher.clone()));
        let a = SchemaId::new("https://x.org/a.json");
        store.register_schema(a.clone(), Some(json!({"$ref": "b.json"})));

        let first = store.get_resolved(&a).await;
        assert_eq!(first.to_value(), json!({"type": "string"}));

        store.invalidate(&SchemaId::new("https://x.org/b.json"));
        let second = store.get_resolved(&a).await;
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }
}
