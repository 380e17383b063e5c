//! Debounced, cancellable validation of open documents.
//!
//! Each open resource moves through
//! `Idle -> PendingValidation -> Validating -> Idle`. An edit re-arms the
//! debounce timer and cancels whatever pass is pending or running for the
//! resource. A finished pass publishes only if the document version it
//! validated is still the current one.

use crate::document::{Document, DocumentStore};
use crate::host::ServiceHost;
use crate::settings::LanguageSettings;
use crate::types::Diagnostic;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Receives the diagnostics of every completed validation pass.
#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    /// Replace the diagnostics shown for `uri`. `version` is the document
    /// version they were computed from, `None` when clearing.
    async fn publish(&self, uri: &str, diagnostics: Vec<Diagnostic>, version: Option<i32>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationState {
    Idle,
    PendingValidation,
    Validating,
}

struct Resource {
    /// Identifies the pass that owns this entry; stale passes see a newer one.
    generation: u64,
    state: ValidationState,
    cancel: CancellationToken,
}

struct Shared {
    host: Arc<ServiceHost>,
    sink: Arc<dyn DiagnosticSink>,
    documents: Mutex<DocumentStore>,
    resources: Mutex<HashMap<String, Resource>>,
    next_generation: AtomicU64,
    passes: AtomicUsize,
    shutdown: CancellationToken,
}

/// Validates open documents in the background and publishes the results.
///
/// Entry points spawn tokio tasks and must be called within a runtime.
pub struct ValidationPipeline {
    shared: Arc<Shared>,
}

impl fmt::Debug for ValidationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationPipeline")
            .field("open", &self.shared.documents().len())
            .field("passes", &self.validation_passes())
            .finish()
    }
}

impl ValidationPipeline {
    pub fn new(host: Arc<ServiceHost>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            shared: Arc::new(Shared {
                host,
                sink,
                documents: Mutex::new(DocumentStore::new()),
                resources: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                passes: AtomicUsize::new(0),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn host(&self) -> &Arc<ServiceHost> {
        &self.shared.host
    }

    /// Track a newly opened document and validate it without delay.
    pub fn open(&self, uri: &str, text: impl Into<String>, version: i32) {
        self.shared.documents().open(uri, text, version);
        self.schedule(uri, Duration::ZERO);
    }

    /// Record an edit and re-arm the debounce timer.
    pub fn change(&self, uri: &str, text: impl Into<String>, version: i32) {
        if !self.shared.documents().change(uri, text, version) {
            warn!(uri, version, "change for a document that is not open");
            return;
        }
        let debounce = self.shared.host.settings().debounce();
        self.schedule(uri, debounce);
    }

    /// Stop tracking `uri`: cancel its pending work, clear its diagnostics
    /// and drop the schemas cached for it.
    pub async fn close(&self, uri: &str) {
        if let Some(resource) = self.shared.resources().remove(uri) {
            resource.cancel.cancel();
        }
        if self.shared.documents().close(uri).is_none() {
            return;
        }
        debug!(uri, "document closed");
        self.shared.sink.publish(uri, Vec::new(), None).await;
        if let Some(service) = self.shared.host.running() {
            service.reset_schema(uri);
        }
    }

    /// Apply new settings and re-validate every open document.
    pub fn reconfigure(&self, settings: LanguageSettings) {
        self.shared.host.update_settings(settings);
        let uris: Vec<String> = self.shared.documents().uris().map(str::to_string).collect();
        debug!(count = uris.len(), "revalidating after settings change");
        for uri in uris {
            self.schedule(&uri, Duration::ZERO);
        }
    }

    /// Abandon all work without publishing and drop the service.
    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
        self.shared.resources().clear();
        self.shared.documents().clear();
        self.shared.host.stop();
        debug!("validation pipeline shut down");
    }

    pub fn state(&self, uri: &str) -> Option<ValidationState> {
        self.shared.resources().get(uri).map(|r| r.state)
    }

    /// Number of validation passes started so far.
    pub fn validation_passes(&self) -> usize {
        self.shared.passes.load(Ordering::Relaxed)
    }

    fn schedule(&self, uri: &str, delay: Duration) {
        if self.shared.shutdown.is_cancelled() {
            return;
        }
        let generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = self.shared.shutdown.child_token();
        let previous = self.shared.resources().insert(
            uri.to_string(),
            Resource {
                generation,
                state: ValidationState::PendingValidation,
                cancel: cancel.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.cancel.cancel();
            if previous.state == ValidationState::Validating {
                debug!(uri, "superseding in-flight validation");
            }
        }
        debug!(uri, delay_ms = delay.as_millis() as u64, "validation scheduled");

        let shared = Arc::clone(&self.shared);
        let uri = uri.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            shared.validate(&uri, generation, &cancel).await;
        });
    }
}

impl Shared {
    fn documents(&self) -> MutexGuard<'_, DocumentStore> {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resources(&self) -> MutexGuard<'_, HashMap<String, Resource>> {
        self.resources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the resource to `state` if pass `generation` still owns it.
    fn transition(&self, uri: &str, generation: u64, state: ValidationState) -> bool {
        let mut resources = self.resources();
        match resources.get_mut(uri) {
            Some(resource) if resource.generation == generation => {
                debug!(uri, from = ?resource.state, to = ?state, "validation state");
                resource.state = state;
                true
            }
            _ => false,
        }
    }

    async fn validate(&self, uri: &str, generation: u64, cancel: &CancellationToken) {
        let Some(document) = self.documents().get(uri).cloned() else {
            return;
        };
        if !self.transition(uri, generation, ValidationState::Validating) {
            return;
        }
        self.passes.fetch_add(1, Ordering::Relaxed);
        let version = document.version();
        let service = self.host.service();

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(uri, version, "validation cancelled");
                return;
            }
            result = service.do_validation(&document) => result,
        };
        let diagnostics = match result {
            Ok(diagnostics) => diagnostics,
            Err(err) => {
                warn!(uri, version, error = %err, "validation failed");
                self.transition(uri, generation, ValidationState::Idle);
                return;
            }
        };

        let current = self.documents().get(uri).map(Document::version);
        if cancel.is_cancelled() || current != Some(version) {
            debug!(uri, version, ?current, "discarding stale validation result");
            return;
        }
        self.sink.publish(uri, diagnostics, Some(version)).await;
        self.transition(uri, generation, ValidationState::Idle);
    }
}
