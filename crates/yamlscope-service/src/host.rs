//! Service host: creates the language service on demand and reclaims it
//! when idle.
//!
//! Nothing the service caches is persisted, so dropping it only costs the
//! schema fetches the next instance repeats. Settings and schema
//! contributions live on the host and are applied to every new instance.

use crate::language_service::LanguageService;
use crate::settings::LanguageSettings;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use yamlscope_schema::{SchemaContributions, SchemaFetcher};

/// How often [`ServiceHost::spawn_idle_monitor`] checks for inactivity by default.
pub const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(30);

struct HostState {
    settings: LanguageSettings,
    contributions: SchemaContributions,
    service: Option<Arc<LanguageService>>,
    last_used: Instant,
}

impl HostState {
    /// Drop the running instance, keeping the contributions it carried.
    fn take_service(&mut self) -> Option<Arc<LanguageService>> {
        let service = self.service.take()?;
        self.contributions = service.registry().schema_contributions();
        Some(service)
    }
}

/// Owns the current [`LanguageService`] instance, if any.
pub struct ServiceHost {
    fetcher: Option<Arc<dyn SchemaFetcher>>,
    state: Mutex<HostState>,
}

impl fmt::Debug for ServiceHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHost")
            .field("has_fetcher", &self.fetcher.is_some())
            .field("running", &self.is_running())
            .finish()
    }
}

impl ServiceHost {
    pub fn new(fetcher: Option<Arc<dyn SchemaFetcher>>, settings: LanguageSettings) -> Self {
        Self {
            fetcher,
            state: Mutex::new(HostState {
                settings,
                contributions: SchemaContributions::default(),
                service: None,
                last_used: Instant::now(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn settings(&self) -> LanguageSettings {
        self.lock().settings.clone()
    }

    /// The running service, created and configured first if there is none.
    /// Counts as use for idle tracking.
    pub fn service(&self) -> Arc<LanguageService> {
        let mut state = self.lock();
        state.last_used = Instant::now();
        if let Some(service) = &state.service {
            return Arc::clone(service);
        }
        info!("starting language service");
        let service = Arc::new(LanguageService::new(self.fetcher.clone()));
        service
            .registry()
            .set_schema_contributions(state.contributions.clone());
        service.configure(state.settings.clone());
        state.service = Some(Arc::clone(&service));
        service
    }

    /// The running service without creating one or counting as use.
    pub fn running(&self) -> Option<Arc<LanguageService>> {
        self.lock().service.clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock().service.is_some()
    }

    /// Replace the settings and reconfigure the running instance, if any.
    pub fn update_settings(&self, settings: LanguageSettings) {
        let mut state = self.lock();
        if let Some(service) = &state.service {
            service.configure(settings.clone());
            debug!("settings changed, language service reconfigured");
        }
        state.settings = settings;
    }

    /// Replace the statically contributed schemas, here and on the running
    /// instance.
    pub fn set_schema_contributions(&self, contributions: SchemaContributions) {
        let mut state = self.lock();
        if let Some(service) = &state.service {
            service.registry().set_schema_contributions(contributions.clone());
        }
        state.contributions = contributions;
    }

    /// Drop the running instance. Returns whether one was running.
    pub fn stop(&self) -> bool {
        self.lock().take_service().is_some()
    }

    /// Drop the instance if it has not been used for the idle timeout.
    pub fn reclaim_if_idle(&self) -> bool {
        let mut state = self.lock();
        if state.service.is_none() {
            return false;
        }
        let idle = state.last_used.elapsed();
        if idle <= state.settings.idle_timeout() {
            return false;
        }
        state.take_service();
        info!(idle_secs = idle.as_secs(), "reclaimed idle language service");
        true
    }

    /// Check for idleness every `interval` until `cancel` fires.
    pub fn spawn_idle_monitor(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let host = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        host.reclaim_if_idle();
                    }
                }
            }
            debug!("idle monitor stopped");
        })
    }
}
