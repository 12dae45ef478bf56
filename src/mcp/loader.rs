use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::mcp::backend::{Backend, BackendId, Capability, Initializer};
use crate::mcp::cache::{BackendCache, LoadState};
use crate::mcp::error::LoadError;

/// Upper bound on startup: eager loading gives up after this long.
pub const EAGER_LOAD_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderMode {
    /// Every backend was loaded at startup (or startup is still racing).
    Eager,
    /// Backends load on first use.
    Safe,
}

/// Owns the backend cache and the startup state machine.
///
/// Eager → Safe is the only transition and it happens at most once. Ready is
/// signalled exactly once per loader, after the startup race is decided.
pub struct Loader {
    cache: BackendCache,
    safe: AtomicBool,
    started: AtomicBool,
    ready: watch::Sender<bool>,
}

impl Loader {
    pub fn new(initializer: Arc<dyn Initializer>) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            cache: BackendCache::new(initializer),
            safe: AtomicBool::new(false),
            started: AtomicBool::new(false),
            ready,
        }
    }

    /// Run the startup race in the background.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<LoaderMode> {
        let loader = Arc::clone(self);
        tokio::spawn(async move { loader.start().await })
    }

    /// Eager-load every backend, racing the aggregate against
    /// `EAGER_LOAD_TIMEOUT`. Falls back to safe mode on the first failure or
    /// when the timer wins. Calling it again just waits for the first run.
    pub async fn start(&self) -> LoaderMode {
        if self.started.swap(true, Ordering::SeqCst) {
            self.wait_ready().await;
            return self.mode();
        }

        info!(
            "Eager-loading {} backends (timeout {:?})",
            BackendId::ALL.len(),
            EAGER_LOAD_TIMEOUT
        );
        let eager = try_join_all(BackendId::ALL.iter().map(|id| self.cache.resolve(*id)));

        tokio::select! {
            outcome = eager => match outcome {
                Ok(_) => info!("All backends loaded eagerly"),
                Err(err) => {
                    warn!("Eager loading failed: {}", err);
                    self.cache.reset_all();
                    self.enter_safe_mode();
                }
            },
            _ = tokio::time::sleep(EAGER_LOAD_TIMEOUT) => {
                let pending = self.cache.abandon_pending();
                warn!(
                    "Eager loading timed out after {:?}; deferring {:?}",
                    EAGER_LOAD_TIMEOUT, pending
                );
                self.enter_safe_mode();
            }
        }

        self.signal_ready();
        self.mode()
    }

    pub fn mode(&self) -> LoaderMode {
        if self.safe.load(Ordering::SeqCst) {
            LoaderMode::Safe
        } else {
            LoaderMode::Eager
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Wait until the startup race is decided. Bounded by
    /// `EAGER_LOAD_TIMEOUT` once `start` has been called.
    pub async fn wait_ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    pub fn load_state(&self, id: BackendId) -> LoadState {
        self.cache.load_state(id)
    }

    pub async fn resolve(&self, id: BackendId) -> Result<Backend, LoadError> {
        if self.cache.load_state(id) != LoadState::Loaded {
            debug!("Resolving {} backend in {:?} mode", id, self.mode());
        }
        self.cache.resolve(id).await
    }

    /// Typed lookup: resolve the backend that produces `C`.
    pub async fn resolve_as<C: Capability>(&self) -> Result<Arc<C>, LoadError> {
        let backend = self.resolve(C::ID).await?;
        let actual = backend.id();
        C::from_backend(backend).ok_or(LoadError::Mismatch {
            backend: C::ID,
            actual,
        })
    }

    fn enter_safe_mode(&self) {
        if !self.safe.swap(true, Ordering::SeqCst) {
            info!("Loader entered safe mode; backends will load on first use");
        }
    }

    fn signal_ready(&self) {
        self.ready.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::backends::mail::Mail;
    use crate::mcp::cache::testing::{FakeInitializer, Plan};

    #[tokio::test(start_paused = true)]
    async fn test_all_loaded_stays_eager() {
        let init = Arc::new(FakeInitializer::new());
        let loader = Loader::new(init.clone());

        assert!(!loader.is_ready());
        assert_eq!(loader.start().await, LoaderMode::Eager);
        assert!(loader.is_ready());

        for id in BackendId::ALL {
            assert_eq!(loader.load_state(id), LoadState::Loaded);
            assert_eq!(init.calls(id), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_switches_to_safe_and_resets_cache() {
        let init = Arc::new(FakeInitializer::new().with(BackendId::Reminders, Plan::FailTimes(1)));
        let loader = Loader::new(init.clone());

        assert_eq!(loader.start().await, LoaderMode::Safe);
        for id in BackendId::ALL {
            assert_eq!(loader.load_state(id), LoadState::NotLoaded);
        }

        loader.resolve(BackendId::Reminders).await.unwrap();
        assert_eq!(init.calls(BackendId::Reminders), 2);
        assert_eq!(loader.mode(), LoaderMode::Safe);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_defers_slow_backend() {
        let init = Arc::new(
            FakeInitializer::new().with(BackendId::Mail, Plan::Delay(Duration::from_secs(30))),
        );
        let loader = Loader::new(init.clone());

        let started = tokio::time::Instant::now();
        assert_eq!(loader.start().await, LoaderMode::Safe);
        assert!(started.elapsed() >= EAGER_LOAD_TIMEOUT);
        assert!(started.elapsed() < Duration::from_secs(30));

        assert_eq!(loader.load_state(BackendId::Mail), LoadState::NotLoaded);
        assert_eq!(loader.load_state(BackendId::Notes), LoadState::Loaded);

        let mail = loader.resolve_as::<Mail>().await;
        assert!(mail.is_ok());
        assert_eq!(init.calls(BackendId::Mail), 2);
        assert_eq!(loader.load_state(BackendId::Mail), LoadState::Loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_backend_does_not_block_ready() {
        let init = Arc::new(FakeInitializer::new().with(BackendId::Messages, Plan::Hang));
        let loader = Arc::new(Loader::new(init.clone()));

        let handle = loader.spawn();
        loader.wait_ready().await;

        assert_eq!(loader.mode(), LoaderMode::Safe);
        assert_eq!(handle.await.unwrap(), LoaderMode::Safe);
        assert_eq!(loader.load_state(BackendId::Messages), LoadState::NotLoaded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_runs_once() {
        let init = Arc::new(FakeInitializer::new());
        let loader = Loader::new(init.clone());

        let (first, second) = tokio::join!(loader.start(), loader.start());
        assert_eq!(first, LoaderMode::Eager);
        assert_eq!(second, LoaderMode::Eager);
        assert_eq!(init.calls(BackendId::Contacts), 1);
    }
}
