use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crate::mcp::backend::{Backend, BackendId, Initializer};
use crate::mcp::error::LoadError;

type LoadFuture = Shared<BoxFuture<'static, Result<Backend, LoadError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
}

enum SlotState {
    NotLoaded,
    Loading(LoadFuture),
    Loaded(Backend),
}

/// One backend's cache entry. `ticket` identifies the load that currently
/// owns the slot; a load may only settle the slot while it still holds it.
struct Slot {
    state: SlotState,
    ticket: u64,
}

type Slots = Arc<Vec<Mutex<Slot>>>;

/// Process-wide backend cache with single-flight loading per identifier.
///
/// Each slot has its own lock and no lock is held across an await, so
/// different backends load independently.
pub struct BackendCache {
    initializer: Arc<dyn Initializer>,
    slots: Slots,
}

impl BackendCache {
    pub fn new(initializer: Arc<dyn Initializer>) -> Self {
        let slots = BackendId::ALL
            .iter()
            .map(|_| {
                Mutex::new(Slot {
                    state: SlotState::NotLoaded,
                    ticket: 0,
                })
            })
            .collect::<Vec<_>>();
        Self {
            initializer,
            slots: Arc::new(slots),
        }
    }

    /// Return the cached backend, or start/join the single in-flight load.
    pub async fn resolve(&self, id: BackendId) -> Result<Backend, LoadError> {
        let load = {
            let mut slot = lock_slot(&self.slots, id);
            let in_flight = match &slot.state {
                SlotState::Loaded(backend) => return Ok(backend.clone()),
                SlotState::Loading(load) => Some(load.clone()),
                SlotState::NotLoaded => None,
            };
            match in_flight {
                Some(load) => {
                    debug!("Joining in-flight load of {} backend", id);
                    load
                }
                None => {
                    slot.ticket += 1;
                    let load = self.start_load(id, slot.ticket);
                    slot.state = SlotState::Loading(load.clone());
                    load
                }
            }
        };
        load.await
    }

    pub fn load_state(&self, id: BackendId) -> LoadState {
        match lock_slot(&self.slots, id).state {
            SlotState::NotLoaded => LoadState::NotLoaded,
            SlotState::Loading(_) => LoadState::Loading,
            SlotState::Loaded(_) => LoadState::Loaded,
        }
    }

    /// Drop every instance and detach every in-flight load. Loads that are
    /// still running settle into nothing.
    pub fn reset_all(&self) {
        for id in BackendId::ALL {
            let mut slot = lock_slot(&self.slots, id);
            slot.ticket += 1;
            slot.state = SlotState::NotLoaded;
        }
    }

    /// Detach in-flight loads only; already loaded backends stay cached.
    pub fn abandon_pending(&self) -> Vec<BackendId> {
        let mut abandoned = Vec::new();
        for id in BackendId::ALL {
            let mut slot = lock_slot(&self.slots, id);
            if matches!(slot.state, SlotState::Loading(_)) {
                slot.ticket += 1;
                slot.state = SlotState::NotLoaded;
                abandoned.push(id);
            }
        }
        abandoned
    }

    /// Spawn the initializer call. The task settles the slot itself so the
    /// transition happens even when every caller has gone away.
    fn start_load(&self, id: BackendId, ticket: u64) -> LoadFuture {
        let initializer = Arc::clone(&self.initializer);
        let slots = Arc::clone(&self.slots);

        let task = tokio::spawn(async move {
            debug!("Initializing {} backend", id);
            let outcome = initializer
                .initialize(id)
                .await
                .map_err(|source| LoadError::Init {
                    backend: id,
                    source: Arc::new(source),
                });
            settle(&slots, id, ticket, &outcome);
            outcome
        });

        async move {
            task.await
                .unwrap_or_else(|_| Err(LoadError::Aborted { backend: id }))
        }
        .boxed()
        .shared()
    }
}

fn settle(slots: &Slots, id: BackendId, ticket: u64, outcome: &Result<Backend, LoadError>) {
    let mut slot = lock_slot(slots, id);
    if slot.ticket != ticket {
        debug!("Discarding result of abandoned {} backend load", id);
        return;
    }
    slot.state = match outcome {
        Ok(backend) => {
            info!("{} backend loaded", id);
            SlotState::Loaded(backend.clone())
        }
        Err(err) => {
            warn!("{}", err);
            SlotState::NotLoaded
        }
    };
}

fn lock_slot(slots: &Slots, id: BackendId) -> MutexGuard<'_, Slot> {
    slots[id.index()]
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::mcp::backend::BackendId;
    use crate::mcp::backends;
    use crate::mcp::error::{BackendError, BackendResult};
    use crate::shared::config::{MailConfig, WebSearchConfig};

    pub fn fake_backend(id: BackendId) -> Backend {
        match id {
            BackendId::Contacts => Backend::Contacts(Arc::new(backends::contacts::Contacts::new())),
            BackendId::Notes => Backend::Notes(Arc::new(backends::notes::Notes::new())),
            BackendId::Messages => Backend::Messages(Arc::new(backends::messages::Messages::new())),
            BackendId::Mail => Backend::Mail(Arc::new(backends::mail::Mail::new(
                MailConfig::default(),
            ))),
            BackendId::Reminders => {
                Backend::Reminders(Arc::new(backends::reminders::Reminders::new()))
            }
            BackendId::Calendar => Backend::Calendar(Arc::new(backends::calendar::Calendar::new())),
            BackendId::Maps => Backend::Maps(Arc::new(backends::maps::Maps::new())),
            BackendId::WebSearch => Backend::WebSearch(Arc::new(
                backends::web_search::WebSearch::new(WebSearchConfig::default())
                    .expect("http client"),
            )),
        }
    }

    /// Scripted behaviour for one backend in a `FakeInitializer`.
    #[derive(Clone, Copy)]
    pub enum Plan {
        Succeed,
        Delay(Duration),
        FailTimes(usize),
        Hang,
    }

    /// Initializer that counts calls and follows a per-backend plan.
    pub struct FakeInitializer {
        plans: HashMap<BackendId, Plan>,
        calls: HashMap<BackendId, AtomicUsize>,
    }

    impl FakeInitializer {
        pub fn new() -> Self {
            Self {
                plans: HashMap::new(),
                calls: BackendId::ALL
                    .iter()
                    .map(|id| (*id, AtomicUsize::new(0)))
                    .collect(),
            }
        }

        pub fn with(mut self, id: BackendId, plan: Plan) -> Self {
            self.plans.insert(id, plan);
            self
        }

        pub fn calls(&self, id: BackendId) -> usize {
            self.calls[&id].load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Initializer for FakeInitializer {
        async fn initialize(&self, id: BackendId) -> BackendResult<Backend> {
            let call = self.calls[&id].fetch_add(1, Ordering::SeqCst);
            match self.plans.get(&id).copied().unwrap_or(Plan::Succeed) {
                Plan::Succeed => {}
                Plan::Delay(delay) => tokio::time::sleep(delay).await,
                Plan::FailTimes(n) if call < n => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    return Err(BackendError::AccessDenied {
                        app: "Test",
                        message: "permission prompt not answered".to_string(),
                    });
                }
                Plan::FailTimes(_) => {}
                Plan::Hang => futures::future::pending::<()>().await,
            }
            Ok(fake_backend(id))
        }
    }
}
