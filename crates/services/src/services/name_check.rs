//! Debounced "is this size group name already used" check.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, warn};

use super::{
    admin_api::SizeApi,
    size_taxonomy::{NAME_MAX_CHARS, NAME_MIN_CHARS},
};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Latest known availability of the name being typed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NameCheck {
    /// Nothing worth checking (empty or outside the length limits)
    #[default]
    Idle,
    Pending,
    /// Free, for the trimmed name carried
    Available(String),
    Taken(String),
    /// The lookup itself failed; the backend still rejects duplicates on submit.
    Failed(String),
}

impl NameCheck {
    pub fn blocks_submit(&self) -> bool {
        matches!(self, Self::Pending | Self::Taken(_))
    }

    /// Name a completed lookup answered for
    pub fn checked_name(&self) -> Option<&str> {
        match self {
            Self::Available(name) | Self::Taken(name) => Some(name),
            Self::Idle | Self::Pending | Self::Failed(_) => None,
        }
    }
}

/// Schedules name lookups so only the most recent keystroke is checked. Every schedule bumps a
/// generation counter and results are only published if their generation is still current.
pub struct NameAvailabilityChecker<A> {
    api: Arc<A>,
    debounce: Duration,
    generation: Arc<AtomicU64>,
    state: Arc<watch::Sender<NameCheck>>,
    scheduled: Mutex<Option<JoinHandle<()>>>,
}

impl<A: SizeApi + 'static> NameAvailabilityChecker<A> {
    pub fn new(api: Arc<A>, debounce: Duration) -> Self {
        let (state, _) = watch::channel(NameCheck::Idle);
        Self {
            api,
            debounce,
            generation: Arc::new(AtomicU64::new(0)),
            state: Arc::new(state),
            scheduled: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<NameCheck> {
        self.state.subscribe()
    }

    pub fn current(&self) -> NameCheck {
        self.state.borrow().clone()
    }

    /// Queue a lookup after the debounce window, superseding any earlier one.
    pub fn schedule(&self, name: &str) {
        let Some((generation, name)) = self.begin(name) else {
            return;
        };

        let api = self.api.clone();
        let state = self.state.clone();
        let current = self.generation.clone();
        let debounce = self.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let outcome = lookup(api.as_ref(), &name).await;
            publish(&state, &current, generation, outcome);
        });

        *self.scheduled.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Look the name up immediately. The outcome is returned even if a newer check has since
    /// replaced it in the published state.
    pub async fn check_now(&self, name: &str) -> NameCheck {
        let Some((generation, name)) = self.begin(name) else {
            return NameCheck::Idle;
        };
        let outcome = lookup(self.api.as_ref(), &name).await;
        publish(&self.state, &self.generation, generation, outcome.clone());
        outcome
    }

    /// Drop any scheduled lookup and go back to idle.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.abort_scheduled();
        self.state.send_replace(NameCheck::Idle);
    }

    /// Start a new generation. Returns `None` when the name is not worth looking up.
    fn begin(&self, name: &str) -> Option<(u64, String)> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.abort_scheduled();

        let name = name.trim();
        let len = name.chars().count();
        if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len) {
            self.state.send_replace(NameCheck::Idle);
            return None;
        }

        self.state.send_replace(NameCheck::Pending);
        Some((generation, name.to_string()))
    }

    fn abort_scheduled(&self) {
        if let Some(handle) = self
            .scheduled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
    }
}

impl<A> Drop for NameAvailabilityChecker<A> {
    fn drop(&mut self) {
        if let Some(handle) = self
            .scheduled
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
    }
}

async fn lookup<A: SizeApi + ?Sized>(api: &A, name: &str) -> NameCheck {
    match api.check_size_name(name).await {
        Ok(usage) if usage.is_taken() => NameCheck::Taken(name.to_string()),
        Ok(_) => NameCheck::Available(name.to_string()),
        Err(e) => {
            warn!(name = %name, error = %e, "Size name check failed");
            NameCheck::Failed(e.user_message())
        }
    }
}

/// The generation is compared while the channel is locked, so a newer `begin` either lands
/// before (and the result is dropped) or after (and overwrites it).
fn publish(
    state: &watch::Sender<NameCheck>,
    current: &AtomicU64,
    generation: u64,
    outcome: NameCheck,
) {
    state.send_if_modified(|slot| {
        if current.load(Ordering::SeqCst) != generation {
            debug!(generation, "Discarding stale name check result");
            return false;
        }
        *slot = outcome;
        true
    });
}
