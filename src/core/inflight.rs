use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::{sync::watch, time::Instant};

use crate::{error::PlannerError, types::result::SynthesisReport};

/// Terminal outcome shared by every caller attached to one synthesis.
pub(crate) type SharedOutcome = Arc<Result<SynthesisReport, PlannerError>>;

type OutcomeReceiver = watch::Receiver<Option<SharedOutcome>>;

/// Deduplication map from request content hash to the synthesis running for it.
///
/// The lock is only held for map lookups and updates, never across an await.
#[derive(Debug, Default)]
pub(crate) struct InFlightRegistry {
    entries: Mutex<HashMap<String, OutcomeReceiver>>,
}

pub(crate) enum Claim {
    /// The caller runs the synthesis and must publish through the guard.
    Leader(LeaderGuard),
    /// Another caller is already running it.
    Follower(OutcomeReceiver),
}

/// How a follower's wait ended.
#[derive(Debug)]
pub(crate) enum Waited {
    Finished(SharedOutcome),
    /// The leader went away without publishing; claim again.
    Abandoned,
    DeadlineElapsed,
}

impl InFlightRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, OutcomeReceiver>> {
        // Entries stay consistent even if a holder panicked.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn claim(self: &Arc<Self>, key: &str) -> Claim {
        let mut entries = self.lock();
        if let Some(receiver) = entries.get(key) {
            return Claim::Follower(receiver.clone());
        }

        let (sender, receiver) = watch::channel(None);
        entries.insert(key.to_string(), receiver);
        Claim::Leader(LeaderGuard {
            registry: Arc::clone(self),
            key: key.to_string(),
            sender: Some(sender),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn remove(&self, key: &str) {
        self.lock().remove(key);
    }
}

/// Held by the caller running a synthesis. Dropping it unpublished
/// releases the key so a waiting follower can take over.
pub(crate) struct LeaderGuard {
    registry: Arc<InFlightRegistry>,
    key: String,
    sender: Option<watch::Sender<Option<SharedOutcome>>>,
}

impl LeaderGuard {
    /// Release the key, then hand `outcome` to every attached follower.
    pub(crate) fn publish(mut self, outcome: SharedOutcome) {
        self.registry.remove(&self.key);
        if let Some(sender) = self.sender.take() {
            sender.send_replace(Some(outcome));
        }
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        if self.sender.is_some() {
            self.registry.remove(&self.key);
        }
    }
}

/// Wait for the leader's outcome, bounded by `deadline`.
pub(crate) async fn wait_for_leader(mut receiver: OutcomeReceiver, deadline: Instant) -> Waited {
    loop {
        let current = receiver.borrow_and_update().clone();
        if let Some(outcome) = current {
            return Waited::Finished(outcome);
        }

        match tokio::time::timeout_at(deadline, receiver.changed()).await {
            Ok(Ok(())) => continue,
            Ok(Err(_)) => {
                let last = receiver.borrow().clone();
                return match last {
                    Some(outcome) => Waited::Finished(outcome),
                    None => Waited::Abandoned,
                };
            }
            Err(_) => return Waited::DeadlineElapsed,
        }
    }
}
