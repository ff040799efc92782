//! Best-effort state change notifications.

use chrono::{DateTime, Utc};
use domain::EntityKind;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// A state change that was persisted.
#[derive(Debug, Clone)]
pub struct StateChanged {
    pub entity: EntityKind,
    pub entity_id: u64,
    pub old_state: String,
    pub new_state: String,
    pub event: String,
    pub at: DateTime<Utc>,
}

/// Fans persisted state changes out to interested subscribers.
///
/// Publishing is best-effort: a publish with no live subscribers, or with
/// subscribers that have lagged past the channel capacity, never fails the
/// transition that produced it.
#[derive(Debug, Clone)]
pub struct ChangePublisher {
    sender: broadcast::Sender<StateChanged>,
}

impl ChangePublisher {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribes to future state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChanged> {
        self.sender.subscribe()
    }

    /// Publishes a change. Send errors (no receivers) are ignored.
    pub fn publish(&self, change: StateChanged) {
        let _ = self.sender.send(change);
    }
}

impl Default for ChangePublisher {
    fn default() -> Self {
        Self::new()
    }
}
