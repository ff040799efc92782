//! Append-only log of state transitions.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use domain::{EntityKind, TransitionLogEntry};

use crate::error::Result;

/// Audit trail for every state transition the lifecycle services apply.
/// Entries are never updated or deleted.
#[async_trait]
pub trait TransitionLogStore: Send + Sync {
    async fn append(&self, entry: TransitionLogEntry) -> Result<()>;

    /// Entries for one entity, in append order.
    async fn entries_for(&self, entity: EntityKind, entity_id: u64)
    -> Result<Vec<TransitionLogEntry>>;
}

/// In-memory transition log.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransitionLog {
    entries: Arc<Mutex<Vec<TransitionLogEntry>>>,
}

impl InMemoryTransitionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries across all entities.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TransitionLogStore for InMemoryTransitionLog {
    async fn append(&self, entry: TransitionLogEntry) -> Result<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    async fn entries_for(
        &self,
        entity: EntityKind,
        entity_id: u64,
    ) -> Result<Vec<TransitionLogEntry>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .filter(|e| e.entity == entity && e.entity_id == entity_id)
            .cloned()
            .collect())
    }
}
