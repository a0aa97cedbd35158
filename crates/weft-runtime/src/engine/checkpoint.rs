//! Execution checkpoints.

use std::collections::{HashMap, VecDeque};
use std::str::FromStr;

use derive_more::{Debug, Display, From, Into};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::state::ExecutionState;

/// Unique identifier for one workflow execution.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Debug, Display, From, Into)]
#[debug("{_0}")]
#[display("{_0}")]
#[serde(transparent)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    /// Creates a new random execution ID.
    #[inline]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates an execution ID from an existing UUID.
    #[inline]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[inline]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ExecutionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Where in an execution a checkpoint was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    /// State as seeded, before any node ran.
    Initial,
    /// State after the last node completed.
    Final,
}

/// A recorded snapshot of execution state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Where the snapshot was taken.
    pub kind: CheckpointKind,
    /// The state at that point.
    pub state: ExecutionState,
    /// When the snapshot was taken.
    pub timestamp: Timestamp,
}

impl Checkpoint {
    /// Creates a checkpoint stamped with the current time.
    pub fn now(kind: CheckpointKind, state: ExecutionState) -> Self {
        Self {
            kind,
            state,
            timestamp: Timestamp::now(),
        }
    }
}

/// Bounded per-execution checkpoint storage.
///
/// Append-only per execution ID with FIFO eviction once the capacity is
/// reached; safe for concurrent use across executions.
#[derive(Debug)]
pub struct CheckpointStore {
    capacity: usize,
    inner: RwLock<HashMap<ExecutionId, VecDeque<Checkpoint>>>,
}

impl CheckpointStore {
    /// Creates a store retaining up to `capacity` checkpoints per execution.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Records a checkpoint for an execution, evicting the oldest entry
    /// when the capacity is exceeded.
    pub async fn record(&self, execution_id: ExecutionId, checkpoint: Checkpoint) {
        let mut inner = self.inner.write().await;
        let entries = inner.entry(execution_id).or_default();
        entries.push_back(checkpoint);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Returns all checkpoints recorded for an execution, oldest first.
    pub async fn get(&self, execution_id: &ExecutionId) -> Vec<Checkpoint> {
        self.inner
            .read()
            .await
            .get(execution_id)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Removes all checkpoints recorded for an execution.
    pub async fn clear(&self, execution_id: &ExecutionId) {
        self.inner.write().await.remove(execution_id);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn state(n: u64) -> ExecutionState {
        ExecutionState::seed(Default::default(), json!(n))
    }

    #[tokio::test]
    async fn test_record_and_get() {
        let store = CheckpointStore::new(100);
        let id = ExecutionId::new();

        store
            .record(id, Checkpoint::now(CheckpointKind::Initial, state(1)))
            .await;
        store
            .record(id, Checkpoint::now(CheckpointKind::Final, state(2)))
            .await;

        let checkpoints = store.get(&id).await;
        assert_eq!(checkpoints.len(), 2);
        assert_eq!(checkpoints[0].kind, CheckpointKind::Initial);
        assert_eq!(checkpoints[1].kind, CheckpointKind::Final);

        assert!(store.get(&ExecutionId::new()).await.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest_first() {
        let store = CheckpointStore::new(100);
        let id = ExecutionId::new();

        for n in 0..150 {
            store
                .record(id, Checkpoint::now(CheckpointKind::Initial, state(n)))
                .await;
        }

        let checkpoints = store.get(&id).await;
        assert_eq!(checkpoints.len(), 100);
        // The first 50 snapshots were evicted.
        assert_eq!(checkpoints[0].state.input(), json!(50));
        assert_eq!(checkpoints[99].state.input(), json!(149));
    }

    #[tokio::test]
    async fn test_clear() {
        let store = CheckpointStore::new(10);
        let id = ExecutionId::new();
        store
            .record(id, Checkpoint::now(CheckpointKind::Initial, state(1)))
            .await;
        store.clear(&id).await;
        assert!(store.get(&id).await.is_empty());
    }
}
