//! Workflow storage.

use std::collections::HashMap;

use tokio::sync::RwLock;
use weft_runtime::definition::WorkflowDefinition;

use crate::error::{ServiceError, ServiceResult};
use crate::workflow::{Workflow, WorkflowId};

/// Repository of stored workflows and their definitions.
///
/// The executor only needs lookup; persistence technology is the
/// implementor's concern.
#[async_trait::async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Returns a workflow and its definition by ID.
    async fn get(&self, id: &WorkflowId) -> ServiceResult<(Workflow, WorkflowDefinition)>;
}

/// In-memory workflow store.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    inner: RwLock<HashMap<WorkflowId, (Workflow, WorkflowDefinition)>>,
}

impl InMemoryWorkflowStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts (or replaces) a workflow and its definition, returning the
    /// workflow ID.
    pub async fn insert(&self, workflow: Workflow, definition: WorkflowDefinition) -> WorkflowId {
        let id = workflow.id;
        self.inner.write().await.insert(id, (workflow, definition));
        id
    }

    /// Removes a workflow, returning it if it existed.
    pub async fn remove(&self, id: &WorkflowId) -> Option<(Workflow, WorkflowDefinition)> {
        self.inner.write().await.remove(id)
    }

    /// Returns the number of stored workflows.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Returns whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn get(&self, id: &WorkflowId) -> ServiceResult<(Workflow, WorkflowDefinition)> {
        self.inner
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(ServiceError::WorkflowNotFound(*id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_get_remove() {
        let store = InMemoryWorkflowStore::new();
        let workflow = Workflow::new("test");
        let id = store.insert(workflow, WorkflowDefinition::new()).await;

        let (fetched, _) = store.get(&id).await.unwrap();
        assert_eq!(fetched.name, "test");

        store.remove(&id).await.unwrap();
        assert!(matches!(
            store.get(&id).await,
            Err(ServiceError::WorkflowNotFound(_))
        ));
    }
}
