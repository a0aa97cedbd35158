//! Workflow records.

use std::str::FromStr;

use derive_builder::Builder;
use derive_more::{Debug, Display, From, Into};
use jiff::Timestamp;
use semver::Version;
use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumString};
use uuid::Uuid;
use weft_runtime::convert::WorkflowKind;
use weft_runtime::definition::{AgentConfig, ChainConfig};
use weft_runtime::provider::LlmParams;

/// Unique identifier for a stored workflow.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Debug, Display, From, Into)]
#[debug("{_0}")]
#[display("{_0}")]
#[serde(transparent)]
pub struct WorkflowId(Uuid);

impl WorkflowId {
    /// Creates a new random workflow ID.
    #[inline]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a workflow ID from an existing UUID.
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

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for WorkflowId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Lifecycle status of a stored workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(StrumDisplay, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkflowStatus {
    /// Being edited, not yet runnable by policy.
    Draft,
    /// Live and runnable.
    Active,
    /// Retired; kept for history.
    Archived,
}

/// A stored, user-authored workflow.
///
/// The graph body lives in the associated
/// [`WorkflowDefinition`](weft_runtime::definition::WorkflowDefinition);
/// this record carries identity, lifecycle, engine selection, and
/// engine-specific configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(
    name = "WorkflowBuilder",
    pattern = "owned",
    setter(into, strip_option, prefix = "with")
)]
pub struct Workflow {
    /// Unique workflow ID.
    #[builder(default)]
    pub id: WorkflowId,
    /// Display name.
    pub name: String,
    /// Description of what the workflow does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub description: Option<String>,
    /// Lifecycle status.
    #[builder(default = "WorkflowStatus::Draft")]
    pub status: WorkflowStatus,
    /// Engine selection; detected from the definition when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub kind: Option<WorkflowKind>,
    /// Tags for organization.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub tags: Vec<String>,
    /// Workflow version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub version: Option<Version>,
    /// Creation timestamp.
    #[builder(default = "Timestamp::now()")]
    pub created_at: Timestamp,
    /// Last update timestamp.
    #[builder(default = "Timestamp::now()")]
    pub updated_at: Timestamp,
    /// Agent-engine configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub agent_config: Option<AgentConfig>,
    /// Chain-engine configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub chain_config: Option<ChainConfig>,
    /// Default LLM parameters for nodes without their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub llm_config: Option<LlmParams>,
    /// Number of recorded executions.
    #[serde(default)]
    #[builder(default)]
    pub execution_count: u64,
    /// When the workflow last ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub last_executed: Option<Timestamp>,
}

impl Workflow {
    /// Creates a draft workflow with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Timestamp::now();
        Self {
            id: WorkflowId::new(),
            name: name.into(),
            description: None,
            status: WorkflowStatus::Draft,
            kind: None,
            tags: Vec::new(),
            version: None,
            created_at: now,
            updated_at: now,
            agent_config: None,
            chain_config: None,
            llm_config: None,
            execution_count: 0,
            last_executed: None,
        }
    }

    /// Returns a builder for creating a workflow.
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::default()
    }

    /// Sets the engine kind, returning the workflow.
    pub fn with_kind(mut self, kind: WorkflowKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Sets the agent configuration, returning the workflow.
    pub fn with_agent_config(mut self, config: AgentConfig) -> Self {
        self.agent_config = Some(config);
        self
    }

    /// Sets the chain configuration, returning the workflow.
    pub fn with_chain_config(mut self, config: ChainConfig) -> Self {
        self.chain_config = Some(config);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_workflow_defaults() {
        let workflow = Workflow::new("enrichment");
        assert_eq!(workflow.status, WorkflowStatus::Draft);
        assert!(workflow.kind.is_none());
        assert_eq!(workflow.execution_count, 0);
    }

    #[test]
    fn test_builder() {
        let workflow = Workflow::builder()
            .with_name("routing")
            .with_kind(WorkflowKind::Graph)
            .build()
            .unwrap();
        assert_eq!(workflow.name, "routing");
        assert_eq!(workflow.kind, Some(WorkflowKind::Graph));
    }
}
