//! Engine-specific configuration blocks carried by a workflow.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display as StrumDisplay, EnumString};

use super::NodeId;
use crate::provider::ToolId;

/// Agent construction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(StrumDisplay, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AgentType {
    /// Reasoning-and-acting loop.
    React,
    /// Function-calling agent.
    OpenaiFunctions,
    /// Planner followed by step execution.
    PlanAndExecute,
    /// Conversational agent with history.
    Conversational,
}

/// Chain composition strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(StrumDisplay, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChainType {
    /// Nodes executed one after another.
    Sequential,
    /// Pure data-transform chain.
    Transform,
    /// Routes input to one of several sub-chains.
    Router,
}

/// Configuration for agent-engine workflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent construction strategy.
    pub agent_type: AgentType,
    /// LLM provider name; must parse as a supported provider.
    pub provider: String,
    /// LLM model name.
    pub model: String,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// System message prepended to every run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    /// Tool IDs available to the agent.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolId>,
}

/// Configuration for chain-engine workflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain composition strategy.
    pub chain_type: ChainType,
    /// Node IDs in execution order.
    pub nodes: Vec<NodeId>,
    /// Transform specs keyed by node ID.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub transforms: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_type_round_trip() {
        let ty: AgentType = serde_json::from_str("\"plan-and-execute\"").unwrap();
        assert_eq!(ty, AgentType::PlanAndExecute);
        assert_eq!(ty.to_string(), "plan-and-execute");
    }

    #[test]
    fn test_chain_type_rejects_unknown() {
        let result: Result<ChainType, _> = serde_json::from_str("\"parallel\"");
        assert!(result.is_err());
    }
}
