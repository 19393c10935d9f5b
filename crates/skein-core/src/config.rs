//! EngineConfig - decision cycle の設定
//!
//! Passed explicitly to [`WorkflowExecution`](crate::app::execution::WorkflowExecution)
//! and [`HostedWorkflows`](crate::app::hosted::HostedWorkflows); nothing is
//! read from global state.

use serde::{Deserialize, Serialize};

pub const DEFAULT_COMPLETION_RESULT: &str = "Workflow is completed.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Result carried by the completion proposal emitted when the last leaf
    /// finishes.
    #[serde(default = "default_completion_result")]
    pub completion_proposal_result: String,

    /// Skip history events of items the workflow no longer declares instead
    /// of failing the cycle.
    #[serde(default)]
    pub ignore_unknown_items: bool,
}

fn default_completion_result() -> String {
    DEFAULT_COMPLETION_RESULT.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            completion_proposal_result: default_completion_result(),
            ignore_unknown_items: false,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.completion_proposal_result, "Workflow is completed.");
    }

    #[test]
    fn fields_can_be_overridden() {
        let config = EngineConfig::from_json_str(
            r#"{ "completion_proposal_result": "done", "ignore_unknown_items": true }"#,
        )
        .unwrap();
        assert_eq!(config.completion_proposal_result, "done");
        assert!(config.ignore_unknown_items);
    }
}
