//! HostedWorkflows - (name, version) で引ける workflow の集合
//!
//! Built once at startup and shared read-only (`Arc<HostedWorkflows>`)
//! between decision cycles.

use super::execution::WorkflowExecution;
use crate::config::EngineConfig;
use crate::domain::decision::Decision;
use crate::domain::history::WorkflowHistoryEvents;
use crate::error::{DeciderError, DefinitionError};
use crate::graph::workflow::Workflow;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Default)]
pub struct HostedWorkflows {
    workflows: HashMap<(String, String), Arc<Workflow>>,
    config: EngineConfig,
}

impl HostedWorkflows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn host(mut self, workflow: Workflow) -> Result<Self, DefinitionError> {
        let description = workflow.description();
        let key = (description.name.clone(), description.version.clone());
        if self.workflows.contains_key(&key) {
            return Err(DefinitionError::DuplicateWorkflow {
                name: key.0,
                version: key.1,
            });
        }
        info!(workflow = %key.0, version = %key.1, "workflow hosted");
        self.workflows.insert(key, Arc::new(workflow));
        Ok(self)
    }

    pub fn find(&self, name: &str, version: &str) -> Result<Arc<Workflow>, DeciderError> {
        self.workflows
            .get(&(name.to_string(), version.to_string()))
            .cloned()
            .ok_or_else(|| DeciderError::WorkflowNotHosted {
                name: name.to_string(),
                version: version.to_string(),
            })
    }

    /// Runs one decision cycle of the workflow type `name`/`version`.
    pub fn decide(
        &self,
        name: &str,
        version: &str,
        history: &WorkflowHistoryEvents,
    ) -> Result<Vec<Decision>, DeciderError> {
        let workflow = self.find(name, version)?;
        WorkflowExecution::new(&workflow, history)
            .with_config(self.config.clone())
            .execute()
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}
