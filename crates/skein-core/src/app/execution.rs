//! WorkflowExecution - 1 回の decision cycle
//!
//! ```text
//! history ──▶ HistoryStore ──▶ new events (昇順) ──interpret──▶ WorkflowAction
//!                                                               │
//!                                      DecisionBatch ◀──resolve─┘
//! ```
//!
//! The cycle is a pure function of the workflow definition and the history:
//! nothing is kept between cycles, so one [`Workflow`] can be shared by any
//! number of concurrent executions.

use super::resolver::ActionResolver;
use crate::config::EngineConfig;
use crate::domain::decision::{Decision, DecisionBatch};
use crate::domain::history::WorkflowHistoryEvents;
use crate::error::DeciderError;
use crate::graph::workflow::Workflow;
use crate::history::HistoryStore;
use tracing::{debug, debug_span};

pub struct WorkflowExecution<'a> {
    workflow: &'a Workflow,
    history: &'a WorkflowHistoryEvents,
    config: EngineConfig,
}

impl<'a> WorkflowExecution<'a> {
    pub fn new(workflow: &'a Workflow, history: &'a WorkflowHistoryEvents) -> Self {
        Self {
            workflow,
            history,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Interprets every new event and returns the merged, de-duplicated
    /// decisions. Any error aborts the cycle without a partial batch.
    pub fn execute(&self) -> Result<Vec<Decision>, DeciderError> {
        let description = self.workflow.description();
        let span = debug_span!(
            "decision_cycle",
            workflow = %description.name,
            version = %description.version,
            started_event_id = %self.history.started_event_id(),
            previous_started_event_id = %self.history.previous_started_event_id(),
        );
        let _entered = span.enter();

        let store = HistoryStore::with_config(self.history, self.workflow, &self.config)?;
        let resolver = ActionResolver::new(self.workflow, &store, &self.config);
        let handlers = self.workflow.handlers();
        let mut batch = DecisionBatch::new();

        for raw in self.history.new_events() {
            let event_id = raw.event_id;
            let decisions = if let Some(event) = store.item_event(event_id) {
                let action = event
                    .interpret(handlers)
                    .map_err(|source| DeciderError::Handler { event_id, source })?;
                debug!(%event_id, item = %event.identity(), kind = ?event.kind(), ?action, "item event interpreted");
                resolver.resolve(&action, Some(&*event))?
            } else if let Some(event) = store.workflow_event(event_id) {
                let action = event
                    .interpret(handlers)
                    .map_err(|source| DeciderError::Handler { event_id, source })?;
                debug!(%event_id, kind = ?event.kind(), ?action, "workflow event interpreted");
                resolver.resolve(&action, None)?
            } else {
                continue;
            };
            batch.extend(decisions);
        }

        let decisions = batch.finish();
        debug!(decisions = decisions.len(), "decision cycle finished");
        Ok(decisions)
    }
}
