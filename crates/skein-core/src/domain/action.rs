//! WorkflowAction - イベント解釈の結果
//!
//! An action is what a handler (or a default) says should happen in reaction
//! to an event. Actions are resolved into [`Decision`]s by
//! [`crate::app::resolver`]; they never touch history themselves.

use super::decision::Decision;
use super::identity::Identity;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowAction {
    /// Schedule the children of the item whose parents are all processed.
    Continue(Identity),

    /// Do nothing. An item whose last event resolves to `Ignore` is not
    /// processed, so its descendants stay frozen.
    Ignore,

    /// Schedule the item itself.
    Schedule(Identity),

    /// Re-run the item after `after` through a reschedule timer, at most
    /// `retry_limit` times.
    Reschedule {
        item: Identity,
        after: Duration,
        retry_limit: Option<u32>,
    },

    /// Cancel an outstanding activity or timer.
    Cancel(Identity),

    CompleteWorkflow {
        result: Option<String>,
        proposal: bool,
    },

    FailWorkflow {
        reason: Option<String>,
        details: Option<String>,
    },

    CancelWorkflow {
        details: Option<String>,
    },

    Signal {
        name: String,
        input: Option<String>,
        workflow_id: String,
        run_id: Option<String>,
    },

    /// Schedule every item without parents.
    StartWorkflow,

    /// Decisions returned as they are.
    Custom(Vec<Decision>),
}

impl WorkflowAction {
    pub fn continue_with(item: &Identity) -> Self {
        WorkflowAction::Continue(item.clone())
    }

    pub fn schedule(item: &Identity) -> Self {
        WorkflowAction::Schedule(item.clone())
    }

    /// `after` goes over the wire in whole seconds; any fraction is dropped.
    pub fn reschedule(item: &Identity, after: Duration) -> Self {
        WorkflowAction::Reschedule {
            item: item.clone(),
            after,
            retry_limit: None,
        }
    }

    /// Caps a [`WorkflowAction::Reschedule`]; other actions are returned unchanged.
    pub fn up_to(self, limit: u32) -> Self {
        match self {
            WorkflowAction::Reschedule { item, after, .. } => WorkflowAction::Reschedule {
                item,
                after,
                retry_limit: Some(limit),
            },
            other => other,
        }
    }

    pub fn cancel(item: &Identity) -> Self {
        WorkflowAction::Cancel(item.clone())
    }

    pub fn complete_workflow(result: impl Into<String>) -> Self {
        WorkflowAction::CompleteWorkflow {
            result: Some(result.into()),
            proposal: false,
        }
    }

    pub fn fail_workflow(reason: impl Into<String>, details: Option<String>) -> Self {
        WorkflowAction::FailWorkflow {
            reason: Some(reason.into()),
            details,
        }
    }

    pub fn cancel_workflow(details: impl Into<String>) -> Self {
        WorkflowAction::CancelWorkflow {
            details: Some(details.into()),
        }
    }

    pub fn signal(
        name: impl Into<String>,
        input: Option<String>,
        workflow_id: impl Into<String>,
        run_id: Option<String>,
    ) -> Self {
        WorkflowAction::Signal {
            name: name.into(),
            input,
            workflow_id: workflow_id.into(),
            run_id,
        }
    }

    pub fn is_ignore(&self) -> bool {
        matches!(self, WorkflowAction::Ignore)
    }
}
