use thiserror::Error;

use crate::domain::ids::{EventId, ItemId};
use crate::domain::identity::Identity;
use crate::graph::handler::HandlerError;
use std::time::Duration;

/// Configuration errors, raised while a workflow is being defined or hosted.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("parent {parent} of {child} is not declared")]
    ParentNotFound { child: Identity, parent: Identity },

    #[error("workflow item {0} is declared more than once")]
    DuplicateIdentity(Identity),

    #[error("duplicate handler for kind={kind} item={identity}")]
    DuplicateHandler { kind: String, identity: String },

    #[error("workflow name must not be empty")]
    EmptyName,

    #[error("workflow version must not be empty (workflow={0})")]
    EmptyVersion(String),

    #[error("workflow {name} version {version} is already hosted")]
    DuplicateWorkflow { name: String, version: String },

    #[error("workflow item name must not be empty")]
    EmptyItemName,

    #[error("activity version must not be empty (activity={0})")]
    EmptyActivityVersion(String),

    #[error("timer {identity} fires after {fire_after:?}, but timers have whole-second granularity")]
    SubSecondTimer { identity: Identity, fire_after: Duration },
}

/// The supplied history is not self-consistent. Fatal to the cycle.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("event {event_id} references event {reference}, which is not in the history")]
    UnresolvedReference { event_id: EventId, reference: EventId },

    #[error("event {event_id} references event {reference} of the wrong type (expected {expected})")]
    UnexpectedReference {
        event_id: EventId,
        reference: EventId,
        expected: &'static str,
    },

    #[error("event {event_id} belongs to {item_id}, which is not part of the workflow")]
    UnknownItem { event_id: EventId, item_id: ItemId },
}

/// Errors of one decision cycle. No partial batch is returned with them.
#[derive(Debug, Error)]
pub enum DeciderError {
    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("handler failed on event {event_id}: {source}")]
    Handler {
        event_id: EventId,
        #[source]
        source: HandlerError,
    },

    #[error("workflow item {0} is not part of the workflow")]
    ItemNotFound(Identity),

    #[error("workflow {name} version {version} is not hosted")]
    WorkflowNotHosted { name: String, version: String },

    #[error("action item {0} schedules itself again while it is being resolved")]
    ActionCycle(Identity),
}
