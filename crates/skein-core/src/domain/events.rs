//! Interpretable events - 解釈可能なイベントの閉じた union
//!
//! [`ItemEvent`] covers everything that happens to one workflow item
//! (activity or timer); [`WorkflowEvent`] covers execution-level events.
//! Each variant carries the raw event id it was built from, plus whatever the
//! store resolved through back references (identity, timer duration, ...).
//!
//! # 解釈
//! `interpret` looks up a handler for `(kind, identity)` and falls back to
//! `default_action` when there is none.

use super::action::WorkflowAction;
use super::ids::EventId;
use super::identity::Identity;
use crate::graph::handler::{EventVariant, HandlerRegistry, HandlerResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ACTIVITY_CANCELLATION_FAILED: &str = "ACTIVITY_CANCELLATION_FAILED";
pub const ACTIVITY_SCHEDULING_FAILED: &str = "ACTIVITY_SCHEDULING_FAILED";
pub const TIMER_CANCELLED: &str = "TIMER_CANCELLED";
pub const TIMER_START_FAILED: &str = "TIMER_START_FAILED";
pub const TIMER_CANCELLATION_FAILED: &str = "TIMER_CANCELLATION_FAILED";
pub const FAILED_TO_CANCEL_WORKFLOW: &str = "FAILED_TO_CANCEL_WORKFLOW";
pub const FAILED_TO_FAIL_WORKFLOW: &str = "FAILED_TO_FAIL_WORKFLOW";
pub const FAILED_TO_COMPLETE_WORKFLOW: &str = "FAILED_TO_COMPLETE_WORKFLOW";

// ────────────────────────────────────────────────────────────────────────────
// Item events
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemEventKind {
    ActivityScheduled,
    ActivityStarted,
    ActivityCompleted,
    ActivityFailed,
    ActivityTimedOut,
    ActivityCancelled,
    ActivityCancelRequested,
    ActivityCancellationFailed,
    ActivitySchedulingFailed,
    TimerStarted,
    TimerFired,
    TimerCancelled,
    TimerStartFailed,
    TimerCancellationFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityScheduled {
    pub event_id: EventId,
    pub identity: Identity,
    pub input: Option<String>,
    pub task_list: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityStarted {
    pub event_id: EventId,
    pub identity: Identity,
    pub worker_identity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityCompleted {
    pub event_id: EventId,
    pub identity: Identity,
    pub result: Option<String>,
    pub worker_identity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityFailed {
    pub event_id: EventId,
    pub identity: Identity,
    pub reason: Option<String>,
    pub details: Option<String>,
    pub worker_identity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityTimedOut {
    pub event_id: EventId,
    pub identity: Identity,
    pub timeout_type: String,
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityCancelled {
    pub event_id: EventId,
    pub identity: Identity,
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityCancelRequested {
    pub event_id: EventId,
    pub identity: Identity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityCancellationFailed {
    pub event_id: EventId,
    pub identity: Identity,
    pub cause: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivitySchedulingFailed {
    pub event_id: EventId,
    pub identity: Identity,
    pub cause: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerStarted {
    pub event_id: EventId,
    pub identity: Identity,
    pub fire_after: Duration,
    pub is_reschedule: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerFired {
    pub event_id: EventId,
    pub identity: Identity,
    pub fire_after: Duration,
    pub is_reschedule: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerCancelled {
    pub event_id: EventId,
    pub identity: Identity,
    pub fire_after: Duration,
    pub is_reschedule: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerStartFailed {
    pub event_id: EventId,
    pub identity: Identity,
    pub cause: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerCancellationFailed {
    pub event_id: EventId,
    pub identity: Identity,
    pub cause: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemEvent {
    ActivityScheduled(ActivityScheduled),
    ActivityStarted(ActivityStarted),
    ActivityCompleted(ActivityCompleted),
    ActivityFailed(ActivityFailed),
    ActivityTimedOut(ActivityTimedOut),
    ActivityCancelled(ActivityCancelled),
    ActivityCancelRequested(ActivityCancelRequested),
    ActivityCancellationFailed(ActivityCancellationFailed),
    ActivitySchedulingFailed(ActivitySchedulingFailed),
    TimerStarted(TimerStarted),
    TimerFired(TimerFired),
    TimerCancelled(TimerCancelled),
    TimerStartFailed(TimerStartFailed),
    TimerCancellationFailed(TimerCancellationFailed),
}

macro_rules! item_event_variants {
    ($($variant:ident),+ $(,)?) => {
        impl ItemEvent {
            pub fn kind(&self) -> ItemEventKind {
                match self {
                    $(ItemEvent::$variant(_) => ItemEventKind::$variant,)+
                }
            }

            pub fn event_id(&self) -> EventId {
                match self {
                    $(ItemEvent::$variant(e) => e.event_id,)+
                }
            }

            pub fn identity(&self) -> &Identity {
                match self {
                    $(ItemEvent::$variant(e) => &e.identity,)+
                }
            }
        }

        $(
            impl EventVariant for $variant {
                type Family = ItemEvent;
                type Kind = ItemEventKind;
                const KIND: ItemEventKind = ItemEventKind::$variant;

                fn narrow(event: &ItemEvent) -> Option<&Self> {
                    match event {
                        ItemEvent::$variant(e) => Some(e),
                        _ => None,
                    }
                }
            }

            impl From<$variant> for ItemEvent {
                fn from(event: $variant) -> Self {
                    ItemEvent::$variant(event)
                }
            }
        )+
    };
}

item_event_variants!(
    ActivityScheduled,
    ActivityStarted,
    ActivityCompleted,
    ActivityFailed,
    ActivityTimedOut,
    ActivityCancelled,
    ActivityCancelRequested,
    ActivityCancellationFailed,
    ActivitySchedulingFailed,
    TimerStarted,
    TimerFired,
    TimerCancelled,
    TimerStartFailed,
    TimerCancellationFailed,
);

impl ItemEvent {
    /// The item still has outstanding work: scheduled, started, waiting for
    /// a cancellation, or a timer running.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ItemEvent::ActivityScheduled(_)
                | ItemEvent::ActivityStarted(_)
                | ItemEvent::ActivityCancelRequested(_)
                | ItemEvent::TimerStarted(_)
        )
    }

    /// Event belongs to a timer started by a `Reschedule` action.
    pub fn is_reschedule_timer(&self) -> bool {
        match self {
            ItemEvent::TimerStarted(e) => e.is_reschedule,
            ItemEvent::TimerFired(e) => e.is_reschedule,
            ItemEvent::TimerCancelled(e) => e.is_reschedule,
            _ => false,
        }
    }

    pub fn default_action(&self) -> WorkflowAction {
        match self {
            ItemEvent::ActivityCompleted(e) => WorkflowAction::continue_with(&e.identity),
            ItemEvent::ActivityFailed(e) => WorkflowAction::FailWorkflow {
                reason: e.reason.clone(),
                details: e.details.clone(),
            },
            ItemEvent::ActivityTimedOut(e) => WorkflowAction::FailWorkflow {
                reason: Some(e.timeout_type.clone()),
                details: e.details.clone(),
            },
            ItemEvent::ActivityCancelled(e) => WorkflowAction::CancelWorkflow {
                details: e.details.clone(),
            },
            ItemEvent::ActivityCancellationFailed(e) => {
                WorkflowAction::fail_workflow(ACTIVITY_CANCELLATION_FAILED, Some(e.cause.clone()))
            }
            ItemEvent::ActivitySchedulingFailed(e) => {
                WorkflowAction::fail_workflow(ACTIVITY_SCHEDULING_FAILED, Some(e.cause.clone()))
            }
            ItemEvent::TimerFired(e) if e.is_reschedule => WorkflowAction::schedule(&e.identity),
            ItemEvent::TimerFired(e) => WorkflowAction::continue_with(&e.identity),
            ItemEvent::TimerCancelled(_) => WorkflowAction::cancel_workflow(TIMER_CANCELLED),
            ItemEvent::TimerStartFailed(e) => {
                WorkflowAction::fail_workflow(TIMER_START_FAILED, Some(e.cause.clone()))
            }
            ItemEvent::TimerCancellationFailed(e) => {
                WorkflowAction::fail_workflow(TIMER_CANCELLATION_FAILED, Some(e.cause.clone()))
            }
            ItemEvent::ActivityScheduled(_)
            | ItemEvent::ActivityStarted(_)
            | ItemEvent::ActivityCancelRequested(_)
            | ItemEvent::TimerStarted(_) => WorkflowAction::Ignore,
        }
    }

    /// A fired reschedule timer always schedules its item again; user
    /// handlers only see timers they started themselves.
    pub fn interpret(&self, handlers: &HandlerRegistry) -> HandlerResult {
        if let ItemEvent::TimerFired(fired) = self
            && fired.is_reschedule
        {
            return Ok(WorkflowAction::schedule(&fired.identity));
        }
        match handlers.item_handler(self.kind(), self.identity()) {
            Some(handler) => handler.handle_dyn(self),
            None => Ok(self.default_action()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Workflow events
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowEventKind {
    WorkflowStarted,
    WorkflowSignaled,
    WorkflowCancelRequested,
    WorkflowCancellationFailed,
    WorkflowFailureFailed,
    WorkflowCompletionFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStarted {
    pub event_id: EventId,
    pub input: Option<String>,
    pub task_list: Option<String>,
    pub tag_list: Vec<String>,
    pub parent_workflow_id: Option<String>,
    pub parent_run_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSignaled {
    pub event_id: EventId,
    pub signal_name: String,
    pub input: Option<String>,
    pub external_workflow_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowCancelRequested {
    pub event_id: EventId,
    pub cause: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowCancellationFailed {
    pub event_id: EventId,
    pub cause: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowFailureFailed {
    pub event_id: EventId,
    pub cause: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowCompletionFailed {
    pub event_id: EventId,
    pub cause: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    WorkflowStarted(WorkflowStarted),
    WorkflowSignaled(WorkflowSignaled),
    WorkflowCancelRequested(WorkflowCancelRequested),
    WorkflowCancellationFailed(WorkflowCancellationFailed),
    WorkflowFailureFailed(WorkflowFailureFailed),
    WorkflowCompletionFailed(WorkflowCompletionFailed),
}

macro_rules! workflow_event_variants {
    ($($variant:ident),+ $(,)?) => {
        impl WorkflowEvent {
            pub fn kind(&self) -> WorkflowEventKind {
                match self {
                    $(WorkflowEvent::$variant(_) => WorkflowEventKind::$variant,)+
                }
            }

            pub fn event_id(&self) -> EventId {
                match self {
                    $(WorkflowEvent::$variant(e) => e.event_id,)+
                }
            }
        }

        $(
            impl EventVariant for $variant {
                type Family = WorkflowEvent;
                type Kind = WorkflowEventKind;
                const KIND: WorkflowEventKind = WorkflowEventKind::$variant;

                fn narrow(event: &WorkflowEvent) -> Option<&Self> {
                    match event {
                        WorkflowEvent::$variant(e) => Some(e),
                        _ => None,
                    }
                }
            }

            impl From<$variant> for WorkflowEvent {
                fn from(event: $variant) -> Self {
                    WorkflowEvent::$variant(event)
                }
            }
        )+
    };
}

workflow_event_variants!(
    WorkflowStarted,
    WorkflowSignaled,
    WorkflowCancelRequested,
    WorkflowCancellationFailed,
    WorkflowFailureFailed,
    WorkflowCompletionFailed,
);

impl WorkflowEvent {
    pub fn default_action(&self) -> WorkflowAction {
        match self {
            WorkflowEvent::WorkflowStarted(_) => WorkflowAction::StartWorkflow,
            WorkflowEvent::WorkflowSignaled(_) => WorkflowAction::Ignore,
            WorkflowEvent::WorkflowCancelRequested(e) => WorkflowAction::CancelWorkflow {
                details: e.cause.clone(),
            },
            WorkflowEvent::WorkflowCancellationFailed(e) => {
                WorkflowAction::fail_workflow(FAILED_TO_CANCEL_WORKFLOW, Some(e.cause.clone()))
            }
            WorkflowEvent::WorkflowFailureFailed(e) => {
                WorkflowAction::fail_workflow(FAILED_TO_FAIL_WORKFLOW, Some(e.cause.clone()))
            }
            WorkflowEvent::WorkflowCompletionFailed(e) => {
                WorkflowAction::fail_workflow(FAILED_TO_COMPLETE_WORKFLOW, Some(e.cause.clone()))
            }
        }
    }

    pub fn interpret(&self, handlers: &HandlerRegistry) -> HandlerResult {
        match handlers.workflow_handler(self.kind()) {
            Some(handler) => handler.handle_dyn(self),
            None => Ok(self.default_action()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::handler::{HandlerRegistry, TypedHandler};
    use rstest::rstest;
    use std::sync::Arc;

    fn download() -> Identity {
        Identity::new("Download", "1.0")
    }

    fn failed() -> ItemEvent {
        ActivityFailed {
            event_id: EventId::new(7),
            identity: download(),
            reason: Some("disk".into()),
            details: Some("full".into()),
            worker_identity: None,
        }
        .into()
    }

    fn timer(is_reschedule: bool) -> TimerFired {
        TimerFired {
            event_id: EventId::new(4),
            identity: download(),
            fire_after: Duration::from_secs(5),
            is_reschedule,
        }
    }

    #[rstest]
    #[case::completed(
        ActivityCompleted { event_id: EventId::new(1), identity: download(), result: None, worker_identity: None }.into(),
        WorkflowAction::Continue(download())
    )]
    #[case::failed(failed(), WorkflowAction::fail_workflow("disk", Some("full".into())))]
    #[case::timed_out(
        ActivityTimedOut { event_id: EventId::new(1), identity: download(), timeout_type: "START_TO_CLOSE".into(), details: None }.into(),
        WorkflowAction::FailWorkflow { reason: Some("START_TO_CLOSE".into()), details: None }
    )]
    #[case::cancelled(
        ActivityCancelled { event_id: EventId::new(1), identity: download(), details: Some("bye".into()) }.into(),
        WorkflowAction::cancel_workflow("bye")
    )]
    #[case::cancellation_failed(
        ActivityCancellationFailed { event_id: EventId::new(1), identity: download(), cause: "UNKNOWN".into() }.into(),
        WorkflowAction::fail_workflow(ACTIVITY_CANCELLATION_FAILED, Some("UNKNOWN".into()))
    )]
    #[case::scheduling_failed(
        ActivitySchedulingFailed { event_id: EventId::new(1), identity: download(), cause: "TYPE_DEPRECATED".into() }.into(),
        WorkflowAction::fail_workflow(ACTIVITY_SCHEDULING_FAILED, Some("TYPE_DEPRECATED".into()))
    )]
    #[case::started(
        ActivityStarted { event_id: EventId::new(1), identity: download(), worker_identity: None }.into(),
        WorkflowAction::Ignore
    )]
    #[case::timer_fired(timer(false).into(), WorkflowAction::Continue(download()))]
    #[case::reschedule_timer_fired(timer(true).into(), WorkflowAction::Schedule(download()))]
    #[case::timer_cancelled(
        TimerCancelled { event_id: EventId::new(1), identity: download(), fire_after: Duration::ZERO, is_reschedule: false }.into(),
        WorkflowAction::cancel_workflow(TIMER_CANCELLED)
    )]
    #[case::timer_start_failed(
        TimerStartFailed { event_id: EventId::new(1), identity: download(), cause: "ID_IN_USE".into() }.into(),
        WorkflowAction::fail_workflow(TIMER_START_FAILED, Some("ID_IN_USE".into()))
    )]
    fn item_events_have_default_actions(#[case] event: ItemEvent, #[case] expected: WorkflowAction) {
        assert_eq!(event.default_action(), expected);
        assert_eq!(event.interpret(&HandlerRegistry::default()).unwrap(), expected);
    }

    #[rstest]
    #[case::cancellation_failed(
        WorkflowCancellationFailed { event_id: EventId::new(1), cause: "UNHANDLED_DECISION".into() }.into(),
        WorkflowAction::fail_workflow(FAILED_TO_CANCEL_WORKFLOW, Some("UNHANDLED_DECISION".into()))
    )]
    #[case::failure_failed(
        WorkflowFailureFailed { event_id: EventId::new(1), cause: "UNHANDLED_DECISION".into() }.into(),
        WorkflowAction::fail_workflow(FAILED_TO_FAIL_WORKFLOW, Some("UNHANDLED_DECISION".into()))
    )]
    #[case::completion_failed(
        WorkflowCompletionFailed { event_id: EventId::new(1), cause: "UNHANDLED_DECISION".into() }.into(),
        WorkflowAction::fail_workflow(FAILED_TO_COMPLETE_WORKFLOW, Some("UNHANDLED_DECISION".into()))
    )]
    #[case::cancel_requested(
        WorkflowCancelRequested { event_id: EventId::new(1), cause: Some("operator".into()) }.into(),
        WorkflowAction::cancel_workflow("operator")
    )]
    #[case::signaled(
        WorkflowSignaled { event_id: EventId::new(1), signal_name: "poke".into(), input: None, external_workflow_id: None }.into(),
        WorkflowAction::Ignore
    )]
    fn workflow_events_have_default_actions(#[case] event: WorkflowEvent, #[case] expected: WorkflowAction) {
        assert_eq!(event.default_action(), expected);
    }

    #[test]
    fn only_outstanding_events_are_active() {
        let started: ItemEvent = ActivityStarted {
            event_id: EventId::new(2),
            identity: download(),
            worker_identity: None,
        }
        .into();
        assert!(started.is_active());
        assert!(!failed().is_active());
        assert!(!ItemEvent::from(timer(false)).is_active());
    }

    #[test]
    fn registered_handler_overrides_the_default() {
        let mut registry = HandlerRegistry::default();
        registry
            .register_item(
                download(),
                ItemEventKind::ActivityFailed,
                Arc::new(TypedHandler::<ActivityFailed, _>::new(|e: &ActivityFailed| {
                    Ok(WorkflowAction::continue_with(&e.identity))
                })),
            )
            .unwrap();

        assert_eq!(
            failed().interpret(&registry).unwrap(),
            WorkflowAction::Continue(download())
        );
    }

    #[test]
    fn handler_of_another_item_is_not_used() {
        let mut registry = HandlerRegistry::default();
        registry
            .register_item(
                Identity::new("Transcode", "1.0"),
                ItemEventKind::ActivityFailed,
                Arc::new(TypedHandler::<ActivityFailed, _>::new(|_: &ActivityFailed| {
                    Ok(WorkflowAction::Ignore)
                })),
            )
            .unwrap();

        assert_eq!(
            failed().interpret(&registry).unwrap(),
            WorkflowAction::fail_workflow("disk", Some("full".into()))
        );
    }

    #[test]
    fn reschedule_timer_bypasses_fired_handler() {
        let mut registry = HandlerRegistry::default();
        registry
            .register_item(
                download(),
                ItemEventKind::TimerFired,
                Arc::new(TypedHandler::<TimerFired, _>::new(|_: &TimerFired| Ok(WorkflowAction::Ignore))),
            )
            .unwrap();

        let reschedule: ItemEvent = timer(true).into();
        assert_eq!(
            reschedule.interpret(&registry).unwrap(),
            WorkflowAction::Schedule(download())
        );
        let plain: ItemEvent = timer(false).into();
        assert_eq!(plain.interpret(&registry).unwrap(), WorkflowAction::Ignore);
    }
}
