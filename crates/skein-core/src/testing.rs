//! History fixtures for exercising workflows without a remote service.
//!
//! Each method returns the causally linked events of one sub-graph (for
//! example scheduled → started → completed) with ids continuing from the
//! previous call, so graphs can be concatenated in any order.
//!
//! ```ignore
//! let mut h = HistoryBuilder::new();
//! let mut events = h.workflow_started(Some("input"));
//! let before = h.last_event_id();
//! events.extend(h.activity_completed(&download, "ok"));
//! let history = WorkflowHistoryEvents::new(events, h.last_event_id(), before);
//! ```

use crate::domain::history::{
    ActivityControl, ActivityType, EventAttributes, HistoryEvent, TimerControl,
    WorkflowHistoryEvents,
};
use crate::domain::identity::Identity;
use crate::domain::ids::EventId;
use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

const EPOCH_SECS: i64 = 1_700_000_000;

#[derive(Debug)]
pub struct HistoryBuilder {
    next_id: u64,
}

impl Default for HistoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryBuilder {
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Id of the most recently produced event, `0` before the first one.
    pub fn last_event_id(&self) -> EventId {
        EventId::new(self.next_id - 1)
    }

    /// Every event is new.
    pub fn history(events: Vec<HistoryEvent>) -> WorkflowHistoryEvents {
        WorkflowHistoryEvents::from_events(events)
    }

    fn next(&mut self, attributes: EventAttributes) -> HistoryEvent {
        let id = self.next_id;
        self.next_id += 1;
        let event = HistoryEvent::new(id, attributes);
        match timestamp(id) {
            Some(ts) => event.with_timestamp(ts),
            None => event,
        }
    }

    pub fn workflow_started(&mut self, input: Option<&str>) -> Vec<HistoryEvent> {
        vec![self.next(EventAttributes::WorkflowExecutionStarted {
            input: input.map(str::to_string),
            task_list: None,
            tag_list: Vec::new(),
            parent_workflow_id: None,
            parent_run_id: None,
        })]
    }

    pub fn workflow_signaled(&mut self, signal_name: &str, input: Option<&str>) -> Vec<HistoryEvent> {
        vec![self.next(EventAttributes::WorkflowExecutionSignaled {
            signal_name: signal_name.to_string(),
            input: input.map(str::to_string),
            external_workflow_id: None,
        })]
    }

    pub fn workflow_cancel_requested(&mut self, cause: Option<&str>) -> Vec<HistoryEvent> {
        vec![self.next(EventAttributes::WorkflowExecutionCancelRequested {
            cause: cause.map(str::to_string),
        })]
    }

    pub fn workflow_cancellation_failed(&mut self, cause: &str) -> Vec<HistoryEvent> {
        vec![self.next(EventAttributes::CancelWorkflowExecutionFailed {
            cause: cause.to_string(),
        })]
    }

    pub fn workflow_failure_failed(&mut self, cause: &str) -> Vec<HistoryEvent> {
        vec![self.next(EventAttributes::FailWorkflowExecutionFailed {
            cause: cause.to_string(),
        })]
    }

    pub fn workflow_completion_failed(&mut self, cause: &str) -> Vec<HistoryEvent> {
        vec![self.next(EventAttributes::CompleteWorkflowExecutionFailed {
            cause: cause.to_string(),
        })]
    }

    pub fn decision_task_completed(&mut self) -> Vec<HistoryEvent> {
        let scheduled = self.next(EventAttributes::DecisionTaskScheduled);
        let started = self.next(EventAttributes::DecisionTaskStarted {
            scheduled_event_id: scheduled.event_id,
        });
        let completed = self.next(EventAttributes::DecisionTaskCompleted {
            scheduled_event_id: scheduled.event_id,
            started_event_id: started.event_id,
        });
        vec![scheduled, started, completed]
    }

    pub fn activity_scheduled(&mut self, identity: &Identity) -> Vec<HistoryEvent> {
        vec![self.scheduled(identity)]
    }

    pub fn activity_started(&mut self, identity: &Identity) -> Vec<HistoryEvent> {
        let scheduled = self.scheduled(identity);
        let started = self.started(scheduled.event_id);
        vec![scheduled, started]
    }

    pub fn activity_completed(&mut self, identity: &Identity, result: &str) -> Vec<HistoryEvent> {
        let scheduled = self.scheduled(identity);
        let started = self.started(scheduled.event_id);
        let completed = self.next(EventAttributes::ActivityTaskCompleted {
            scheduled_event_id: scheduled.event_id,
            started_event_id: started.event_id,
            result: Some(result.to_string()),
        });
        vec![scheduled, started, completed]
    }

    pub fn activity_failed(&mut self, identity: &Identity, reason: &str, details: &str) -> Vec<HistoryEvent> {
        let scheduled = self.scheduled(identity);
        let started = self.started(scheduled.event_id);
        let failed = self.next(EventAttributes::ActivityTaskFailed {
            scheduled_event_id: scheduled.event_id,
            started_event_id: started.event_id,
            reason: Some(reason.to_string()),
            details: Some(details.to_string()),
        });
        vec![scheduled, started, failed]
    }

    pub fn activity_timed_out(
        &mut self,
        identity: &Identity,
        timeout_type: &str,
        details: &str,
    ) -> Vec<HistoryEvent> {
        let scheduled = self.scheduled(identity);
        let started = self.started(scheduled.event_id);
        let timed_out = self.next(EventAttributes::ActivityTaskTimedOut {
            scheduled_event_id: scheduled.event_id,
            started_event_id: Some(started.event_id),
            timeout_type: timeout_type.to_string(),
            details: Some(details.to_string()),
        });
        vec![scheduled, started, timed_out]
    }

    /// Timed out while still queued (SCHEDULE_TO_START): no started event.
    pub fn activity_timed_out_unstarted(&mut self, identity: &Identity, timeout_type: &str) -> Vec<HistoryEvent> {
        let scheduled = self.scheduled(identity);
        let timed_out = self.next(EventAttributes::ActivityTaskTimedOut {
            scheduled_event_id: scheduled.event_id,
            started_event_id: None,
            timeout_type: timeout_type.to_string(),
            details: None,
        });
        vec![scheduled, timed_out]
    }

    pub fn activity_cancelled(&mut self, identity: &Identity, details: &str) -> Vec<HistoryEvent> {
        let scheduled = self.scheduled(identity);
        let started = self.started(scheduled.event_id);
        let requested = self.next(EventAttributes::ActivityTaskCancelRequested {
            activity_id: identity.id(),
        });
        let cancelled = self.next(EventAttributes::ActivityTaskCanceled {
            scheduled_event_id: scheduled.event_id,
            started_event_id: Some(started.event_id),
            latest_cancel_requested_event_id: Some(requested.event_id),
            details: Some(details.to_string()),
        });
        vec![scheduled, started, requested, cancelled]
    }

    pub fn activity_cancel_requested(&mut self, identity: &Identity) -> Vec<HistoryEvent> {
        vec![self.next(EventAttributes::ActivityTaskCancelRequested {
            activity_id: identity.id(),
        })]
    }

    pub fn activity_cancellation_failed(&mut self, identity: &Identity, cause: &str) -> Vec<HistoryEvent> {
        vec![self.next(EventAttributes::RequestCancelActivityTaskFailed {
            activity_id: identity.id(),
            cause: cause.to_string(),
        })]
    }

    pub fn activity_scheduling_failed(&mut self, identity: &Identity, cause: &str) -> Vec<HistoryEvent> {
        vec![self.next(EventAttributes::ScheduleActivityTaskFailed {
            activity_id: identity.id(),
            activity_type: activity_type(identity),
            cause: cause.to_string(),
        })]
    }

    pub fn timer_started(&mut self, identity: &Identity, fire_after: Duration, is_reschedule: bool) -> Vec<HistoryEvent> {
        vec![self.timer(identity, fire_after, is_reschedule)]
    }

    pub fn timer_fired(&mut self, identity: &Identity, fire_after: Duration, is_reschedule: bool) -> Vec<HistoryEvent> {
        let started = self.timer(identity, fire_after, is_reschedule);
        let fired = self.next(EventAttributes::TimerFired {
            timer_id: identity.id(),
            started_event_id: started.event_id,
        });
        vec![started, fired]
    }

    pub fn timer_cancelled(&mut self, identity: &Identity, fire_after: Duration, is_reschedule: bool) -> Vec<HistoryEvent> {
        let started = self.timer(identity, fire_after, is_reschedule);
        let cancelled = self.next(EventAttributes::TimerCanceled {
            timer_id: identity.id(),
            started_event_id: started.event_id,
        });
        vec![started, cancelled]
    }

    pub fn timer_start_failed(&mut self, identity: &Identity, cause: &str) -> Vec<HistoryEvent> {
        vec![self.next(EventAttributes::StartTimerFailed {
            timer_id: identity.id(),
            cause: cause.to_string(),
        })]
    }

    pub fn timer_cancellation_failed(&mut self, identity: &Identity, cause: &str) -> Vec<HistoryEvent> {
        vec![self.next(EventAttributes::CancelTimerFailed {
            timer_id: identity.id(),
            cause: cause.to_string(),
        })]
    }

    fn scheduled(&mut self, identity: &Identity) -> HistoryEvent {
        let control = (!identity.positional_name().is_empty()).then(|| ActivityControl {
            positional_name: identity.positional_name().to_string(),
        });
        self.next(EventAttributes::ActivityTaskScheduled {
            activity_id: identity.id(),
            activity_type: activity_type(identity),
            control,
            input: None,
            task_list: None,
        })
    }

    fn started(&mut self, scheduled_event_id: EventId) -> HistoryEvent {
        self.next(EventAttributes::ActivityTaskStarted {
            scheduled_event_id,
            identity: Some("worker-1".to_string()),
        })
    }

    fn timer(&mut self, identity: &Identity, fire_after: Duration, is_reschedule: bool) -> HistoryEvent {
        self.next(EventAttributes::TimerStarted {
            timer_id: identity.id(),
            start_to_fire_timeout: fire_after.as_secs(),
            control: Some(TimerControl { is_reschedule }),
        })
    }
}

fn activity_type(identity: &Identity) -> ActivityType {
    ActivityType {
        name: identity.name().to_string(),
        version: identity.version().to_string(),
    }
}

fn timestamp(event_id: u64) -> Option<DateTime<Utc>> {
    let offset = i64::try_from(event_id).ok()?;
    Utc.timestamp_opt(EPOCH_SECS + offset, 0).single()
}
