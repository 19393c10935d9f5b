//! Raw history - リモートサービスが返す履歴イベントの表現
//!
//! Events reference each other by id (`scheduled_event_id`,
//! `started_event_id`, ...). Resolution of those back references happens in
//! [`crate::history::HistoryStore`]; this module only models the log.

use super::ids::{EventId, ItemId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the append-only execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub event_id: EventId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_timestamp: Option<DateTime<Utc>>,
    pub attributes: EventAttributes,
}

impl HistoryEvent {
    pub fn new(event_id: impl Into<EventId>, attributes: EventAttributes) -> Self {
        Self {
            event_id: event_id.into(),
            event_timestamp: None,
            attributes,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.event_timestamp = Some(timestamp);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityType {
    pub name: String,
    pub version: String,
}

/// Control data attached to a scheduled activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityControl {
    #[serde(default)]
    pub positional_name: String,
}

/// Control data attached to a started timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerControl {
    #[serde(default)]
    pub is_reschedule: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventAttributes {
    WorkflowExecutionStarted {
        #[serde(default)]
        input: Option<String>,
        #[serde(default)]
        task_list: Option<String>,
        #[serde(default)]
        tag_list: Vec<String>,
        #[serde(default)]
        parent_workflow_id: Option<String>,
        #[serde(default)]
        parent_run_id: Option<String>,
    },
    WorkflowExecutionSignaled {
        signal_name: String,
        #[serde(default)]
        input: Option<String>,
        #[serde(default)]
        external_workflow_id: Option<String>,
    },
    WorkflowExecutionCancelRequested {
        #[serde(default)]
        cause: Option<String>,
    },
    CancelWorkflowExecutionFailed {
        cause: String,
    },
    FailWorkflowExecutionFailed {
        cause: String,
    },
    CompleteWorkflowExecutionFailed {
        cause: String,
    },

    ActivityTaskScheduled {
        activity_id: ItemId,
        activity_type: ActivityType,
        #[serde(default)]
        control: Option<ActivityControl>,
        #[serde(default)]
        input: Option<String>,
        #[serde(default)]
        task_list: Option<String>,
    },
    ActivityTaskStarted {
        scheduled_event_id: EventId,
        #[serde(default)]
        identity: Option<String>,
    },
    ActivityTaskCompleted {
        scheduled_event_id: EventId,
        started_event_id: EventId,
        #[serde(default)]
        result: Option<String>,
    },
    ActivityTaskFailed {
        scheduled_event_id: EventId,
        started_event_id: EventId,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        details: Option<String>,
    },
    ActivityTaskTimedOut {
        scheduled_event_id: EventId,
        /// None when the activity timed out before any worker picked it up.
        #[serde(default)]
        started_event_id: Option<EventId>,
        timeout_type: String,
        #[serde(default)]
        details: Option<String>,
    },
    ActivityTaskCanceled {
        scheduled_event_id: EventId,
        #[serde(default)]
        started_event_id: Option<EventId>,
        #[serde(default)]
        latest_cancel_requested_event_id: Option<EventId>,
        #[serde(default)]
        details: Option<String>,
    },
    ActivityTaskCancelRequested {
        activity_id: ItemId,
    },
    RequestCancelActivityTaskFailed {
        activity_id: ItemId,
        cause: String,
    },
    ScheduleActivityTaskFailed {
        activity_id: ItemId,
        activity_type: ActivityType,
        cause: String,
    },

    TimerStarted {
        timer_id: ItemId,
        /// Seconds.
        start_to_fire_timeout: u64,
        #[serde(default)]
        control: Option<TimerControl>,
    },
    TimerFired {
        timer_id: ItemId,
        started_event_id: EventId,
    },
    TimerCanceled {
        timer_id: ItemId,
        started_event_id: EventId,
    },
    StartTimerFailed {
        timer_id: ItemId,
        cause: String,
    },
    CancelTimerFailed {
        timer_id: ItemId,
        cause: String,
    },

    DecisionTaskScheduled,
    DecisionTaskStarted {
        scheduled_event_id: EventId,
    },
    DecisionTaskCompleted {
        scheduled_event_id: EventId,
        started_event_id: EventId,
    },
    MarkerRecorded {
        marker_name: String,
        #[serde(default)]
        details: Option<String>,
    },
}

/// Ordered view of an execution's history plus the cursors of the current
/// decision task.
///
/// Events are kept sorted by id whatever order they were supplied in.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowHistoryEvents {
    events: Vec<HistoryEvent>,
    started_event_id: EventId,
    previous_started_event_id: EventId,
}

impl WorkflowHistoryEvents {
    pub fn new(
        mut events: Vec<HistoryEvent>,
        started_event_id: impl Into<EventId>,
        previous_started_event_id: impl Into<EventId>,
    ) -> Self {
        events.sort_by_key(|event| event.event_id);
        Self {
            events,
            started_event_id: started_event_id.into(),
            previous_started_event_id: previous_started_event_id.into(),
        }
    }

    /// Treats every supplied event as new.
    pub fn from_events(events: Vec<HistoryEvent>) -> Self {
        let started = events
            .iter()
            .map(|event| event.event_id)
            .max()
            .unwrap_or(EventId::ZERO);
        Self::new(events, started, EventId::ZERO)
    }

    pub fn events(&self) -> &[HistoryEvent] {
        &self.events
    }

    pub fn started_event_id(&self) -> EventId {
        self.started_event_id
    }

    pub fn previous_started_event_id(&self) -> EventId {
        self.previous_started_event_id
    }

    /// Events with `previous_started_event_id < id <= started_event_id`, ascending.
    pub fn new_events(&self) -> impl Iterator<Item = &HistoryEvent> + '_ {
        let (previous, started) = (self.previous_started_event_id, self.started_event_id);
        self.events
            .iter()
            .filter(move |event| event.event_id > previous && event.event_id <= started)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for WorkflowHistoryEvents {
    fn default() -> Self {
        Self::new(Vec::new(), EventId::ZERO, EventId::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(id: u64) -> HistoryEvent {
        HistoryEvent::new(
            id,
            EventAttributes::MarkerRecorded {
                marker_name: format!("m{id}"),
                details: None,
            },
        )
    }

    #[test]
    fn events_are_sorted_by_id() {
        let history = WorkflowHistoryEvents::from_events(vec![marker(3), marker(1), marker(2)]);
        let ids: Vec<u64> = history.events().iter().map(|e| e.event_id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(history.started_event_id(), EventId::new(3));
    }

    #[test]
    fn new_events_are_bounded_by_cursors() {
        let history = WorkflowHistoryEvents::new(
            vec![marker(1), marker(2), marker(3), marker(4), marker(5)],
            4,
            2,
        );
        let ids: Vec<u64> = history.new_events().map(|e| e.event_id.get()).collect();
        assert_eq!(ids, vec![3, 4]);
    }

    #[test]
    fn attributes_use_an_internal_type_tag() {
        let json = r#"{
            "event_id": 7,
            "attributes": {
                "type": "ACTIVITY_TASK_COMPLETED",
                "scheduled_event_id": 5,
                "started_event_id": 6,
                "result": "done"
            }
        }"#;
        let event: HistoryEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_id, EventId::new(7));
        assert!(matches!(
            event.attributes,
            EventAttributes::ActivityTaskCompleted { ref result, .. } if result.as_deref() == Some("done")
        ));
    }
}
