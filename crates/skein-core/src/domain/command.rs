//! Wire form of decisions.
//!
//! Timeouts travel as whole seconds; an unbounded timeout (`Duration::MAX`)
//! is sent as `"NONE"`.

use super::history::{ActivityControl, ActivityType, TimerControl};
use super::ids::ItemId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const NO_TIMEOUT: &str = "NONE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "decision_type",
    content = "attributes",
    rename_all = "SCREAMING_SNAKE_CASE"
)]
pub enum Command {
    ScheduleActivityTask {
        activity_id: ItemId,
        activity_type: ActivityType,
        #[serde(skip_serializing_if = "Option::is_none")]
        control: Option<ActivityControl>,
        #[serde(skip_serializing_if = "Option::is_none")]
        input: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        task_list: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        task_priority: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        heartbeat_timeout: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        schedule_to_close_timeout: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        schedule_to_start_timeout: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        start_to_close_timeout: Option<String>,
    },
    RequestCancelActivityTask {
        activity_id: ItemId,
    },
    StartTimer {
        timer_id: ItemId,
        start_to_fire_timeout: String,
        control: TimerControl,
    },
    CancelTimer {
        timer_id: ItemId,
    },
    CompleteWorkflowExecution {
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
    FailWorkflowExecution {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    CancelWorkflowExecution {
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    SignalExternalWorkflowExecution {
        signal_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        input: Option<String>,
        workflow_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        run_id: Option<String>,
    },
}

pub fn format_timeout(timeout: Option<Duration>) -> Option<String> {
    timeout.map(|t| {
        if t == Duration::MAX {
            NO_TIMEOUT.to_string()
        } else {
            t.as_secs().to_string()
        }
    })
}
