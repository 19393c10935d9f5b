//! Decision model: what the engine asks the remote service to do next.
//!
//! Decisions are value objects. Two decisions built from the same values are
//! equal and hash alike, which is what lets [`DecisionBatch`] collapse the
//! duplicates produced when several completing parents schedule the same child.

use super::command::{Command, format_timeout};
use super::history::{ActivityControl, ActivityType, TimerControl};
use super::identity::Identity;
use std::collections::HashSet;
use std::time::Duration;

/// Activity timeouts. `None` leaves the registered default in place and
/// `Duration::MAX` means "no timeout".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActivityTimeouts {
    pub heartbeat: Option<Duration>,
    pub schedule_to_close: Option<Duration>,
    pub schedule_to_start: Option<Duration>,
    pub start_to_close: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScheduleActivity {
    pub identity: Identity,
    pub input: Option<String>,
    pub task_list: Option<String>,
    pub priority: Option<i32>,
    pub timeouts: ActivityTimeouts,
}

impl ScheduleActivity {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            input: None,
            task_list: None,
            priority: None,
            timeouts: ActivityTimeouts::default(),
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Decision {
    ScheduleActivity(ScheduleActivity),

    RequestCancelActivity {
        identity: Identity,
    },

    ScheduleTimer {
        identity: Identity,
        fire_after: Duration,
        is_reschedule: bool,
    },

    CancelTimer {
        identity: Identity,
    },

    /// `proposal: true` is the engine's own "nothing left to do" suggestion;
    /// it is dropped whenever the batch holds a concrete decision.
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

    SignalWorkflow {
        name: String,
        input: Option<String>,
        workflow_id: String,
        run_id: Option<String>,
    },
}

impl Decision {
    pub fn schedule_timer(identity: Identity, fire_after: Duration) -> Self {
        Decision::ScheduleTimer {
            identity,
            fire_after,
            is_reschedule: false,
        }
    }

    pub fn reschedule_timer(identity: Identity, fire_after: Duration) -> Self {
        Decision::ScheduleTimer {
            identity,
            fire_after,
            is_reschedule: true,
        }
    }

    pub fn is_proposal(&self) -> bool {
        matches!(self, Decision::CompleteWorkflow { proposal: true, .. })
    }

    /// Wire form of this decision.
    pub fn to_command(&self) -> Command {
        match self {
            Decision::ScheduleActivity(schedule) => {
                let identity = &schedule.identity;
                let control = (!identity.positional_name().is_empty()).then(|| ActivityControl {
                    positional_name: identity.positional_name().to_string(),
                });
                Command::ScheduleActivityTask {
                    activity_id: identity.id(),
                    activity_type: ActivityType {
                        name: identity.name().to_string(),
                        version: identity.version().to_string(),
                    },
                    control,
                    input: schedule.input.clone(),
                    task_list: schedule.task_list.clone(),
                    task_priority: schedule.priority.map(|p| p.to_string()),
                    heartbeat_timeout: format_timeout(schedule.timeouts.heartbeat),
                    schedule_to_close_timeout: format_timeout(schedule.timeouts.schedule_to_close),
                    schedule_to_start_timeout: format_timeout(schedule.timeouts.schedule_to_start),
                    start_to_close_timeout: format_timeout(schedule.timeouts.start_to_close),
                }
            }
            Decision::RequestCancelActivity { identity } => Command::RequestCancelActivityTask {
                activity_id: identity.id(),
            },
            Decision::ScheduleTimer {
                identity,
                fire_after,
                is_reschedule,
            } => Command::StartTimer {
                timer_id: identity.id(),
                start_to_fire_timeout: fire_after.as_secs().to_string(),
                control: TimerControl {
                    is_reschedule: *is_reschedule,
                },
            },
            Decision::CancelTimer { identity } => Command::CancelTimer {
                timer_id: identity.id(),
            },
            Decision::CompleteWorkflow { result, .. } => Command::CompleteWorkflowExecution {
                result: result.clone(),
            },
            Decision::FailWorkflow { reason, details } => Command::FailWorkflowExecution {
                reason: reason.clone(),
                details: details.clone(),
            },
            Decision::CancelWorkflow { details } => Command::CancelWorkflowExecution {
                details: details.clone(),
            },
            Decision::SignalWorkflow {
                name,
                input,
                workflow_id,
                run_id,
            } => Command::SignalExternalWorkflowExecution {
                signal_name: name.clone(),
                input: input.clone(),
                workflow_id: workflow_id.clone(),
                run_id: run_id.clone(),
            },
        }
    }
}

/// Accumulates the decisions of one cycle.
///
/// - 値の重複は 1 件にまとめる
/// - 具体的な decision が 1 件でもあれば完了提案 (proposal) は捨てる
/// - `finish` はソート済みで返すので、解釈順に依存しない
#[derive(Debug, Default)]
pub struct DecisionBatch {
    decisions: HashSet<Decision>,
}

impl DecisionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, decisions: impl IntoIterator<Item = Decision>) {
        self.decisions.extend(decisions);
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    pub fn finish(self) -> Vec<Decision> {
        let has_concrete = self.decisions.iter().any(|d| !d.is_proposal());
        let mut decisions: Vec<Decision> = self
            .decisions
            .into_iter()
            .filter(|d| !(has_concrete && d.is_proposal()))
            .collect();
        decisions.sort();
        decisions
    }
}
