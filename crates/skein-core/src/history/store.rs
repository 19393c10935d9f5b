//! HistoryStore - 1 サイクル分の履歴インデックス
//!
//! Built once per decision cycle. Construction resolves every item-related
//! raw event through its back references (scheduled, started,
//! latest-cancel-requested, timer-started) and attributes it to a workflow
//! item. Anything inconsistent fails the whole cycle, so the query methods
//! afterwards are infallible.
//!
//! # 不変条件
//! - `last_event` は同じ store で同じ `Rc` を返す（メモ化）
//! - イベントの順序は event id のみで決まる（入力順は無関係）

use crate::config::EngineConfig;
use crate::domain::events::{
    ActivityCancelRequested, ActivityCancellationFailed, ActivityCancelled, ActivityCompleted,
    ActivityFailed, ActivityScheduled, ActivitySchedulingFailed, ActivityStarted, ActivityTimedOut,
    ItemEvent, TimerCancellationFailed, TimerCancelled, TimerFired, TimerStartFailed, TimerStarted,
    WorkflowCancelRequested, WorkflowCancellationFailed, WorkflowCompletionFailed, WorkflowEvent,
    WorkflowFailureFailed, WorkflowSignaled, WorkflowStarted,
};
use crate::domain::history::{EventAttributes, HistoryEvent, WorkflowHistoryEvents};
use crate::domain::identity::Identity;
use crate::domain::ids::{EventId, ItemId};
use crate::error::HistoryError;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Maps wire ids found in history back to declared identities.
pub trait ItemCatalog {
    fn identity_of(&self, id: &ItemId) -> Option<&Identity>;
}

impl ItemCatalog for HashMap<ItemId, Identity> {
    fn identity_of(&self, id: &ItemId) -> Option<&Identity> {
        self.get(id)
    }
}

struct StoredEvent {
    event: Rc<ItemEvent>,
    /// Older events of the same sub-graph, hidden by this one.
    references: Vec<EventId>,
}

pub struct HistoryStore<'h> {
    history: &'h WorkflowHistoryEvents,
    item_events: HashMap<EventId, StoredEvent>,
    by_item: HashMap<Identity, Vec<EventId>>,
    workflow_events: HashMap<EventId, Rc<WorkflowEvent>>,
    workflow_input: Option<&'h str>,
    last_events: RefCell<HashMap<Identity, Option<Rc<ItemEvent>>>>,
}

impl<'h> HistoryStore<'h> {
    pub fn new(history: &'h WorkflowHistoryEvents, catalog: &dyn ItemCatalog) -> Result<Self, HistoryError> {
        Self::with_config(history, catalog, &EngineConfig::default())
    }

    pub fn with_config(
        history: &'h WorkflowHistoryEvents,
        catalog: &dyn ItemCatalog,
        config: &EngineConfig,
    ) -> Result<Self, HistoryError> {
        let index = EventIndex::new(history);
        let attribution = Attribution {
            catalog,
            ignore_unknown: config.ignore_unknown_items,
        };

        let mut item_events = HashMap::new();
        let mut by_item: HashMap<Identity, Vec<EventId>> = HashMap::new();
        let mut workflow_events = HashMap::new();

        for event in history.events() {
            if let Some(workflow_event) = parse_workflow_event(event) {
                workflow_events.insert(event.event_id, Rc::new(workflow_event));
                continue;
            }
            if let Some(stored) = parse_item_event(event, &index, &attribution)? {
                trace!(
                    event_id = %event.event_id,
                    item = %stored.event.identity(),
                    kind = ?stored.event.kind(),
                    "resolved item event"
                );
                by_item
                    .entry(stored.event.identity().clone())
                    .or_default()
                    .push(event.event_id);
                item_events.insert(event.event_id, stored);
            }
        }

        let workflow_input = history
            .events()
            .iter()
            .find_map(|event| match &event.attributes {
                EventAttributes::WorkflowExecutionStarted { input, .. } => Some(input.as_deref()),
                _ => None,
            })
            .flatten();

        debug!(
            events = history.events().len(),
            items = by_item.len(),
            "history store built"
        );

        Ok(Self {
            history,
            item_events,
            by_item,
            workflow_events,
            workflow_input,
            last_events: RefCell::new(HashMap::new()),
        })
    }

    pub fn history(&self) -> &'h WorkflowHistoryEvents {
        self.history
    }

    pub fn workflow_input(&self) -> Option<&'h str> {
        self.workflow_input
    }

    /// Item event built from the raw event `event_id`, if it is one.
    pub fn item_event(&self, event_id: EventId) -> Option<Rc<ItemEvent>> {
        self.item_events
            .get(&event_id)
            .map(|stored| Rc::clone(&stored.event))
    }

    pub fn workflow_event(&self, event_id: EventId) -> Option<Rc<WorkflowEvent>> {
        self.workflow_events.get(&event_id).cloned()
    }

    pub fn has_events(&self, identity: &Identity) -> bool {
        self.by_item.contains_key(identity)
    }

    /// Events of `identity`, newest first, one per causal sub-graph: a
    /// completion hides the scheduled and started events it references.
    pub fn all_events(&self, identity: &Identity) -> Vec<Rc<ItemEvent>> {
        let Some(ids) = self.by_item.get(identity) else {
            return Vec::new();
        };
        let mut hidden = HashSet::new();
        let mut events = Vec::new();
        for id in ids.iter().rev() {
            if hidden.contains(id) {
                continue;
            }
            if let Some(stored) = self.item_events.get(id) {
                hidden.extend(stored.references.iter().copied());
                events.push(Rc::clone(&stored.event));
            }
        }
        events
    }

    /// Newest event of `identity` across its activity and timer sub-graphs.
    pub fn last_event(&self, identity: &Identity) -> Option<Rc<ItemEvent>> {
        if let Some(cached) = self.last_events.borrow().get(identity) {
            return cached.clone();
        }
        let last = self
            .by_item
            .get(identity)
            .and_then(|ids| ids.last())
            .and_then(|id| self.item_events.get(id))
            .map(|stored| Rc::clone(&stored.event));
        self.last_events
            .borrow_mut()
            .insert(identity.clone(), last.clone());
        last
    }

    pub fn is_active(&self, identity: &Identity) -> bool {
        self.last_event(identity)
            .is_some_and(|event| event.is_active())
    }

    /// Reschedule timers already issued for `identity`.
    pub fn reschedule_count(&self, identity: &Identity) -> usize {
        self.all_events(identity)
            .iter()
            .filter(|event| event.is_reschedule_timer())
            .count()
    }
}

struct EventIndex<'h> {
    events: HashMap<EventId, &'h HistoryEvent>,
}

impl<'h> EventIndex<'h> {
    fn new(history: &'h WorkflowHistoryEvents) -> Self {
        Self {
            events: history
                .events()
                .iter()
                .map(|event| (event.event_id, event))
                .collect(),
        }
    }

    fn get(&self, event_id: EventId, reference: EventId) -> Result<&'h EventAttributes, HistoryError> {
        self.events
            .get(&reference)
            .copied()
            .map(|event| &event.attributes)
            .ok_or(HistoryError::UnresolvedReference { event_id, reference })
    }

    fn activity_scheduled(&self, event_id: EventId, reference: EventId) -> Result<&'h ItemId, HistoryError> {
        match self.get(event_id, reference)? {
            EventAttributes::ActivityTaskScheduled { activity_id, .. } => Ok(activity_id),
            _ => Err(HistoryError::UnexpectedReference {
                event_id,
                reference,
                expected: "ACTIVITY_TASK_SCHEDULED",
            }),
        }
    }

    /// Worker identity recorded on the started event.
    fn activity_started(&self, event_id: EventId, reference: EventId) -> Result<Option<&'h str>, HistoryError> {
        match self.get(event_id, reference)? {
            EventAttributes::ActivityTaskStarted { identity, .. } => Ok(identity.as_deref()),
            _ => Err(HistoryError::UnexpectedReference {
                event_id,
                reference,
                expected: "ACTIVITY_TASK_STARTED",
            }),
        }
    }

    fn cancel_requested(&self, event_id: EventId, reference: EventId) -> Result<(), HistoryError> {
        match self.get(event_id, reference)? {
            EventAttributes::ActivityTaskCancelRequested { .. } => Ok(()),
            _ => Err(HistoryError::UnexpectedReference {
                event_id,
                reference,
                expected: "ACTIVITY_TASK_CANCEL_REQUESTED",
            }),
        }
    }

    /// Fire-after and reschedule flag of the started timer.
    fn timer_started(&self, event_id: EventId, reference: EventId) -> Result<(Duration, bool), HistoryError> {
        match self.get(event_id, reference)? {
            EventAttributes::TimerStarted {
                start_to_fire_timeout,
                control,
                ..
            } => Ok((
                Duration::from_secs(*start_to_fire_timeout),
                control.as_ref().is_some_and(|c| c.is_reschedule),
            )),
            _ => Err(HistoryError::UnexpectedReference {
                event_id,
                reference,
                expected: "TIMER_STARTED",
            }),
        }
    }
}

struct Attribution<'c> {
    catalog: &'c dyn ItemCatalog,
    ignore_unknown: bool,
}

impl Attribution<'_> {
    fn identity(&self, event_id: EventId, item_id: &ItemId) -> Result<Option<Identity>, HistoryError> {
        match self.catalog.identity_of(item_id) {
            Some(identity) => Ok(Some(identity.clone())),
            None if self.ignore_unknown => {
                warn!(%event_id, %item_id, "skipping event of an undeclared workflow item");
                Ok(None)
            }
            None => Err(HistoryError::UnknownItem {
                event_id,
                item_id: item_id.clone(),
            }),
        }
    }
}

fn stored(event: impl Into<ItemEvent>, references: Vec<EventId>) -> Result<Option<StoredEvent>, HistoryError> {
    Ok(Some(StoredEvent {
        event: Rc::new(event.into()),
        references,
    }))
}

fn parse_item_event(
    event: &HistoryEvent,
    index: &EventIndex<'_>,
    attribution: &Attribution<'_>,
) -> Result<Option<StoredEvent>, HistoryError> {
    let event_id = event.event_id;
    match &event.attributes {
        EventAttributes::ActivityTaskScheduled {
            activity_id,
            input,
            task_list,
            ..
        } => {
            let Some(identity) = attribution.identity(event_id, activity_id)? else {
                return Ok(None);
            };
            stored(
                ActivityScheduled {
                    event_id,
                    identity,
                    input: input.clone(),
                    task_list: task_list.clone(),
                },
                Vec::new(),
            )
        }
        EventAttributes::ActivityTaskStarted {
            scheduled_event_id,
            identity: worker,
        } => {
            let activity_id = index.activity_scheduled(event_id, *scheduled_event_id)?;
            let Some(identity) = attribution.identity(event_id, activity_id)? else {
                return Ok(None);
            };
            stored(
                ActivityStarted {
                    event_id,
                    identity,
                    worker_identity: worker.clone(),
                },
                vec![*scheduled_event_id],
            )
        }
        EventAttributes::ActivityTaskCompleted {
            scheduled_event_id,
            started_event_id,
            result,
        } => {
            let activity_id = index.activity_scheduled(event_id, *scheduled_event_id)?;
            let worker = index.activity_started(event_id, *started_event_id)?;
            let Some(identity) = attribution.identity(event_id, activity_id)? else {
                return Ok(None);
            };
            stored(
                ActivityCompleted {
                    event_id,
                    identity,
                    result: result.clone(),
                    worker_identity: worker.map(str::to_string),
                },
                vec![*scheduled_event_id, *started_event_id],
            )
        }
        EventAttributes::ActivityTaskFailed {
            scheduled_event_id,
            started_event_id,
            reason,
            details,
        } => {
            let activity_id = index.activity_scheduled(event_id, *scheduled_event_id)?;
            let worker = index.activity_started(event_id, *started_event_id)?;
            let Some(identity) = attribution.identity(event_id, activity_id)? else {
                return Ok(None);
            };
            stored(
                ActivityFailed {
                    event_id,
                    identity,
                    reason: reason.clone(),
                    details: details.clone(),
                    worker_identity: worker.map(str::to_string),
                },
                vec![*scheduled_event_id, *started_event_id],
            )
        }
        EventAttributes::ActivityTaskTimedOut {
            scheduled_event_id,
            started_event_id,
            timeout_type,
            details,
        } => {
            let activity_id = index.activity_scheduled(event_id, *scheduled_event_id)?;
            let mut references = vec![*scheduled_event_id];
            if let Some(started) = started_event_id {
                index.activity_started(event_id, *started)?;
                references.push(*started);
            }
            let Some(identity) = attribution.identity(event_id, activity_id)? else {
                return Ok(None);
            };
            stored(
                ActivityTimedOut {
                    event_id,
                    identity,
                    timeout_type: timeout_type.clone(),
                    details: details.clone(),
                },
                references,
            )
        }
        EventAttributes::ActivityTaskCanceled {
            scheduled_event_id,
            started_event_id,
            latest_cancel_requested_event_id,
            details,
        } => {
            let activity_id = index.activity_scheduled(event_id, *scheduled_event_id)?;
            let mut references = vec![*scheduled_event_id];
            if let Some(started) = started_event_id {
                index.activity_started(event_id, *started)?;
                references.push(*started);
            }
            if let Some(requested) = latest_cancel_requested_event_id {
                index.cancel_requested(event_id, *requested)?;
                references.push(*requested);
            }
            let Some(identity) = attribution.identity(event_id, activity_id)? else {
                return Ok(None);
            };
            stored(
                ActivityCancelled {
                    event_id,
                    identity,
                    details: details.clone(),
                },
                references,
            )
        }
        EventAttributes::ActivityTaskCancelRequested { activity_id } => {
            let Some(identity) = attribution.identity(event_id, activity_id)? else {
                return Ok(None);
            };
            stored(ActivityCancelRequested { event_id, identity }, Vec::new())
        }
        EventAttributes::RequestCancelActivityTaskFailed { activity_id, cause } => {
            let Some(identity) = attribution.identity(event_id, activity_id)? else {
                return Ok(None);
            };
            stored(
                ActivityCancellationFailed {
                    event_id,
                    identity,
                    cause: cause.clone(),
                },
                Vec::new(),
            )
        }
        EventAttributes::ScheduleActivityTaskFailed {
            activity_id, cause, ..
        } => {
            let Some(identity) = attribution.identity(event_id, activity_id)? else {
                return Ok(None);
            };
            stored(
                ActivitySchedulingFailed {
                    event_id,
                    identity,
                    cause: cause.clone(),
                },
                Vec::new(),
            )
        }
        EventAttributes::TimerStarted {
            timer_id,
            start_to_fire_timeout,
            control,
        } => {
            let Some(identity) = attribution.identity(event_id, timer_id)? else {
                return Ok(None);
            };
            stored(
                TimerStarted {
                    event_id,
                    identity,
                    fire_after: Duration::from_secs(*start_to_fire_timeout),
                    is_reschedule: control.as_ref().is_some_and(|c| c.is_reschedule),
                },
                Vec::new(),
            )
        }
        EventAttributes::TimerFired {
            timer_id,
            started_event_id,
        } => {
            let (fire_after, is_reschedule) = index.timer_started(event_id, *started_event_id)?;
            let Some(identity) = attribution.identity(event_id, timer_id)? else {
                return Ok(None);
            };
            stored(
                TimerFired {
                    event_id,
                    identity,
                    fire_after,
                    is_reschedule,
                },
                vec![*started_event_id],
            )
        }
        EventAttributes::TimerCanceled {
            timer_id,
            started_event_id,
        } => {
            let (fire_after, is_reschedule) = index.timer_started(event_id, *started_event_id)?;
            let Some(identity) = attribution.identity(event_id, timer_id)? else {
                return Ok(None);
            };
            stored(
                TimerCancelled {
                    event_id,
                    identity,
                    fire_after,
                    is_reschedule,
                },
                vec![*started_event_id],
            )
        }
        EventAttributes::StartTimerFailed { timer_id, cause } => {
            let Some(identity) = attribution.identity(event_id, timer_id)? else {
                return Ok(None);
            };
            stored(
                TimerStartFailed {
                    event_id,
                    identity,
                    cause: cause.clone(),
                },
                Vec::new(),
            )
        }
        EventAttributes::CancelTimerFailed { timer_id, cause } => {
            let Some(identity) = attribution.identity(event_id, timer_id)? else {
                return Ok(None);
            };
            stored(
                TimerCancellationFailed {
                    event_id,
                    identity,
                    cause: cause.clone(),
                },
                Vec::new(),
            )
        }
        _ => Ok(None),
    }
}

fn parse_workflow_event(event: &HistoryEvent) -> Option<WorkflowEvent> {
    let event_id = event.event_id;
    let parsed: WorkflowEvent = match &event.attributes {
        EventAttributes::WorkflowExecutionStarted {
            input,
            task_list,
            tag_list,
            parent_workflow_id,
            parent_run_id,
        } => WorkflowStarted {
            event_id,
            input: input.clone(),
            task_list: task_list.clone(),
            tag_list: tag_list.clone(),
            parent_workflow_id: parent_workflow_id.clone(),
            parent_run_id: parent_run_id.clone(),
        }
        .into(),
        EventAttributes::WorkflowExecutionSignaled {
            signal_name,
            input,
            external_workflow_id,
        } => WorkflowSignaled {
            event_id,
            signal_name: signal_name.clone(),
            input: input.clone(),
            external_workflow_id: external_workflow_id.clone(),
        }
        .into(),
        EventAttributes::WorkflowExecutionCancelRequested { cause } => WorkflowCancelRequested {
            event_id,
            cause: cause.clone(),
        }
        .into(),
        EventAttributes::CancelWorkflowExecutionFailed { cause } => WorkflowCancellationFailed {
            event_id,
            cause: cause.clone(),
        }
        .into(),
        EventAttributes::FailWorkflowExecutionFailed { cause } => WorkflowFailureFailed {
            event_id,
            cause: cause.clone(),
        }
        .into(),
        EventAttributes::CompleteWorkflowExecutionFailed { cause } => WorkflowCompletionFailed {
            event_id,
            cause: cause.clone(),
        }
        .into(),
        _ => return None,
    };
    Some(parsed)
}
