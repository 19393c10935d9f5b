//! Workflow items - グラフの節点
//!
//! - `ActivityItem`: schedules an activity; input, task list, priority,
//!   timeouts and a `when` gate are computed from an [`ItemContext`]
//! - `TimerItem`: starts a timer
//! - `ActionItem`: yields the decisions of a [`WorkflowAction`] once its
//!   parents are processed (e.g. complete the workflow after A and B)
//!
//! Items are declared through consuming builder methods and handed to
//! [`WorkflowBuilder`](super::workflow::WorkflowBuilder), which takes their
//! parents and handlers out and seals them into the graph.

use super::handler::{EventVariant, Handler, HandlerResult, ItemHandler, item_handler};
use crate::domain::action::WorkflowAction;
use crate::domain::decision::{ActivityTimeouts, Decision, ScheduleActivity};
use crate::domain::events::{
    ActivityCancellationFailed, ActivityCancelled, ActivityCompleted, ActivityFailed,
    ActivitySchedulingFailed, ActivityStarted, ActivityTimedOut, ItemEvent, ItemEventKind,
    TimerCancellationFailed, TimerCancelled, TimerFired, TimerStartFailed,
};
use crate::domain::identity::Identity;
use crate::history::HistoryStore;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

pub type TextFn = Arc<dyn Fn(&ItemContext<'_>) -> Option<String> + Send + Sync>;
pub type PriorityFn = Arc<dyn Fn(&ItemContext<'_>) -> Option<i32> + Send + Sync>;
pub type WhenFn = Arc<dyn Fn(&ItemContext<'_>) -> bool + Send + Sync>;
pub type TimeoutsFn = Arc<dyn Fn(&ItemContext<'_>) -> ActivityTimeouts + Send + Sync>;
pub type ActionFn = Arc<dyn Fn(&ItemContext<'_>) -> WorkflowAction + Send + Sync>;

/// Read-only view handed to item configuration closures.
pub struct ItemContext<'a> {
    identity: &'a Identity,
    store: &'a HistoryStore<'a>,
}

impl<'a> ItemContext<'a> {
    pub fn new(identity: &'a Identity, store: &'a HistoryStore<'a>) -> Self {
        Self { identity, store }
    }

    pub fn identity(&self) -> &Identity {
        self.identity
    }

    /// Input of the workflow-started event.
    pub fn workflow_input(&self) -> Option<&str> {
        self.store.workflow_input()
    }

    pub fn last_event(&self, identity: &Identity) -> Option<Rc<ItemEvent>> {
        self.store.last_event(identity)
    }

    /// Result of `identity` when its last event is a completion.
    pub fn result_of(&self, identity: &Identity) -> Option<String> {
        match self.store.last_event(identity).as_deref() {
            Some(ItemEvent::ActivityCompleted(completed)) => completed.result.clone(),
            _ => None,
        }
    }
}

/// Parents and handlers declared on an item, taken by the workflow builder.
pub(crate) struct Declaration {
    pub parents: Vec<Identity>,
    pub handlers: Vec<(ItemEventKind, ItemHandler)>,
}

pub struct ActivityItem {
    identity: Identity,
    parents: Vec<Identity>,
    input: Option<TextFn>,
    task_list: Option<TextFn>,
    priority: Option<PriorityFn>,
    when: Option<WhenFn>,
    timeouts: Option<TimeoutsFn>,
    handlers: Vec<(ItemEventKind, ItemHandler)>,
}

impl ActivityItem {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            identity: Identity::new(name, version),
            parents: Vec::new(),
            input: None,
            task_list: None,
            priority: None,
            when: None,
            timeouts: None,
            handlers: Vec::new(),
        }
    }

    pub fn positional_name(mut self, positional_name: impl Into<String>) -> Self {
        self.identity = Identity::with_positional_name(
            self.identity.name(),
            self.identity.version(),
            positional_name,
        );
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn after(mut self, parent: Identity) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn after_activity(self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.after(Identity::new(name, version))
    }

    pub fn after_timer(self, name: impl Into<String>) -> Self {
        self.after(Identity::timer(name))
    }

    /// Defaults to the workflow input.
    pub fn with_input<F>(mut self, f: F) -> Self
    where
        F: Fn(&ItemContext<'_>) -> Option<String> + Send + Sync + 'static,
    {
        self.input = Some(Arc::new(f));
        self
    }

    pub fn with_task_list<F>(mut self, f: F) -> Self
    where
        F: Fn(&ItemContext<'_>) -> Option<String> + Send + Sync + 'static,
    {
        self.task_list = Some(Arc::new(f));
        self
    }

    pub fn with_priority<F>(mut self, f: F) -> Self
    where
        F: Fn(&ItemContext<'_>) -> Option<i32> + Send + Sync + 'static,
    {
        self.priority = Some(Arc::new(f));
        self
    }

    pub fn with_timeouts<F>(mut self, f: F) -> Self
    where
        F: Fn(&ItemContext<'_>) -> ActivityTimeouts + Send + Sync + 'static,
    {
        self.timeouts = Some(Arc::new(f));
        self
    }

    /// Gate evaluated at scheduling time; `false` schedules nothing.
    pub fn when<F>(mut self, f: F) -> Self
    where
        F: Fn(&ItemContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.when = Some(Arc::new(f));
        self
    }

    pub fn on_started<F>(self, f: F) -> Self
    where
        F: Fn(&ActivityStarted) -> HandlerResult + Send + Sync + 'static,
    {
        self.handle::<ActivityStarted, _>(f)
    }

    pub fn on_completion<F>(self, f: F) -> Self
    where
        F: Fn(&ActivityCompleted) -> HandlerResult + Send + Sync + 'static,
    {
        self.handle::<ActivityCompleted, _>(f)
    }

    pub fn on_failure<F>(self, f: F) -> Self
    where
        F: Fn(&ActivityFailed) -> HandlerResult + Send + Sync + 'static,
    {
        self.handle::<ActivityFailed, _>(f)
    }

    pub fn on_timeout<F>(self, f: F) -> Self
    where
        F: Fn(&ActivityTimedOut) -> HandlerResult + Send + Sync + 'static,
    {
        self.handle::<ActivityTimedOut, _>(f)
    }

    pub fn on_cancelled<F>(self, f: F) -> Self
    where
        F: Fn(&ActivityCancelled) -> HandlerResult + Send + Sync + 'static,
    {
        self.handle::<ActivityCancelled, _>(f)
    }

    pub fn on_failed_cancellation<F>(self, f: F) -> Self
    where
        F: Fn(&ActivityCancellationFailed) -> HandlerResult + Send + Sync + 'static,
    {
        self.handle::<ActivityCancellationFailed, _>(f)
    }

    pub fn on_failed_scheduling<F>(self, f: F) -> Self
    where
        F: Fn(&ActivitySchedulingFailed) -> HandlerResult + Send + Sync + 'static,
    {
        self.handle::<ActivitySchedulingFailed, _>(f)
    }

    /// Handler for a cancelled reschedule timer of this activity.
    pub fn on_timer_cancelled<F>(self, f: F) -> Self
    where
        F: Fn(&TimerCancelled) -> HandlerResult + Send + Sync + 'static,
    {
        self.handle::<TimerCancelled, _>(f)
    }

    fn handle<E, H>(mut self, handler: H) -> Self
    where
        E: EventVariant<Family = ItemEvent, Kind = ItemEventKind>,
        H: Handler<E> + 'static,
    {
        self.handlers.push(item_handler::<E, H>(handler));
        self
    }

    pub fn schedule_decision(&self, cx: &ItemContext<'_>) -> Option<Decision> {
        if let Some(when) = &self.when
            && !when(cx)
        {
            return None;
        }
        let input = match &self.input {
            Some(f) => f(cx),
            None => cx.workflow_input().map(str::to_string),
        };
        Some(Decision::ScheduleActivity(ScheduleActivity {
            identity: self.identity.clone(),
            input,
            task_list: self.task_list.as_ref().and_then(|f| f(cx)),
            priority: self.priority.as_ref().and_then(|f| f(cx)),
            timeouts: self.timeouts.as_ref().map(|f| f(cx)).unwrap_or_default(),
        }))
    }

    fn take_declaration(&mut self) -> Declaration {
        Declaration {
            parents: std::mem::take(&mut self.parents),
            handlers: std::mem::take(&mut self.handlers),
        }
    }
}

pub struct TimerItem {
    identity: Identity,
    parents: Vec<Identity>,
    fire_after: Duration,
    handlers: Vec<(ItemEventKind, ItemHandler)>,
}

impl TimerItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            identity: Identity::timer(name),
            parents: Vec::new(),
            fire_after: Duration::ZERO,
            handlers: Vec::new(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Whole seconds only. `StartTimer` carries seconds on the wire, so a
    /// sub-second part is rejected when the timer is declared.
    pub fn fire_after(mut self, fire_after: Duration) -> Self {
        self.fire_after = fire_after;
        self
    }

    pub fn delay(&self) -> Duration {
        self.fire_after
    }

    pub fn after(mut self, parent: Identity) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn after_activity(self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.after(Identity::new(name, version))
    }

    pub fn after_timer(self, name: impl Into<String>) -> Self {
        self.after(Identity::timer(name))
    }

    pub fn on_fired<F>(self, f: F) -> Self
    where
        F: Fn(&TimerFired) -> HandlerResult + Send + Sync + 'static,
    {
        self.handle::<TimerFired, _>(f)
    }

    pub fn on_cancelled<F>(self, f: F) -> Self
    where
        F: Fn(&TimerCancelled) -> HandlerResult + Send + Sync + 'static,
    {
        self.handle::<TimerCancelled, _>(f)
    }

    pub fn on_start_failed<F>(self, f: F) -> Self
    where
        F: Fn(&TimerStartFailed) -> HandlerResult + Send + Sync + 'static,
    {
        self.handle::<TimerStartFailed, _>(f)
    }

    pub fn on_cancellation_failed<F>(self, f: F) -> Self
    where
        F: Fn(&TimerCancellationFailed) -> HandlerResult + Send + Sync + 'static,
    {
        self.handle::<TimerCancellationFailed, _>(f)
    }

    fn handle<E, H>(mut self, handler: H) -> Self
    where
        E: EventVariant<Family = ItemEvent, Kind = ItemEventKind>,
        H: Handler<E> + 'static,
    {
        self.handlers.push(item_handler::<E, H>(handler));
        self
    }

    pub fn schedule_decision(&self) -> Decision {
        Decision::schedule_timer(self.identity.clone(), self.fire_after)
    }

    fn take_declaration(&mut self) -> Declaration {
        Declaration {
            parents: std::mem::take(&mut self.parents),
            handlers: std::mem::take(&mut self.handlers),
        }
    }
}

pub struct ActionItem {
    identity: Identity,
    parents: Vec<Identity>,
    action: ActionFn,
}

impl ActionItem {
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&ItemContext<'_>) -> WorkflowAction + Send + Sync + 'static,
    {
        Self {
            identity: Identity::named(name),
            parents: Vec::new(),
            action: Arc::new(action),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn after(mut self, parent: Identity) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn after_activity(self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.after(Identity::new(name, version))
    }

    pub fn after_timer(self, name: impl Into<String>) -> Self {
        self.after(Identity::timer(name))
    }

    pub fn action(&self, cx: &ItemContext<'_>) -> WorkflowAction {
        (self.action)(cx)
    }

    fn take_declaration(&mut self) -> Declaration {
        Declaration {
            parents: std::mem::take(&mut self.parents),
            handlers: Vec::new(),
        }
    }
}

pub enum WorkflowItem {
    Activity(ActivityItem),
    Timer(TimerItem),
    Action(ActionItem),
}

impl WorkflowItem {
    pub fn identity(&self) -> &Identity {
        match self {
            WorkflowItem::Activity(item) => item.identity(),
            WorkflowItem::Timer(item) => item.identity(),
            WorkflowItem::Action(item) => item.identity(),
        }
    }

    /// Activity: request cancel, timer: cancel timer, action: nothing to cancel.
    pub fn cancel_decision(&self) -> Option<Decision> {
        match self {
            WorkflowItem::Activity(item) => Some(Decision::RequestCancelActivity {
                identity: item.identity().clone(),
            }),
            WorkflowItem::Timer(item) => Some(Decision::CancelTimer {
                identity: item.identity().clone(),
            }),
            WorkflowItem::Action(_) => None,
        }
    }

    pub fn reschedule_decision(&self, after: Duration) -> Decision {
        Decision::reschedule_timer(self.identity().clone(), after)
    }

    pub(crate) fn take_declaration(&mut self) -> Declaration {
        match self {
            WorkflowItem::Activity(item) => item.take_declaration(),
            WorkflowItem::Timer(item) => item.take_declaration(),
            WorkflowItem::Action(item) => item.take_declaration(),
        }
    }
}

impl fmt::Debug for WorkflowItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            WorkflowItem::Activity(_) => "Activity",
            WorkflowItem::Timer(_) => "Timer",
            WorkflowItem::Action(_) => "Action",
        };
        f.debug_tuple(kind).field(self.identity()).finish()
    }
}

impl From<ActivityItem> for WorkflowItem {
    fn from(item: ActivityItem) -> Self {
        WorkflowItem::Activity(item)
    }
}

impl From<TimerItem> for WorkflowItem {
    fn from(item: TimerItem) -> Self {
        WorkflowItem::Timer(item)
    }
}

impl From<ActionItem> for WorkflowItem {
    fn from(item: ActionItem) -> Self {
        WorkflowItem::Action(item)
    }
}
