//! ActionResolver - WorkflowAction → Decision
//!
//! # 責務
//! - `Continue`: 子 item のうち、親がすべて processed のものを schedule する (AND-join)
//! - `Reschedule`: 上限に達するまで reschedule timer を出し、上限後は
//!   trigger event の default action に落とす
//! - 葉が終わり、他に active な item がなければ完了提案 (proposal) を出す
//!
//! "Processed" is the only gate on scheduling: an item with no events counts
//! as processed, an active item never does, and otherwise the item's last
//! event is interpreted again and must not resolve to `Ignore`, `Schedule` or
//! a `Reschedule` that still has retries left.

use crate::config::EngineConfig;
use crate::domain::action::WorkflowAction;
use crate::domain::decision::Decision;
use crate::domain::events::ItemEvent;
use crate::domain::identity::Identity;
use crate::error::DeciderError;
use crate::graph::item::{ItemContext, WorkflowItem};
use crate::graph::workflow::Workflow;
use crate::history::HistoryStore;
use std::cell::RefCell;
use std::time::Duration;
use tracing::{debug, trace};

pub struct ActionResolver<'a> {
    workflow: &'a Workflow,
    store: &'a HistoryStore<'a>,
    config: &'a EngineConfig,
    /// Action items whose action is being resolved right now.
    resolving: RefCell<Vec<Identity>>,
}

impl<'a> ActionResolver<'a> {
    pub fn new(workflow: &'a Workflow, store: &'a HistoryStore<'a>, config: &'a EngineConfig) -> Self {
        Self {
            workflow,
            store,
            config,
            resolving: RefCell::new(Vec::new()),
        }
    }

    /// `trigger` is the item event the action was interpreted from, if any.
    pub fn resolve(
        &self,
        action: &WorkflowAction,
        trigger: Option<&ItemEvent>,
    ) -> Result<Vec<Decision>, DeciderError> {
        match action {
            WorkflowAction::Continue(item) => self.continue_from(item),
            WorkflowAction::Ignore => Ok(Vec::new()),
            WorkflowAction::Schedule(item) => self.schedule(item),
            WorkflowAction::Reschedule {
                item,
                after,
                retry_limit,
            } => self.reschedule(item, *after, *retry_limit, trigger),
            WorkflowAction::Cancel(item) => Ok(self.item(item)?.cancel_decision().into_iter().collect()),
            WorkflowAction::CompleteWorkflow { result, proposal } => {
                Ok(vec![Decision::CompleteWorkflow {
                    result: result.clone(),
                    proposal: *proposal,
                }])
            }
            WorkflowAction::FailWorkflow { reason, details } => Ok(vec![Decision::FailWorkflow {
                reason: reason.clone(),
                details: details.clone(),
            }]),
            WorkflowAction::CancelWorkflow { details } => Ok(vec![Decision::CancelWorkflow {
                details: details.clone(),
            }]),
            WorkflowAction::Signal {
                name,
                input,
                workflow_id,
                run_id,
            } => Ok(vec![Decision::SignalWorkflow {
                name: name.clone(),
                input: input.clone(),
                workflow_id: workflow_id.clone(),
                run_id: run_id.clone(),
            }]),
            WorkflowAction::StartWorkflow => self.start_workflow(),
            WorkflowAction::Custom(decisions) => Ok(decisions.clone()),
        }
    }

    /// Schedules the children of `identity` that are ready to run.
    pub fn continue_from(&self, identity: &Identity) -> Result<Vec<Decision>, DeciderError> {
        self.item(identity)?;
        let children = self.workflow.children_of(identity);

        if children.is_empty() {
            let busy = self
                .workflow
                .items()
                .map(WorkflowItem::identity)
                .filter(|other| *other != identity)
                .find(|other| self.store.is_active(other));
            if let Some(busy) = busy {
                trace!(leaf = %identity, active = %busy, "leaf finished while other items are active");
                return Ok(Vec::new());
            }
            debug!(leaf = %identity, "last leaf finished, proposing completion");
            return Ok(vec![self.completion_proposal()]);
        }

        let mut decisions = Vec::new();
        for child in children {
            if self.all_parents_processed(child)? {
                decisions.extend(self.schedule(child)?);
            } else {
                trace!(parent = %identity, child = %child, "child waits for its other parents");
            }
        }
        Ok(decisions)
    }

    pub fn all_parents_processed(&self, identity: &Identity) -> Result<bool, DeciderError> {
        for parent in self.workflow.parents_of(identity) {
            if !self.is_processed(parent)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn is_processed(&self, identity: &Identity) -> Result<bool, DeciderError> {
        let Some(last) = self.store.last_event(identity) else {
            return Ok(true);
        };
        if last.is_active() {
            return Ok(false);
        }
        let processed = match self.interpret(&last)? {
            WorkflowAction::Ignore | WorkflowAction::Schedule(_) => false,
            WorkflowAction::Reschedule {
                item, retry_limit, ..
            } => self.retries_exhausted(&item, retry_limit) && !last.default_action().is_ignore(),
            _ => true,
        };
        Ok(processed)
    }

    /// Activity → ScheduleActivity (unless its `when` says no), timer →
    /// ScheduleTimer, action item → whatever its action resolves to.
    pub fn schedule(&self, identity: &Identity) -> Result<Vec<Decision>, DeciderError> {
        let item = self.item(identity)?;
        let cx = ItemContext::new(identity, self.store);
        match item {
            WorkflowItem::Activity(activity) => {
                let decision = activity.schedule_decision(&cx);
                if decision.is_none() {
                    debug!(item = %identity, "activity skipped by its condition");
                }
                Ok(decision.into_iter().collect())
            }
            WorkflowItem::Timer(timer) => Ok(vec![timer.schedule_decision()]),
            WorkflowItem::Action(action_item) => {
                if self.resolving.borrow().contains(identity) {
                    return Err(DeciderError::ActionCycle(identity.clone()));
                }
                let action = action_item.action(&cx);
                trace!(item = %identity, ?action, "action item evaluated");
                self.resolving.borrow_mut().push(identity.clone());
                let resolved = self.resolve(&action, None);
                self.resolving.borrow_mut().pop();
                resolved
            }
        }
    }

    fn reschedule(
        &self,
        identity: &Identity,
        after: Duration,
        retry_limit: Option<u32>,
        trigger: Option<&ItemEvent>,
    ) -> Result<Vec<Decision>, DeciderError> {
        let item = self.item(identity)?;
        if !self.retries_exhausted(identity, retry_limit) {
            return Ok(vec![item.reschedule_decision(after)]);
        }

        let fallback = match trigger {
            Some(event) => event.default_action(),
            None => self
                .store
                .last_event(identity)
                .map(|event| event.default_action())
                .unwrap_or(WorkflowAction::Ignore),
        };
        debug!(
            item = %identity,
            attempts = self.store.reschedule_count(identity),
            ?fallback,
            "reschedule limit reached"
        );
        self.resolve(&fallback, trigger)
    }

    fn start_workflow(&self) -> Result<Vec<Decision>, DeciderError> {
        if self.workflow.graph().is_empty() {
            return Ok(vec![self.completion_proposal()]);
        }
        let mut decisions = Vec::new();
        for identity in self.workflow.graph().startup_items() {
            decisions.extend(self.schedule(identity)?);
        }
        Ok(decisions)
    }

    fn retries_exhausted(&self, identity: &Identity, retry_limit: Option<u32>) -> bool {
        retry_limit.is_some_and(|limit| self.store.reschedule_count(identity) >= limit as usize)
    }

    fn interpret(&self, event: &ItemEvent) -> Result<WorkflowAction, DeciderError> {
        event
            .interpret(self.workflow.handlers())
            .map_err(|source| DeciderError::Handler {
                event_id: event.event_id(),
                source,
            })
    }

    fn item(&self, identity: &Identity) -> Result<&'a WorkflowItem, DeciderError> {
        self.workflow
            .item(identity)
            .ok_or_else(|| DeciderError::ItemNotFound(identity.clone()))
    }

    fn completion_proposal(&self) -> Decision {
        Decision::CompleteWorkflow {
            result: Some(self.config.completion_proposal_result.clone()),
            proposal: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decision::ScheduleActivity;
    use crate::domain::description::WorkflowDescription;
    use crate::domain::history::WorkflowHistoryEvents;
    use crate::graph::item::{ActionItem, ActivityItem, TimerItem};
    use crate::testing::HistoryBuilder;

    fn download() -> Identity {
        Identity::new("Download", "1.0")
    }

    fn transcode() -> Identity {
        Identity::new("Transcode", "1.0")
    }

    fn workflow() -> Workflow {
        Workflow::builder(WorkflowDescription::new("Media", "1.0"))
            .activity(
                ActivityItem::new("Download", "1.0")
                    .on_failure(|e| Ok(WorkflowAction::reschedule(&e.identity, Duration::from_secs(10)).up_to(2))),
            )
            .unwrap()
            .activity(
                ActivityItem::new("Transcode", "1.0")
                    .after_activity("Download", "1.0")
                    .on_completion(|_| Ok(WorkflowAction::Ignore)),
            )
            .unwrap()
            .timer(TimerItem::new("cooldown").fire_after(Duration::from_secs(30)))
            .unwrap()
            .action(ActionItem::new("publish", |_| WorkflowAction::complete_workflow("published")).after_activity("Transcode", "1.0"))
            .unwrap()
            .build()
            .unwrap()
    }

    fn with_resolver<T>(history: &WorkflowHistoryEvents, f: impl FnOnce(&ActionResolver<'_>) -> T) -> T {
        let workflow = workflow();
        let config = EngineConfig::default();
        let store = HistoryStore::new(history, &workflow).unwrap();
        let resolver = ActionResolver::new(&workflow, &store, &config);
        f(&resolver)
    }

    #[test]
    fn item_without_events_is_processed() {
        let history = WorkflowHistoryEvents::default();
        with_resolver(&history, |r| {
            assert!(r.is_processed(&download()).unwrap());
        });
    }

    #[test]
    fn active_item_is_not_processed() {
        let mut h = HistoryBuilder::new();
        let history = HistoryBuilder::history(h.activity_started(&download()));
        with_resolver(&history, |r| {
            assert!(!r.is_processed(&download()).unwrap());
        });
    }

    #[test]
    fn ignored_completion_is_not_processed() {
        let mut h = HistoryBuilder::new();
        let history = HistoryBuilder::history(h.activity_completed(&transcode(), "ok"));
        with_resolver(&history, |r| {
            assert!(!r.is_processed(&transcode()).unwrap());
        });
    }

    #[test]
    fn failure_with_retries_left_is_not_processed() {
        let mut h = HistoryBuilder::new();
        let history = HistoryBuilder::history(h.activity_failed(&download(), "r", "d"));
        with_resolver(&history, |r| {
            assert!(!r.is_processed(&download()).unwrap());
        });
    }

    #[test]
    fn failure_with_retries_exhausted_is_processed() {
        let mut h = HistoryBuilder::new();
        let mut events = h.timer_fired(&download(), Duration::from_secs(10), true);
        events.extend(h.timer_fired(&download(), Duration::from_secs(10), true));
        events.extend(h.activity_failed(&download(), "r", "d"));
        let history = HistoryBuilder::history(events);
        with_resolver(&history, |r| {
            assert!(r.is_processed(&download()).unwrap());
        });
    }

    #[test]
    fn reschedule_emits_a_reschedule_timer() {
        let history = WorkflowHistoryEvents::default();
        with_resolver(&history, |r| {
            let action = WorkflowAction::reschedule(&download(), Duration::from_secs(10)).up_to(2);
            assert_eq!(
                r.resolve(&action, None).unwrap(),
                vec![Decision::reschedule_timer(download(), Duration::from_secs(10))]
            );
        });
    }

    #[test]
    fn cancel_targets_the_item_kind() {
        let history = WorkflowHistoryEvents::default();
        with_resolver(&history, |r| {
            assert_eq!(
                r.resolve(&WorkflowAction::cancel(&download()), None).unwrap(),
                vec![Decision::RequestCancelActivity { identity: download() }]
            );
            assert_eq!(
                r.resolve(&WorkflowAction::cancel(&Identity::timer("cooldown")), None).unwrap(),
                vec![Decision::CancelTimer {
                    identity: Identity::timer("cooldown")
                }]
            );
        });
    }

    #[test]
    fn unknown_item_is_an_error() {
        let history = WorkflowHistoryEvents::default();
        with_resolver(&history, |r| {
            let result = r.resolve(&WorkflowAction::schedule(&Identity::new("Nope", "1.0")), None);
            assert!(matches!(result, Err(DeciderError::ItemNotFound(_))));
        });
    }

    #[test]
    fn start_workflow_schedules_items_without_parents() {
        let history = WorkflowHistoryEvents::default();
        with_resolver(&history, |r| {
            let decisions = r.resolve(&WorkflowAction::StartWorkflow, None).unwrap();
            assert_eq!(
                decisions,
                vec![
                    Decision::ScheduleActivity(ScheduleActivity::new(download())),
                    Decision::schedule_timer(Identity::timer("cooldown"), Duration::from_secs(30)),
                ]
            );
        });
    }

    #[test]
    fn scheduling_an_action_item_resolves_its_action() {
        let history = WorkflowHistoryEvents::default();
        with_resolver(&history, |r| {
            assert_eq!(
                r.schedule(&Identity::named("publish")).unwrap(),
                vec![Decision::CompleteWorkflow {
                    result: Some("published".into()),
                    proposal: false,
                }]
            );
        });
    }

    #[test]
    fn action_item_scheduling_itself_is_an_error() {
        let workflow = Workflow::builder(WorkflowDescription::new("Loop", "1.0"))
            .action(ActionItem::new("again", |cx| WorkflowAction::schedule(cx.identity())))
            .unwrap()
            .build()
            .unwrap();
        let history = WorkflowHistoryEvents::default();
        let config = EngineConfig::default();
        let store = HistoryStore::new(&history, &workflow).unwrap();
        let resolver = ActionResolver::new(&workflow, &store, &config);

        let result = resolver.schedule(&Identity::named("again"));
        assert!(matches!(result, Err(DeciderError::ActionCycle(id)) if id == Identity::named("again")));
    }

    #[test]
    fn action_item_continuing_its_parent_is_an_error() {
        let workflow = Workflow::builder(WorkflowDescription::new("Loop", "1.0"))
            .activity(ActivityItem::new("Download", "1.0"))
            .unwrap()
            .action(
                ActionItem::new("back", |_| WorkflowAction::continue_with(&Identity::new("Download", "1.0")))
                    .after_activity("Download", "1.0"),
            )
            .unwrap()
            .build()
            .unwrap();
        let mut h = HistoryBuilder::new();
        let history = HistoryBuilder::history(h.activity_completed(&download(), "ok"));
        let config = EngineConfig::default();
        let store = HistoryStore::new(&history, &workflow).unwrap();
        let resolver = ActionResolver::new(&workflow, &store, &config);

        assert!(matches!(
            resolver.continue_from(&download()),
            Err(DeciderError::ActionCycle(_))
        ));
    }

    #[test]
    fn chained_action_items_are_not_a_cycle() {
        let workflow = Workflow::builder(WorkflowDescription::new("Chain", "1.0"))
            .action(ActionItem::new("first", |_| WorkflowAction::schedule(&Identity::named("second"))))
            .unwrap()
            .action(ActionItem::new("second", |_| WorkflowAction::complete_workflow("done")))
            .unwrap()
            .build()
            .unwrap();
        let history = WorkflowHistoryEvents::default();
        let config = EngineConfig::default();
        let store = HistoryStore::new(&history, &workflow).unwrap();
        let resolver = ActionResolver::new(&workflow, &store, &config);

        assert_eq!(
            resolver.schedule(&Identity::named("first")).unwrap(),
            vec![Decision::CompleteWorkflow {
                result: Some("done".into()),
                proposal: false,
            }]
        );
    }

    #[test]
    fn custom_decisions_pass_through() {
        let history = WorkflowHistoryEvents::default();
        with_resolver(&history, |r| {
            let custom = vec![Decision::CancelTimer {
                identity: Identity::timer("cooldown"),
            }];
            assert_eq!(r.resolve(&WorkflowAction::Custom(custom.clone()), None).unwrap(), custom);
        });
    }
}
