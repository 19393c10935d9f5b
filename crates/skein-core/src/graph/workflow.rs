//! Workflow / WorkflowBuilder - グラフ定義の構築と封印
//!
//! # 学習ポイント
//! - Builder パターン（consuming self、`Result<Self, _>` で fail-fast）
//! - build() 後は不変。`Arc<Workflow>` で複数スレッドから共有できる
//!
//! ```ignore
//! let workflow = Workflow::builder(WorkflowDescription::new("Transcode", "1.0"))
//!     .activity(ActivityItem::new("Download", "1.0"))?
//!     .activity(ActivityItem::new("Transcode", "1.0").after_activity("Download", "1.0"))?
//!     .build()?;
//! ```

use super::dependency::DependencyGraph;
use super::handler::{HandlerRegistry, HandlerResult, WorkflowHandler, workflow_handler};
use super::item::{ActionItem, ActivityItem, TimerItem, WorkflowItem};
use crate::domain::description::WorkflowDescription;
use crate::domain::events::{
    WorkflowCancelRequested, WorkflowCancellationFailed, WorkflowCompletionFailed,
    WorkflowEventKind, WorkflowFailureFailed, WorkflowSignaled, WorkflowStarted,
};
use crate::domain::identity::Identity;
use crate::domain::ids::ItemId;
use crate::error::DefinitionError;
use crate::history::ItemCatalog;
use std::collections::HashMap;
use std::fmt;

/// Sealed workflow definition: description, item graph and handlers.
pub struct Workflow {
    description: WorkflowDescription,
    graph: DependencyGraph,
    items: HashMap<Identity, WorkflowItem>,
    ids: HashMap<ItemId, Identity>,
    handlers: HandlerRegistry,
}

impl Workflow {
    pub fn builder(description: WorkflowDescription) -> WorkflowBuilder {
        WorkflowBuilder::new(description)
    }

    pub fn description(&self) -> &WorkflowDescription {
        &self.description
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn item(&self, identity: &Identity) -> Option<&WorkflowItem> {
        self.items.get(identity)
    }

    /// Items in declaration order.
    pub fn items(&self) -> impl Iterator<Item = &WorkflowItem> + '_ {
        self.graph
            .nodes()
            .iter()
            .filter_map(|identity| self.items.get(identity))
    }

    pub fn children_of(&self, identity: &Identity) -> &[Identity] {
        self.graph.children_of(identity)
    }

    pub fn parents_of(&self, identity: &Identity) -> impl Iterator<Item = &Identity> + '_ {
        self.graph.parents_of(identity)
    }
}

impl ItemCatalog for Workflow {
    fn identity_of(&self, id: &ItemId) -> Option<&Identity> {
        self.ids.get(id)
    }
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.description.name)
            .field("version", &self.description.version)
            .field("items", &self.graph.nodes())
            .finish()
    }
}

pub struct WorkflowBuilder {
    description: WorkflowDescription,
    graph: DependencyGraph,
    items: HashMap<Identity, WorkflowItem>,
    ids: HashMap<ItemId, Identity>,
    handlers: HandlerRegistry,
}

impl WorkflowBuilder {
    pub fn new(description: WorkflowDescription) -> Self {
        Self {
            description,
            graph: DependencyGraph::new(),
            items: HashMap::new(),
            ids: HashMap::new(),
            handlers: HandlerRegistry::new(),
        }
    }

    pub fn activity(self, item: ActivityItem) -> Result<Self, DefinitionError> {
        self.declare(item.into())
    }

    pub fn timer(self, item: TimerItem) -> Result<Self, DefinitionError> {
        self.declare(item.into())
    }

    pub fn action(self, item: ActionItem) -> Result<Self, DefinitionError> {
        self.declare(item.into())
    }

    fn declare(mut self, mut item: WorkflowItem) -> Result<Self, DefinitionError> {
        validate_item(&item)?;
        let identity = item.identity().clone();
        let id = identity.id();
        if self.ids.contains_key(&id) {
            return Err(DefinitionError::DuplicateIdentity(identity));
        }

        let declaration = item.take_declaration();
        self.graph.add_item(identity.clone(), &declaration.parents)?;
        for (kind, handler) in declaration.handlers {
            self.handlers.register_item(identity.clone(), kind, handler)?;
        }
        self.ids.insert(id, identity.clone());
        self.items.insert(identity, item);
        Ok(self)
    }

    pub fn on_workflow_started<F>(self, f: F) -> Result<Self, DefinitionError>
    where
        F: Fn(&WorkflowStarted) -> HandlerResult + Send + Sync + 'static,
    {
        self.on_workflow(workflow_handler::<WorkflowStarted, F>(f))
    }

    pub fn on_signal<F>(self, f: F) -> Result<Self, DefinitionError>
    where
        F: Fn(&WorkflowSignaled) -> HandlerResult + Send + Sync + 'static,
    {
        self.on_workflow(workflow_handler::<WorkflowSignaled, F>(f))
    }

    pub fn on_cancel_requested<F>(self, f: F) -> Result<Self, DefinitionError>
    where
        F: Fn(&WorkflowCancelRequested) -> HandlerResult + Send + Sync + 'static,
    {
        self.on_workflow(workflow_handler::<WorkflowCancelRequested, F>(f))
    }

    pub fn on_cancellation_failed<F>(self, f: F) -> Result<Self, DefinitionError>
    where
        F: Fn(&WorkflowCancellationFailed) -> HandlerResult + Send + Sync + 'static,
    {
        self.on_workflow(workflow_handler::<WorkflowCancellationFailed, F>(f))
    }

    pub fn on_failure_failed<F>(self, f: F) -> Result<Self, DefinitionError>
    where
        F: Fn(&WorkflowFailureFailed) -> HandlerResult + Send + Sync + 'static,
    {
        self.on_workflow(workflow_handler::<WorkflowFailureFailed, F>(f))
    }

    pub fn on_completion_failed<F>(self, f: F) -> Result<Self, DefinitionError>
    where
        F: Fn(&WorkflowCompletionFailed) -> HandlerResult + Send + Sync + 'static,
    {
        self.on_workflow(workflow_handler::<WorkflowCompletionFailed, F>(f))
    }

    fn on_workflow(
        mut self,
        (kind, handler): (WorkflowEventKind, WorkflowHandler),
    ) -> Result<Self, DefinitionError> {
        self.handlers.register_workflow(kind, handler)?;
        Ok(self)
    }

    /// Validates the description and seals the graph.
    pub fn build(self) -> Result<Workflow, DefinitionError> {
        self.description.validate()?;
        Ok(Workflow {
            description: self.description,
            graph: self.graph,
            items: self.items,
            ids: self.ids,
            handlers: self.handlers,
        })
    }
}

/// Activities need a version so their wire id never collides with a
/// name-only timer or action item id.
fn validate_item(item: &WorkflowItem) -> Result<(), DefinitionError> {
    let identity = item.identity();
    if identity.name().trim().is_empty() {
        return Err(DefinitionError::EmptyItemName);
    }
    match item {
        WorkflowItem::Activity(_) if identity.version().trim().is_empty() => {
            Err(DefinitionError::EmptyActivityVersion(identity.name().to_string()))
        }
        WorkflowItem::Timer(timer) if timer.delay().subsec_nanos() != 0 => {
            Err(DefinitionError::SubSecondTimer {
                identity: identity.clone(),
                fire_after: timer.delay(),
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::WorkflowAction;
    use rstest::rstest;
    use std::time::Duration;

    fn description() -> WorkflowDescription {
        WorkflowDescription::new("Transcode", "1.0")
    }

    #[test]
    fn build_success() {
        let workflow = Workflow::builder(description())
            .activity(ActivityItem::new("Download", "1.0"))
            .unwrap()
            .timer(TimerItem::new("wait").fire_after(Duration::from_secs(2)).after_activity("Download", "1.0"))
            .unwrap()
            .activity(ActivityItem::new("Transcode", "1.0").after_timer("wait"))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(workflow.items().count(), 3);
        assert_eq!(
            workflow.children_of(&Identity::new("Download", "1.0")),
            &[Identity::timer("wait")]
        );
        assert_eq!(
            workflow.identity_of(&ItemId::from("wait")),
            Some(&Identity::timer("wait"))
        );
    }

    #[test]
    fn parent_must_be_declared_first() {
        let result = Workflow::builder(description())
            .activity(ActivityItem::new("Transcode", "1.0").after_activity("Download", "1.0"));
        assert!(matches!(result, Err(DefinitionError::ParentNotFound { .. })));
    }

    #[test]
    fn duplicate_item_is_rejected() {
        let result = Workflow::builder(description())
            .activity(ActivityItem::new("Download", "1.0"))
            .unwrap()
            .activity(ActivityItem::new("Download", "1.0"));
        assert!(matches!(result, Err(DefinitionError::DuplicateIdentity(_))));
    }

    #[test]
    fn positional_names_allow_the_same_activity_twice() {
        let workflow = Workflow::builder(description())
            .activity(ActivityItem::new("Download", "1.0").positional_name("First"))
            .unwrap()
            .activity(ActivityItem::new("Download", "1.0").positional_name("Second"))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(workflow.items().count(), 2);
    }

    #[test]
    fn handler_registered_twice_on_one_item_is_rejected() {
        let result = Workflow::builder(description()).activity(
            ActivityItem::new("Download", "1.0")
                .on_completion(|e| Ok(WorkflowAction::continue_with(&e.identity)))
                .on_completion(|_| Ok(WorkflowAction::Ignore)),
        );
        assert!(matches!(result, Err(DefinitionError::DuplicateHandler { .. })));
    }

    #[test]
    fn workflow_handler_registered_twice_is_rejected() {
        let result = Workflow::builder(description())
            .on_signal(|_| Ok(WorkflowAction::Ignore))
            .unwrap()
            .on_signal(|_| Ok(WorkflowAction::Ignore));
        assert!(matches!(result, Err(DefinitionError::DuplicateHandler { .. })));
    }

    #[test]
    fn empty_version_is_rejected_at_build() {
        let result = Workflow::builder(WorkflowDescription::new("Transcode", "")).build();
        assert!(matches!(result, Err(DefinitionError::EmptyVersion(_))));
    }

    #[rstest]
    #[case::empty_name(ActivityItem::new("", "1.0"))]
    #[case::blank_name(ActivityItem::new("  ", "1.0"))]
    fn activity_without_a_name_is_rejected(#[case] item: ActivityItem) {
        let result = Workflow::builder(description()).activity(item);
        assert!(matches!(result, Err(DefinitionError::EmptyItemName)));
    }

    #[test]
    fn activity_without_a_version_is_rejected() {
        let result = Workflow::builder(description()).activity(ActivityItem::new("Download", ""));
        assert!(matches!(
            result,
            Err(DefinitionError::EmptyActivityVersion(name)) if name == "Download"
        ));
    }

    #[test]
    fn timer_and_action_need_a_name() {
        let timer = Workflow::builder(description()).timer(TimerItem::new(""));
        assert!(matches!(timer, Err(DefinitionError::EmptyItemName)));

        let action = Workflow::builder(description())
            .action(ActionItem::new("", |_| WorkflowAction::Ignore));
        assert!(matches!(action, Err(DefinitionError::EmptyItemName)));
    }

    #[test]
    fn sub_second_timer_is_rejected() {
        let result = Workflow::builder(description())
            .timer(TimerItem::new("wait").fire_after(Duration::from_millis(500)));
        assert!(matches!(
            result,
            Err(DefinitionError::SubSecondTimer { fire_after, .. }) if fire_after == Duration::from_millis(500)
        ));

        let whole = Workflow::builder(description())
            .timer(TimerItem::new("wait").fire_after(Duration::from_secs(2)));
        assert!(whole.is_ok());
    }

    #[test]
    fn workflow_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Workflow>();
    }
}
