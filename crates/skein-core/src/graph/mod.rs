//! Workflow graph: items, parent/child edges, handlers.

pub mod dependency;
pub mod handler;
pub mod item;
pub mod workflow;

pub use dependency::DependencyGraph;
pub use handler::{
    DynHandler, EventVariant, Handler, HandlerError, HandlerRegistry, HandlerResult, TypedHandler,
};
pub use item::{ActionItem, ActivityItem, ItemContext, TimerItem, WorkflowItem};
pub use workflow::{Workflow, WorkflowBuilder};
