//! Handler - イベントハンドラの型消去と登録
//!
//! # 学習ポイント
//! - ジェネリック trait (`Handler<E>`) と closure の blanket impl
//! - Object-safe trait (`DynHandler<Family>`)
//! - Type erasure パターン (`TypedHandler<E, H>` → `DynHandler`)
//!
//! Handlers are registered per `(event kind, item identity)`; workflow-level
//! handlers per event kind. The registry is filled by
//! [`WorkflowBuilder`](super::workflow::WorkflowBuilder) and is read-only
//! afterwards.

use crate::domain::action::WorkflowAction;
use crate::domain::events::{ItemEvent, ItemEventKind, WorkflowEvent, WorkflowEventKind};
use crate::domain::identity::Identity;
use crate::error::DefinitionError;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

/// Error raised by user code inside a handler. Propagated as-is to the caller
/// of the cycle.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type HandlerResult = Result<WorkflowAction, HandlerError>;

/// One concrete event struct belonging to an event union (`Family`).
pub trait EventVariant: Sized + 'static {
    type Family: 'static;
    type Kind: Copy + Eq + Hash + Debug;

    const KIND: Self::Kind;

    fn narrow(event: &Self::Family) -> Option<&Self>;
}

/// Handler は具体的なイベント型を受け取って WorkflowAction を返す
///
/// Handlers must be pure: the same event always yields the same action. They
/// are called again whenever a later cycle needs to know whether an item is
/// processed.
pub trait Handler<E>: Send + Sync {
    fn handle(&self, event: &E) -> HandlerResult;
}

impl<E, F> Handler<E> for F
where
    F: Fn(&E) -> HandlerResult + Send + Sync,
{
    fn handle(&self, event: &E) -> HandlerResult {
        self(event)
    }
}

/// Object-safe form of [`Handler`], keyed on the event union.
pub trait DynHandler<U>: Send + Sync {
    fn handle_dyn(&self, event: &U) -> HandlerResult;
}

pub struct TypedHandler<E, H> {
    handler: H,
    _marker: PhantomData<fn(&E)>,
}

impl<E: EventVariant, H: Handler<E>> TypedHandler<E, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

impl<E: EventVariant, H: Handler<E>> DynHandler<E::Family> for TypedHandler<E, H> {
    fn handle_dyn(&self, event: &E::Family) -> HandlerResult {
        match E::narrow(event) {
            Some(event) => self.handler.handle(event),
            None => Err(format!("handler for {:?} received another event kind", E::KIND).into()),
        }
    }
}

pub type ItemHandler = Arc<dyn DynHandler<ItemEvent>>;
pub type WorkflowHandler = Arc<dyn DynHandler<WorkflowEvent>>;

/// Wraps a typed item-event handler for registration.
pub fn item_handler<E, H>(handler: H) -> (ItemEventKind, ItemHandler)
where
    E: EventVariant<Family = ItemEvent, Kind = ItemEventKind>,
    H: Handler<E> + 'static,
{
    (E::KIND, Arc::new(TypedHandler::<E, H>::new(handler)))
}

/// Wraps a typed workflow-event handler for registration.
pub fn workflow_handler<E, H>(handler: H) -> (WorkflowEventKind, WorkflowHandler)
where
    E: EventVariant<Family = WorkflowEvent, Kind = WorkflowEventKind>,
    H: Handler<E> + 'static,
{
    (E::KIND, Arc::new(TypedHandler::<E, H>::new(handler)))
}

#[derive(Default)]
pub struct HandlerRegistry {
    item_handlers: HashMap<Identity, HashMap<ItemEventKind, ItemHandler>>,
    workflow_handlers: HashMap<WorkflowEventKind, WorkflowHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_item(
        &mut self,
        identity: Identity,
        kind: ItemEventKind,
        handler: ItemHandler,
    ) -> Result<(), DefinitionError> {
        match self.item_handlers.entry(identity.clone()).or_default().entry(kind) {
            Entry::Occupied(_) => Err(DefinitionError::DuplicateHandler {
                kind: format!("{kind:?}"),
                identity: identity.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(handler);
                Ok(())
            }
        }
    }

    pub fn register_workflow(
        &mut self,
        kind: WorkflowEventKind,
        handler: WorkflowHandler,
    ) -> Result<(), DefinitionError> {
        match self.workflow_handlers.entry(kind) {
            Entry::Occupied(_) => Err(DefinitionError::DuplicateHandler {
                kind: format!("{kind:?}"),
                identity: "workflow".to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(handler);
                Ok(())
            }
        }
    }

    pub fn item_handler(&self, kind: ItemEventKind, identity: &Identity) -> Option<&ItemHandler> {
        self.item_handlers.get(identity)?.get(&kind)
    }

    pub fn workflow_handler(&self, kind: WorkflowEventKind) -> Option<&WorkflowHandler> {
        self.workflow_handlers.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.item_handlers.values().map(HashMap::len).sum::<usize>() + self.workflow_handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
