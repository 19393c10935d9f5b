//! Domain model (ids, identities, raw history, item events, actions, decisions).
//!
//! - 入力: `history` (raw events) → `events` (item / workflow events)
//! - 解釈: `events` → `action` (WorkflowAction)
//! - 出力: `decision` (engine の語彙) → `command` (wire 形式)

pub mod action;
pub mod command;
pub mod decision;
pub mod description;
pub mod events;
pub mod history;
pub mod identity;
pub mod ids;

// 主要な型を再エクスポート
pub use self::action::WorkflowAction;
pub use self::command::Command;
pub use self::decision::{ActivityTimeouts, Decision, DecisionBatch, ScheduleActivity};
pub use self::description::WorkflowDescription;
pub use self::events::{ItemEvent, ItemEventKind, WorkflowEvent, WorkflowEventKind};
pub use self::history::{EventAttributes, HistoryEvent, WorkflowHistoryEvents};
pub use self::identity::Identity;
pub use self::ids::{EventId, ItemId};
