//! skein-core
//!
//! Decider engine for event-sourced workflows: given a workflow graph and the
//! execution history, decide what the workflow service should do next.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, identity, history, events, action, decision, command, description）
//! - **graph**: workflow 定義（ActivityItem / TimerItem / ActionItem, DependencyGraph, HandlerRegistry）
//! - **history**: HistoryStore（1 cycle 分の履歴インデックス）
//! - **app**: decision cycle（ActionResolver, WorkflowExecution, HostedWorkflows, DecisionTask）
//! - **ports**: 抽象化レイヤー（DecisionSink）
//! - **impls**: 実装（RecordingSink）
//! - **testing**: 履歴 fixture（HistoryBuilder）
//!
//! ```ignore
//! let workflow = Workflow::builder(WorkflowDescription::new("Media", "1.0"))
//!     .activity(ActivityItem::new("Download", "1.0"))?
//!     .activity(ActivityItem::new("Transcode", "1.0").after_activity("Download", "1.0"))?
//!     .build()?;
//! let decisions = WorkflowExecution::new(&workflow, &history).execute()?;
//! ```

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod graph;
pub mod history;
pub mod impls;
pub mod ports;
pub mod testing;

pub use app::{DecisionTask, HostedWorkflows, WorkflowExecution};
pub use config::EngineConfig;
pub use domain::{Decision, Identity, WorkflowAction, WorkflowDescription, WorkflowHistoryEvents};
pub use error::{DeciderError, DefinitionError, HistoryError};
pub use graph::{ActionItem, ActivityItem, TimerItem, Workflow, WorkflowBuilder};
