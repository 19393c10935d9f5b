//! App - アプリケーション層
//!
//! Decision cycle の組み立て。domain / graph / history を組み合わせて
//! 1 回の cycle を実行し、結果を ports 経由で返します。
//!
//! # 主要コンポーネント
//! - **ActionResolver**: WorkflowAction → Decision（continue / reschedule / 完了提案）
//! - **WorkflowExecution**: 新規イベントを解釈して DecisionBatch にまとめる
//! - **HostedWorkflows**: (name, version) → Workflow
//! - **DecisionTask**: ポーリングした task の実行と応答

pub mod execution;
pub mod hosted;
pub mod resolver;
pub mod task;

// 主要な型を再エクスポート
pub use self::execution::WorkflowExecution;
pub use self::hosted::HostedWorkflows;
pub use self::resolver::ActionResolver;
pub use self::task::{DecisionTask, WorkflowType};
