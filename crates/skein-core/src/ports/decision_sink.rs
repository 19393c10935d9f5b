//! DecisionSink port - decision の返送先の抽象化
//!
//! The engine itself never talks to the workflow service; whoever polls
//! decision tasks hands the resulting commands to a sink.
//!
//! # 実装
//! - RecordingSink: メモリに記録（テスト・デモ用）
//! - 本番: workflow service の RespondDecisionTaskCompleted を呼ぶ実装

use crate::domain::command::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("task token {0} was already answered")]
    AlreadyResponded(String),

    #[error("decision sink unavailable: {0}")]
    Unavailable(String),
}

/// Receives the commands decided for one decision task.
#[async_trait::async_trait]
pub trait DecisionSink: Send + Sync {
    async fn respond(&self, task_token: &str, commands: Vec<Command>) -> Result<(), SinkError>;
}
