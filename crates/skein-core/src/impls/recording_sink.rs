//! RecordingSink - メモリに記録するだけの DecisionSink
//!
//! # 学習ポイント
//! - tokio::sync::Mutex（await をまたいでロックを保持できる）
//! - 同じ task token への 2 回目の応答はエラー

use crate::domain::command::Command;
use crate::ports::decision_sink::{DecisionSink, SinkError};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
pub struct RecordingSink {
    responses: Mutex<Vec<(String, Vec<Command>)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 記録済みの応答（応答順）
    pub async fn responses(&self) -> Vec<(String, Vec<Command>)> {
        self.responses.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl DecisionSink for RecordingSink {
    async fn respond(&self, task_token: &str, commands: Vec<Command>) -> Result<(), SinkError> {
        let mut responses = self.responses.lock().await;
        if responses.iter().any(|(token, _)| token == task_token) {
            return Err(SinkError::AlreadyResponded(task_token.to_string()));
        }
        debug!(%task_token, commands = commands.len(), "decision task answered");
        responses.push((task_token.to_string(), commands));
        Ok(())
    }
}
