//! DecisionTask - ポーリングで受け取る 1 件の decision task
//!
//! ```json
//! {
//!   "task_token": "t-1",
//!   "workflow_type": { "name": "Media", "version": "1.0" },
//!   "started_event_id": 3,
//!   "previous_started_event_id": 0,
//!   "events": [ { "event_id": 1, "attributes": { "type": "WORKFLOW_EXECUTION_STARTED" } } ]
//! }
//! ```

use super::hosted::HostedWorkflows;
use crate::domain::decision::Decision;
use crate::domain::history::{HistoryEvent, WorkflowHistoryEvents};
use crate::domain::ids::EventId;
use crate::error::DeciderError;
use crate::ports::decision_sink::{DecisionSink, SinkError};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowType {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTask {
    pub task_token: String,
    pub workflow_type: WorkflowType,
    pub events: Vec<HistoryEvent>,
    pub started_event_id: EventId,
    #[serde(default)]
    pub previous_started_event_id: EventId,
}

impl DecisionTask {
    pub fn history(&self) -> WorkflowHistoryEvents {
        WorkflowHistoryEvents::new(
            self.events.clone(),
            self.started_event_id,
            self.previous_started_event_id,
        )
    }

    pub fn execute_for(&self, hosted: &HostedWorkflows) -> Result<Vec<Decision>, DeciderError> {
        hosted.decide(
            &self.workflow_type.name,
            &self.workflow_type.version,
            &self.history(),
        )
    }

    /// Converts `decisions` to wire commands and hands them to `sink`.
    pub async fn respond(
        &self,
        decisions: &[Decision],
        sink: &dyn DecisionSink,
    ) -> Result<(), SinkError> {
        let commands = decisions.iter().map(Decision::to_command).collect::<Vec<_>>();
        info!(
            task_token = %self.task_token,
            workflow = %self.workflow_type.name,
            commands = commands.len(),
            "responding to decision task"
        );
        sink.respond(&self.task_token, commands).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::command::Command;
    use crate::domain::description::WorkflowDescription;
    use crate::graph::item::ActivityItem;
    use crate::graph::workflow::Workflow;
    use crate::impls::RecordingSink;

    const TASK: &str = r#"{
        "task_token": "t-1",
        "workflow_type": { "name": "Media", "version": "1.0" },
        "started_event_id": 3,
        "previous_started_event_id": 0,
        "events": [
            { "event_id": 1, "attributes": { "type": "WORKFLOW_EXECUTION_STARTED", "input": "movie.mkv" } },
            { "event_id": 2, "attributes": { "type": "DECISION_TASK_SCHEDULED" } },
            { "event_id": 3, "attributes": { "type": "DECISION_TASK_STARTED", "scheduled_event_id": 2 } }
        ]
    }"#;

    fn hosted() -> HostedWorkflows {
        let workflow = Workflow::builder(WorkflowDescription::new("Media", "1.0"))
            .activity(ActivityItem::new("Download", "1.0"))
            .unwrap()
            .build()
            .unwrap();
        HostedWorkflows::new().host(workflow).unwrap()
    }

    #[test]
    fn deserializes_and_builds_the_history() {
        let task: DecisionTask = serde_json::from_str(TASK).unwrap();
        assert_eq!(task.workflow_type.name, "Media");
        let history = task.history();
        assert_eq!(history.started_event_id(), EventId::new(3));
        assert_eq!(history.new_events().count(), 3);
    }

    #[test]
    fn unknown_workflow_type_fails() {
        let mut task: DecisionTask = serde_json::from_str(TASK).unwrap();
        task.workflow_type.version = "9.9".into();
        assert!(matches!(
            task.execute_for(&hosted()),
            Err(DeciderError::WorkflowNotHosted { .. })
        ));
    }

    #[tokio::test]
    async fn decisions_reach_the_sink_as_commands() {
        let task: DecisionTask = serde_json::from_str(TASK).unwrap();
        let decisions = task.execute_for(&hosted()).unwrap();
        let sink = RecordingSink::new();

        task.respond(&decisions, &sink).await.unwrap();

        let responses = sink.responses().await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].0, "t-1");
        assert!(matches!(
            &responses[0].1[..],
            [Command::ScheduleActivityTask { input: Some(input), .. }] if input == "movie.mkv"
        ));
    }
}
