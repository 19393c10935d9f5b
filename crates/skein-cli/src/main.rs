use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use serde::Serialize;
use skein_core::domain::{ActivityTimeouts, Command};
use skein_core::ports::{DecisionSink, SinkError};
use skein_core::{
    ActionItem, ActivityItem, DecisionTask, DefinitionError, EngineConfig, HostedWorkflows,
    Identity, TimerItem, Workflow, WorkflowAction, WorkflowDescription,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Replays decision-task JSON documents against the sample media workflow
/// and prints the resulting commands.
#[derive(Parser)]
#[command(name = "skein")]
#[command(about = "Decide the next steps of a workflow from its history", long_about = None)]
#[command(version)]
struct Cli {
    /// Decision task files (JSON)
    #[arg(required = true)]
    tasks: Vec<PathBuf>,

    /// Engine configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pretty-print the commands
    #[arg(long)]
    pretty: bool,

    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Download ──┬──▶ Transcode ──┬──▶ settle (timer) ──▶ publish
/// Sync ──────┴──▶ Thumbnail ──┘
///
/// Transcode and Thumbnail are released by the same join, so neither can
/// finish while the other still has no history.
fn media_workflow() -> Result<Workflow, DefinitionError> {
    let description = WorkflowDescription::new("MediaPipeline", "1.0")
        .with_description("download, transcode and publish a video")
        .with_default_task_list("media");

    Workflow::builder(description)
        .activity(
            ActivityItem::new("Download", "1.0")
                .with_task_list(|_| Some("io".to_string()))
                .on_failure(|e| {
                    Ok(WorkflowAction::reschedule(&e.identity, Duration::from_secs(30)).up_to(3))
                }),
        )?
        .activity(ActivityItem::new("SyncMetadata", "1.0"))?
        .activity(
            ActivityItem::new("Transcode", "1.0")
                .after_activity("Download", "1.0")
                .after_activity("SyncMetadata", "1.0")
                .with_input(|cx| cx.result_of(&Identity::new("Download", "1.0")))
                .with_timeouts(|_| ActivityTimeouts {
                    start_to_close: Some(Duration::from_secs(3600)),
                    ..ActivityTimeouts::default()
                }),
        )?
        .activity(
            ActivityItem::new("Thumbnail", "1.0")
                .after_activity("Download", "1.0")
                .after_activity("SyncMetadata", "1.0"),
        )?
        .timer(
            TimerItem::new("settle")
                .fire_after(Duration::from_secs(60))
                .after_activity("Transcode", "1.0")
                .after_activity("Thumbnail", "1.0"),
        )?
        .action(
            ActionItem::new("publish", |cx| {
                match cx.result_of(&Identity::new("Transcode", "1.0")) {
                    Some(location) => WorkflowAction::complete_workflow(format!("published {location}")),
                    None => WorkflowAction::fail_workflow("NOTHING_TO_PUBLISH", None),
                }
            })
            .after_timer("settle"),
        )?
        .on_signal(|signal| match signal.signal_name.as_str() {
            "abort" => Ok(WorkflowAction::cancel_workflow("aborted by signal")),
            _ => Ok(WorkflowAction::Ignore),
        })?
        .build()
}

#[derive(Serialize)]
struct Response<'a> {
    task_token: &'a str,
    decisions: &'a [Command],
}

/// Prints each response as one JSON document on stdout.
struct StdoutSink {
    pretty: bool,
}

#[async_trait]
impl DecisionSink for StdoutSink {
    async fn respond(&self, task_token: &str, commands: Vec<Command>) -> Result<(), SinkError> {
        let response = Response {
            task_token,
            decisions: &commands,
        };
        let json = if self.pretty {
            serde_json::to_string_pretty(&response)
        } else {
            serde_json::to_string(&response)
        }
        .map_err(|e| SinkError::Unavailable(format!("encode response: {e}")))?;
        println!("{json}");
        Ok(())
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    EngineConfig::from_json_str(&text).with_context(|| format!("parse config {}", path.display()))
}

/// 1 ファイル = 1 decision task
async fn run_task(path: PathBuf, hosted: Arc<HostedWorkflows>, sink: Arc<StdoutSink>) -> Result<()> {
    let (task, decisions) = tokio::task::spawn_blocking(move || -> Result<_> {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("read task {}", path.display()))?;
        let task: DecisionTask = serde_json::from_str(&text)
            .with_context(|| format!("parse task {}", path.display()))?;
        let decisions = task
            .execute_for(&hosted)
            .with_context(|| format!("decide task {}", task.task_token))?;
        Ok((task, decisions))
    })
    .await??;

    task.respond(&decisions, sink.as_ref()).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| cli.log_level.clone().into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(cli.config.as_ref())?;
    let hosted = Arc::new(
        HostedWorkflows::new()
            .with_config(config)
            .host(media_workflow()?)?,
    );
    let sink = Arc::new(StdoutSink { pretty: cli.pretty });

    info!(tasks = cli.tasks.len(), "replaying decision tasks");
    let handles: Vec<_> = cli
        .tasks
        .into_iter()
        .map(|path| tokio::spawn(run_task(path, Arc::clone(&hosted), Arc::clone(&sink))))
        .collect();

    let mut failed = 0usize;
    for handle in handles {
        if let Err(e) = handle.await? {
            error!(error = %format!("{e:#}"), "decision task failed");
            failed += 1;
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} decision task(s) failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::Decision;

    fn decide(json: &str) -> Vec<Decision> {
        let hosted = HostedWorkflows::new().host(media_workflow().unwrap()).unwrap();
        let task: DecisionTask = serde_json::from_str(json).unwrap();
        task.execute_for(&hosted).unwrap()
    }

    #[test]
    fn start_schedules_download_and_sync() {
        let decisions = decide(include_str!("../fixtures/01-started.json"));
        let names: Vec<_> = decisions.iter().map(to_activity_name).collect();
        assert_eq!(names, vec![Some("Download"), Some("SyncMetadata")]);
    }

    #[test]
    fn download_waits_for_sync_before_transcoding() {
        let decisions = decide(include_str!("../fixtures/02-download-completed.json"));
        assert!(decisions.is_empty());
    }

    #[test]
    fn thumbnail_finishing_first_waits_for_the_transcode() {
        let decisions = decide(include_str!("../fixtures/04-thumbnail-first.json"));
        assert!(decisions.is_empty());
    }

    #[test]
    fn transcode_after_thumbnail_starts_the_settle_timer() {
        let decisions = decide(include_str!("../fixtures/05-transcode-completed.json"));
        assert_eq!(
            decisions,
            vec![Decision::schedule_timer(Identity::timer("settle"), Duration::from_secs(60))]
        );
    }

    #[test]
    fn settled_timer_publishes() {
        let decisions = decide(include_str!("../fixtures/03-settle-fired.json"));
        assert_eq!(
            decisions,
            vec![Decision::CompleteWorkflow {
                result: Some("published s3://media/movie.mp4".into()),
                proposal: false,
            }]
        );
    }

    fn to_activity_name(decision: &Decision) -> Option<&str> {
        match decision {
            Decision::ScheduleActivity(schedule) => Some(schedule.identity.name()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn stdout_sink_accepts_commands() {
        let sink = StdoutSink { pretty: true };
        sink.respond("t-1", vec![Command::CancelTimer { timer_id: "settle".into() }])
            .await
            .unwrap();
    }
}
