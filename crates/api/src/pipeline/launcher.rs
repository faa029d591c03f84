//! Runs the external plan-conversion executable for accepted jobs.
//!
//! Each accepted job gets one supervising task. The task waits for a worker
//! slot, spawns `<runtime> <script> <uuid> <plan_id>`, feeds stdout markers
//! into the registry, logs stderr, and reports the terminal state once the
//! child exits. The child is owned by that task alone.

use std::sync::Arc;
use std::time::Duration;

use hvac_core::pipeline::markers::match_milestone;
use hvac_core::pipeline::state::{FailureReason, JobState};
use hvac_core::pipeline::stderr::{classify_stderr, StderrSeverity};
use hvac_core::scripting::executor::{OutputLine, ScriptCommand, ScriptError, ScriptExit};
use hvac_core::scripting::subprocess::spawn_streaming;
use hvac_events::{EventBus, PipelineEvent, PipelineEventKind};
use tokio::sync::{oneshot, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::pipeline::registry::{JobRegistry, LaunchRequest};

/// How long to keep reading output after the child has exited. Bounds the
/// wait when a grandchild inherited the pipes and keeps them open.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

pub struct ProcessLauncher {
    config: PipelineConfig,
    slots: Arc<Semaphore>,
    event_bus: Arc<EventBus>,
    cancel: CancellationToken,
}

impl ProcessLauncher {
    pub fn new(config: PipelineConfig, event_bus: Arc<EventBus>) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_concurrent));
        Self {
            config,
            slots,
            event_bus,
            cancel: CancellationToken::new(),
        }
    }

    /// Build the command line for one job. Output is forced unbuffered so
    /// progress markers reach the registry as they are printed.
    pub fn command_for(&self, uuid: &str, plan_id: &str) -> ScriptCommand {
        ScriptCommand {
            runtime: self.config.runtime.clone(),
            script_path: self.config.script_path.clone(),
            args: vec![uuid.to_string(), plan_id.to_string()],
            working_directory: self.config.working_directory.clone(),
            env_vars: vec![("PYTHONUNBUFFERED".to_string(), "1".to_string())],
        }
    }

    /// Worker slots not currently held by a running child.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Cancel all queued and running jobs. Irreversible.
    pub fn cancel_all(&self) {
        tracing::info!("Cancelling all pipeline jobs");
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Spawn the supervising task for an accepted job. The terminal state is
    /// sent on `done` after the registry entry has been removed.
    pub(crate) fn launch(
        &self,
        registry: Arc<JobRegistry>,
        request: LaunchRequest,
        done: oneshot::Sender<JobState>,
    ) {
        let job = SupervisedJob {
            command: self.command_for(&request.uuid, &request.plan_id),
            deadline: self.config.job_timeout(),
            slots: Arc::clone(&self.slots),
            event_bus: Arc::clone(&self.event_bus),
            cancel: self.cancel.clone(),
            registry,
            request,
        };
        job.publish(PipelineEventKind::Queued);
        tokio::spawn(job.run(done));
    }
}

/// Map the outcome of waiting on a child to its terminal job state.
pub fn exit_state(result: Result<ScriptExit, ScriptError>) -> JobState {
    match result {
        Ok(exit) if exit.success() => JobState::Completed,
        Ok(ScriptExit {
            exit_code: Some(code),
            ..
        }) => JobState::Failed(FailureReason::ExitCode(code)),
        Ok(_) => JobState::Failed(FailureReason::Signalled),
        Err(ScriptError::Timeout { .. }) => JobState::Failed(FailureReason::Timeout),
        Err(ScriptError::IoError(e)) => JobState::Failed(FailureReason::Io(e.to_string())),
        Err(e @ (ScriptError::NotFound(_) | ScriptError::PermissionDenied(_))) => {
            JobState::Failed(FailureReason::SpawnFailed(e.to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// SupervisedJob
// ---------------------------------------------------------------------------

struct SupervisedJob {
    registry: Arc<JobRegistry>,
    request: LaunchRequest,
    command: ScriptCommand,
    deadline: Option<Duration>,
    slots: Arc<Semaphore>,
    event_bus: Arc<EventBus>,
    cancel: CancellationToken,
}

impl SupervisedJob {
    async fn run(self, done: oneshot::Sender<JobState>) {
        let state = self.execute().await;

        if let Some(entry) = self.registry.finish(&self.request.job_key, &state).await {
            if let Some(started) = entry.started_at {
                let elapsed = chrono::Utc::now() - started;
                tracing::debug!(
                    project_id = %self.request.job_key,
                    queue_wait_ms = entry.queue_wait().map(|d| d.num_milliseconds()),
                    duration_ms = elapsed.num_milliseconds(),
                    final_progress = entry.progress,
                    "Pipeline job removed from registry",
                );
            }
        }

        let kind = match &state {
            JobState::Failed(reason) => PipelineEventKind::Failed {
                reason: reason.clone(),
            },
            _ => PipelineEventKind::Completed,
        };
        self.publish(kind);

        // The submitter may have stopped listening; nothing to do then.
        let _ = done.send(state);
    }

    async fn execute(&self) -> JobState {
        let key = &self.request.job_key;

        let _permit = tokio::select! {
            _ = self.cancel.cancelled() => return JobState::Failed(FailureReason::Cancelled),
            permit = Arc::clone(&self.slots).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return JobState::Failed(FailureReason::Cancelled),
            },
        };

        let (mut process, mut output) = match spawn_streaming(&self.command) {
            Ok(spawned) => spawned,
            Err(e) => {
                tracing::error!(
                    project_id = %key,
                    runtime = %self.command.runtime,
                    script = %self.command.script_path,
                    error = %e,
                    "Failed to start pipeline process",
                );
                return JobState::Failed(FailureReason::SpawnFailed(e.to_string()));
            }
        };

        self.registry.mark_running(key).await;
        self.publish(PipelineEventKind::Started);
        tracing::info!(
            project_id = %key,
            plan_id = %self.request.plan_id,
            uuid = %self.request.uuid,
            pid = process.id(),
            "Pipeline process started",
        );

        let outcome = {
            let wait = process.wait(self.deadline);
            tokio::pin!(wait);
            let mut output_open = true;
            loop {
                tokio::select! {
                    result = &mut wait => break Some(result),
                    line = output.recv(), if output_open => match line {
                        Some(line) => self.handle_line(line).await,
                        None => output_open = false,
                    },
                    _ = self.cancel.cancelled() => break None,
                }
            }
        };

        let Some(result) = outcome else {
            if let Err(e) = process.kill().await {
                tracing::warn!(project_id = %key, error = %e, "Failed to kill pipeline process");
            }
            return JobState::Failed(FailureReason::Cancelled);
        };

        let drained = tokio::time::timeout(OUTPUT_DRAIN_GRACE, async {
            while let Some(line) = output.recv().await {
                self.handle_line(line).await;
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!(project_id = %key, "Pipeline output still open after exit");
        }

        if let Ok(exit) = &result {
            tracing::debug!(
                project_id = %key,
                exit_code = exit.exit_code,
                duration_ms = exit.duration_ms,
                "Pipeline process exited",
            );
        }
        exit_state(result)
    }

    async fn handle_line(&self, line: OutputLine) {
        let key = &self.request.job_key;
        match line {
            OutputLine::Stdout(text) => {
                tracing::info!(project_id = %key, output = %text, "Pipeline output");
                let Some(milestone) = match_milestone(&text) else {
                    return;
                };
                if self.registry.set_progress(key, milestone.percent).await {
                    tracing::info!(
                        project_id = %key,
                        progress = milestone.percent,
                        marker = milestone.marker,
                        "Pipeline progress updated",
                    );
                    self.publish(PipelineEventKind::Progress {
                        percent: milestone.percent,
                    });
                }
            }
            OutputLine::Stderr(text) => match classify_stderr(&text) {
                StderrSeverity::Error => {
                    tracing::error!(project_id = %key, output = %text, "Pipeline error output");
                }
                StderrSeverity::Info => {
                    tracing::info!(project_id = %key, output = %text, "Pipeline diagnostic output");
                }
            },
        }
    }

    fn publish(&self, kind: PipelineEventKind) {
        self.event_bus.publish(PipelineEvent::new(
            self.request.job_key.clone(),
            self.request.uuid.clone(),
            self.request.plan_id.clone(),
            kind,
        ));
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
