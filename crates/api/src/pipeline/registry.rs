//! Live pipeline job registry.
//!
//! Maps a job key (project id) to the state of the job running under it.
//! A key can hold at most one live job: [`JobRegistry::submit`] checks and
//! inserts under a single write-lock acquisition. Entries are removed as soon
//! as their process exits, so a finished job is indistinguishable from one
//! that never started.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use hvac_core::error::CoreError;
use hvac_core::pipeline::markers::INITIAL_PROGRESS;
use hvac_core::pipeline::state::JobState;
use hvac_core::types::{JobKey, Timestamp};
use hvac_events::EventBus;
use tokio::sync::{oneshot, RwLock};

use crate::config::PipelineConfig;
use crate::pipeline::launcher::ProcessLauncher;

/// A request to run the conversion executable for one job.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Registry key (project id).
    pub job_key: JobKey,
    /// User identifier passed as the executable's first argument.
    pub uuid: String,
    /// Plan identifier passed as the executable's second argument.
    pub plan_id: String,
}

/// Registry bookkeeping for one live job.
#[derive(Debug, Clone)]
pub struct JobEntry {
    pub uuid: String,
    pub plan_id: String,
    pub state: JobState,
    pub progress: u8,
    pub submitted_at: Timestamp,
    pub started_at: Option<Timestamp>,
}

impl JobEntry {
    fn queued(request: &LaunchRequest) -> Self {
        Self {
            uuid: request.uuid.clone(),
            plan_id: request.plan_id.clone(),
            state: JobState::Queued,
            progress: INITIAL_PROGRESS,
            submitted_at: Utc::now(),
            started_at: None,
        }
    }

    /// Time spent waiting for a worker slot, once the child has started.
    pub fn queue_wait(&self) -> Option<chrono::Duration> {
        self.started_at.map(|started| started - self.submitted_at)
    }
}

/// Point-in-time view of a live job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub progress: u8,
    pub state: JobState,
}

/// Returned by [`JobRegistry::submit`] when a job is accepted.
#[derive(Debug)]
pub struct Accepted {
    pub job_key: JobKey,
    /// Resolves with the terminal state once the process has exited.
    pub completion: oneshot::Receiver<JobState>,
}

pub struct JobRegistry {
    jobs: RwLock<HashMap<JobKey, JobEntry>>,
    launcher: ProcessLauncher,
}

impl JobRegistry {
    pub fn new(config: PipelineConfig, event_bus: Arc<EventBus>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            launcher: ProcessLauncher::new(config, event_bus),
        }
    }

    /// Accept a job and start its process, or return `Conflict` if the key
    /// already holds a live job. No process is spawned on conflict.
    pub async fn submit(self: &Arc<Self>, request: LaunchRequest) -> Result<Accepted, CoreError> {
        {
            let mut jobs = self.jobs.write().await;
            if jobs
                .get(&request.job_key)
                .is_some_and(|job| job.state.is_live())
            {
                tracing::warn!(
                    project_id = %request.job_key,
                    "Rejected duplicate pipeline submission",
                );
                return Err(CoreError::Conflict(
                    "Pipeline already running for this project.".into(),
                ));
            }
            jobs.insert(request.job_key.clone(), JobEntry::queued(&request));
        }

        tracing::info!(
            project_id = %request.job_key,
            plan_id = %request.plan_id,
            uuid = %request.uuid,
            "Pipeline job accepted",
        );

        let (tx, rx) = oneshot::channel();
        let job_key = request.job_key.clone();
        self.launcher.launch(Arc::clone(self), request, tx);

        Ok(Accepted {
            job_key,
            completion: rx,
        })
    }

    /// Current progress of a live job, or `NotFound`.
    pub async fn get_progress(&self, job_key: &str) -> Result<ProgressSnapshot, CoreError> {
        self.jobs
            .read()
            .await
            .get(job_key)
            .map(|job| ProgressSnapshot {
                progress: job.progress,
                state: job.state.clone(),
            })
            .ok_or_else(|| CoreError::NotFound {
                entity: "Pipeline job",
                id: job_key.to_string(),
            })
    }

    /// Full entry for a live job.
    pub async fn get(&self, job_key: &str) -> Option<JobEntry> {
        self.jobs.read().await.get(job_key).cloned()
    }

    /// Number of live (queued or running) jobs.
    pub async fn active_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Cancel every queued and running job. Children are killed.
    pub fn shutdown(&self) {
        self.launcher.cancel_all();
    }

    pub fn launcher(&self) -> &ProcessLauncher {
        &self.launcher
    }

    // -- launcher-side mutations ---------------------------------------------

    pub(crate) async fn mark_running(&self, job_key: &str) {
        if let Some(job) = self.jobs.write().await.get_mut(job_key) {
            job.state = JobState::Running;
            job.started_at = Some(Utc::now());
        }
    }

    /// Overwrite the progress of a live job. The last marker wins; there is
    /// no monotonic clamp. Returns `false` if the job is gone.
    pub(crate) async fn set_progress(&self, job_key: &str, percent: u8) -> bool {
        match self.jobs.write().await.get_mut(job_key) {
            Some(job) => {
                job.progress = percent;
                true
            }
            None => false,
        }
    }

    /// Report the terminal state of a job and remove its entry.
    pub(crate) async fn finish(&self, job_key: &str, state: &JobState) -> Option<JobEntry> {
        match state {
            JobState::Completed => {
                tracing::info!(project_id = %job_key, "Pipeline completed successfully");
            }
            JobState::Failed(reason) => {
                tracing::error!(
                    project_id = %job_key,
                    reason = %reason,
                    "Pipeline execution failed",
                );
            }
            JobState::Queued | JobState::Running => {
                tracing::warn!(
                    project_id = %job_key,
                    state = state.as_str(),
                    "Finishing job in a non-terminal state",
                );
            }
        }
        self.jobs.write().await.remove(job_key)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use hvac_core::pipeline::state::FailureReason;

    use super::*;
    use crate::pipeline::launcher::test_helpers::{config_for_script, request, wait_until};

    fn registry(config: PipelineConfig) -> Arc<JobRegistry> {
        Arc::new(JobRegistry::new(config, Arc::new(EventBus::default())))
    }

    #[test]
    fn queue_wait_spans_submission_to_start() {
        let mut entry = JobEntry::queued(&request("p1"));
        assert_eq!(entry.queue_wait(), None);

        entry.started_at = Some(entry.submitted_at + chrono::Duration::milliseconds(250));
        assert_eq!(entry.queue_wait(), Some(chrono::Duration::milliseconds(250)));
    }

    #[tokio::test]
    async fn unknown_key_is_not_found() {
        let jobs = registry(PipelineConfig::default());
        assert_matches!(
            jobs.get_progress("nope").await,
            Err(CoreError::NotFound { entity: "Pipeline job", id }) if id == "nope"
        );
    }

    #[tokio::test]
    async fn second_submission_while_running_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = registry(config_for_script(dir.path(), "exec sleep 5\n"));

        let first = jobs.submit(request("p2")).await;
        let second = jobs.submit(request("p2")).await;

        assert!(first.is_ok());
        assert_matches!(second, Err(CoreError::Conflict(_)));
        jobs.shutdown();
    }

    #[tokio::test]
    async fn different_projects_run_side_by_side() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = registry(config_for_script(dir.path(), "exec sleep 5\n"));

        jobs.submit(request("a")).await.unwrap();
        jobs.submit(request("b")).await.unwrap();

        assert_eq!(jobs.active_count().await, 2);
        jobs.shutdown();
    }

    #[tokio::test]
    async fn progress_follows_markers_and_entry_is_removed_on_exit() {
        let dir = tempfile::tempdir().unwrap();
        let gate = dir.path().join("gate");
        let script = format!(
            "echo 'OCR Complete'\nwhile [ ! -f '{}' ]; do sleep 0.05; done\nexit 0\n",
            gate.display()
        );
        let jobs = registry(config_for_script(dir.path(), &script));

        let accepted = jobs.submit(request("p1")).await.unwrap();

        let jobs_ref = Arc::clone(&jobs);
        wait_until(|| {
            let jobs = Arc::clone(&jobs_ref);
            async move {
                jobs.get_progress("p1")
                    .await
                    .is_ok_and(|s| s.progress == 25)
            }
        })
        .await;
        let snapshot = jobs.get_progress("p1").await.unwrap();
        assert_eq!(snapshot.state, JobState::Running);

        std::fs::write(&gate, b"go").unwrap();
        let state = tokio::time::timeout(Duration::from_secs(10), accepted.completion)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(state, JobState::Completed);
        assert_matches!(jobs.get_progress("p1").await, Err(CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn last_marker_wins() {
        let dir = tempfile::tempdir().unwrap();
        let gate = dir.path().join("gate");
        let script = format!(
            "echo 'Scale Extraction Complete'\necho 'OCR Complete'\nwhile [ ! -f '{}' ]; do sleep 0.05; done\n",
            gate.display()
        );
        let jobs = registry(config_for_script(dir.path(), &script));

        jobs.submit(request("p3")).await.unwrap();

        let jobs_ref = Arc::clone(&jobs);
        wait_until(|| {
            let jobs = Arc::clone(&jobs_ref);
            async move {
                jobs.get_progress("p3")
                    .await
                    .is_ok_and(|s| s.progress == 25)
            }
        })
        .await;

        std::fs::write(&gate, b"go").unwrap();
    }

    #[tokio::test]
    async fn nonzero_exit_fails_and_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = registry(config_for_script(dir.path(), "echo 'OCR Complete'\nexit 4\n"));

        let accepted = jobs.submit(request("p4")).await.unwrap();
        let state = accepted.completion.await.unwrap();

        assert_eq!(state, JobState::Failed(FailureReason::ExitCode(4)));
        assert!(jobs.get("p4").await.is_none());
    }

    #[tokio::test]
    async fn key_is_free_again_after_exit() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = registry(config_for_script(dir.path(), "exit 0\n"));

        let first = jobs.submit(request("p5")).await.unwrap();
        first.completion.await.unwrap();

        let second = jobs.submit(request("p5")).await.unwrap();
        assert_eq!(second.completion.await.unwrap(), JobState::Completed);
    }

    #[tokio::test]
    async fn deadline_fails_job_with_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for_script(dir.path(), "exec sleep 30\n");
        config.job_timeout_secs = 1;
        let jobs = registry(config);

        let accepted = jobs.submit(request("slow")).await.unwrap();
        let state = tokio::time::timeout(Duration::from_secs(10), accepted.completion)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(state, JobState::Failed(FailureReason::Timeout));
        assert_eq!(jobs.active_count().await, 0);
    }

    #[tokio::test]
    async fn excess_jobs_wait_in_queue() {
        let dir = tempfile::tempdir().unwrap();
        let gate = dir.path().join("gate");
        let script = format!(
            "while [ ! -f '{}' ]; do sleep 0.05; done\n",
            gate.display()
        );
        let mut config = config_for_script(dir.path(), &script);
        config.max_concurrent = 1;
        let jobs = registry(config);

        let first = jobs.submit(request("first")).await.unwrap();

        let jobs_ref = Arc::clone(&jobs);
        wait_until(|| {
            let jobs = Arc::clone(&jobs_ref);
            async move {
                jobs.get_progress("first")
                    .await
                    .is_ok_and(|s| s.state == JobState::Running)
            }
        })
        .await;

        let second = jobs.submit(request("second")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let queued = jobs.get_progress("second").await.unwrap();
        assert_eq!(queued.state, JobState::Queued);
        assert_eq!(queued.progress, 0);

        std::fs::write(&gate, b"go").unwrap();
        assert_eq!(first.completion.await.unwrap(), JobState::Completed);
        assert_eq!(second.completion.await.unwrap(), JobState::Completed);
    }

    #[tokio::test]
    async fn shutdown_cancels_running_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = registry(config_for_script(dir.path(), "exec sleep 30\n"));

        let accepted = jobs.submit(request("p6")).await.unwrap();
        jobs.shutdown();

        let state = tokio::time::timeout(Duration::from_secs(10), accepted.completion)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state, JobState::Failed(FailureReason::Cancelled));
        assert_eq!(jobs.active_count().await, 0);
    }
}
