//! # Job Status Monitor
//!
//! Polls a submitted job, decodes its composite status into a
//! [`ConditionSet`], logs progress and applies the recovery policy:
//!
//! - `Printed` or `Complete`: issue `Release` and finish. A failed release is
//!   fatal, since the job can no longer be controlled.
//! - `Error`: issue `Resume` once for this poll. A failed resume is logged
//!   and polling continues.
//! - anything else: keep polling.
//!
//! [`JobMonitor::run`] repeats this every `poll_interval` until completion,
//! cancellation through the shutdown flag, or the wall-clock budget runs
//! out. Running out of budget is an outcome, not an error. Which failures end
//! the loop is decided by [`SpoolError::is_fatal`].

pub mod control;
pub mod policy;

pub use control::JobController;
pub use policy::{decide, RecoveryAction};

use crate::config::MonitorConfig;
use crate::error::SpoolError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use spoolguard_shared::{ConditionSet, DeviceError, JobId, StatusCondition};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// One decoded status observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub pages_printed: u32,
    pub total_pages: u32,
    pub signal: u32,
    pub conditions: ConditionSet,
    pub observed_at: DateTime<Utc>,
}

impl JobSnapshot {
    pub fn is_retained(&self) -> bool {
        self.conditions.contains(StatusCondition::Retained)
    }
}

/// Result of a single poll-and-act cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStep {
    /// No status was available: unknown job or a failed query.
    Unobserved,
    Observed {
        snapshot: JobSnapshot,
        action: RecoveryAction,
    },
}

impl PollStep {
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            PollStep::Observed {
                action: RecoveryAction::Release,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorOutcome {
    Completed,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorReport {
    pub job_id: JobId,
    pub outcome: MonitorOutcome,
    pub polls: usize,
    pub resume_attempts: u32,
    pub last: Option<JobSnapshot>,
}

#[derive(Debug, Clone)]
pub struct JobMonitor {
    controller: JobController,
    config: MonitorConfig,
    resume_attempts: u32,
}

impl JobMonitor {
    pub fn new(controller: JobController, config: MonitorConfig) -> Self {
        Self {
            controller,
            config,
            resume_attempts: 0,
        }
    }

    pub fn controller(&self) -> &JobController {
        &self.controller
    }

    pub fn resume_attempts(&self) -> u32 {
        self.resume_attempts
    }

    /// Query and decode the job's current status.
    pub async fn poll(&self, job_id: JobId) -> Result<JobSnapshot, SpoolError> {
        let info = self
            .controller
            .queue()
            .get_job(job_id)
            .await
            .map_err(|e| match e {
                DeviceError::NotFound(id) => SpoolError::JobNotFound(id),
                source => SpoolError::StatusQueryFailed { job_id, source },
            })?;
        Ok(JobSnapshot {
            job_id,
            pages_printed: info.pages_printed,
            total_pages: info.total_pages,
            signal: info.status,
            conditions: ConditionSet::decode(info.status),
            observed_at: Utc::now(),
        })
    }

    /// Query job 0, which must never exist. Returns true when the device
    /// answered "not found" as expected.
    pub async fn probe_sentinel(&self) -> bool {
        tracing::info!("check non-existent job {}", JobId::NONE);
        match self.poll(JobId::NONE).await {
            Err(SpoolError::JobNotFound(_)) => {
                tracing::info!("  job {} not found, as expected", JobId::NONE);
                true
            }
            Ok(snapshot) => {
                tracing::warn!("  device reported a job for id 0: {}", snapshot.conditions);
                false
            }
            Err(e) => {
                tracing::warn!("  get job failed: {}", e);
                false
            }
        }
    }

    /// Poll once and apply the recovery policy.
    ///
    /// Non-fatal failures are logged and reported as an unobserved or
    /// observed step; fatal ones are returned.
    pub async fn step(&mut self, job_id: JobId) -> Result<PollStep, SpoolError> {
        let snapshot = match self.poll(job_id).await {
            Ok(snapshot) => snapshot,
            Err(e) if !e.is_fatal() => {
                tracing::info!("  {}", e);
                return Ok(PollStep::Unobserved);
            }
            Err(e) => return Err(e),
        };
        tracing::info!(
            "  printed: {}/{}, status: {}",
            snapshot.pages_printed,
            snapshot.total_pages,
            snapshot.conditions
        );

        let action = decide(&snapshot.conditions);
        let acted = match action {
            RecoveryAction::Release => self.controller.release(job_id).await.map(|()| {
                tracing::info!("detect complete, job {} released", job_id);
            }),
            RecoveryAction::Resume => self.try_resume(job_id).await,
            RecoveryAction::None => Ok(()),
        };
        match acted {
            Ok(()) => Ok(PollStep::Observed { snapshot, action }),
            Err(e) if !e.is_fatal() => {
                tracing::warn!("{}", e);
                Ok(PollStep::Observed { snapshot, action })
            }
            Err(e) => {
                tracing::error!("{}", e);
                Err(e)
            }
        }
    }

    async fn try_resume(&mut self, job_id: JobId) -> Result<(), SpoolError> {
        if let Some(max) = self.config.max_resume_attempts {
            if self.resume_attempts >= max {
                tracing::warn!("detect error, resume limit of {} reached; waiting", max);
                return Ok(());
            }
        }
        self.resume_attempts += 1;
        self.controller.resume(job_id).await?;
        tracing::info!("detect error, resume job");
        Ok(())
    }

    /// Poll until the job completes, the budget runs out, or `shutdown` is
    /// set to `true`.
    ///
    /// Cancellation is observed between polls, including a flag that was
    /// already set before the loop started. Dropping the sender counts as
    /// cancellation. Releasing a retained job after cancellation is left to
    /// the caller.
    pub async fn run(
        &mut self,
        job_id: JobId,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<MonitorReport, SpoolError> {
        let started = Instant::now();
        let budget = self.config.budget();
        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut polls = 0usize;
        let mut last = None;

        tracing::info!(
            "Monitoring job {} every {:?} for up to {:?}",
            job_id,
            self.config.poll_interval(),
            budget
        );
        let outcome = loop {
            tokio::select! {
                biased;
                _ = shutdown.wait_for(|stop| *stop) => {
                    tracing::info!("Monitor for job {} cancelled", job_id);
                    break MonitorOutcome::Cancelled;
                }
                _ = interval.tick() => {}
            }
            if started.elapsed() >= budget {
                tracing::info!("Monitoring of job {} timed out after {} polls", job_id, polls);
                break MonitorOutcome::TimedOut;
            }
            polls += 1;
            let step = self.step(job_id).await?;
            let complete = step.is_complete();
            if let PollStep::Observed { snapshot, .. } = step {
                last = Some(snapshot);
            }
            if complete {
                break MonitorOutcome::Completed;
            }
        };

        Ok(MonitorReport {
            job_id,
            outcome,
            polls,
            resume_attempts: self.resume_attempts,
            last,
        })
    }

    /// Run the monitor on its own task.
    pub fn spawn(
        mut self,
        job_id: JobId,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<Result<MonitorReport, SpoolError>> {
        tokio::spawn(async move { self.run(job_id, shutdown).await })
    }
}
