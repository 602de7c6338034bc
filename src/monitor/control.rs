// Serialized control-command channel for submitted jobs.
use crate::error::SpoolError;
use spoolguard_shared::{JobControl, JobId, JobQueue};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Issues retain/release/resume commands one at a time.
///
/// Clones share the same lock, so every holder of a clone is serialized
/// against every other holder.
#[derive(Clone)]
pub struct JobController {
    queue: Arc<dyn JobQueue>,
    command_lock: Arc<Mutex<()>>,
}

impl JobController {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self {
            queue,
            command_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    pub async fn send(&self, job_id: JobId, command: JobControl) -> Result<(), SpoolError> {
        let _guard = self.command_lock.lock().await;
        tracing::debug!("=> SetJob {} {}", job_id, command);
        self.queue
            .set_job_command(job_id, command)
            .await
            .map_err(|source| SpoolError::ControlCommandFailed {
                job_id,
                command,
                source,
            })
    }

    pub async fn retain(&self, job_id: JobId) -> Result<(), SpoolError> {
        self.send(job_id, JobControl::Retain).await
    }

    pub async fn release(&self, job_id: JobId) -> Result<(), SpoolError> {
        self.send(job_id, JobControl::Release).await
    }

    pub async fn resume(&self, job_id: JobId) -> Result<(), SpoolError> {
        self.send(job_id, JobControl::Resume).await
    }

    /// Hold a freshly submitted job for supervised release.
    ///
    /// When the retain is refused the job is released best-effort and the
    /// retain failure is returned: an unretained job may already be printing.
    pub async fn hold(&self, job_id: JobId) -> Result<(), SpoolError> {
        match self.retain(job_id).await {
            Ok(()) => {
                tracing::info!(">>> job {} retained", job_id);
                Ok(())
            }
            Err(retain_err) => {
                tracing::error!("Retain job failed: {}", retain_err);
                if let Err(release_err) = self.release(job_id).await {
                    tracing::warn!("Best-effort release after failed retain also failed: {}", release_err);
                }
                Err(retain_err)
            }
        }
    }
}

impl std::fmt::Debug for JobController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobController").finish_non_exhaustive()
    }
}
