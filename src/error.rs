// src/error.rs - failure taxonomy shared by the session, monitor and runner
use crate::session::SessionState;
use spoolguard_shared::{DeviceError, JobControl, JobId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpoolError {
    #[error("target '{target}' unavailable: {source}")]
    TargetUnavailable {
        target: String,
        #[source]
        source: DeviceError,
    },
    #[error("job submission for '{document}' failed: {source}")]
    JobSubmissionFailed {
        document: String,
        #[source]
        source: DeviceError,
    },
    #[error("invalid session state: cannot {operation} while {state}")]
    InvalidSessionState {
        operation: &'static str,
        state: SessionState,
    },
    #[error("job {0} not found")]
    JobNotFound(JobId),
    #[error("status query for job {job_id} failed: {source}")]
    StatusQueryFailed {
        job_id: JobId,
        #[source]
        source: DeviceError,
    },
    #[error("{command} of job {job_id} failed: {source}")]
    ControlCommandFailed {
        job_id: JobId,
        command: JobControl,
        #[source]
        source: DeviceError,
    },
    #[error("{operation} failed: {source}")]
    Device {
        operation: &'static str,
        #[source]
        source: DeviceError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("monitor task failed: {0}")]
    MonitorTask(#[from] tokio::task::JoinError),
}

impl SpoolError {
    /// Whether a monitor that hit this error must stop.
    ///
    /// Missing jobs, failed status queries and failed resumes are
    /// observations; everything else, including a failed release after
    /// completion, ends the run.
    pub fn is_fatal(&self) -> bool {
        match self {
            SpoolError::JobNotFound(_) | SpoolError::StatusQueryFailed { .. } => false,
            SpoolError::ControlCommandFailed { command, .. } => *command != JobControl::Resume,
            _ => true,
        }
    }

    pub(crate) fn device(operation: &'static str) -> impl FnOnce(DeviceError) -> SpoolError {
        move |source| SpoolError::Device { operation, source }
    }
}
