// Trait-based seam between the job core and a concrete print spooler.
// Implemented by the simulator and by any OS-backed spooler binding.

use crate::job::{JobControl, JobId, JobInfo};
use crate::target::Target;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("target '{0}' is unreachable")]
    Unreachable(String),
    #[error("job {0} not found")]
    NotFound(JobId),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("handle already closed")]
    Closed,
}

/// Enumerates targets and hands out handles to them.
#[async_trait]
pub trait Spooler: Send + Sync {
    type Port: PrinterPort;

    async fn enumerate(&self) -> Result<Vec<Target>, DeviceError>;

    /// Name of the system default target, if one is configured.
    async fn default_target(&self) -> Result<Option<String>, DeviceError>;

    /// Exclusive handle used to submit one document.
    async fn open(&self, target: &Target) -> Result<Self::Port, DeviceError>;

    /// Shared handle used for status queries and control commands.
    async fn open_queue(&self, target: &Target) -> Result<Arc<dyn JobQueue>, DeviceError>;
}

/// Document submission primitives of an open target.
#[async_trait]
pub trait PrinterPort: Send {
    async fn start_doc(&mut self, name: &str, datatype: &str) -> Result<JobId, DeviceError>;
    async fn start_page(&mut self) -> Result<(), DeviceError>;
    async fn write(&mut self, data: &[u8]) -> Result<usize, DeviceError>;
    async fn end_page(&mut self) -> Result<(), DeviceError>;
    async fn end_doc(&mut self) -> Result<(), DeviceError>;
    /// Release the underlying handle. Synchronous so it can run from `Drop`.
    fn close(&mut self) -> Result<(), DeviceError>;
}

/// Status and control access to jobs on a target's queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn get_job(&self, job_id: JobId) -> Result<JobInfo, DeviceError>;
    async fn set_job_command(&self, job_id: JobId, command: JobControl) -> Result<(), DeviceError>;
}
