use serde::{Deserialize, Serialize};
use std::fmt;

/// Datatype marker submitted with every document.
pub const RAW_DATATYPE: &str = "RAW";

/// Device-assigned job identifier. `0` is reserved for "no job".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u32);

impl JobId {
    pub const NONE: JobId = JobId(0);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw record returned by a job status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub job_id: JobId,
    pub pages_printed: u32,
    /// Zero when the device does not know the page count.
    pub total_pages: u32,
    /// Composite status signal.
    pub status: u32,
}

/// Control commands accepted by the device queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobControl {
    Pause,
    Resume,
    Cancel,
    Restart,
    Delete,
    Retain,
    Release,
}

impl fmt::Display for JobControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobControl::Pause => "pause",
            JobControl::Resume => "resume",
            JobControl::Cancel => "cancel",
            JobControl::Restart => "restart",
            JobControl::Delete => "delete",
            JobControl::Retain => "retain",
            JobControl::Release => "release",
        };
        f.write_str(name)
    }
}
