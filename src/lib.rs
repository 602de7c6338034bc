//! spoolguard: submit print jobs through an ordered document session and
//! supervise them to completion from the device's reported status.

pub mod config;
pub mod error;
pub mod monitor;
pub mod print_job;
pub mod session;

pub use config::{load_config, Config, ConfigError};
pub use error::SpoolError;
pub use monitor::{JobController, JobMonitor, JobSnapshot, MonitorOutcome, MonitorReport, PollStep, RecoveryAction};
pub use print_job::{select_target, JobReport, PrintJobRunner, PrintRequest};
pub use session::{DocumentSession, SessionOptions, SessionState};

pub use spoolguard_shared::{
    ConditionSet, DeviceError, JobControl, JobId, JobInfo, JobQueue, PrinterPort, Spooler,
    StatusCondition, Target,
};
