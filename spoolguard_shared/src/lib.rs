// spoolguard_shared: device-facing types and traits shared by the host and the simulator

pub mod device;
pub mod job;
pub mod status;
pub mod target;

pub use device::{DeviceError, JobQueue, PrinterPort, Spooler};
pub use job::{JobControl, JobId, JobInfo, RAW_DATATYPE};
pub use status::{ConditionSet, StatusCondition};
pub use target::Target;
