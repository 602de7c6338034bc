// Recovery policy applied to every decoded status.
use serde::Serialize;
use spoolguard_shared::{ConditionSet, StatusCondition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecoveryAction {
    /// Job finished: release any retention and stop watching.
    Release,
    /// Device reported an error: try to resume the job.
    Resume,
    None,
}

/// Completion wins over error; everything else is left alone.
pub fn decide(conditions: &ConditionSet) -> RecoveryAction {
    if conditions.contains(StatusCondition::Printed) || conditions.contains(StatusCondition::Complete) {
        RecoveryAction::Release
    } else if conditions.contains(StatusCondition::Error) {
        RecoveryAction::Resume
    } else {
        RecoveryAction::None
    }
}
