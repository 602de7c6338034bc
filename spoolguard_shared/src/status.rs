//! Named conditions carried by a job's composite status signal.
//!
//! A device reports job state as a single bit-set in which any number of
//! conditions may hold at once. [`ConditionSet::decode`] turns that word into
//! an ordered collection of [`StatusCondition`]s so call sites never test
//! bits directly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One named condition. Declaration order is the canonical reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatusCondition {
    Paused,
    Error,
    Deleting,
    Spooling,
    Printing,
    Offline,
    PaperOut,
    Printed,
    Deleted,
    BlockedQueue,
    UserIntervention,
    Restart,
    Complete,
    Retained,
    RenderingLocally,
}

impl StatusCondition {
    pub const ALL: [StatusCondition; 15] = [
        StatusCondition::Paused,
        StatusCondition::Error,
        StatusCondition::Deleting,
        StatusCondition::Spooling,
        StatusCondition::Printing,
        StatusCondition::Offline,
        StatusCondition::PaperOut,
        StatusCondition::Printed,
        StatusCondition::Deleted,
        StatusCondition::BlockedQueue,
        StatusCondition::UserIntervention,
        StatusCondition::Restart,
        StatusCondition::Complete,
        StatusCondition::Retained,
        StatusCondition::RenderingLocally,
    ];

    /// Bit pattern of this condition in the composite signal.
    pub const fn mask(self) -> u32 {
        match self {
            StatusCondition::Paused => 0x0001,
            StatusCondition::Error => 0x0002,
            StatusCondition::Deleting => 0x0004,
            StatusCondition::Spooling => 0x0008,
            StatusCondition::Printing => 0x0010,
            StatusCondition::Offline => 0x0020,
            StatusCondition::PaperOut => 0x0040,
            StatusCondition::Printed => 0x0080,
            StatusCondition::Deleted => 0x0100,
            StatusCondition::BlockedQueue => 0x0200,
            StatusCondition::UserIntervention => 0x0400,
            StatusCondition::Restart => 0x0800,
            StatusCondition::Complete => 0x1000,
            StatusCondition::Retained => 0x2000,
            StatusCondition::RenderingLocally => 0x4000,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            StatusCondition::Paused => "PAUSED",
            StatusCondition::Error => "ERROR",
            StatusCondition::Deleting => "DELETING",
            StatusCondition::Spooling => "SPOOLING",
            StatusCondition::Printing => "PRINTING",
            StatusCondition::Offline => "OFFLINE",
            StatusCondition::PaperOut => "PAPEROUT",
            StatusCondition::Printed => "PRINTED",
            StatusCondition::Deleted => "DELETED",
            StatusCondition::BlockedQueue => "BLOCKED_DEVQ",
            StatusCondition::UserIntervention => "USER_INTERVENTION",
            StatusCondition::Restart => "RESTART",
            StatusCondition::Complete => "COMPLETE",
            StatusCondition::Retained => "RETAINED",
            StatusCondition::RenderingLocally => "RENDERING_LOCALLY",
        }
    }

    /// True when `signal` carries every bit of this condition's pattern.
    pub const fn is_set_in(self, signal: u32) -> bool {
        signal & self.mask() == self.mask()
    }
}

impl fmt::Display for StatusCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Every condition active in one status signal, in canonical order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionSet(BTreeSet<StatusCondition>);

impl ConditionSet {
    /// Decode a composite signal. Every condition is tested; unknown bits are ignored.
    pub fn decode(signal: u32) -> Self {
        Self(
            StatusCondition::ALL
                .iter()
                .copied()
                .filter(|condition| condition.is_set_in(signal))
                .collect(),
        )
    }

    pub fn contains(&self, condition: StatusCondition) -> bool {
        self.0.contains(&condition)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = StatusCondition> + '_ {
        self.0.iter().copied()
    }

    /// Re-encode into a signal word.
    pub fn to_signal(&self) -> u32 {
        self.0.iter().fold(0, |acc, condition| acc | condition.mask())
    }
}

impl FromIterator<StatusCondition> for ConditionSet {
    fn from_iter<I: IntoIterator<Item = StatusCondition>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ConditionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, condition) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(condition.name())?;
        }
        f.write_str("]")
    }
}
