use serde::{Deserialize, Serialize};
use std::fmt;

/// An addressable output device as reported by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    /// Attached to this machine rather than shared over the network.
    pub local: bool,
    /// Reachable at enumeration time.
    pub online: bool,
}

impl Target {
    pub fn new(name: impl Into<String>, local: bool, online: bool) -> Self {
        Self {
            name: name.into(),
            local,
            online,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t(local={}, online={})", self.name, self.local, self.online)
    }
}
