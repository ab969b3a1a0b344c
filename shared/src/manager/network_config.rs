use serde::{Deserialize, Serialize};

/// Contains Config properties which will be used by a `NetworkContext`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// When the server denies a variable write it answers the offending
    /// client with the authoritative value, undoing the client's optimistic
    /// local write. Otherwise the denial is silent.
    pub rollback_rejected_writes: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rollback_rejected_writes: false,
        }
    }
}
