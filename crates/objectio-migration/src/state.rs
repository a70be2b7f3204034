//! Migration job state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `Idle -> Scanning -> Migrating -> (Complete | Failed)`, with `Failed`
/// resumable back into `Scanning` once an operator repairs the
/// underlying condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationState {
    Idle,
    Scanning,
    Migrating,
    Complete,
    Failed,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Migrating => "migrating",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(MigrationState::Scanning.to_string(), "scanning");
    }
}
