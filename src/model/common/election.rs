use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// States in the Election lifecycle, derived at read time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionStatus {
    /// Not yet activated, or activated ahead of its start time.
    Scheduled,
    /// Activated and within its voting window. Ballots are accepted.
    Open,
    /// Explicitly closed, deactivated, or past its end time. Terminal.
    Closed,
}

impl Display for ElectionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Scheduled => "scheduled",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        write!(f, "{name}")
    }
}
