use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// How an election's ballots are shaped and counted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionType {
    /// One candidate per ballot (or an abstention); most votes wins.
    Plurality,
    /// Ranked ballots, counted by instant runoff.
    Runoff,
}

impl Display for ElectionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plurality => write!(f, "plurality"),
            Self::Runoff => write!(f, "runoff"),
        }
    }
}
