use serde::{Deserialize, Serialize};

use crate::model::api::id::ApiId;
use crate::tally::{Tally, TallyResult};

/// Results of a completed election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub election_id: ApiId,
    /// Turnout: every ballot cast, abstentions included.
    pub total_ballots: u64,
    pub tally: TallyResult,
}

impl ElectionResults {
    pub fn new(election_id: impl Into<ApiId>, tally: Tally) -> Self {
        Self {
            election_id: election_id.into(),
            total_ballots: tally.total_ballots,
            tally: tally.result,
        }
    }
}
