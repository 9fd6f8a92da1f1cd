//! Counting the ballots of completed elections.
//!
//! Both counting methods are pure functions of the ballots and candidates,
//! so repeated tallies of the same election always agree.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StateError};
use crate::model::{common::election::ElectionType, db::election::Election};
use crate::store::Store;

mod plurality;
mod runoff;

pub use plurality::{tally_plurality, PluralityResult};
pub use runoff::{tally_runoff, Resolution, RoundResult, RunoffResult};

/// Result of counting, by election type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TallyResult {
    Plurality(PluralityResult),
    Runoff(RunoffResult),
}

/// A full tally of one election.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    pub total_ballots: u64,
    pub result: TallyResult,
}

/// Count a completed election.
///
/// Refuses elections that are not completed, so nothing can be learned about
/// results while voting may still happen.
pub async fn tally(store: &dyn Store, election: &Election) -> Result<Tally> {
    if !election.completed {
        return Err(StateError::NotCompleted.into());
    }

    let candidates = store.candidates(election.id).await?;
    let ballots = store.all_ballots(election.id).await?;
    debug!(
        "Tallying election {}: {} ballots, {} candidates",
        election.id,
        ballots.len(),
        candidates.len()
    );

    let result = match election.settings.kind {
        ElectionType::Plurality => TallyResult::Plurality(tally_plurality(&ballots, &candidates)),
        ElectionType::Runoff => TallyResult::Runoff(tally_runoff(&ballots, &candidates)),
    };
    Ok(Tally {
        total_ballots: ballots.len() as u64,
        result,
    })
}
