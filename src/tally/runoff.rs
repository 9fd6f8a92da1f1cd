use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::{
    common::ballot::Choice,
    db::{ballot::Ballot, candidate::Candidate},
    mongodb::{serde_string_map, serde_string_set, Id},
};

/// How the count ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// A candidate held more than half of the active ballots.
    Majority,
    /// Everybody else was eliminated.
    Exhaustion,
    /// Every remaining candidate tied; they all win.
    Tie,
    /// There was nobody to elect.
    NoCandidates,
}

/// One counting round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    /// First active preferences, per remaining candidate.
    #[serde(with = "serde_string_map")]
    pub counts: BTreeMap<Id, u64>,
    /// Ballots with no remaining candidate ranked. Excluded from the majority threshold.
    pub exhausted: u64,
    /// Candidates eliminated at the end of this round.
    #[serde(with = "serde_string_set")]
    pub eliminated: BTreeSet<Id>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunoffResult {
    pub rounds: Vec<RoundResult>,
    #[serde(with = "serde_string_set")]
    pub winners: BTreeSet<Id>,
    pub resolution: Resolution,
}

/// Count ranked ballots by instant runoff.
///
/// Each round, every ballot counts for its highest-ranked remaining
/// candidate. A candidate with a strict majority of the active ballots wins.
/// Otherwise all candidates on the lowest count are eliminated together,
/// unless that would eliminate everybody, in which case the remaining
/// candidates share the win.
pub fn tally_runoff(ballots: &[Ballot], candidates: &[Candidate]) -> RunoffResult {
    let mut remaining = candidates.iter().map(|c| c.id).collect::<BTreeSet<_>>();
    let mut rounds = Vec::new();

    if remaining.is_empty() {
        return RunoffResult {
            rounds,
            winners: BTreeSet::new(),
            resolution: Resolution::NoCandidates,
        };
    }

    loop {
        let mut counts = remaining
            .iter()
            .map(|&id| (id, 0))
            .collect::<BTreeMap<_, u64>>();
        let mut exhausted = 0;
        for ballot in ballots {
            match top_preference(&ballot.choice, &remaining) {
                Some(id) => *counts.entry(id).or_default() += 1,
                None => exhausted += 1,
            }
        }
        let active = ballots.len() as u64 - exhausted;

        let majority = counts
            .iter()
            .find(|(_, &count)| 2 * count > active)
            .map(|(&id, _)| id);
        if let Some(winner) = majority {
            return finish(rounds, counts, exhausted, [winner], Resolution::Majority);
        }

        if remaining.len() == 1 {
            let winners = remaining.clone();
            return finish(rounds, counts, exhausted, winners, Resolution::Exhaustion);
        }

        // `counts` covers `remaining`, which is not empty.
        let min = counts.values().copied().min().unwrap_or_default();
        let lowest = counts
            .iter()
            .filter(|(_, &count)| count == min)
            .map(|(&id, _)| id)
            .collect::<BTreeSet<_>>();

        if lowest.len() == remaining.len() {
            return finish(rounds, counts, exhausted, lowest, Resolution::Tie);
        }

        remaining.retain(|id| !lowest.contains(id));
        rounds.push(RoundResult {
            counts,
            exhausted,
            eliminated: lowest,
        });
    }
}

fn finish(
    mut rounds: Vec<RoundResult>,
    counts: BTreeMap<Id, u64>,
    exhausted: u64,
    winners: impl IntoIterator<Item = Id>,
    resolution: Resolution,
) -> RunoffResult {
    rounds.push(RoundResult {
        counts,
        exhausted,
        eliminated: BTreeSet::new(),
    });
    RunoffResult {
        rounds,
        winners: winners.into_iter().collect(),
        resolution,
    }
}

/// The highest-ranked candidate on this ballot that is still in the count.
fn top_preference(choice: &Choice, remaining: &BTreeSet<Id>) -> Option<Id> {
    let ranking = match choice {
        Choice::Runoff(ranking) => ranking.as_slice(),
        Choice::Plurality(choice) => choice.as_ref().map_or(&[][..], std::slice::from_ref),
    };
    ranking.iter().copied().find(|id| remaining.contains(id))
}
