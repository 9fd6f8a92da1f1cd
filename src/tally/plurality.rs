use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::{
    common::ballot::Choice,
    db::{ballot::Ballot, candidate::Candidate},
    mongodb::{serde_string_map, serde_string_set, Id},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluralityResult {
    /// Votes per candidate, every candidate present.
    #[serde(with = "serde_string_map")]
    pub counts: BTreeMap<Id, u64>,
    pub abstentions: u64,
    /// Every candidate sharing the highest count. Empty only when there are
    /// no candidates.
    #[serde(with = "serde_string_set")]
    pub winners: BTreeSet<Id>,
}

/// Count single-choice ballots.
///
/// Ballots naming something other than a candidate are ignored.
pub fn tally_plurality(ballots: &[Ballot], candidates: &[Candidate]) -> PluralityResult {
    let mut counts = candidates
        .iter()
        .map(|c| (c.id, 0))
        .collect::<BTreeMap<_, u64>>();
    let mut abstentions = 0;

    for ballot in ballots {
        match ballot.choice {
            Choice::Plurality(None) => abstentions += 1,
            Choice::Plurality(Some(id)) => {
                if let Some(count) = counts.get_mut(&id) {
                    *count += 1;
                }
            }
            Choice::Runoff(_) => {}
        }
    }

    let winners = match counts.values().max() {
        Some(&max) => counts
            .iter()
            .filter(|(_, &count)| count == max)
            .map(|(&id, _)| id)
            .collect(),
        None => BTreeSet::new(),
    };

    PluralityResult {
        counts,
        abstentions,
        winners,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tally::tests::{ballots, candidates};

    #[test]
    fn most_votes_wins() {
        let cands = candidates(2);
        let (x, y) = (cands[0].id, cands[1].id);
        let result = tally_plurality(
            &ballots([
                Choice::Plurality(Some(x)),
                Choice::Plurality(Some(x)),
                Choice::Plurality(Some(y)),
            ]),
            &cands,
        );
        assert_eq!(result.counts, BTreeMap::from([(x, 2), (y, 1)]));
        assert_eq!(result.winners, BTreeSet::from([x]));
        assert_eq!(result.abstentions, 0);
    }

    #[test]
    fn zero_counts_and_abstentions_are_reported() {
        let cands = candidates(3);
        let (x, y, z) = (cands[0].id, cands[1].id, cands[2].id);
        let result = tally_plurality(
            &ballots([
                Choice::Plurality(Some(y)),
                Choice::Plurality(None),
                Choice::Plurality(None),
            ]),
            &cands,
        );
        assert_eq!(result.counts, BTreeMap::from([(x, 0), (y, 1), (z, 0)]));
        assert_eq!(result.abstentions, 2);
        assert_eq!(result.winners, BTreeSet::from([y]));
    }

    #[test]
    fn ties_share_the_win() {
        let cands = candidates(3);
        let (x, y) = (cands[0].id, cands[1].id);
        let result = tally_plurality(
            &ballots([Choice::Plurality(Some(x)), Choice::Plurality(Some(y))]),
            &cands,
        );
        assert_eq!(result.winners, BTreeSet::from([x, y]));

        // Nobody voted: everybody ties at zero.
        let result = tally_plurality(&[], &cands);
        assert_eq!(result.winners.len(), 3);

        let result = tally_plurality(&[], &[]);
        assert!(result.winners.is_empty());
    }

    #[test]
    fn ballot_order_does_not_matter() {
        let cands = candidates(3);
        let choices = [0, 1, 2, 0, 0, 2, 1, 0]
            .map(|i| Choice::Plurality(Some(cands[i].id)));
        let forward = tally_plurality(&ballots(choices.clone()), &cands);

        let mut reversed = choices.to_vec();
        reversed.reverse();
        assert_eq!(tally_plurality(&ballots(reversed), &cands), forward);

        let mut rotated = choices.to_vec();
        rotated.rotate_left(3);
        assert_eq!(tally_plurality(&ballots(rotated), &cands), forward);
    }

    #[test]
    fn unknown_candidates_are_ignored() {
        let cands = candidates(1);
        let result = tally_plurality(&ballots([Choice::Plurality(Some(Id::new()))]), &cands);
        assert_eq!(result.counts[&cands[0].id], 0);
        assert_eq!(result.abstentions, 0);
    }
}
