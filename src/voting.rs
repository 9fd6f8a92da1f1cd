use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::eligibility::is_eligible;
use crate::error::{ConflictError, Error, Result, StateError, StorageError};
use crate::events::{ElectionEvent, EventBus};
use crate::lifecycle::is_open;
use crate::model::{
    common::{
        ballot::{Choice, VoteToken},
        identity::Identity,
    },
    db::{candidate::Candidate, election::Election},
};
use crate::store::{RecordOutcome, Store};

/// Default bound on token regeneration after collisions.
pub const DEFAULT_MAX_TOKEN_ATTEMPTS: u32 = 5;

/// Casts votes.
///
/// The only place where a vote record and a ballot come into being. Nothing
/// about the identity survives in the ballot, and the returned token is not
/// kept or logged.
pub struct VoteCaster<'a> {
    store: &'a dyn Store,
    events: Option<&'a EventBus>,
    max_token_attempts: u32,
}

impl<'a> VoteCaster<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self {
            store,
            events: None,
            max_token_attempts: DEFAULT_MAX_TOKEN_ATTEMPTS,
        }
    }

    /// Publish [`ElectionEvent::VoteCast`] after every recorded vote.
    pub fn with_events(mut self, events: &'a EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_max_token_attempts(mut self, attempts: u32) -> Self {
        self.max_token_attempts = attempts.max(1);
        self
    }

    /// Record `identity`'s vote in `election` and return the ballot's token.
    ///
    /// Checks run in order: eligibility, the election being open at `now`,
    /// not having voted, and the choice fitting the election. On any failure
    /// nothing is written.
    pub async fn cast_vote(
        &self,
        identity: &Identity,
        election: &Election,
        candidates: &[Candidate],
        now: DateTime<Utc>,
        choice: Choice,
    ) -> Result<VoteToken> {
        if !is_eligible(identity, election) {
            return Err(Error::NotEligible(format!(
                "Not eligible to vote in election {}",
                election.id
            )));
        }
        if !is_open(election, now) {
            return Err(StateError::ElectionNotOpen.into());
        }
        // Fast path only; the store arbitrates races below.
        if self.store.has_voted(identity.id, election.id).await? {
            return Err(ConflictError::AlreadyVoted.into());
        }
        let candidate_ids = candidates.iter().map(|c| c.id).collect::<BTreeSet<_>>();
        choice.validate(election.settings.kind, &candidate_ids)?;

        for attempt in 1..=self.max_token_attempts {
            let token = self.store.generate_token();
            match self
                .store
                .record_vote(identity.id, election.id, &token, &choice)
                .await?
            {
                RecordOutcome::Recorded => {
                    info!("Recorded a vote in election {}", election.id);
                    if let Some(events) = self.events {
                        events.publish(ElectionEvent::VoteCast {
                            election_id: election.id,
                        });
                    }
                    return Ok(token);
                }
                RecordOutcome::AlreadyVoted => return Err(ConflictError::AlreadyVoted.into()),
                // Completed after `election` was read.
                RecordOutcome::NotOpen => return Err(StateError::ElectionNotOpen.into()),
                RecordOutcome::TokenCollision => {
                    warn!("Vote token collision (attempt {attempt}), regenerating");
                }
            }
        }

        error!(
            "No unused vote token after {} attempts in election {}",
            self.max_token_attempts, election.id
        );
        Err(StorageError::TokenSpaceExhausted(self.max_token_attempts).into())
    }
}
