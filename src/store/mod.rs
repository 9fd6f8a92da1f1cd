//! Persistence for elections, candidates, vote records and ballots.
//!
//! Two rules are enforced here, at the storage boundary, rather than by
//! callers:
//!
//! - A user has at most one vote record per election. The storage backend
//!   arbitrates concurrent attempts; no application-side lock is relied upon.
//! - A vote record and its ballot are written together or not at all, and
//!   nothing links one to the other.
//! - Neither is written once the election is completed, so the ballots of a
//!   completed election never change.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{
    common::ballot::{Choice, VoteToken},
    db::{
        ballot::Ballot,
        candidate::Candidate,
        election::{Election, ElectionSettings, NewElection},
    },
    mongodb::Id,
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Result of trying to record a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The vote record and the ballot were both written.
    Recorded,
    /// A vote record already exists for this user and election. Nothing was written.
    AlreadyVoted,
    /// The token is already in use by another ballot. Nothing was written;
    /// try again with a fresh token.
    TokenCollision,
    /// The election is missing or was completed before the write. Nothing
    /// was written.
    NotOpen,
}

/// Election and candidate configuration.
#[rocket::async_trait]
pub trait ElectionStore: Send + Sync {
    /// Persist a new election and its candidates, in order.
    /// Fails with a conflict if the url is taken.
    async fn create_election(
        &self,
        election: NewElection,
        candidates: Vec<String>,
    ) -> Result<(Election, Vec<Candidate>)>;

    async fn election_by_id(&self, id: Id) -> Result<Option<Election>>;

    async fn election_by_url(&self, url: &str) -> Result<Option<Election>>;

    /// Elections in creation order. With `completed` given, only those whose
    /// flag matches.
    async fn elections(&self, completed: Option<bool>) -> Result<Vec<Election>>;

    async fn candidate_by_id(&self, id: Id) -> Result<Option<Candidate>>;

    /// Candidates of an election, in their stored order.
    async fn candidates(&self, election_id: Id) -> Result<Vec<Candidate>>;

    /// Overwrite the admin-editable settings, leaving `completed` alone.
    /// Fails with a conflict if another election has the new url.
    async fn update_settings(&self, id: Id, settings: &ElectionSettings) -> Result<Election>;

    async fn set_completed(&self, id: Id, completed: bool) -> Result<Election>;
}

/// Vote records and anonymous ballots.
#[rocket::async_trait]
pub trait BallotStore: Send + Sync {
    /// A fresh vote token. Collisions are detected on insert, not here.
    fn generate_token(&self) -> VoteToken {
        VoteToken::generate()
    }

    /// Atomically insert the vote record for `(user_id, election_id)` and a
    /// ballot with the given token and choice, provided the election exists
    /// and is not completed at the time of the write.
    async fn record_vote(
        &self,
        user_id: Id,
        election_id: Id,
        token: &VoteToken,
        choice: &Choice,
    ) -> Result<RecordOutcome>;

    async fn has_voted(&self, user_id: Id, election_id: Id) -> Result<bool>;

    /// Look a ballot up by token, regardless of election state.
    /// Callers wanting to disclose a ballot should use [`BallotStore::get_ballot`].
    async fn ballot_by_token(&self, token: &VoteToken) -> Result<Option<Ballot>>;

    /// Every ballot of an election, ordered by token.
    async fn all_ballots(&self, election_id: Id) -> Result<Vec<Ballot>>;

    async fn ballot_count(&self, election_id: Id) -> Result<u64>;

    /// Disclose a ballot. Ballots of elections that are not completed are
    /// never found, so nothing about in-progress results can be learned.
    async fn get_ballot(&self, token: &VoteToken, election: &Election) -> Result<Ballot> {
        let not_found = || Error::not_found(format!("Ballot in election {}", election.id));
        if !election.completed {
            return Err(not_found());
        }
        match self.ballot_by_token(token).await? {
            Some(ballot) if ballot.election_id == election.id => Ok(ballot),
            _ => Err(not_found()),
        }
    }
}

/// Everything the application needs from storage.
pub trait Store: ElectionStore + BallotStore {}

impl<T> Store for T where T: ElectionStore + BallotStore {}

/// The store as managed by Rocket.
pub type SharedStore = Arc<dyn Store>;
