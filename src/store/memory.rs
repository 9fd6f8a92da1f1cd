use std::collections::{BTreeMap, HashMap, HashSet};

use rocket::tokio::sync::Mutex;

use crate::error::{ConflictError, Error, Result};
use crate::model::{
    common::ballot::{Choice, VoteToken},
    db::{
        ballot::Ballot,
        candidate::Candidate,
        election::{Election, ElectionSettings, NewElection},
        vote_record::VoteRecordKey,
    },
    mongodb::Id,
};

use super::{BallotStore, ElectionStore, RecordOutcome};

/// A single-process store.
///
/// Every operation runs under one lock, which makes this store's own
/// uniqueness checks and dual writes atomic. Suitable for a single instance
/// and for tests; several instances must share a [`super::MongoStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    elections: BTreeMap<Id, Election>,
    /// Keyed by ID, so iteration follows creation order like the database.
    candidates: BTreeMap<Id, Candidate>,
    vote_records: HashSet<VoteRecordKey>,
    ballots: HashMap<VoteToken, Ballot>,
}

impl Tables {
    fn url_taken(&self, url: &str, except: Option<Id>) -> bool {
        self.elections
            .values()
            .any(|e| e.settings.url == url && Some(e.id) != except)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rocket::async_trait]
impl ElectionStore for MemoryStore {
    async fn create_election(
        &self,
        election: NewElection,
        candidates: Vec<String>,
    ) -> Result<(Election, Vec<Candidate>)> {
        let mut tables = self.tables.lock().await;
        if tables.url_taken(&election.settings.url, None) {
            return Err(ConflictError::DuplicateUrl(election.settings.url).into());
        }
        let election = Election::new(election);
        let candidates = candidates
            .into_iter()
            .map(|name| Candidate::new(election.id, name))
            .collect::<Vec<_>>();
        for candidate in &candidates {
            tables.candidates.insert(candidate.id, candidate.clone());
        }
        tables.elections.insert(election.id, election.clone());
        Ok((election, candidates))
    }

    async fn election_by_id(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.tables.lock().await.elections.get(&id).cloned())
    }

    async fn election_by_url(&self, url: &str) -> Result<Option<Election>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .elections
            .values()
            .find(|e| e.settings.url == url)
            .cloned())
    }

    async fn elections(&self, completed: Option<bool>) -> Result<Vec<Election>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .elections
            .values()
            .filter(|e| completed.map_or(true, |completed| e.completed == completed))
            .cloned()
            .collect())
    }

    async fn candidate_by_id(&self, id: Id) -> Result<Option<Candidate>> {
        Ok(self.tables.lock().await.candidates.get(&id).cloned())
    }

    async fn candidates(&self, election_id: Id) -> Result<Vec<Candidate>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .candidates
            .values()
            .filter(|c| c.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn update_settings(&self, id: Id, settings: &ElectionSettings) -> Result<Election> {
        let mut tables = self.tables.lock().await;
        if !tables.elections.contains_key(&id) {
            return Err(Error::not_found(format!("Election {}", id)));
        }
        if tables.url_taken(&settings.url, Some(id)) {
            return Err(ConflictError::DuplicateUrl(settings.url.clone()).into());
        }
        let election = tables
            .elections
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("Election {}", id)))?;
        election.settings = settings.clone();
        Ok(election.clone())
    }

    async fn set_completed(&self, id: Id, completed: bool) -> Result<Election> {
        let mut tables = self.tables.lock().await;
        let election = tables
            .elections
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("Election {}", id)))?;
        election.completed = completed;
        Ok(election.clone())
    }
}

#[rocket::async_trait]
impl BallotStore for MemoryStore {
    async fn record_vote(
        &self,
        user_id: Id,
        election_id: Id,
        token: &VoteToken,
        choice: &Choice,
    ) -> Result<RecordOutcome> {
        let key = VoteRecordKey {
            user_id,
            election_id,
        };
        let mut tables = self.tables.lock().await;
        match tables.elections.get(&election_id) {
            Some(election) if !election.completed => {}
            _ => return Ok(RecordOutcome::NotOpen),
        }
        if tables.vote_records.contains(&key) {
            return Ok(RecordOutcome::AlreadyVoted);
        }
        if tables.ballots.contains_key(token) {
            return Ok(RecordOutcome::TokenCollision);
        }
        tables.vote_records.insert(key);
        tables.ballots.insert(
            token.clone(),
            Ballot {
                token: token.clone(),
                election_id,
                choice: choice.clone(),
            },
        );
        Ok(RecordOutcome::Recorded)
    }

    async fn has_voted(&self, user_id: Id, election_id: Id) -> Result<bool> {
        let key = VoteRecordKey {
            user_id,
            election_id,
        };
        Ok(self.tables.lock().await.vote_records.contains(&key))
    }

    async fn ballot_by_token(&self, token: &VoteToken) -> Result<Option<Ballot>> {
        Ok(self.tables.lock().await.ballots.get(token).cloned())
    }

    async fn all_ballots(&self, election_id: Id) -> Result<Vec<Ballot>> {
        let tables = self.tables.lock().await;
        let mut ballots = tables
            .ballots
            .values()
            .filter(|b| b.election_id == election_id)
            .cloned()
            .collect::<Vec<_>>();
        ballots.sort_by(|a, b| a.token.cmp(&b.token));
        Ok(ballots)
    }

    async fn ballot_count(&self, election_id: Id) -> Result<u64> {
        let tables = self.tables.lock().await;
        let count = tables
            .ballots
            .values()
            .filter(|b| b.election_id == election_id)
            .count();
        Ok(count as u64)
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Number of vote records for an election. Test-only: counts records
    /// without ever looking at ballots.
    pub async fn vote_record_count(&self, election_id: Id) -> usize {
        self.tables
            .lock()
            .await
            .vote_records
            .iter()
            .filter(|key| key.election_id == election_id)
            .count()
    }
}
