use std::time::Duration;

use mongodb::{
    bson::{doc, to_bson, to_document},
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument, SessionOptions},
    Client, ClientSession, Database,
};
use rand::Rng;
use rocket::tokio::time::sleep;

use crate::error::{ConflictError, Error, Result, StorageError};
use crate::model::{
    common::ballot::{Choice, VoteToken},
    db::{
        ballot::Ballot,
        candidate::Candidate,
        election::{Election, ElectionSettings, NewElection},
        vote_record::{VoteRecord, VoteRecordKey},
    },
    mongodb::{
        ensure_indexes_exist, is_duplicate_key_error, is_transient_transaction_error,
        is_unknown_commit_result, Coll, Id,
    },
};

use super::{BallotStore, ElectionStore, RecordOutcome};

/// How many times a transaction is attempted before giving up.
const MAX_TRANSACTION_ATTEMPTS: u32 = 5;

/// Votes in one election all write to its document, so they conflict with
/// each other far more often than other transactions do.
const MAX_VOTE_ATTEMPTS: u32 = 16;

/// Base delay between transaction attempts; grows linearly.
const TRANSACTION_BACKOFF: Duration = Duration::from_millis(20);

/// A store backed by a MongoDB replica set.
///
/// Vote records use their `(user_id, election_id)` key as `_id`, and ballots
/// their token, so both uniqueness rules are enforced by the primary key
/// index and hold across any number of application instances.
#[derive(Debug, Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Connect and make sure collections and indexes exist.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        Self::from_client(client, db_name).await
    }

    pub async fn from_client(client: Client, db_name: &str) -> Result<Self> {
        let db = client.database(db_name);
        ensure_indexes_exist(&db).await?;
        Ok(Self { client, db })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn election_coll(&self) -> Coll<Election> {
        Coll::from_db(&self.db)
    }

    fn candidate_coll(&self) -> Coll<Candidate> {
        Coll::from_db(&self.db)
    }

    fn ballots(&self) -> Coll<Ballot> {
        Coll::from_db(&self.db)
    }

    fn vote_records(&self) -> Coll<VoteRecord> {
        Coll::from_db(&self.db)
    }

    /// One attempt at writing a vote record and its ballot together.
    async fn try_record_vote(
        &self,
        record: &VoteRecord,
        ballot: &Ballot,
    ) -> std::result::Result<RecordOutcome, DbError> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        // Writing to the election makes a concurrent completion conflict with
        // this transaction, so no ballot can commit after it.
        let mut open_filter = ballot.election_id.as_doc();
        open_filter.insert("completed", false);
        let gate = self
            .election_coll()
            .update_one_with_session(
                open_filter,
                doc! { "$inc": { "votes_recorded": 1_i64 } },
                None,
                &mut session,
            )
            .await;
        match gate {
            Ok(result) if result.matched_count == 0 => {
                let _ = session.abort_transaction().await;
                return Ok(RecordOutcome::NotOpen);
            }
            Ok(_) => {}
            Err(err) => {
                let _ = session.abort_transaction().await;
                return Err(err);
            }
        }

        if let Err(err) = self
            .vote_records()
            .insert_one_with_session(record, None, &mut session)
            .await
        {
            let _ = session.abort_transaction().await;
            return if is_duplicate_key_error(&err) {
                Ok(RecordOutcome::AlreadyVoted)
            } else {
                Err(err)
            };
        }

        if let Err(err) = self
            .ballots()
            .insert_one_with_session(ballot, None, &mut session)
            .await
        {
            let _ = session.abort_transaction().await;
            return if is_duplicate_key_error(&err) {
                Ok(RecordOutcome::TokenCollision)
            } else {
                Err(err)
            };
        }

        commit_with_retry(&mut session).await?;
        Ok(RecordOutcome::Recorded)
    }

    async fn try_create_election(
        &self,
        election: &Election,
        candidates: &[Candidate],
    ) -> std::result::Result<(), DbError> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        if let Err(err) = self
            .election_coll()
            .insert_one_with_session(election, None, &mut session)
            .await
        {
            let _ = session.abort_transaction().await;
            return Err(err);
        }
        if !candidates.is_empty() {
            if let Err(err) = self
                .candidate_coll()
                .insert_many_with_session(candidates, None, &mut session)
                .await
            {
                let _ = session.abort_transaction().await;
                return Err(err);
            }
        }

        commit_with_retry(&mut session).await
    }
}

/// Commit, retrying for as long as the server cannot tell whether the
/// previous commit attempt took effect. Committing twice is harmless.
async fn commit_with_retry(session: &mut ClientSession) -> std::result::Result<(), DbError> {
    let mut attempt = 1;
    loop {
        match session.commit_transaction().await {
            Err(err) if is_unknown_commit_result(&err) && attempt < MAX_TRANSACTION_ATTEMPTS => {
                debug!("Commit outcome unknown, retrying commit (attempt {attempt})");
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Errors the caller can do nothing about except try again later.
fn storage_error(err: DbError) -> Error {
    if is_transient_transaction_error(&err) {
        StorageError::Unavailable(err.to_string()).into()
    } else {
        err.into()
    }
}

fn vote_record_filter(key: &VoteRecordKey) -> Result<mongodb::bson::Document> {
    // Embedded documents compare field by field in order, so build the
    // filter from the same serialization used on insert.
    let key = to_bson(key).map_err(DbError::from)?;
    Ok(doc! { "_id": key })
}

#[rocket::async_trait]
impl ElectionStore for MongoStore {
    async fn create_election(
        &self,
        election: NewElection,
        candidates: Vec<String>,
    ) -> Result<(Election, Vec<Candidate>)> {
        let election = Election::new(election);
        let candidates = candidates
            .into_iter()
            .map(|name| Candidate::new(election.id, name))
            .collect::<Vec<_>>();

        match self.try_create_election(&election, &candidates).await {
            Ok(()) => {}
            Err(err) if is_duplicate_key_error(&err) => {
                return Err(ConflictError::DuplicateUrl(election.settings.url.clone()).into())
            }
            Err(err) => return Err(storage_error(err)),
        }

        debug!("Created election {} with {} candidates", election.id, candidates.len());
        Ok((election, candidates))
    }

    async fn election_by_id(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.election_coll().find_one(id.as_doc(), None).await?)
    }

    async fn election_by_url(&self, url: &str) -> Result<Option<Election>> {
        Ok(self.election_coll().find_one(Election::url_filter(url), None).await?)
    }

    async fn candidates(&self, election_id: Id) -> Result<Vec<Candidate>> {
        // IDs are generated in insertion order.
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let mut cursor = self
            .candidate_coll()
            .find(Election::children_filter(election_id), options)
            .await?;
        let mut candidates = Vec::new();
        while cursor.advance().await? {
            candidates.push(cursor.deserialize_current()?);
        }
        Ok(candidates)
    }

    async fn elections(&self, completed: Option<bool>) -> Result<Vec<Election>> {
        let filter = completed.map(|completed| doc! { "completed": completed });
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let mut cursor = self.election_coll().find(filter, options).await?;
        let mut elections = Vec::new();
        while cursor.advance().await? {
            elections.push(cursor.deserialize_current()?);
        }
        Ok(elections)
    }

    async fn candidate_by_id(&self, id: Id) -> Result<Option<Candidate>> {
        Ok(self.candidate_coll().find_one(id.as_doc(), None).await?)
    }

    async fn update_settings(&self, id: Id, settings: &ElectionSettings) -> Result<Election> {
        // Only the settings fields are written, so a concurrent completion
        // is never undone by an edit.
        let update = doc! { "$set": to_document(settings).map_err(DbError::from)? };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        match self
            .election_coll()
            .find_one_and_update(id.as_doc(), update, options)
            .await
        {
            Ok(Some(election)) => Ok(election),
            Ok(None) => Err(Error::not_found(format!("Election {}", id))),
            Err(err) if is_duplicate_key_error(&err) => {
                Err(ConflictError::DuplicateUrl(settings.url.clone()).into())
            }
            Err(err) => Err(storage_error(err)),
        }
    }

    async fn set_completed(&self, id: Id, completed: bool) -> Result<Election> {
        let update = doc! { "$set": { "completed": completed } };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.election_coll()
            .find_one_and_update(id.as_doc(), update, options)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| Error::not_found(format!("Election {}", id)))
    }
}

#[rocket::async_trait]
impl BallotStore for MongoStore {
    async fn record_vote(
        &self,
        user_id: Id,
        election_id: Id,
        token: &VoteToken,
        choice: &Choice,
    ) -> Result<RecordOutcome> {
        let record = VoteRecord::new(user_id, election_id);
        let ballot = Ballot {
            token: token.clone(),
            election_id,
            choice: choice.clone(),
        };

        let mut attempt = 1;
        loop {
            match self.try_record_vote(&record, &ballot).await {
                // Typically a write conflict with a concurrent vote or a
                // completion. The retry sees whichever committed first.
                Err(err) if is_transient_transaction_error(&err) => {
                    if attempt >= MAX_VOTE_ATTEMPTS {
                        warn!("Giving up recording vote in election {election_id} after {attempt} attempts");
                        return Err(StorageError::Unavailable(err.to_string()).into());
                    }
                    debug!("Transient error recording vote (attempt {attempt}): {err}");
                    // Jitter keeps colliding voters from retrying in lockstep.
                    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..20));
                    sleep(TRANSACTION_BACKOFF * attempt + jitter).await;
                    attempt += 1;
                }
                result => return result.map_err(storage_error),
            }
        }
    }

    async fn has_voted(&self, user_id: Id, election_id: Id) -> Result<bool> {
        let filter = vote_record_filter(&VoteRecordKey {
            user_id,
            election_id,
        })?;
        Ok(self.vote_records().find_one(filter, None).await?.is_some())
    }

    async fn ballot_by_token(&self, token: &VoteToken) -> Result<Option<Ballot>> {
        Ok(self
            .ballots()
            .find_one(doc! { "_id": token.as_str() }, None)
            .await?)
    }

    async fn all_ballots(&self, election_id: Id) -> Result<Vec<Ballot>> {
        // Read a consistent snapshot. Completed elections take no new
        // ballots, so repeated reads agree.
        let session_options = SessionOptions::builder().snapshot(true).build();
        let mut session = self.client.start_session(Some(session_options)).await?;

        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let mut cursor = self
            .ballots()
            .find_with_session(Election::children_filter(election_id), options, &mut session)
            .await?;
        let mut ballots = Vec::new();
        while let Some(ballot) = cursor.next(&mut session).await {
            ballots.push(ballot?);
        }
        Ok(ballots)
    }

    async fn ballot_count(&self, election_id: Id) -> Result<u64> {
        Ok(self
            .ballots()
            .count_documents(Election::children_filter(election_id), None)
            .await?)
    }
}
