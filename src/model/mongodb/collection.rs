use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use super::errors::is_namespace_exists_error;
use crate::model::db::{
    ballot::Ballot,
    candidate::Candidate,
    election::Election,
    vote_record::VoteRecord,
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Election collections
const ELECTIONS: &str = "elections";
impl MongoCollection for Election {
    const NAME: &'static str = ELECTIONS;
}

// Candidate collection
const CANDIDATES: &str = "candidates";
impl MongoCollection for Candidate {
    const NAME: &'static str = CANDIDATES;
}

// Ballot collection
const BALLOTS: &str = "ballots";
impl MongoCollection for Ballot {
    const NAME: &'static str = BALLOTS;
}

// Vote record collection
const VOTE_RECORDS: &str = "vote_records";
impl MongoCollection for VoteRecord {
    const NAME: &'static str = VOTE_RECORDS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This also creates the collections, which must exist before any
/// transaction writes to them.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Election collection.
    let election_index = IndexModel::builder()
        .keys(doc! {"url": 1})
        .options(unique)
        .build();
    Coll::<Election>::from_db(db)
        .create_index(election_index, None)
        .await?;

    // Candidate collection.
    let candidate_index = IndexModel::builder()
        .keys(doc! {"election_id": 1})
        .build();
    Coll::<Candidate>::from_db(db)
        .create_index(candidate_index, None)
        .await?;

    // Ballot collection. The token is the `_id`, which is already unique.
    let ballot_index = IndexModel::builder()
        .keys(doc! {"election_id": 1})
        .build();
    Coll::<Ballot>::from_db(db)
        .create_index(ballot_index, None)
        .await?;

    // Vote record collection. The (user, election) key is the `_id`, so
    // the only job here is to make sure the collection exists.
    let existing = db.list_collection_names(None).await?;
    if !existing.iter().any(|name| name == VoteRecord::NAME) {
        // Another instance may have won the race to create it.
        if let Err(e) = db.create_collection(VoteRecord::NAME, None).await {
            if !is_namespace_exists_error(&e) {
                return Err(e);
            }
        }
    }

    Ok(())
}
