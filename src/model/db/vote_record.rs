use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// The unique key of a vote record.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoteRecordKey {
    pub user_id: Id,
    pub election_id: Id,
}

/// Marks that a user has voted in an election, and nothing more.
///
/// The key is the document ID, so uniqueness is enforced by the database on
/// every insert and the record carries no creation timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    #[serde(rename = "_id")]
    pub key: VoteRecordKey,
    pub has_voted: bool,
}

impl VoteRecord {
    pub fn new(user_id: Id, election_id: Id) -> Self {
        Self {
            key: VoteRecordKey {
                user_id,
                election_id,
            },
            has_voted: true,
        }
    }
}
