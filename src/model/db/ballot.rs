use serde::{Deserialize, Serialize};

use crate::model::{
    common::ballot::{Choice, VoteToken},
    mongodb::Id,
};

/// An anonymous ballot, as stored in the database.
///
/// There is no voter field and no reference to a vote record.
/// The token doubles as the document ID, so no generated ObjectId (and the
/// insertion timestamp inside it) is ever attached to a ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    #[serde(rename = "_id")]
    pub token: VoteToken,
    /// Foreign key election ID.
    pub election_id: Id,
    pub choice: Choice,
}
