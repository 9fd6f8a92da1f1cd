use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A candidate standing in exactly one election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    /// Foreign key election ID.
    pub election_id: Id,
    pub name: String,
}

impl Candidate {
    pub fn new(election_id: Id, name: impl Into<String>) -> Self {
        Self {
            id: Id::new(),
            election_id,
            name: name.into(),
        }
    }
}
