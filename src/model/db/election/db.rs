use std::ops::{Deref, DerefMut};

use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

use super::base::{ElectionCore, NewElection};

/// A stored election: its settings and completion flag under a fresh ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Election {
    /// Assign an ID to a new election.
    pub fn new(election: NewElection) -> Self {
        Self {
            id: Id::new(),
            election,
        }
    }

    /// Filter matching the election with this url, of which there is at most one.
    pub fn url_filter(url: &str) -> Document {
        doc! { "url": url }
    }

    /// Filter matching candidates or ballots of the given election.
    pub fn children_filter(election_id: Id) -> Document {
        doc! { "election_id": election_id }
    }
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}
