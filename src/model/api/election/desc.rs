use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::election::{ElectionType, GradYear},
    db::{candidate::Candidate, election::Election},
};

/// An API-friendly election description, tailored to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: ApiId,
    pub name: String,
    pub url: String,
    pub picture_id: String,
    #[serde(rename = "type")]
    pub kind: ElectionType,
    pub allowed_grad_years: BTreeSet<GradYear>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub completed: bool,
    /// Derived from the window and `completed` at the time of the request.
    pub is_open: bool,
    pub candidates: Vec<CandidateDescription>,
    /// Whether the caller may vote here.
    pub user_is_eligible: bool,
    /// Whether the caller has voted here; `None` when signed out.
    pub user_has_voted: Option<bool>,
}

impl ElectionDescription {
    pub fn new(
        election: Election,
        candidates: Vec<Candidate>,
        is_open: bool,
        user_is_eligible: bool,
        user_has_voted: Option<bool>,
    ) -> Self {
        let id = election.id.into();
        let settings = election.election.settings;
        Self {
            id,
            name: settings.name,
            url: settings.url,
            picture_id: settings.picture_id,
            kind: settings.kind,
            allowed_grad_years: settings.allowed_grad_years,
            start: settings.start,
            end: settings.end,
            completed: election.election.completed,
            is_open,
            candidates: candidates.into_iter().map(Into::into).collect(),
            user_is_eligible,
            user_has_voted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: ApiId,
    pub name: String,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.name,
        }
    }
}

/// A candidate looked up on its own, with the election it stands in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDetail {
    pub id: ApiId,
    pub election_id: ApiId,
    pub name: String,
}

impl From<Candidate> for CandidateDetail {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            election_id: candidate.election_id.into(),
            name: candidate.name,
        }
    }
}
