use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::common::election::{ElectionType, GradYear};

/// The admin-editable part of an election.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ElectionSettings {
    /// Election name.
    pub name: String,
    /// Unique URL slug.
    pub url: String,
    /// Cover picture, owned by the media collaborator.
    pub picture_id: String,
    /// Ballot shape and counting method.
    #[serde(rename = "type")]
    pub kind: ElectionType,
    /// Graduation years allowed to vote. Empty means every verified member.
    pub allowed_grad_years: BTreeSet<GradYear>,
    /// Voting opens (inclusive).
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start: DateTime<Utc>,
    /// Voting closes (exclusive).
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end: DateTime<Utc>,
}

/// Core election data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ElectionCore {
    #[serde(flatten)]
    pub settings: ElectionSettings,
    /// Set and cleared only by an admin; independent of the time window.
    pub completed: bool,
}

impl ElectionCore {
    /// A fresh, not yet completed election.
    pub fn new(settings: ElectionSettings) -> Self {
        Self {
            settings,
            completed: false,
        }
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use chrono::Duration;

    impl ElectionSettings {
        /// A plurality election open for a week either side of `now`.
        pub fn current_example(now: DateTime<Utc>) -> Self {
            Self {
                name: "Senior Caucus".to_string(),
                url: "senior-caucus".to_string(),
                picture_id: "caucus-cover".to_string(),
                kind: ElectionType::Plurality,
                allowed_grad_years: BTreeSet::new(),
                start: now - Duration::days(7),
                end: now + Duration::days(7),
            }
        }

        /// A runoff election restricted to two graduating classes.
        pub fn runoff_example(now: DateTime<Utc>) -> Self {
            Self {
                name: "Student Union President".to_string(),
                url: "su-president".to_string(),
                picture_id: "su-cover".to_string(),
                kind: ElectionType::Runoff,
                allowed_grad_years: BTreeSet::from([2025, 2026]),
                start: now - Duration::days(1),
                end: now + Duration::days(1),
            }
        }
    }
}
