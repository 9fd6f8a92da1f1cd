use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::election::{ElectionType, GradYear},
    db::election::{ElectionCore, ElectionSettings, NewElection},
};

/// The admin-editable fields of an election, as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionEdit {
    pub name: String,
    pub url: String,
    pub picture_id: String,
    #[serde(rename = "type")]
    pub kind: ElectionType,
    /// Empty (or omitted) opens the election to every verified member.
    #[serde(default)]
    pub allowed_grad_years: BTreeSet<GradYear>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ElectionEdit {
    /// Validate and normalise into storable settings.
    ///
    /// Text fields are trimmed and must not end up empty. The window must
    /// have positive length.
    pub fn validate(self) -> Result<ElectionSettings> {
        let name = non_empty("name", self.name)?;
        let url = non_empty("url", self.url)?;
        let picture_id = non_empty("picture_id", self.picture_id)?;
        if self.start >= self.end {
            return Err(Error::validation(format!(
                "Election must start before it ends (start {}, end {})",
                self.start, self.end
            )));
        }
        Ok(ElectionSettings {
            name,
            url,
            picture_id,
            kind: self.kind,
            allowed_grad_years: self.allowed_grad_years,
            start: self.start,
            end: self.end,
        })
    }
}

impl From<ElectionSettings> for ElectionEdit {
    fn from(settings: ElectionSettings) -> Self {
        Self {
            name: settings.name,
            url: settings.url,
            picture_id: settings.picture_id,
            kind: settings.kind,
            allowed_grad_years: settings.allowed_grad_years,
            start: settings.start,
            end: settings.end,
        }
    }
}

/// A new election: its settings plus candidate names, in ballot order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSpec {
    #[serde(flatten)]
    pub settings: ElectionEdit,
    pub candidates: Vec<String>,
}

impl ElectionSpec {
    /// Validate into a new election and its trimmed candidate names.
    pub fn validate(self) -> Result<(NewElection, Vec<String>)> {
        let settings = self.settings.validate()?;
        let mut seen = BTreeSet::new();
        let mut candidates = Vec::with_capacity(self.candidates.len());
        for name in self.candidates {
            let name = non_empty("candidate name", name)?;
            if !seen.insert(name.clone()) {
                return Err(Error::validation(format!("Duplicate candidate '{name}'")));
            }
            candidates.push(name);
        }
        Ok((ElectionCore::new(settings), candidates))
    }
}

fn non_empty(field: &str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(Error::validation(format!("{field} must not be empty")))
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl ElectionSpec {
        pub fn example(now: DateTime<Utc>) -> Self {
            Self {
                settings: ElectionSettings::current_example(now).into(),
                candidates: vec!["Ada".to_string(), "Grace".to_string()],
            }
        }
    }
}
