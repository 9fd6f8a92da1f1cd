use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::ballot::{Choice, VoteToken},
    db::ballot::Ballot,
};

/// A ballot's content in API form: `{"plurality": id | null}` or
/// `{"runoff": [id, ...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiChoice {
    Plurality(Option<ApiId>),
    Runoff(Vec<ApiId>),
}

impl From<ApiChoice> for Choice {
    fn from(choice: ApiChoice) -> Self {
        match choice {
            ApiChoice::Plurality(id) => Self::Plurality(id.map(Into::into)),
            ApiChoice::Runoff(ids) => Self::Runoff(ids.into_iter().map(Into::into).collect()),
        }
    }
}

impl From<Choice> for ApiChoice {
    fn from(choice: Choice) -> Self {
        match choice {
            Choice::Plurality(id) => Self::Plurality(id.map(Into::into)),
            Choice::Runoff(ids) => Self::Runoff(ids.into_iter().map(Into::into).collect()),
        }
    }
}

/// Returned once, to the voter, when their ballot is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub token: VoteToken,
}

/// A disclosed ballot of a completed election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotDescription {
    pub token: VoteToken,
    pub election_id: ApiId,
    pub choice: ApiChoice,
}

impl From<Ballot> for BallotDescription {
    fn from(ballot: Ballot) -> Self {
        Self {
            token: ballot.token,
            election_id: ballot.election_id.into(),
            choice: ballot.choice.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json::{self, json};

    use super::*;
    use crate::model::mongodb::Id;

    #[test]
    fn choice_json_shapes() {
        let id = Id::new();
        let plurality: ApiChoice =
            serde_json::from_value(json!({ "plurality": id.to_string() })).unwrap();
        assert_eq!(Choice::from(plurality), Choice::Plurality(Some(id)));

        let abstain: ApiChoice = serde_json::from_value(json!({ "plurality": null })).unwrap();
        assert_eq!(Choice::from(abstain), Choice::Plurality(None));

        let runoff: ApiChoice = serde_json::from_value(json!({ "runoff": [id.to_string()] })).unwrap();
        assert_eq!(Choice::from(runoff), Choice::Runoff(vec![id]));

        assert!(serde_json::from_value::<ApiChoice>(json!({ "approval": [] })).is_err());
    }
}
