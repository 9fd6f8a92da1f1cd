use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};

use data_encoding::BASE64URL_NOPAD;
use rand::{rngs::OsRng, RngCore};
use rocket::request::FromParam;
use serde::{Deserialize, Serialize};

use crate::error::ChoiceError;
use crate::model::{common::election::ElectionType, mongodb::Id};

/// Number of random bytes behind each vote token.
pub const TOKEN_BYTES: usize = 32;

/// An opaque, unguessable vote token.
///
/// The token is handed to the voter once, when their ballot is recorded, and
/// is the only way to find that ballot again. Nothing server-side maps a user
/// to their token.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteToken(String);

impl VoteToken {
    /// Draw a fresh token from the operating system's CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(BASE64URL_NOPAD.encode(&bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Tokens are as good as ballot keys; keep them out of logs.
impl Debug for VoteToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "VoteToken(..)")
    }
}

impl<'a> FromParam<'a> for VoteToken {
    type Error = data_encoding::DecodeError;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        let bytes = BASE64URL_NOPAD.decode(param.as_bytes())?;
        if bytes.len() != TOKEN_BYTES {
            return Err(data_encoding::DecodeError {
                position: bytes.len(),
                kind: data_encoding::DecodeKind::Length,
            });
        }
        Ok(Self(param.to_string()))
    }
}

/// The content of a ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    /// A single candidate, or `None` to abstain.
    Plurality(Option<Id>),
    /// Candidates in order of preference. May be shorter than the candidate
    /// list, or empty to abstain.
    Runoff(Vec<Id>),
}

impl Choice {
    /// The kind of election this choice was made for.
    pub fn kind(&self) -> ElectionType {
        match self {
            Self::Plurality(_) => ElectionType::Plurality,
            Self::Runoff(_) => ElectionType::Runoff,
        }
    }

    /// Check that this choice is a valid ballot in an election of the given
    /// kind with the given candidates.
    pub fn validate(&self, kind: ElectionType, candidates: &BTreeSet<Id>) -> Result<(), ChoiceError> {
        if self.kind() != kind {
            return Err(ChoiceError::WrongType { expected: kind });
        }
        match self {
            Self::Plurality(None) => Ok(()),
            Self::Plurality(Some(id)) => {
                if candidates.contains(id) {
                    Ok(())
                } else {
                    Err(ChoiceError::UnknownCandidate(*id))
                }
            }
            Self::Runoff(ranking) => {
                // Distinct entries drawn from the candidates also bounds the length.
                let mut seen = BTreeSet::new();
                for id in ranking {
                    if !candidates.contains(id) {
                        return Err(ChoiceError::UnknownCandidate(*id));
                    }
                    if !seen.insert(*id) {
                        return Err(ChoiceError::DuplicateCandidate(*id));
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let a = VoteToken::generate();
        let b = VoteToken::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 43);
        assert!(a
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn token_param_must_be_full_length() {
        let token = VoteToken::generate();
        assert_eq!(VoteToken::from_param(token.as_str()).unwrap(), token);
        assert!(VoteToken::from_param("abc").is_err());
        assert!(VoteToken::from_param("not base64 at all!").is_err());
    }

    #[test]
    fn plurality_choices() {
        let (a, b) = (Id::new(), Id::new());
        let candidates = BTreeSet::from([a, b]);
        let kind = ElectionType::Plurality;

        assert_eq!(Choice::Plurality(Some(a)).validate(kind, &candidates), Ok(()));
        assert_eq!(Choice::Plurality(None).validate(kind, &candidates), Ok(()));

        let stranger = Id::new();
        assert_eq!(
            Choice::Plurality(Some(stranger)).validate(kind, &candidates),
            Err(ChoiceError::UnknownCandidate(stranger))
        );
        assert_eq!(
            Choice::Runoff(vec![a]).validate(kind, &candidates),
            Err(ChoiceError::WrongType { expected: kind })
        );
    }

    #[test]
    fn runoff_choices() {
        let (a, b, c) = (Id::new(), Id::new(), Id::new());
        let candidates = BTreeSet::from([a, b, c]);
        let kind = ElectionType::Runoff;

        assert_eq!(Choice::Runoff(vec![c, a, b]).validate(kind, &candidates), Ok(()));
        assert_eq!(Choice::Runoff(vec![b]).validate(kind, &candidates), Ok(()));
        assert_eq!(Choice::Runoff(vec![]).validate(kind, &candidates), Ok(()));

        assert_eq!(
            Choice::Runoff(vec![a, b, a]).validate(kind, &candidates),
            Err(ChoiceError::DuplicateCandidate(a))
        );
        let stranger = Id::new();
        assert_eq!(
            Choice::Runoff(vec![a, stranger]).validate(kind, &candidates),
            Err(ChoiceError::UnknownCandidate(stranger))
        );
        assert_eq!(
            Choice::Plurality(None).validate(kind, &candidates),
            Err(ChoiceError::WrongType { expected: kind })
        );
    }

    #[test]
    fn debug_hides_token() {
        let token = VoteToken::generate();
        assert!(!format!("{:?}", token).contains(token.as_str()));
    }
}
