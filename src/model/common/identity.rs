use mongodb::bson::oid::ObjectId;

use crate::model::{common::election::GradYear, mongodb::Id};

/// A caller identity, as verified by the authentication collaborator.
///
/// This crate never checks credentials itself; it trusts whatever arrives here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Id,
    pub grad_year: Option<GradYear>,
    pub admin_privileges: bool,
    pub signed_in: bool,
}

impl Identity {
    /// A verified, signed-in member.
    pub fn member(id: Id, grad_year: impl Into<Option<GradYear>>) -> Self {
        Self {
            id,
            grad_year: grad_year.into(),
            admin_privileges: false,
            signed_in: true,
        }
    }

    /// A verified, signed-in administrator.
    pub fn admin(id: Id) -> Self {
        Self {
            id,
            grad_year: None,
            admin_privileges: true,
            signed_in: true,
        }
    }

    /// Nobody in particular: the caller presented no credentials.
    pub fn signed_out() -> Self {
        Self {
            id: ObjectId::from_bytes([0; 12]).into(),
            grad_year: None,
            admin_privileges: false,
            signed_in: false,
        }
    }

    /// Is this a signed-in administrator?
    pub fn is_admin(&self) -> bool {
        self.signed_in && self.admin_privileges
    }
}
