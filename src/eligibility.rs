use crate::model::{common::identity::Identity, db::election::ElectionCore};

/// May this identity vote in this election?
///
/// Signed-out callers never may. An election with no allowed graduation
/// years is open to every signed-in member; otherwise the member's
/// graduation year must be listed.
pub fn is_eligible(identity: &Identity, election: &ElectionCore) -> bool {
    if !identity.signed_in {
        return false;
    }
    let allowed = &election.settings.allowed_grad_years;
    if allowed.is_empty() {
        return true;
    }
    identity
        .grad_year
        .map_or(false, |year| allowed.contains(&year))
}
