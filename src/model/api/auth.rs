use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::try_outcome,
    request::{FromRequest, Outcome},
    Request,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::id::ApiId,
    common::{election::GradYear, identity::Identity},
};

/// Cookie carrying the identity token issued by the authentication service.
pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// Claims of the identity token. Signed with the shared `jwt_secret`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// User ID.
    pub sub: ApiId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grad_year: Option<GradYear>,
    /// Admin privileges.
    #[serde(default)]
    pub adm: bool,
    #[serde(with = "ts_seconds")]
    pub exp: DateTime<Utc>,
}

impl IdentityClaims {
    pub fn new(identity: &Identity, expire_at: DateTime<Utc>) -> Self {
        Self {
            sub: identity.id.into(),
            grad_year: identity.grad_year,
            adm: identity.admin_privileges,
            exp: expire_at,
        }
    }

    /// Sign these claims into a token.
    pub fn encode(&self, config: &Config) -> Result<String> {
        let token = jsonwebtoken::encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;
        Ok(token)
    }

    /// Sign these claims into a cookie.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>> {
        Ok(Cookie::build(AUTH_TOKEN_COOKIE, self.encode(config)?)
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish())
    }

    /// Verify signature and expiry.
    pub fn decode(token: &str, config: &Config) -> Result<Self> {
        let claims = jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|data: TokenData<Self>| data.claims)?;
        Ok(claims)
    }
}

impl From<IdentityClaims> for Identity {
    fn from(claims: IdentityClaims) -> Self {
        Self {
            id: claims.sub.into(),
            grad_year: claims.grad_year,
            admin_privileges: claims.adm,
            signed_in: true,
        }
    }
}

/// Why an identity guard turned a request away. Left in the request's local
/// cache for the error catchers.
#[derive(Debug, Clone, Default)]
pub struct GuardRejection(pub Option<String>);

impl GuardRejection {
    pub fn of<'a>(req: &'a Request<'_>) -> Option<&'a str> {
        req.local_cache(GuardRejection::default).0.as_deref()
    }
}

fn reject<T>(req: &Request<'_>, status: Status, err: Error) -> Outcome<T, Error> {
    let message = match &err {
        Error::Unauthorized(reason) | Error::Internal(reason) => reason.clone(),
        other => other.to_string(),
    };
    req.local_cache(|| GuardRejection(Some(message)));
    Outcome::Failure((status, err))
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Identity {
    type Error = Error;

    /// No cookie means a signed-out caller, which is not an error in itself.
    /// A cookie that fails verification is.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(config) = req.rocket().state::<Config>() else {
            error!("Application config is not managed, cannot verify identity");
            return reject(
                req,
                Status::InternalServerError,
                Error::Internal("Identity verification unavailable".to_string()),
            );
        };

        let Some(cookie) = req.cookies().get(AUTH_TOKEN_COOKIE) else {
            return Outcome::Success(Identity::signed_out());
        };

        match IdentityClaims::decode(cookie.value(), config) {
            Ok(claims) => Outcome::Success(claims.into()),
            Err(err) => {
                debug!("Rejected identity token: {err}");
                reject(req, Status::Unauthorized, err)
            }
        }
    }
}

/// A signed-in identity with admin privileges.
#[derive(Debug, Clone)]
pub struct AdminIdentity(pub Identity);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminIdentity {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let identity = try_outcome!(req.guard::<Identity>().await);
        if identity.is_admin() {
            Outcome::Success(Self(identity))
        } else {
            reject(
                req,
                Status::Unauthorized,
                Error::Unauthorized("Admin privileges required".to_string()),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::model::mongodb::Id;

    #[test]
    fn claims_round_trip_to_identity() {
        let config = Config::example();
        let identity = Identity::member(Id::new(), 2026);
        let token = IdentityClaims::new(&identity, Utc::now() + Duration::hours(1))
            .encode(&config)
            .unwrap();
        let decoded = IdentityClaims::decode(&token, &config).unwrap();
        assert_eq!(Identity::from(decoded), identity);
    }

    #[test]
    fn expired_or_foreign_tokens_are_rejected() {
        let config = Config::example();
        let identity = Identity::admin(Id::new());

        let expired = IdentityClaims::new(&identity, Utc::now() - Duration::hours(1))
            .encode(&config)
            .unwrap();
        let err = IdentityClaims::decode(&expired, &config).unwrap_err();
        assert_eq!(err.status(), Status::Unauthorized);

        let other = Config::with_jwt_secret("another secret");
        let foreign = IdentityClaims::new(&identity, Utc::now() + Duration::hours(1))
            .encode(&other)
            .unwrap();
        assert!(IdentityClaims::decode(&foreign, &config).is_err());
    }
}
