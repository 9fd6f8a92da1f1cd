use rocket::{Catcher, Request, Route};

use crate::error::{Error, Result};
use crate::model::{api::auth::GuardRejection, db::election::Election};
use crate::store::Store;

mod admin;
mod elections;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(elections::routes());
    routes.extend(voting::routes());
    routes.extend(admin::routes());
    routes
}

/// JSON bodies for failures that never reach a handler.
pub fn catchers() -> Vec<Catcher> {
    catchers![unauthorized, internal_error]
}

#[catch(401)]
fn unauthorized(req: &Request<'_>) -> Error {
    match GuardRejection::of(req) {
        Some(reason) => Error::Unauthorized(reason.to_string()),
        None => Error::Unauthorized("Credentials required".to_string()),
    }
}

#[catch(500)]
fn internal_error(req: &Request<'_>) -> Error {
    let reason = GuardRejection::of(req).unwrap_or("Request could not be completed");
    Error::Internal(reason.to_string())
}

/// Find an election by its url, or fail with 404.
async fn election_by_url(store: &dyn Store, url: &str) -> Result<Election> {
    store
        .election_by_url(url)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election '{url}'")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, Utc};
    use rocket::{http::Cookie, local::asynchronous::Client};

    use crate::clock::FixedClock;
    use crate::config::Config;
    use crate::model::{
        api::auth::IdentityClaims,
        common::identity::Identity,
        db::{
            candidate::Candidate,
            election::{Election, ElectionCore, ElectionSettings},
        },
    };
    use crate::store::{ElectionStore, MemoryStore, SharedStore};

    /// A client over an in-memory store and a clock stuck at `now()`.
    pub struct TestApp {
        pub client: Client,
        pub store: Arc<MemoryStore>,
        pub clock: Arc<FixedClock>,
    }

    pub fn now() -> DateTime<Utc> {
        "2024-10-01T12:00:00Z".parse().unwrap()
    }

    impl TestApp {
        pub async fn new() -> Self {
            log4rs_test_utils::test_logging::init_logging_once_for(
                ["anonvote_backend"],
                None,
                None,
            );
            let store = Arc::new(MemoryStore::new());
            let clock = Arc::new(FixedClock::new(now()));
            let shared: SharedStore = store.clone();
            let rocket = crate::rocket_for_store(crate::test_figment(), shared, clock.clone());
            let client = Client::tracked(rocket).await.unwrap();
            Self {
                client,
                store,
                clock,
            }
        }

        /// The identity cookie for `identity`, valid for an hour.
        pub fn cookie_for(&self, identity: &Identity) -> Cookie<'static> {
            let config = self.client.rocket().state::<Config>().unwrap();
            IdentityClaims::new(identity, Utc::now() + Duration::hours(1))
                .into_cookie(config)
                .unwrap()
        }

        pub async fn insert(&self, settings: ElectionSettings) -> (Election, Vec<Candidate>) {
            self.store
                .create_election(
                    ElectionCore::new(settings),
                    vec!["Ada".to_string(), "Grace".to_string(), "Edsger".to_string()],
                )
                .await
                .unwrap()
        }
    }

    #[rocket::async_test]
    async fn guard_failures_answer_in_json() {
        use rocket::http::{ContentType, Status};
        use rocket::serde::json::Value;

        // Without managed config, identities cannot be verified.
        let store: SharedStore = Arc::new(MemoryStore::new());
        let clock: crate::clock::SharedClock = Arc::new(FixedClock::new(now()));
        let rocket = rocket::custom(crate::test_figment())
            .manage(store)
            .manage(clock)
            .mount("/", super::routes())
            .register("/", super::catchers());
        let client = Client::tracked(rocket).await.unwrap();

        let response = client.get("/elections/senior-caucus").dispatch().await;
        assert_eq!(response.status(), Status::InternalServerError);
        assert_eq!(response.content_type(), Some(ContentType::JSON));
        let body = response.into_json::<Value>().await.unwrap();
        assert_eq!(body["kind"], "internal");
        assert_eq!(
            body["message"],
            "Internal server error: Identity verification unavailable"
        );
    }
}
