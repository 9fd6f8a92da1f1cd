use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rocket::{serde::json::Json, Route, State};

use crate::clock::SharedClock;
use crate::eligibility::is_eligible;
use crate::error::{Error, Result};
use crate::lifecycle::is_open;
use crate::model::{
    api::election::{CandidateDetail, ElectionDescription},
    common::identity::Identity,
    db::election::Election,
    mongodb::Id,
};
use crate::store::{SharedStore, Store};

use super::election_by_url;

pub fn routes() -> Vec<Route> {
    routes![
        date,
        list_elections,
        get_election,
        get_election_by_id,
        get_candidate_by_id
    ]
}

/// The server's idea of the current time.
#[get("/date")]
fn date(clock: &State<SharedClock>) -> Json<DateTime<Utc>> {
    Json(clock.now())
}

/// Every election, or only past (`completed=true`) or ongoing
/// (`completed=false`) ones, oldest first.
#[get("/elections?<completed>")]
async fn list_elections(
    completed: Option<bool>,
    identity: Identity,
    store: &State<SharedStore>,
    clock: &State<SharedClock>,
) -> Result<Json<Vec<ElectionDescription>>> {
    let store = store.inner().as_ref();
    let now = clock.now();
    let mut descriptions = Vec::new();
    for election in store.elections(completed).await? {
        descriptions.push(describe(store, election, &identity, now, false).await?);
    }
    Ok(Json(descriptions))
}

#[get("/elections/<url>?<shuffle>")]
async fn get_election(
    url: &str,
    shuffle: Option<bool>,
    identity: Identity,
    store: &State<SharedStore>,
    clock: &State<SharedClock>,
) -> Result<Json<ElectionDescription>> {
    let store = store.inner().as_ref();
    let election = election_by_url(store, url).await?;
    let shuffle = shuffle.unwrap_or(false);
    let description = describe(store, election, &identity, clock.now(), shuffle).await?;
    Ok(Json(description))
}

// Collides with `/elections/<url>/...` without an explicit rank.
#[get("/elections/by-id/<id>?<shuffle>", rank = 1)]
async fn get_election_by_id(
    id: Id,
    shuffle: Option<bool>,
    identity: Identity,
    store: &State<SharedStore>,
    clock: &State<SharedClock>,
) -> Result<Json<ElectionDescription>> {
    let store = store.inner().as_ref();
    let election = store
        .election_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election with ID '{id}'")))?;
    let shuffle = shuffle.unwrap_or(false);
    let description = describe(store, election, &identity, clock.now(), shuffle).await?;
    Ok(Json(description))
}

#[get("/candidates/by-id/<id>")]
async fn get_candidate_by_id(id: Id, store: &State<SharedStore>) -> Result<Json<CandidateDetail>> {
    let candidate = store
        .candidate_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate with ID '{id}'")))?;
    Ok(Json(candidate.into()))
}

/// Describe an election from the point of view of `identity`.
///
/// Shuffling the candidates avoids favouring whoever is listed first.
pub(super) async fn describe(
    store: &dyn Store,
    election: Election,
    identity: &Identity,
    now: DateTime<Utc>,
    shuffle: bool,
) -> Result<ElectionDescription> {
    let mut candidates = store.candidates(election.id).await?;
    let user_has_voted = if identity.signed_in {
        Some(store.has_voted(identity.id, election.id).await?)
    } else {
        None
    };
    if shuffle {
        candidates.shuffle(&mut rand::thread_rng());
    }
    let open = is_open(&election, now);
    let eligible = is_eligible(identity, &election);
    Ok(ElectionDescription::new(
        election,
        candidates,
        open,
        eligible,
        user_has_voted,
    ))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rocket::{
        http::{ContentType, Cookie, Status},
        serde::json::Value,
    };

    use super::*;
    use crate::api::tests::{now, TestApp};
    use crate::model::{
        api::{auth::AUTH_TOKEN_COOKIE, id::ApiId},
        common::ballot::Choice,
        db::election::ElectionSettings,
    };
    use crate::store::{BallotStore, ElectionStore};

    #[rocket::async_test]
    async fn date_follows_the_clock() {
        let app = TestApp::new().await;
        let response = app.client.get(uri!(date)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_json::<DateTime<Utc>>().await.unwrap(), now());

        app.clock.advance(Duration::minutes(5));
        let response = app.client.get(uri!(date)).dispatch().await;
        assert_eq!(
            response.into_json::<DateTime<Utc>>().await.unwrap(),
            now() + Duration::minutes(5)
        );
    }

    #[rocket::async_test]
    async fn signed_out_description() {
        let app = TestApp::new().await;
        let (election, candidates) = app.insert(ElectionSettings::current_example(now())).await;

        let response = app
            .client
            .get(uri!(get_election("senior-caucus", _)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let description = response.into_json::<ElectionDescription>().await.unwrap();
        assert_eq!(description.id, ApiId::from(election.id));
        assert!(description.is_open);
        assert!(!description.user_is_eligible);
        assert_eq!(description.user_has_voted, None);
        let names = description
            .candidates
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Ada", "Grace", "Edsger"]);
        assert_eq!(description.candidates[0].id, ApiId::from(candidates[0].id));
    }

    #[rocket::async_test]
    async fn member_description_by_id() {
        let app = TestApp::new().await;
        let (election, _) = app.insert(ElectionSettings::runoff_example(now())).await;
        let member = Identity::member(Id::new(), 2025);
        app.store
            .record_vote(
                member.id,
                election.id,
                &app.store.generate_token(),
                &Choice::Runoff(vec![]),
            )
            .await
            .unwrap();

        let response = app
            .client
            .get(format!("/elections/by-id/{}?shuffle=true", election.id))
            .cookie(app.cookie_for(&member))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let description = response.into_json::<ElectionDescription>().await.unwrap();
        assert!(description.user_is_eligible);
        assert_eq!(description.user_has_voted, Some(true));
        assert_eq!(description.candidates.len(), 3);

        // Closed once the clock passes the end.
        app.clock.set(election.settings.end);
        let response = app
            .client
            .get(uri!(get_election_by_id(election.id, _)))
            .dispatch()
            .await;
        let description = response.into_json::<ElectionDescription>().await.unwrap();
        assert!(!description.is_open);
    }

    #[rocket::async_test]
    async fn elections_listed_by_completion() {
        let app = TestApp::new().await;
        let (ongoing, _) = app.insert(ElectionSettings::current_example(now())).await;
        let (past, _) = app.insert(ElectionSettings::runoff_example(now())).await;
        app.store.set_completed(past.id, true).await.unwrap();

        let listed = |completed: Option<bool>| {
            let client = &app.client;
            async move {
                let response = client.get(uri!(list_elections(completed))).dispatch().await;
                assert_eq!(response.status(), Status::Ok);
                response
                    .into_json::<Vec<ElectionDescription>>()
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|d| d.url)
                    .collect::<Vec<_>>()
            }
        };
        assert_eq!(
            listed(None).await,
            vec![ongoing.settings.url.clone(), past.settings.url.clone()]
        );
        assert_eq!(listed(Some(false)).await, vec![ongoing.settings.url.clone()]);
        assert_eq!(listed(Some(true)).await, vec![past.settings.url.clone()]);

        // Descriptions are tailored to the caller like single lookups.
        let member = Identity::member(Id::new(), 2025);
        let response = app
            .client
            .get(uri!(list_elections(Some(false))))
            .cookie(app.cookie_for(&member))
            .dispatch()
            .await;
        let descriptions = response
            .into_json::<Vec<ElectionDescription>>()
            .await
            .unwrap();
        assert_eq!(descriptions[0].user_has_voted, Some(false));
        assert!(descriptions[0].user_is_eligible);
    }

    #[rocket::async_test]
    async fn candidate_by_id() {
        let app = TestApp::new().await;
        let (election, candidates) = app.insert(ElectionSettings::current_example(now())).await;

        let response = app
            .client
            .get(uri!(get_candidate_by_id(candidates[1].id)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let candidate = response.into_json::<CandidateDetail>().await.unwrap();
        assert_eq!(candidate.name, "Grace");
        assert_eq!(candidate.election_id, ApiId::from(election.id));

        let response = app
            .client
            .get(uri!(get_candidate_by_id(Id::new())))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn unknown_elections_and_bad_tokens() {
        let app = TestApp::new().await;
        let response = app.client.get("/elections/nope").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);

        let response = app
            .client
            .get(uri!(get_election_by_id(Id::new(), _)))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);

        app.insert(ElectionSettings::current_example(now())).await;
        let response = app
            .client
            .get("/elections/senior-caucus")
            .cookie(Cookie::new(AUTH_TOKEN_COOKIE, "not-a-jwt"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
        // Rejected guards still answer in JSON, not the default HTML page.
        assert_eq!(response.content_type(), Some(ContentType::JSON));
        let body = response.into_json::<Value>().await.unwrap();
        assert_eq!(body["kind"], "unauthorized");
    }
}
