use rocket::{serde::json::Json, Route, State};

use crate::clock::SharedClock;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::EventBus;
use crate::lifecycle;
use crate::model::{
    api::{
        election::ElectionResults,
        vote::{ApiChoice, BallotDescription, VoteReceipt},
    },
    common::{ballot::VoteToken, identity::Identity},
};
use crate::store::SharedStore;
use crate::tally::tally;
use crate::voting::VoteCaster;

use super::election_by_url;

pub fn routes() -> Vec<Route> {
    routes![get_open, get_voted, vote, get_results, get_ballot]
}

#[get("/elections/<url>/open")]
async fn get_open(
    url: &str,
    store: &State<SharedStore>,
    clock: &State<SharedClock>,
) -> Result<Json<bool>> {
    let election = election_by_url(store.inner().as_ref(), url).await?;
    Ok(Json(lifecycle::is_open(&election, clock.now())))
}

#[get("/elections/<url>/voted")]
async fn get_voted(
    url: &str,
    identity: Identity,
    store: &State<SharedStore>,
) -> Result<Json<bool>> {
    if !identity.signed_in {
        return Err(Error::Unauthorized("Sign in to see whether you have voted".to_string()));
    }
    let store = store.inner().as_ref();
    let election = election_by_url(store, url).await?;
    Ok(Json(store.has_voted(identity.id, election.id).await?))
}

/// Cast the caller's vote. The receipt is the only copy of the token the
/// server will ever hand out.
#[post("/elections/<url>/vote", data = "<choice>", format = "json")]
async fn vote(
    url: &str,
    choice: Json<ApiChoice>,
    identity: Identity,
    store: &State<SharedStore>,
    clock: &State<SharedClock>,
    events: &State<EventBus>,
    config: &State<Config>,
) -> Result<Json<VoteReceipt>> {
    let store = store.inner().as_ref();
    let election = election_by_url(store, url).await?;
    let candidates = store.candidates(election.id).await?;

    let token = VoteCaster::new(store)
        .with_events(events)
        .with_max_token_attempts(config.max_token_attempts())
        .cast_vote(
            &identity,
            &election,
            &candidates,
            clock.now(),
            choice.into_inner().into(),
        )
        .await?;

    Ok(Json(VoteReceipt { token }))
}

#[get("/elections/<url>/results")]
async fn get_results(url: &str, store: &State<SharedStore>) -> Result<Json<ElectionResults>> {
    let store = store.inner().as_ref();
    let election = election_by_url(store, url).await?;
    let tally = tally(store, &election).await?;
    Ok(Json(ElectionResults::new(election.id, tally)))
}

/// Look a ballot up by its token. Only completed elections disclose ballots.
#[get("/elections/<url>/ballots/<token>")]
async fn get_ballot(
    url: &str,
    token: VoteToken,
    store: &State<SharedStore>,
) -> Result<Json<BallotDescription>> {
    let store = store.inner().as_ref();
    let election = election_by_url(store, url).await?;
    let ballot = store.get_ballot(&token, &election).await?;
    Ok(Json(ballot.into()))
}
