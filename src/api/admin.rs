use rocket::{serde::json::Json, Route, State};

use crate::clock::SharedClock;
use crate::error::Result;
use crate::events::EventBus;
use crate::lifecycle::Lifecycle;
use crate::model::{
    api::{
        auth::AdminIdentity,
        election::{ElectionDescription, ElectionEdit, ElectionSpec},
    },
    mongodb::Id,
};
use crate::store::SharedStore;

use super::{election_by_url, elections::describe};

pub fn routes() -> Vec<Route> {
    routes![create_election, edit_election, complete_election, reopen_election]
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    admin: AdminIdentity,
    spec: Json<ElectionSpec>,
    store: &State<SharedStore>,
    clock: &State<SharedClock>,
) -> Result<Json<ElectionDescription>> {
    let store = store.inner().as_ref();
    let (election, candidates) = spec.into_inner().validate()?;
    let (election, _) = store.create_election(election, candidates).await?;
    info!("Created election {} ({})", election.id, election.settings.url);
    Ok(Json(describe(store, election, &admin.0, clock.now(), false).await?))
}

#[put("/elections/by-id/<id>", data = "<edit>", format = "json")]
async fn edit_election(
    admin: AdminIdentity,
    id: Id,
    edit: Json<ElectionEdit>,
    store: &State<SharedStore>,
    clock: &State<SharedClock>,
    events: &State<EventBus>,
) -> Result<Json<ElectionDescription>> {
    let store = store.inner().as_ref();
    let election = Lifecycle::new(store)
        .with_events(events)
        .edit(id, edit.into_inner())
        .await?;
    Ok(Json(describe(store, election, &admin.0, clock.now(), false).await?))
}

#[post("/elections/<url>/complete")]
async fn complete_election(
    admin: AdminIdentity,
    url: &str,
    store: &State<SharedStore>,
    clock: &State<SharedClock>,
    events: &State<EventBus>,
) -> Result<Json<ElectionDescription>> {
    let store = store.inner().as_ref();
    let election = election_by_url(store, url).await?;
    let election = Lifecycle::new(store)
        .with_events(events)
        .complete(election.id)
        .await?;
    Ok(Json(describe(store, election, &admin.0, clock.now(), false).await?))
}

#[post("/elections/<url>/reopen")]
async fn reopen_election(
    admin: AdminIdentity,
    url: &str,
    store: &State<SharedStore>,
    clock: &State<SharedClock>,
    events: &State<EventBus>,
) -> Result<Json<ElectionDescription>> {
    let store = store.inner().as_ref();
    let election = election_by_url(store, url).await?;
    let election = Lifecycle::new(store)
        .with_events(events)
        .reopen(election.id)
        .await?;
    Ok(Json(describe(store, election, &admin.0, clock.now(), false).await?))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        serde::json::{json, Value},
    };

    use super::*;
    use crate::api::tests::{now, TestApp};
    use crate::events::ElectionEvent;
    use crate::model::{common::identity::Identity, db::election::ElectionSettings};
    use crate::store::ElectionStore;

    #[rocket::async_test]
    async fn members_cannot_administer() {
        let app = TestApp::new().await;
        app.insert(ElectionSettings::current_example(now())).await;
        let member = Identity::member(Id::new(), 2025);

        let response = app
            .client
            .post(uri!(complete_election("senior-caucus")))
            .cookie(app.cookie_for(&member))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(response.content_type(), Some(ContentType::JSON));
        let body = response.into_json::<Value>().await.unwrap();
        assert_eq!(body["kind"], "unauthorized");
        assert_eq!(body["message"], "Unauthorized: Admin privileges required");

        let response = app
            .client
            .post(uri!(complete_election("senior-caucus")))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
        let body = response.into_json::<Value>().await.unwrap();
        assert_eq!(body["kind"], "unauthorized");

        let stored = app.store.election_by_url("senior-caucus").await.unwrap().unwrap();
        assert!(!stored.completed);
    }

    #[rocket::async_test]
    async fn create_then_complete_and_reopen() {
        let app = TestApp::new().await;
        let admin = Identity::admin(Id::new());
        let events = app.client.rocket().state::<EventBus>().unwrap();
        let mut rx = events.subscribe();

        let response = app
            .client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .cookie(app.cookie_for(&admin))
            .body(json!(ElectionSpec::example(now())).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let created = response.into_json::<ElectionDescription>().await.unwrap();
        assert_eq!(created.candidates.len(), 2);
        assert!(created.is_open);

        for (route, completed) in [("complete", true), ("reopen", false), ("complete", true)] {
            let response = app
                .client
                .post(format!("/elections/senior-caucus/{route}"))
                .cookie(app.cookie_for(&admin))
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::Ok);
            let description = response.into_json::<ElectionDescription>().await.unwrap();
            assert_eq!(description.completed, completed);
            assert!(!description.is_open || !completed);
        }

        let election_id = *created.id;
        assert_eq!(rx.recv().await.unwrap(), ElectionEvent::Completed { election_id });
        assert_eq!(rx.recv().await.unwrap(), ElectionEvent::Reopened { election_id });
        assert_eq!(rx.recv().await.unwrap(), ElectionEvent::Completed { election_id });
    }

    #[rocket::async_test]
    async fn create_rejects_taken_url() {
        let app = TestApp::new().await;
        app.insert(ElectionSettings::current_example(now())).await;
        let admin = Identity::admin(Id::new());

        let response = app
            .client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .cookie(app.cookie_for(&admin))
            .body(json!(ElectionSpec::example(now())).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
        let body = response.into_json::<Value>().await.unwrap();
        assert_eq!(body["kind"], "duplicate_url");
    }

    #[rocket::async_test]
    async fn edit_election_settings() {
        let app = TestApp::new().await;
        let (first, _) = app.insert(ElectionSettings::current_example(now())).await;
        let (second, _) = app.insert(ElectionSettings::runoff_example(now())).await;
        let admin = Identity::admin(Id::new());

        // Someone else's url.
        let mut edit = ElectionEdit::from(first.settings.clone());
        edit.url = second.settings.url.clone();
        let response = app
            .client
            .put(uri!(edit_election(first.id)))
            .header(ContentType::JSON)
            .cookie(app.cookie_for(&admin))
            .body(json!(edit).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);

        // Blank name.
        let mut edit = ElectionEdit::from(first.settings.clone());
        edit.name = " ".to_string();
        let response = app
            .client
            .put(uri!(edit_election(first.id)))
            .header(ContentType::JSON)
            .cookie(app.cookie_for(&admin))
            .body(json!(edit).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        // Own url, new name and year restriction.
        let mut edit = ElectionEdit::from(first.settings.clone());
        edit.name = "Senior Caucus (rerun)".to_string();
        edit.allowed_grad_years.insert(2025);
        let response = app
            .client
            .put(uri!(edit_election(first.id)))
            .header(ContentType::JSON)
            .cookie(app.cookie_for(&admin))
            .body(json!(edit).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let description = response.into_json::<ElectionDescription>().await.unwrap();
        assert_eq!(description.name, "Senior Caucus (rerun)");
        assert_eq!(description.url, "senior-caucus");
        // Admins have no graduation year.
        assert!(!description.user_is_eligible);

        let response = app
            .client
            .put(uri!(edit_election(Id::new())))
            .header(ContentType::JSON)
            .cookie(app.cookie_for(&admin))
            .body(json!(ElectionEdit::from(first.settings.clone())).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }
}
