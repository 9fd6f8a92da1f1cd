use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::events::{ElectionEvent, EventBus};
use crate::model::{
    api::election::ElectionEdit,
    db::election::{Election, ElectionCore},
    mongodb::Id,
};
use crate::store::Store;

/// Is the election accepting votes at `now`?
///
/// Open from `start` (inclusive) until `end` (exclusive), unless an admin has
/// marked it completed. Derived on every call, never stored.
pub fn is_open(election: &ElectionCore, now: DateTime<Utc>) -> bool {
    now >= election.settings.start && now < election.settings.end && !election.completed
}

/// Admin transitions of an election.
///
/// Callers are responsible for checking admin privileges. Completion is
/// independent of the time window: nothing completes an election
/// automatically, and an admin may complete or reopen at any time.
pub struct Lifecycle<'a> {
    store: &'a dyn Store,
    events: Option<&'a EventBus>,
}

impl<'a> Lifecycle<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self {
            store,
            events: None,
        }
    }

    /// Publish an event after every successful transition.
    pub fn with_events(mut self, events: &'a EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Validate and overwrite the editable settings of an election.
    pub async fn edit(&self, id: Id, edit: ElectionEdit) -> Result<Election> {
        let settings = edit.validate()?;
        let election = self.store.update_settings(id, &settings).await?;
        info!("Edited election {id}");
        self.publish(ElectionEvent::Edited { election_id: id });
        Ok(election)
    }

    /// Mark an election completed. Idempotent.
    pub async fn complete(&self, id: Id) -> Result<Election> {
        let election = self.store.set_completed(id, true).await?;
        info!("Completed election {id}");
        self.publish(ElectionEvent::Completed { election_id: id });
        Ok(election)
    }

    /// Clear an election's completed flag. Idempotent.
    pub async fn reopen(&self, id: Id) -> Result<Election> {
        let election = self.store.set_completed(id, false).await?;
        info!("Reopened election {id}");
        self.publish(ElectionEvent::Reopened { election_id: id });
        Ok(election)
    }

    fn publish(&self, event: ElectionEvent) {
        if let Some(events) = self.events {
            events.publish(event);
        }
    }
}
