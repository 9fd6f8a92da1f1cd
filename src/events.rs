use rocket::tokio::sync::broadcast::{self, Receiver, Sender};

use crate::model::mongodb::Id;

/// Something changed that callers holding election state may want to refresh.
///
/// Events name the election only: never a user, and never a vote token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionEvent {
    VoteCast { election_id: Id },
    Edited { election_id: Id },
    Completed { election_id: Id },
    Reopened { election_id: Id },
}

impl ElectionEvent {
    pub fn election_id(&self) -> Id {
        match *self {
            Self::VoteCast { election_id }
            | Self::Edited { election_id }
            | Self::Completed { election_id }
            | Self::Reopened { election_id } => election_id,
        }
    }
}

/// Fan-out of [`ElectionEvent`]s to any number of subscribers.
///
/// Publishing never blocks and never fails; slow subscribers lose the oldest
/// events once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: Sender<ElectionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> Receiver<ElectionEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ElectionEvent) {
        trace!("Publishing {event:?}");
        // An error only means nobody is listening right now.
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rocket::async_test]
    async fn subscribers_see_published_events() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        let election_id = Id::new();

        bus.publish(ElectionEvent::VoteCast { election_id });
        bus.publish(ElectionEvent::Completed { election_id });

        assert_eq!(rx.recv().await.unwrap(), ElectionEvent::VoteCast { election_id });
        let next = rx.recv().await.unwrap();
        assert_eq!(next, ElectionEvent::Completed { election_id });
        assert_eq!(next.election_id(), election_id);
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        EventBus::default().publish(ElectionEvent::Edited {
            election_id: Id::new(),
        });
    }
}
