//! The in-process event bus for side effects that run after a request's changes are committed.
//!
//! Handlers publish a [DomainEvent] only once their database work has
//! succeeded. A single worker task consumes the events in order. Failures in
//! the worker are logged and never undo the committed changes.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use rusqlite::Connection;
use tokio::{
    sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel},
    task::JoinHandle,
};

use crate::{
    AppState, Error,
    achievement::{AchievementKind, increment_achievement},
    auth::UserID,
    budget::send_limit_warning,
    db::lock_connection,
    notification::Notifier,
};

/// Something that happened which other parts of the app react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    /// A user recorded a new spend entry.
    SpendCreated {
        /// The user who spent money.
        user_id: UserID,
        /// Their nickname, used in notifications.
        nickname: String,
    },
    /// A user invited a friend to a challenge.
    FriendInvited {
        /// The user who sent the invite.
        inviter_id: UserID,
    },
}

/// The sending half of the event bus.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: UnboundedSender<DomainEvent>,
}

impl EventPublisher {
    /// Create a publisher and the receiver the worker should consume.
    pub fn channel() -> (Self, UnboundedReceiver<DomainEvent>) {
        let (sender, receiver) = unbounded_channel();

        (Self { sender }, receiver)
    }

    /// Queue `event` for the worker.
    ///
    /// If the worker has stopped the event is dropped and an error is logged.
    pub fn publish(&self, event: DomainEvent) {
        tracing::debug!("Publishing {event:?}");

        if let Err(error) = self.sender.send(event) {
            tracing::error!("Could not publish {:?}, the event worker has stopped", error.0);
        }
    }
}

/// Everything the event handlers need.
#[derive(Debug, Clone)]
pub struct EventContext {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
    /// Delivers push notifications.
    pub notifier: Arc<dyn Notifier>,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Seoul".
    pub local_timezone: String,
}

impl FromRef<AppState> for EventContext {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            notifier: state.notifier.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// Run the side effects of a single event.
///
/// # Errors
/// Returns the first error raised by the handler for the event.
pub async fn handle_event(event: &DomainEvent, context: &EventContext) -> Result<(), Error> {
    match event {
        DomainEvent::SpendCreated { user_id, nickname } => {
            send_limit_warning(*user_id, nickname, context).await
        }
        DomainEvent::FriendInvited { inviter_id } => {
            let connection = lock_connection(&context.db_connection)?;
            increment_achievement(*inviter_id, AchievementKind::FriendsInvited, &connection)
        }
    }
}

/// Spawn the task that handles events until every [EventPublisher] is dropped.
pub fn spawn_event_worker(
    context: EventContext,
    mut receiver: UnboundedReceiver<DomainEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            if let Err(error) = handle_event(&event, &context).await {
                tracing::error!("Handling {event:?} failed: {error}");
            }
        }

        tracing::debug!("Event worker stopped.");
    })
}

#[cfg(test)]
mod event_tests {
    use axum::extract::FromRef;

    use crate::{
        UserID,
        achievement::get_achievements,
        test_utils::{TestApp, insert_test_user},
    };

    use super::{DomainEvent, EventContext, EventPublisher, handle_event, spawn_event_worker};

    #[tokio::test]
    async fn publish_reaches_receiver_in_order() {
        let (publisher, mut receiver) = EventPublisher::channel();
        let user_id = UserID::new(1);

        publisher.publish(DomainEvent::FriendInvited { inviter_id: user_id });
        publisher.publish(DomainEvent::SpendCreated {
            user_id,
            nickname: "foo".to_owned(),
        });

        assert_eq!(
            receiver.recv().await,
            Some(DomainEvent::FriendInvited { inviter_id: user_id })
        );
        assert!(matches!(
            receiver.recv().await,
            Some(DomainEvent::SpendCreated { .. })
        ));
    }

    #[tokio::test]
    async fn friend_invited_increments_achievement() {
        let app = TestApp::new();
        let context = EventContext::from_ref(&app.state);
        let user = {
            let conn = app.state.db_connection.lock().unwrap();
            insert_test_user(&conn, "foo@bar.baz")
        };

        handle_event(&DomainEvent::FriendInvited { inviter_id: user.id }, &context)
            .await
            .unwrap();

        let conn = app.state.db_connection.lock().unwrap();
        assert_eq!(get_achievements(user.id, &conn).unwrap().friends_invited, 1);
    }

    #[tokio::test]
    async fn worker_stops_when_publishers_are_dropped() {
        let app = TestApp::new();
        let context = EventContext::from_ref(&app.state);
        let (publisher, receiver) = EventPublisher::channel();
        let handle = spawn_event_worker(context, receiver);

        publisher.publish(DomainEvent::FriendInvited {
            inviter_id: UserID::new(404),
        });
        drop(publisher);

        handle.await.expect("worker panicked");
    }
}
