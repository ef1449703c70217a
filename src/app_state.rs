//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use rusqlite::Connection;
use sha2::{Digest, Sha512};
use time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::{
    Error,
    auth::{DEFAULT_COOKIE_DURATION, PasswordHash},
    codef::CodefClient,
    db::initialize,
    events::{DomainEvent, EventPublisher},
    notification::Notifier,
    pagination::PaginationConfig,
    timezone::get_local_offset,
};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,

    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,

    /// The local timezone as a canonical timezone name, e.g. "Asia/Seoul".
    pub local_timezone: String,

    /// The config that controls how lists are paged.
    pub pagination_config: PaginationConfig,

    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,

    /// Where handlers publish side effects that must run after their transaction commits.
    pub events: EventPublisher,

    /// Sends push notifications to users' devices.
    pub notifier: Arc<dyn Notifier>,

    /// The client for the Codef open banking API.
    pub codef_client: Arc<CodefClient>,

    /// The bcrypt cost used when hashing new passwords.
    pub password_hash_cost: u32,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// `local_timezone` should be a valid, canonical timezone name, e.g. "Asia/Seoul".
    ///
    /// Returns the state along with the receiving end of the event channel,
    /// which should be handed to [crate::spawn_event_worker].
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized or the timezone is unknown.
    pub fn new(
        db_connection: Connection,
        cookie_secret: &str,
        local_timezone: &str,
        notifier: Arc<dyn Notifier>,
        codef_client: CodefClient,
    ) -> Result<(Self, UnboundedReceiver<DomainEvent>), Error> {
        if get_local_offset(local_timezone).is_none() {
            return Err(Error::InvalidTimezoneError(local_timezone.to_owned()));
        }

        initialize(&db_connection)?;

        let (events, receiver) = EventPublisher::channel();

        let state = Self {
            cookie_key: create_cookie_key(cookie_secret),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            local_timezone: local_timezone.to_owned(),
            pagination_config: PaginationConfig::default(),
            db_connection: Arc::new(Mutex::new(db_connection)),
            events,
            notifier,
            codef_client: Arc::new(codef_client),
            password_hash_cost: PasswordHash::DEFAULT_COST,
        };

        Ok((state, receiver))
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Create a signing key for cookies from a `secret`s string.
pub fn create_cookie_key(secret: &str) -> Key {
    let hash = Sha512::digest(secret);

    Key::from(&hash)
}
