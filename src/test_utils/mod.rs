#![allow(missing_docs)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_extra::extract::cookie::Cookie;
use axum_test::TestServer;
use email_address::EmailAddress;
use rusqlite::Connection;
use serde_json::json;
use time::PrimitiveDateTime;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::{
    AppState, DomainEvent, Error, User, UserID,
    account_book::{EntryType, NewEntry},
    auth::{COOKIE_TOKEN, PasswordHash, ValidatedPassword, create_user},
    build_router,
    category::get_category_by_key,
    codef::{CodefClient, CodefConfig},
    db::{initialize, lock_connection},
    endpoints,
    notification::{Notifier, SpendNotification},
};

/// A password that passes the strength check.
pub const TEST_PASSWORD: &str = "averysafeandsecurepassword";

/// The lowest cost bcrypt accepts, so that tests do not spend their time hashing.
pub const TEST_HASH_COST: u32 = 4;

/// An address nothing listens on, for tests that never reach Codef.
const UNREACHABLE_URL: &str = "http://127.0.0.1:9";

pub fn get_test_connection() -> Connection {
    let connection = Connection::open_in_memory().expect("Could not open database in memory.");
    initialize(&connection).expect("Could not initialize database.");

    connection
}

fn create_test_user(connection: &Connection, email: &str, nickname: &str) -> User {
    let email: EmailAddress = email.parse().expect("Invalid test email.");
    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked(TEST_PASSWORD),
        TEST_HASH_COST,
    )
    .expect("Could not hash test password.");

    create_user(&email, nickname, password_hash, connection).expect("Could not create test user.")
}

/// Insert a user whose nickname is the local part of `email`.
pub fn insert_test_user(connection: &Connection, email: &str) -> User {
    let nickname = email.split('@').next().unwrap_or(email);

    create_test_user(connection, email, nickname)
}

/// A lunch bought at `occurred_at`.
pub fn new_spend(
    connection: &Connection,
    user_id: UserID,
    amount: i64,
    occurred_at: PrimitiveDateTime,
) -> NewEntry {
    NewEntry {
        user_id,
        title: "Lunch".to_owned(),
        entry_type: EntryType::Spend,
        amount,
        memo: None,
        category: get_category_by_key("food", connection).expect("Missing food category."),
        occurred_at,
        end_date: None,
        repeat: None,
    }
}

fn codef_config(base_url: &str) -> CodefConfig {
    CodefConfig {
        api_url: base_url.to_owned(),
        oauth_url: base_url.to_owned(),
        client_id: "client".to_owned(),
        client_secret: "secret".to_owned(),
    }
}

fn build_test_state(
    notifier: Arc<dyn Notifier>,
    codef_url: &str,
) -> (AppState, UnboundedReceiver<DomainEvent>) {
    let connection = Connection::open_in_memory().expect("Could not open database in memory.");
    let (mut state, receiver) = AppState::new(
        connection,
        "42",
        "Asia/Seoul",
        notifier,
        CodefClient::new(codef_config(codef_url)),
    )
    .expect("Could not create app state.");
    state.password_hash_cost = TEST_HASH_COST;

    (state, receiver)
}

pub fn get_test_state() -> (AppState, UnboundedReceiver<DomainEvent>) {
    build_test_state(Arc::new(RecordingNotifier::default()), UNREACHABLE_URL)
}

pub fn register_test_user(state: &AppState, email: &str, nickname: &str) -> User {
    let connection = lock_connection(&state.db_connection).expect("Could not lock database.");

    create_test_user(&connection, email, nickname)
}

/// A notifier that keeps every notification instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SpendNotification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SpendNotification> {
        self.sent.lock().expect("Notifier lock poisoned.").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_spend_notification(
        &self,
        notification: &SpendNotification,
    ) -> Result<(), Error> {
        self.sent
            .lock()
            .expect("Notifier lock poisoned.")
            .push(notification.clone());

        Ok(())
    }
}

/// The full router over an in-memory database.
///
/// Events are not handled by a worker, tests read them from `events` or
/// call the handlers directly.
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub events: UnboundedReceiver<DomainEvent>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_codef_url(UNREACHABLE_URL)
    }

    /// Create an app whose Codef client talks to `codef_url`.
    pub fn with_codef_url(codef_url: &str) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        let (state, events) = build_test_state(notifier.clone(), codef_url);
        let server =
            TestServer::new(build_router(state.clone())).expect("Could not create test server.");

        Self {
            server,
            state,
            events,
            notifier,
        }
    }

    /// Register a user and log them in, returning the user and their auth cookie.
    pub async fn log_in_new_user(&self, email: &str, nickname: &str) -> (User, Cookie<'static>) {
        let user = register_test_user(&self.state, email, nickname);

        let response = self
            .server
            .post(endpoints::LOG_IN)
            .json(&json!({"email": email, "password": TEST_PASSWORD}))
            .await;
        response.assert_status_ok();

        (user, response.cookie(COOKIE_TOKEN))
    }
}
