//! The endpoint for creating new user accounts.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
};
use email_address::EmailAddress;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    auth::{PasswordHash, UserID, ValidatedPassword, create_user},
    db::lock_connection,
};

/// The state needed for creating a new user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The bcrypt cost used when hashing the password.
    pub password_hash_cost: u32,
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            password_hash_cost: state.password_hash_cost,
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The details sent by the client to register.
#[derive(Serialize, Deserialize)]
pub struct RegisterData {
    /// The email address to log in with.
    pub email: String,
    /// The name shown to other users.
    pub nickname: String,
    /// The raw password.
    pub password: String,
}

/// The newly created user, without any credentials.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisteredUser {
    /// The ID of the new user.
    pub id: UserID,
    /// The email address the user registered with.
    pub email: String,
    /// The user's nickname.
    pub nickname: String,
}

/// Register a new user and respond with 201 Created.
///
/// # Errors
///
/// Returns an error if the email is invalid or already registered, the
/// nickname is empty, or the password is too weak.
pub async fn register_user(
    State(state): State<RegistrationState>,
    Json(data): Json<RegisterData>,
) -> Result<(StatusCode, Json<RegisteredUser>), Error> {
    let email: EmailAddress = data
        .email
        .trim()
        .parse()
        .map_err(|_| Error::InvalidEmail(data.email.clone()))?;

    let password = ValidatedPassword::new(&data.password, &[email.as_str(), &data.nickname])?;
    let password_hash = PasswordHash::new(password, state.password_hash_cost)?;

    let connection = lock_connection(&state.db_connection)?;
    let user = create_user(&email, &data.nickname, password_hash, &connection)?;

    tracing::info!("Registered user {}", user.id);

    Ok((
        StatusCode::CREATED,
        Json(RegisteredUser {
            id: user.id,
            email: user.email,
            nickname: user.nickname,
        }),
    ))
}

#[cfg(test)]
mod register_user_tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::json;

    use crate::{
        auth::get_user_by_email,
        build_router, endpoints,
        test_utils::{TEST_PASSWORD, get_test_state},
    };

    use super::RegisteredUser;

    fn get_test_server() -> (TestServer, crate::AppState) {
        let (state, _receiver) = get_test_state();
        let server =
            TestServer::new(build_router(state.clone())).expect("Could not create test server.");

        (server, state)
    }

    #[tokio::test]
    async fn register_user_succeeds() {
        let (server, state) = get_test_server();

        let response = server
            .post(endpoints::USERS)
            .json(&json!({
                "email": "foo@bar.baz",
                "nickname": "foo",
                "password": TEST_PASSWORD,
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: RegisteredUser = response.json();
        assert_eq!(body.email, "foo@bar.baz");

        let connection = state.db_connection.lock().unwrap();
        let stored = get_user_by_email("foo@bar.baz", &connection).unwrap();
        assert_eq!(stored.id, body.id);
        assert!(stored.password_hash.verify(TEST_PASSWORD).unwrap());
    }

    #[tokio::test]
    async fn register_user_fails_with_invalid_email() {
        let (server, _state) = get_test_server();

        let response = server
            .post(endpoints::USERS)
            .json(&json!({
                "email": "not-an-email",
                "nickname": "foo",
                "password": TEST_PASSWORD,
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json_contains(&json!({"code": "INVALID_EMAIL"}));
    }

    #[tokio::test]
    async fn register_user_fails_with_weak_password() {
        let (server, _state) = get_test_server();

        let response = server
            .post(endpoints::USERS)
            .json(&json!({
                "email": "foo@bar.baz",
                "nickname": "foo",
                "password": "password",
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json_contains(&json!({"code": "PASSWORD_TOO_WEAK"}));
    }

    #[tokio::test]
    async fn register_user_fails_with_duplicate_email() {
        let (server, _state) = get_test_server();
        let body = json!({
            "email": "foo@bar.baz",
            "nickname": "foo",
            "password": TEST_PASSWORD,
        });

        server.post(endpoints::USERS).json(&body).await.assert_status(StatusCode::CREATED);
        let response = server.post(endpoints::USERS).json(&body).await;

        response.assert_status(StatusCode::CONFLICT);
        response.assert_json_contains(&json!({"code": "DUPLICATE_EMAIL"}));
    }
}
