//! Storage of the push notification device token of each user.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    auth::UserID,
    db::{is_foreign_key_violation, lock_connection},
};

/// Create the FCM token table.
///
/// Each user has at most one registered device.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn create_fcm_token_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS fcm_token (
            user_id INTEGER PRIMARY KEY,
            token TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

/// Store `token` as the user's device token, replacing any previous token.
///
/// # Errors
/// Returns [Error::EmptyFcmToken] if `token` is blank, or [Error::UserNotFound]
/// if the user does not exist.
pub fn upsert_fcm_token(user_id: UserID, token: &str, connection: &Connection) -> Result<(), Error> {
    let token = token.trim();

    if token.is_empty() {
        return Err(Error::EmptyFcmToken);
    }

    connection
        .execute(
            "INSERT INTO fcm_token (user_id, token) VALUES (?1, ?2)
            ON CONFLICT(user_id) DO UPDATE SET token = excluded.token",
            (user_id, token),
        )
        .map_err(|error| {
            if is_foreign_key_violation(&error) {
                Error::UserNotFound
            } else {
                error.into()
            }
        })?;

    Ok(())
}

/// Get the user's device token.
///
/// # Errors
/// Returns [Error::FcmTokenNotFound] if the user has not registered a device.
pub fn get_fcm_token(user_id: UserID, connection: &Connection) -> Result<String, Error> {
    connection
        .query_row(
            "SELECT token FROM fcm_token WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::FcmTokenNotFound,
            error => error.into(),
        })
}

/// The state needed to register device tokens.
#[derive(Debug, Clone)]
pub struct FcmTokenState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for FcmTokenState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for registering a device.
#[derive(Debug, Deserialize)]
pub struct FcmTokenRequest {
    /// The device token issued by the push provider.
    pub token: String,
}

/// A route handler for registering the device of the logged in user.
pub async fn put_fcm_token_endpoint(
    State(state): State<FcmTokenState>,
    Extension(user_id): Extension<UserID>,
    Json(request): Json<FcmTokenRequest>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    upsert_fcm_token(user_id, &request.token, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod fcm_token_tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{
        Error, endpoints,
        test_utils::{TestApp, get_test_connection, insert_test_user},
    };

    use super::{get_fcm_token, upsert_fcm_token};

    #[test]
    fn upsert_replaces_previous_token() {
        let conn = get_test_connection();
        let user = insert_test_user(&conn, "foo@bar.baz");

        upsert_fcm_token(user.id, "first", &conn).unwrap();
        upsert_fcm_token(user.id, "second", &conn).unwrap();

        assert_eq!(get_fcm_token(user.id, &conn).unwrap(), "second");
    }

    #[test]
    fn blank_token_is_rejected() {
        let conn = get_test_connection();
        let user = insert_test_user(&conn, "foo@bar.baz");

        assert_eq!(
            upsert_fcm_token(user.id, "   ", &conn),
            Err(Error::EmptyFcmToken)
        );
    }

    #[test]
    fn missing_token_is_not_found() {
        let conn = get_test_connection();
        let user = insert_test_user(&conn, "foo@bar.baz");

        assert_eq!(get_fcm_token(user.id, &conn), Err(Error::FcmTokenNotFound));
    }

    #[tokio::test]
    async fn put_endpoint_stores_token() {
        let app = TestApp::new();
        let (user, cookie) = app.log_in_new_user("foo@bar.baz", "foo").await;

        app.server
            .put(endpoints::FCM_TOKEN)
            .add_cookie(cookie)
            .json(&json!({"token": "device-1"}))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let conn = app.state.db_connection.lock().unwrap();
        assert_eq!(get_fcm_token(user.id, &conn).unwrap(), "device-1");
    }
}
