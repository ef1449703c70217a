//! Route handlers for connecting a bank account and reading its transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::Value;
use time::Duration;

use crate::{
    AppState, Error,
    auth::UserID,
    codef::{BankCredentials, CodefAccount, CodefClient, get_codef_account, upsert_codef_account},
    db::lock_connection,
    timezone::local_now,
};

/// How far back the transaction list reaches.
pub const TRANSACTION_LOOKBACK: Duration = Duration::days(90);

/// The state needed by the Codef endpoints.
#[derive(Debug, Clone)]
pub struct CodefState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The Codef API client.
    pub codef_client: Arc<CodefClient>,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Seoul".
    pub local_timezone: String,
}

impl FromRef<AppState> for CodefState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            codef_client: state.codef_client.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The request body for connecting a bank account.
#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    /// The Codef organization code of the bank.
    pub organization: String,
    /// The internet banking login ID.
    pub id: String,
    /// The internet banking password.
    pub password: String,
    /// The account number to read transactions from.
    pub account: String,
}

/// A route handler that refreshes the Codef access token.
pub async fn get_token_endpoint(State(state): State<CodefState>) -> Result<StatusCode, Error> {
    state.codef_client.refresh_access_token().await?;

    Ok(StatusCode::NO_CONTENT)
}

/// A route handler that registers the user's bank login with Codef and stores the account.
pub async fn connect_endpoint(
    State(state): State<CodefState>,
    Extension(user_id): Extension<UserID>,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<bool>, Error> {
    let credentials = BankCredentials {
        organization: request.organization,
        login_id: request.id,
        password: request.password,
    };
    let connected_id = state.codef_client.create_connected_id(&credentials).await?;

    let account = CodefAccount {
        user_id,
        connected_id,
        organization: credentials.organization,
        account: request.account,
    };
    let connection = lock_connection(&state.db_connection)?;
    upsert_codef_account(&account, &connection)?;

    tracing::info!("User {user_id} connected bank {}", account.organization);

    Ok(Json(true))
}

/// A route handler for the recent transactions of the user's connected account.
pub async fn transactions_endpoint(
    State(state): State<CodefState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Value>, Error> {
    let account = {
        let connection = lock_connection(&state.db_connection)?;
        get_codef_account(user_id, &connection)?
    };
    let today = local_now(&state.local_timezone)?.date();

    let document = state
        .codef_client
        .get_transaction_list(
            &account.connected_id,
            &account.organization,
            &account.account,
            today - TRANSACTION_LOOKBACK,
            today,
        )
        .await?;

    Ok(Json(document))
}

#[cfg(test)]
mod codef_endpoint_tests {
    use axum::http::StatusCode;
    use httpmock::prelude::*;
    use serde_json::json;

    use crate::{
        codef::{CodefAccount, get_codef_account, upsert_codef_account},
        db::lock_connection,
        endpoints,
        test_utils::TestApp,
    };

    fn encoded(document: serde_json::Value) -> String {
        urlencoding::encode(&document.to_string()).into_owned()
    }

    async fn mock_token(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth/token");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({"access_token": "token-1", "expires_in": 3600}));
            })
            .await;
    }

    #[tokio::test]
    async fn token_endpoint_returns_no_content() {
        let server = MockServer::start_async().await;
        mock_token(&server).await;
        let app = TestApp::with_codef_url(&server.base_url());
        let (_user, cookie) = app.log_in_new_user("foo@bar.baz", "foo").await;

        app.server
            .get(endpoints::CODEF_TOKEN)
            .add_cookie(cookie)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn connect_stores_account() {
        let server = MockServer::start_async().await;
        mock_token(&server).await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/account/create");
                then.status(200).body(encoded(json!({
                    "result": {"code": "CF-00000", "message": "성공"},
                    "data": {"connectedId": "conn-1"},
                })));
            })
            .await;
        let app = TestApp::with_codef_url(&server.base_url());
        let (user, cookie) = app.log_in_new_user("foo@bar.baz", "foo").await;

        let response = app
            .server
            .post(endpoints::CODEF_CONNECT)
            .add_cookie(cookie)
            .json(&json!({
                "organization": "0004",
                "id": "me",
                "password": "pw",
                "account": "123-456",
            }))
            .await;

        response.assert_status_ok();
        response.assert_json(&json!(true));
        let connection = lock_connection(&app.state.db_connection).unwrap();
        let account = get_codef_account(user.id, &connection).unwrap();
        assert_eq!(account.connected_id, "conn-1");
        assert_eq!(account.account, "123-456");
    }

    #[tokio::test]
    async fn rejected_connect_reports_codef_code() {
        let server = MockServer::start_async().await;
        mock_token(&server).await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/account/create");
                then.status(200).body(encoded(json!({
                    "result": {"code": "CF-12801", "message": "비밀번호 오류"},
                })));
            })
            .await;
        let app = TestApp::with_codef_url(&server.base_url());
        let (_user, cookie) = app.log_in_new_user("foo@bar.baz", "foo").await;

        let response = app
            .server
            .post(endpoints::CODEF_CONNECT)
            .add_cookie(cookie)
            .json(&json!({
                "organization": "0004",
                "id": "me",
                "password": "wrong",
                "account": "123-456",
            }))
            .await;

        response.assert_status(StatusCode::BAD_GATEWAY);
        response.assert_json_contains(&json!({"code": "CODEF_API_ERROR"}));
    }

    #[tokio::test]
    async fn transactions_without_account_is_not_found() {
        let app = TestApp::new();
        let (_user, cookie) = app.log_in_new_user("foo@bar.baz", "foo").await;

        let response = app
            .server
            .get(endpoints::CODEF_TRANSACTIONS)
            .add_cookie(cookie)
            .await;

        response.assert_status_not_found();
        response.assert_json_contains(&json!({"code": "CODEF_ACCOUNT_NOT_FOUND"}));
    }

    #[tokio::test]
    async fn transactions_returns_decoded_document() {
        let server = MockServer::start_async().await;
        mock_token(&server).await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/kr/bank/p/account/transaction-list")
                    .json_body_partial(r#"{"connectedId": "conn-1", "account": "123-456"}"#);
                then.status(200).body(encoded(json!({
                    "result": {"code": "CF-00000", "message": "성공"},
                    "data": {"resTrHistoryList": [{"resAccountOut": "8000"}]},
                })));
            })
            .await;
        let app = TestApp::with_codef_url(&server.base_url());
        let (user, cookie) = app.log_in_new_user("foo@bar.baz", "foo").await;
        {
            let connection = lock_connection(&app.state.db_connection).unwrap();
            upsert_codef_account(
                &CodefAccount {
                    user_id: user.id,
                    connected_id: "conn-1".to_owned(),
                    organization: "0004".to_owned(),
                    account: "123-456".to_owned(),
                },
                &connection,
            )
            .unwrap();
        }

        let response = app
            .server
            .get(endpoints::CODEF_TRANSACTIONS)
            .add_cookie(cookie)
            .await;

        response.assert_status_ok();
        response.assert_json_contains(
            &json!({"data": {"resTrHistoryList": [{"resAccountOut": "8000"}]}}),
        );
    }
}
