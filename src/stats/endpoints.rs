//! Route handlers for spending statistics.
//!
//! Every handler takes the period granularity from the URL and measures the
//! current period up to the current local time.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
};
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    AppState, Error,
    account_book::AccountBookEntry,
    auth::UserID,
    category::{Category, resolve_category},
    db::lock_connection,
    frequency::{Frequency, PeriodRange},
    stats::{
        CategorySpend, ConsumeComparison, compare_category_spend, get_category_spend_entries,
        get_spend_by_category,
    },
    timezone::local_now,
};

/// The state needed by the statistics endpoints.
#[derive(Debug, Clone)]
pub struct StatsState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Seoul".
    pub local_timezone: String,
}

impl FromRef<AppState> for StatsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// Spend per category in the current period.
#[derive(Debug, Serialize)]
pub struct StatListResponse {
    /// The granularity of the period.
    pub frequency: Frequency,
    /// The current and previous period.
    pub range: PeriodRange,
    /// The spend per category, largest first.
    pub categories: Vec<CategorySpend>,
}

/// Spend entries of one category in the current period.
#[derive(Debug, Serialize)]
pub struct CategoryListResponse {
    /// The granularity of the period.
    pub frequency: Frequency,
    /// The current and previous period.
    pub range: PeriodRange,
    /// The category.
    pub category: Category,
    /// The entries, newest first.
    pub entries: Vec<AccountBookEntry>,
}

/// Spend in one category this period against the previous one.
#[derive(Debug, Serialize)]
pub struct ConsumeResponse {
    /// The granularity of the period.
    pub frequency: Frequency,
    /// The current and previous period.
    pub range: PeriodRange,
    /// The category.
    pub category: Category,
    /// The totals and their difference.
    #[serde(flatten)]
    pub comparison: ConsumeComparison,
}

fn current_range(frequency: &str, state: &StatsState) -> Result<(Frequency, PeriodRange), Error> {
    let frequency: Frequency = frequency.parse()?;
    let now = local_now(&state.local_timezone)?;

    Ok((frequency, frequency.period_range(now)))
}

/// A route handler for the user's spend per category in the current period.
pub async fn stat_list_endpoint(
    State(state): State<StatsState>,
    Extension(user_id): Extension<UserID>,
    Path(frequency): Path<String>,
) -> Result<Json<StatListResponse>, Error> {
    let (frequency, range) = current_range(&frequency, &state)?;
    let connection = lock_connection(&state.db_connection)?;

    let categories =
        get_spend_by_category(user_id, range.current_start, range.now, &connection)?;

    Ok(Json(StatListResponse {
        frequency,
        range,
        categories,
    }))
}

/// A route handler for the user's spend entries of one category in the current period.
pub async fn category_list_endpoint(
    State(state): State<StatsState>,
    Extension(user_id): Extension<UserID>,
    Path((frequency, category)): Path<(String, String)>,
) -> Result<Json<CategoryListResponse>, Error> {
    let (frequency, range) = current_range(&frequency, &state)?;
    let connection = lock_connection(&state.db_connection)?;
    let category = resolve_category(&category, &connection)?;

    let entries = get_category_spend_entries(
        user_id,
        category.id,
        range.current_start,
        range.now,
        &connection,
    )?;

    Ok(Json(CategoryListResponse {
        frequency,
        range,
        category,
        entries,
    }))
}

/// A route handler comparing the user's spend in a category with the previous period.
pub async fn consume_endpoint(
    State(state): State<StatsState>,
    Extension(user_id): Extension<UserID>,
    Path((frequency, category)): Path<(String, String)>,
) -> Result<Json<ConsumeResponse>, Error> {
    let (frequency, range) = current_range(&frequency, &state)?;
    let connection = lock_connection(&state.db_connection)?;
    let category = resolve_category(&category, &connection)?;

    let comparison = compare_category_spend(user_id, category.id, &range, &connection)?;

    Ok(Json(ConsumeResponse {
        frequency,
        range,
        category,
        comparison,
    }))
}

#[cfg(test)]
mod stats_endpoint_tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::{
        endpoints::{self, format_endpoint_with},
        test_utils::TestApp,
    };

    async fn record_lunch(app: &TestApp, cookie: &axum_extra::extract::cookie::Cookie<'static>) {
        app.server
            .post(endpoints::ACCOUNT_BOOK)
            .add_cookie(cookie.clone())
            .json(&json!({
                "title": "Lunch",
                "entry_type": "SPEND",
                "amount": 8000,
                "category": "food",
            }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    #[tokio::test]
    async fn stat_list_includes_todays_spend() {
        let app = TestApp::new();
        let (_user, cookie) = app.log_in_new_user("foo@bar.baz", "foo").await;
        record_lunch(&app, &cookie).await;

        let body: Value = app
            .server
            .get(&format_endpoint_with(endpoints::STATS, &["daily"]))
            .add_cookie(cookie)
            .await
            .json();

        assert_eq!(body["frequency"], "daily");
        assert_eq!(body["categories"][0]["category"]["key"], "food");
        assert_eq!(body["categories"][0]["total"], 8000);
    }

    #[tokio::test]
    async fn category_list_accepts_korean_label() {
        let app = TestApp::new();
        let (_user, cookie) = app.log_in_new_user("foo@bar.baz", "foo").await;
        record_lunch(&app, &cookie).await;

        let body: Value = app
            .server
            .get(&format_endpoint_with(
                endpoints::STATS_CATEGORY,
                &["monthly", &urlencoding::encode("식비")],
            ))
            .add_cookie(cookie)
            .await
            .json();

        assert_eq!(body["category"]["key"], "food");
        assert_eq!(body["entries"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn consume_reports_difference() {
        let app = TestApp::new();
        let (_user, cookie) = app.log_in_new_user("foo@bar.baz", "foo").await;
        record_lunch(&app, &cookie).await;

        let body: Value = app
            .server
            .get(&format_endpoint_with(
                endpoints::STATS_CONSUME,
                &["yearly", "food"],
            ))
            .add_cookie(cookie)
            .await
            .json();

        assert_eq!(body["current_total"], 8000);
        assert_eq!(body["previous_total"], 0);
        assert_eq!(body["difference"], 8000);
    }

    #[tokio::test]
    async fn unknown_frequency_is_bad_request() {
        let app = TestApp::new();
        let (_user, cookie) = app.log_in_new_user("foo@bar.baz", "foo").await;

        let response = app
            .server
            .get(&format_endpoint_with(endpoints::STATS, &["hourly"]))
            .add_cookie(cookie)
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json_contains(&json!({"code": "INVALID_FREQUENCY"}));
    }
}
