//! Route handlers for managing the user's budget.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    achievement::{AchievementKind, increment_achievement},
    auth::UserID,
    budget::{
        Budget, BudgetSummary, create_budget, delete_budget, get_budget_summary,
        update_budget_amount,
    },
    db::lock_connection,
    timezone::local_now,
};

/// The state needed by the budget endpoints.
#[derive(Debug, Clone)]
pub struct BudgetState {
    /// The database connection for managing budgets.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Seoul".
    pub local_timezone: String,
}

impl FromRef<AppState> for BudgetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The request body for creating or changing a budget.
#[derive(Debug, Deserialize)]
pub struct BudgetRequest {
    /// The monthly limit.
    pub amount: i64,
}

/// A route handler for creating the user's budget for the current month.
///
/// Creating the budget and counting the achievement happen in one transaction.
pub async fn create_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    Json(request): Json<BudgetRequest>,
) -> Result<(StatusCode, Json<Budget>), Error> {
    let now = local_now(&state.local_timezone)?;

    let connection = lock_connection(&state.db_connection)?;
    let transaction = connection.unchecked_transaction()?;

    let budget = create_budget(user_id, request.amount, now.month() as u8, &transaction)?;
    increment_achievement(user_id, AchievementKind::BudgetsCreated, &transaction)?;

    transaction.commit()?;

    tracing::info!("User {user_id} created budget {}", budget.id);

    Ok((StatusCode::CREATED, Json(budget)))
}

/// A route handler for reading the user's budget and this month's spend.
pub async fn get_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<BudgetSummary>, Error> {
    let now = local_now(&state.local_timezone)?;
    let connection = lock_connection(&state.db_connection)?;

    get_budget_summary(user_id, now, &connection).map(Json)
}

/// A route handler for changing the limit of the user's budget.
pub async fn update_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    Path(budget_id): Path<i64>,
    Json(request): Json<BudgetRequest>,
) -> Result<Json<Budget>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    update_budget_amount(budget_id, user_id, request.amount, &connection).map(Json)
}

/// A route handler for deleting the user's budget.
pub async fn delete_budget_endpoint(
    State(state): State<BudgetState>,
    Extension(user_id): Extension<UserID>,
    Path(budget_id): Path<i64>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    delete_budget(budget_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}
