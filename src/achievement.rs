//! Per-user achievement counters.
//!
//! Counters are bumped as side effects of other features (creating a budget,
//! receiving a budget warning, inviting a friend) and can be read by the user.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    auth::UserID,
    db::{is_foreign_key_violation, lock_connection},
};

/// The kinds of events that are counted towards a user's achievements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AchievementKind {
    /// The user set up a budget.
    BudgetsCreated,
    /// The user was warned about using half their budget.
    BudgetWarnings,
    /// The user invited a friend to a challenge.
    FriendsInvited,
}

impl AchievementKind {
    fn column(self) -> &'static str {
        match self {
            AchievementKind::BudgetsCreated => "budgets_created",
            AchievementKind::BudgetWarnings => "budget_warnings",
            AchievementKind::FriendsInvited => "friends_invited",
        }
    }
}

/// The counters for a single user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievements {
    /// How many budgets the user has created.
    pub budgets_created: i64,
    /// How many budget warnings the user has received.
    pub budget_warnings: i64,
    /// How many friends the user has invited to challenges.
    pub friends_invited: i64,
}

/// Create the achievement table.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn create_achievement_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS achievement (
            user_id INTEGER PRIMARY KEY,
            budgets_created INTEGER NOT NULL DEFAULT 0,
            budget_warnings INTEGER NOT NULL DEFAULT 0,
            friends_invited INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

/// Add one to the `kind` counter of the user, creating their row if needed.
///
/// # Errors
/// Returns [Error::UserNotFound] if the user does not exist.
pub fn increment_achievement(
    user_id: UserID,
    kind: AchievementKind,
    connection: &Connection,
) -> Result<(), Error> {
    let column = kind.column();

    connection
        .execute(
            &format!(
                "INSERT INTO achievement (user_id, {column}) VALUES (?1, 1)
                ON CONFLICT(user_id) DO UPDATE SET {column} = {column} + 1"
            ),
            [user_id],
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

/// Get the counters of the user. Users without any achievements get zeroes.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn get_achievements(user_id: UserID, connection: &Connection) -> Result<Achievements, Error> {
    let result = connection
        .prepare(
            "SELECT budgets_created, budget_warnings, friends_invited
            FROM achievement WHERE user_id = ?1",
        )?
        .query_row([user_id], |row| {
            Ok(Achievements {
                budgets_created: row.get(0)?,
                budget_warnings: row.get(1)?,
                friends_invited: row.get(2)?,
            })
        });

    match result {
        Ok(achievements) => Ok(achievements),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(Achievements::default()),
        Err(error) => Err(error.into()),
    }
}

/// The state needed to read achievements.
#[derive(Debug, Clone)]
pub struct AchievementState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AchievementState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for reading the logged in user's achievements.
pub async fn get_my_achievements_endpoint(
    State(state): State<AchievementState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Achievements>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_achievements(user_id, &connection).map(Json)
}
