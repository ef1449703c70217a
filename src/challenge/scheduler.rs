//! Moves challenges through their lifecycle as their dates pass.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rusqlite::Connection;
use time::Date;

use crate::{
    Error,
    challenge::{ChallengeStatus, set_challenge_status},
    db::lock_connection,
    timezone::local_now,
};

/// The number of challenges changed by one run of [update_challenge_statuses].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdates {
    /// Challenges that moved from recruiting to in progress.
    pub started: usize,
    /// Challenges that were marked as completed.
    pub completed: usize,
}

fn ids_where(
    condition: &str,
    today: Date,
    connection: &Connection,
) -> Result<Vec<i64>, rusqlite::Error> {
    connection
        .prepare(&format!("SELECT id FROM challenge WHERE {condition}"))?
        .query_map([today], |row| row.get(0))?
        .collect()
}

fn set_status_in_transaction(
    id: i64,
    status: ChallengeStatus,
    connection: &Connection,
) -> Result<(), Error> {
    let transaction = connection.unchecked_transaction()?;
    set_challenge_status(id, status, &transaction)?;
    transaction.commit()?;

    Ok(())
}

/// Start recruiting challenges whose period includes `today` and complete those that have ended.
///
/// Each challenge is updated in its own transaction, so a failure for one
/// challenge is logged and does not stop the others.
///
/// # Errors
/// Returns an error if the challenges to update could not be queried.
pub fn update_challenge_statuses(
    today: Date,
    connection: &Connection,
) -> Result<StatusUpdates, Error> {
    let mut updates = StatusUpdates::default();

    let to_start = ids_where(
        "status = 'RECRUITING' AND start_date <= ?1 AND end_date >= ?1",
        today,
        connection,
    )?;

    for id in to_start {
        match set_status_in_transaction(id, ChallengeStatus::InProgress, connection) {
            Ok(()) => updates.started += 1,
            Err(error) => tracing::error!("Could not start challenge {id}: {error}"),
        }
    }

    let to_complete = ids_where(
        "status <> 'COMPLETED' AND end_date < ?1",
        today,
        connection,
    )?;

    for id in to_complete {
        match set_status_in_transaction(id, ChallengeStatus::Completed, connection) {
            Ok(()) => updates.completed += 1,
            Err(error) => tracing::error!("Could not complete challenge {id}: {error}"),
        }
    }

    Ok(updates)
}

fn run_once(db_connection: &Arc<Mutex<Connection>>, local_timezone: &str) -> Result<(), Error> {
    let today = local_now(local_timezone)?.date();
    let connection = lock_connection(db_connection)?;
    let updates = update_challenge_statuses(today, &connection)?;

    if updates != StatusUpdates::default() {
        tracing::info!(
            "Started {} and completed {} challenges",
            updates.started,
            updates.completed
        );
    }

    Ok(())
}

/// Update challenge statuses every `period`, forever.
///
/// The first update runs immediately. Errors are logged and the next run goes ahead as planned.
pub async fn run_challenge_scheduler(
    db_connection: Arc<Mutex<Connection>>,
    local_timezone: String,
    period: Duration,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        if let Err(error) = run_once(&db_connection, &local_timezone) {
            tracing::error!("Challenge status update failed: {error}");
        }
    }
}
