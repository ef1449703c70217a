//! The bank account each user has connected through Codef.

use rusqlite::{Connection, Row};
use serde::Serialize;

use crate::{Error, auth::UserID, db::is_foreign_key_violation};

/// A user's connected bank account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodefAccount {
    /// The owner of the account.
    pub user_id: UserID,
    /// The Codef connected ID for the user's bank login.
    pub connected_id: String,
    /// The Codef organization code of the bank.
    pub organization: String,
    /// The account number.
    pub account: String,
}

/// Create the table that stores connected accounts.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn create_codef_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS codef_account (
            user_id INTEGER PRIMARY KEY,
            connected_id TEXT NOT NULL,
            organization TEXT NOT NULL,
            account TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

/// Store `account`, replacing any account the user connected before.
///
/// # Errors
/// Returns [Error::UserNotFound] if the user does not exist or
/// [Error::SqlError] if there is some other SQL error.
pub fn upsert_codef_account(account: &CodefAccount, connection: &Connection) -> Result<(), Error> {
    connection
        .execute(
            "INSERT INTO codef_account (user_id, connected_id, organization, account)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
                connected_id = excluded.connected_id,
                organization = excluded.organization,
                account = excluded.account",
            (
                account.user_id,
                &account.connected_id,
                &account.organization,
                &account.account,
            ),
        )
        .map_err(|error| match error {
            error if is_foreign_key_violation(&error) => Error::UserNotFound,
            error => error.into(),
        })?;

    Ok(())
}

fn map_codef_account_row(row: &Row) -> Result<CodefAccount, rusqlite::Error> {
    Ok(CodefAccount {
        user_id: row.get(0)?,
        connected_id: row.get(1)?,
        organization: row.get(2)?,
        account: row.get(3)?,
    })
}

/// Get the account the user connected.
///
/// # Errors
/// Returns [Error::CodefAccountNotFound] if the user has not connected an account.
pub fn get_codef_account(user_id: UserID, connection: &Connection) -> Result<CodefAccount, Error> {
    connection
        .query_row(
            "SELECT user_id, connected_id, organization, account
            FROM codef_account WHERE user_id = ?1",
            [user_id],
            map_codef_account_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::CodefAccountNotFound,
            error => error.into(),
        })
}
