/*! This module sets up the application's database and provides helpers shared by the domain modules. */

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, TransactionBehavior, ffi};

use crate::{
    Error, account_book::create_account_book_table, achievement::create_achievement_table,
    auth::create_user_table, budget::create_budget_table, category::create_category_table,
    challenge::create_challenge_tables, codef::create_codef_account_table,
    notification::create_fcm_token_table,
};

/// Create all tables used by the application and seed the shared category list.
///
/// All statements are idempotent, so this function can be called on every start.
///
/// # Errors
/// Returns an error if any of the tables could not be created.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;

    let transaction = rusqlite::Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_category_table(&transaction)?;
    create_account_book_table(&transaction)?;
    create_budget_table(&transaction)?;
    create_achievement_table(&transaction)?;
    create_fcm_token_table(&transaction)?;
    create_challenge_tables(&transaction)?;
    create_codef_account_table(&transaction)?;

    transaction.commit()
}

/// Acquire the lock on the shared database connection.
///
/// # Errors
/// Returns [Error::DatabaseLockError] if the lock is poisoned.
pub fn lock_connection(
    connection: &Arc<Mutex<Connection>>,
) -> Result<MutexGuard<'_, Connection>, Error> {
    connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })
}

/// Whether `error` was caused by a UNIQUE or PRIMARY KEY constraint.
pub fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(sql_error, _)
            if sql_error.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || sql_error.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

/// Whether `error` was caused by a FOREIGN KEY constraint.
pub fn is_foreign_key_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(sql_error, _)
            if sql_error.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

#[cfg(test)]
mod db_tests {
    use rusqlite::Connection;

    use super::{initialize, is_foreign_key_violation, is_unique_violation};

    #[test]
    fn initialize_is_idempotent() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).expect("first initialization failed");
        initialize(&connection).expect("second initialization failed");

        let categories: i64 = connection
            .query_row("SELECT COUNT(id) FROM category", [], |row| row.get(0))
            .unwrap();
        assert!(categories > 0, "categories should be seeded");
    }

    #[test]
    fn detects_unique_violation() {
        let connection = Connection::open_in_memory().unwrap();
        connection
            .execute_batch("CREATE TABLE t (name TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();

        let error = connection
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err();

        assert!(is_unique_violation(&error));
        assert!(!is_foreign_key_violation(&error));
    }

    #[test]
    fn detects_foreign_key_violation() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();

        let error = connection
            .execute("INSERT INTO budget (user_id, amount, month) VALUES (999, 1, 1)", [])
            .unwrap_err();

        assert!(is_foreign_key_violation(&error));
    }
}
