//! Defines the budget model, the usage calculations and the database queries for budgets.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use crate::{
    Error,
    account_book::sum_spend,
    auth::UserID,
    db::{is_foreign_key_violation, is_unique_violation},
    frequency::Frequency,
};

// ============================================================================
// MODELS
// ============================================================================

/// A monthly spending limit. Each user has at most one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    /// The ID of the budget.
    pub id: i64,
    /// The user the budget belongs to.
    pub user_id: UserID,
    /// The most the user wants to spend in a month.
    pub amount: i64,
    /// The month (1-12) the budget was created in.
    pub month: u8,
}

/// A budget along with how much of it has been used this month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetSummary {
    /// The ID of the budget.
    pub id: i64,
    /// The monthly limit.
    pub budget: i64,
    /// The month (1-12) the budget was created in.
    pub month: u8,
    /// The total spend dated within this month.
    pub total: i64,
    /// The percentage of the budget used, truncated to a whole number.
    pub usage_rate: i64,
}

impl BudgetSummary {
    /// Whether spending has reached the point where the user should be warned.
    pub fn needs_warning(&self) -> bool {
        exceeds_warning_threshold(self.total, self.budget)
    }
}

/// The percentage of `budget` that `total` makes up, truncated.
///
/// A non-positive budget has a usage rate of zero.
pub fn calc_usage_rate(total: i64, budget: i64) -> i64 {
    if budget <= 0 {
        return 0;
    }

    total * 100 / budget
}

/// Whether `total` is at least half of `budget`.
pub fn exceeds_warning_threshold(total: i64, budget: i64) -> bool {
    budget > 0 && total * 2 >= budget
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the budget table.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL UNIQUE,
            amount INTEGER NOT NULL,
            month INTEGER NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

fn map_row(row: &Row) -> Result<Budget, rusqlite::Error> {
    Ok(Budget {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        month: row.get(3)?,
    })
}

/// Create a budget of `amount` for the user in `month`.
///
/// # Errors
/// Returns [Error::InvalidAmount] if `amount` is not positive,
/// [Error::DuplicateBudget] if the user already has a budget or
/// [Error::UserNotFound] if the user does not exist.
pub fn create_budget(
    user_id: UserID,
    amount: i64,
    month: u8,
    connection: &Connection,
) -> Result<Budget, Error> {
    if amount <= 0 {
        return Err(Error::InvalidAmount(amount));
    }

    connection
        .execute(
            "INSERT INTO budget (user_id, amount, month) VALUES (?1, ?2, ?3)",
            (user_id, amount, month),
        )
        .map_err(|error| {
            if is_unique_violation(&error) {
                Error::DuplicateBudget
            } else if is_foreign_key_violation(&error) {
                Error::UserNotFound
            } else {
                error.into()
            }
        })?;

    Ok(Budget {
        id: connection.last_insert_rowid(),
        user_id,
        amount,
        month,
    })
}

/// Get the user's budget.
///
/// # Errors
/// Returns [Error::BudgetNotFound] if the user has no budget.
pub fn get_budget(user_id: UserID, connection: &Connection) -> Result<Budget, Error> {
    connection
        .prepare("SELECT id, user_id, amount, month FROM budget WHERE user_id = ?1")?
        .query_row([user_id], map_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::BudgetNotFound,
            error => error.into(),
        })
}

/// Get the user's budget and the spend over the whole month containing `now`.
///
/// # Errors
/// Returns [Error::BudgetNotFound] if the user has no budget.
pub fn get_budget_summary(
    user_id: UserID,
    now: PrimitiveDateTime,
    connection: &Connection,
) -> Result<BudgetSummary, Error> {
    let budget = get_budget(user_id, connection)?;
    let month_start = Frequency::Monthly.start_of_current(now);
    let month_end = Frequency::Monthly.end_of_current(now);
    let total = sum_spend(user_id, month_start, month_end, None, connection)?;

    Ok(BudgetSummary {
        id: budget.id,
        budget: budget.amount,
        month: budget.month,
        total,
        usage_rate: calc_usage_rate(total, budget.amount),
    })
}

/// Set the limit of the budget `id` owned by the user.
///
/// # Errors
/// Returns [Error::InvalidAmount] if `amount` is not positive or
/// [Error::BudgetNotFound] if the budget does not exist or belongs to another user.
pub fn update_budget_amount(
    id: i64,
    user_id: UserID,
    amount: i64,
    connection: &Connection,
) -> Result<Budget, Error> {
    if amount <= 0 {
        return Err(Error::InvalidAmount(amount));
    }

    let rows_affected = connection.execute(
        "UPDATE budget SET amount = ?1 WHERE id = ?2 AND user_id = ?3",
        (amount, id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::BudgetNotFound);
    }

    get_budget(user_id, connection)
}

/// Delete the budget `id` owned by the user.
///
/// # Errors
/// Returns [Error::BudgetNotFound] if the budget does not exist or belongs to another user.
pub fn delete_budget(id: i64, user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM budget WHERE id = ?1 AND user_id = ?2",
        (id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::BudgetNotFound);
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod database_tests {
    use time::macros::datetime;

    use crate::{
        Error, UserID,
        account_book::create_entry,
        test_utils::{get_test_connection, insert_test_user, new_spend},
    };

    use super::{
        create_budget, delete_budget, get_budget, get_budget_summary, update_budget_amount,
    };

    #[test]
    fn second_budget_is_duplicate() {
        let conn = get_test_connection();
        let user = insert_test_user(&conn, "foo@bar.baz");

        create_budget(user.id, 100_000, 3, &conn).unwrap();

        assert_eq!(
            create_budget(user.id, 200_000, 3, &conn),
            Err(Error::DuplicateBudget)
        );
    }

    #[test]
    fn create_rejects_non_positive_amount() {
        let conn = get_test_connection();
        let user = insert_test_user(&conn, "foo@bar.baz");

        assert_eq!(
            create_budget(user.id, 0, 3, &conn),
            Err(Error::InvalidAmount(0))
        );
    }

    #[test]
    fn create_for_missing_user_fails() {
        let conn = get_test_connection();

        assert_eq!(
            create_budget(UserID::new(99), 1000, 3, &conn),
            Err(Error::UserNotFound)
        );
    }

    #[test]
    fn summary_counts_spend_within_the_month() {
        let conn = get_test_connection();
        let user = insert_test_user(&conn, "foo@bar.baz");
        create_budget(user.id, 100, 3, &conn).unwrap();
        for (amount, occurred_at) in [
            (70, datetime!(2025-02-28 23:59:59)),
            (40, datetime!(2025-03-01 00:00:00)),
            (20, datetime!(2025-03-14 10:00:00)),
            (500, datetime!(2025-04-01 00:00:00)),
        ] {
            create_entry(new_spend(&conn, user.id, amount, occurred_at), &conn).unwrap();
        }

        let summary =
            get_budget_summary(user.id, datetime!(2025-03-15 12:00:00), &conn).unwrap();

        assert_eq!(summary.budget, 100);
        assert_eq!(summary.total, 60);
        assert_eq!(summary.usage_rate, 60);
        assert!(summary.needs_warning());
    }

    #[test]
    fn summary_counts_spend_dated_later_in_the_month() {
        let conn = get_test_connection();
        let user = insert_test_user(&conn, "foo@bar.baz");
        create_budget(user.id, 100, 3, &conn).unwrap();
        create_entry(
            new_spend(&conn, user.id, 60, datetime!(2025-03-25 09:00:00)),
            &conn,
        )
        .unwrap();

        let summary =
            get_budget_summary(user.id, datetime!(2025-03-15 12:00:00), &conn).unwrap();

        assert_eq!(summary.total, 60);
        assert_eq!(summary.usage_rate, 60);
        assert!(summary.needs_warning());
    }

    #[test]
    fn summary_without_budget_fails() {
        let conn = get_test_connection();
        let user = insert_test_user(&conn, "foo@bar.baz");

        assert_eq!(
            get_budget_summary(user.id, datetime!(2025-03-15 12:00:00), &conn),
            Err(Error::BudgetNotFound)
        );
    }

    #[test]
    fn update_and_delete_are_scoped_to_owner() {
        let conn = get_test_connection();
        let owner = insert_test_user(&conn, "owner@bar.baz");
        let other = insert_test_user(&conn, "other@bar.baz");
        let budget = create_budget(owner.id, 1000, 3, &conn).unwrap();

        assert_eq!(
            update_budget_amount(budget.id, other.id, 5, &conn),
            Err(Error::BudgetNotFound)
        );
        assert_eq!(
            delete_budget(budget.id, other.id, &conn),
            Err(Error::BudgetNotFound)
        );

        let updated = update_budget_amount(budget.id, owner.id, 2000, &conn).unwrap();
        assert_eq!(updated.amount, 2000);

        delete_budget(budget.id, owner.id, &conn).unwrap();
        assert_eq!(get_budget(owner.id, &conn), Err(Error::BudgetNotFound));
    }
}
