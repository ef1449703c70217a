//! Spending aggregations over a period.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use crate::{
    Error,
    account_book::{AccountBookEntry, SELECT_ENTRY, map_entry_row, sum_spend},
    auth::UserID,
    category::Category,
    frequency::PeriodRange,
};

/// The total spend in one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpend {
    /// The category the spend was recorded under.
    pub category: Category,
    /// The sum of the spend entries.
    pub total: i64,
}

/// The spend in a category this period compared with the whole previous period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeComparison {
    /// The spend from the start of the current period until now.
    pub current_total: i64,
    /// The spend over the whole previous period.
    pub previous_total: i64,
    /// `current_total - previous_total`, negative when spending went down.
    pub difference: i64,
}

/// Get the user's spend per category between `start` and `end` inclusive, largest first.
///
/// Categories without any spend are left out.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn get_spend_by_category(
    user_id: UserID,
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
    connection: &Connection,
) -> Result<Vec<CategorySpend>, Error> {
    connection
        .prepare(
            "SELECT c.id, c.key, c.korean, SUM(a.amount) AS total
            FROM account_book a
            INNER JOIN category c ON c.id = a.category_id
            WHERE a.user_id = ?1
                AND a.entry_type = 'SPEND'
                AND a.occurred_at >= ?2
                AND a.occurred_at <= ?3
            GROUP BY c.id
            ORDER BY total DESC, c.id ASC",
        )?
        .query_map((user_id, start, end), |row| {
            Ok(CategorySpend {
                category: Category {
                    id: row.get(0)?,
                    key: row.get(1)?,
                    korean: row.get(2)?,
                },
                total: row.get(3)?,
            })
        })?
        .map(|maybe_spend| maybe_spend.map_err(Error::from))
        .collect()
}

/// Get the user's spend entries in `category_id` between `start` and `end` inclusive, newest first.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn get_category_spend_entries(
    user_id: UserID,
    category_id: i64,
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
    connection: &Connection,
) -> Result<Vec<AccountBookEntry>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_ENTRY}
            WHERE a.user_id = ?1
                AND a.entry_type = 'SPEND'
                AND a.category_id = ?2
                AND a.occurred_at >= ?3
                AND a.occurred_at <= ?4
            ORDER BY a.occurred_at DESC, a.id DESC"
        ))?
        .query_map((user_id, category_id, start, end), map_entry_row)?
        .map(|maybe_entry| maybe_entry.map_err(Error::from))
        .collect()
}

/// Compare the user's spend in `category_id` so far this period with the previous period.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn compare_category_spend(
    user_id: UserID,
    category_id: i64,
    range: &PeriodRange,
    connection: &Connection,
) -> Result<ConsumeComparison, Error> {
    let current_total = sum_spend(
        user_id,
        range.current_start,
        range.now,
        Some(category_id),
        connection,
    )?;
    let previous_total = sum_spend(
        user_id,
        range.previous_start,
        range.previous_end,
        Some(category_id),
        connection,
    )?;

    Ok(ConsumeComparison {
        current_total,
        previous_total,
        difference: current_total - previous_total,
    })
}
