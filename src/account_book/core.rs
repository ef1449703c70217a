//! Defines the core data models and database queries for account book entries.

use std::fmt::Display;

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::{Date, PrimitiveDateTime};

use crate::{
    Error,
    auth::UserID,
    category::Category,
    db::is_foreign_key_violation,
    frequency::Frequency,
    pagination::{Page, PageRequest},
    timezone::local_date_time,
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether an entry records money going out or coming in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    /// Money that was spent.
    Spend,
    /// Money that was earned or received.
    Income,
}

impl EntryType {
    fn as_str(self) -> &'static str {
        match self {
            EntryType::Spend => "SPEND",
            EntryType::Income => "INCOME",
        }
    }
}

impl Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for EntryType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for EntryType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "SPEND" => Ok(EntryType::Spend),
            "INCOME" => Ok(EntryType::Income),
            other => Err(FromSqlError::Other(
                format!("unknown entry type {other}").into(),
            )),
        }
    }
}

/// How often an entry repeats.
///
/// `month` and `day` pin the repetition within the period, e.g. a yearly entry
/// on month 3, day 14. Only the fields that make sense for the frequency are
/// expected to be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repeat {
    /// How often the entry repeats.
    pub frequency: Frequency,
    /// The month of the year (1-12) for yearly repeats.
    #[serde(default)]
    pub month: Option<u8>,
    /// The day of the month (1-31) for monthly and yearly repeats.
    #[serde(default)]
    pub day: Option<u8>,
}

/// A single recorded income or expense.
///
/// An entry belongs to exactly one user. Fields are changed through the
/// `modify_*` methods, which enforce the same rules as creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBookEntry {
    /// The ID of the entry.
    pub id: i64,
    /// The owner of the entry.
    pub user_id: UserID,
    /// A short description, e.g. "Lunch".
    pub title: String,
    /// Whether money was spent or earned.
    pub entry_type: EntryType,
    /// The amount of money, always positive.
    pub amount: i64,
    /// Free text notes.
    pub memo: Option<String>,
    /// The category of the entry.
    pub category: Category,
    /// When the money moved, in local time.
    #[serde(with = "local_date_time")]
    pub occurred_at: PrimitiveDateTime,
    /// The last date a repeating entry applies to.
    pub end_date: Option<Date>,
    /// How often the entry repeats, if at all.
    pub repeat: Option<Repeat>,
}

fn validate_title(title: &str) -> Result<String, Error> {
    let title = title.trim();

    if title.is_empty() {
        return Err(Error::EmptyTitle);
    }

    Ok(title.to_owned())
}

fn validate_amount(amount: i64) -> Result<i64, Error> {
    if amount <= 0 {
        return Err(Error::InvalidAmount(amount));
    }

    Ok(amount)
}

impl AccountBookEntry {
    /// Change the title.
    ///
    /// # Errors
    /// Returns [Error::EmptyTitle] if `title` is blank.
    pub fn modify_title(&mut self, title: &str) -> Result<(), Error> {
        self.title = validate_title(title)?;
        Ok(())
    }

    /// Change the amount.
    ///
    /// # Errors
    /// Returns [Error::InvalidAmount] if `amount` is not positive.
    pub fn modify_amount(&mut self, amount: i64) -> Result<(), Error> {
        self.amount = validate_amount(amount)?;
        Ok(())
    }

    /// Change the memo.
    pub fn modify_memo(&mut self, memo: Option<String>) {
        self.memo = memo;
    }

    /// Change or clear the repeat settings.
    pub fn modify_repeat(&mut self, repeat: Option<Repeat>) {
        self.repeat = repeat;
    }

    /// Change or clear the end date.
    pub fn modify_end_date(&mut self, end_date: Option<Date>) {
        self.end_date = end_date;
    }

    /// Change the category.
    pub fn modify_category(&mut self, category: Category) {
        self.category = category;
    }

    /// Change when the entry occurred.
    pub fn modify_occurred_at(&mut self, occurred_at: PrimitiveDateTime) {
        self.occurred_at = occurred_at;
    }
}

/// The data needed to record a new entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    /// The owner of the entry.
    pub user_id: UserID,
    /// A short description.
    pub title: String,
    /// Whether money was spent or earned.
    pub entry_type: EntryType,
    /// The amount of money, must be positive.
    pub amount: i64,
    /// Free text notes.
    pub memo: Option<String>,
    /// The category of the entry.
    pub category: Category,
    /// When the money moved.
    pub occurred_at: PrimitiveDateTime,
    /// The last date a repeating entry applies to.
    pub end_date: Option<Date>,
    /// How often the entry repeats.
    pub repeat: Option<Repeat>,
}

/// Restricts which entries [list_entries] returns.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EntryFilter {
    /// Only return entries of this type.
    pub entry_type: Option<EntryType>,
    /// Only return entries that occurred at or after this time.
    pub start: Option<PrimitiveDateTime>,
    /// Only return entries that occurred at or before this time.
    pub end: Option<PrimitiveDateTime>,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the account book table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_account_book_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS account_book (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            entry_type TEXT NOT NULL,
            amount INTEGER NOT NULL CHECK (amount > 0),
            memo TEXT,
            category_id INTEGER NOT NULL,
            occurred_at TEXT NOT NULL,
            end_date TEXT,
            frequency TEXT,
            repeat_month INTEGER,
            repeat_day INTEGER,
            FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE,
            FOREIGN KEY(category_id) REFERENCES category(id)
        );

        CREATE INDEX IF NOT EXISTS idx_account_book_user_occurred
            ON account_book(user_id, occurred_at);",
    )
}

/// Selects the columns read by [map_entry_row], with the entry aliased as `a`.
pub(crate) const SELECT_ENTRY: &str = "SELECT
        a.id, a.user_id, a.title, a.entry_type, a.amount, a.memo,
        c.id, c.key, c.korean,
        a.occurred_at, a.end_date, a.frequency, a.repeat_month, a.repeat_day
    FROM account_book a
    INNER JOIN category c ON c.id = a.category_id";

/// Map a row selected with [SELECT_ENTRY] to an entry.
pub(crate) fn map_entry_row(row: &Row) -> Result<AccountBookEntry, rusqlite::Error> {
    let frequency: Option<Frequency> = row.get(11)?;

    Ok(AccountBookEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        entry_type: row.get(3)?,
        amount: row.get(4)?,
        memo: row.get(5)?,
        category: Category {
            id: row.get(6)?,
            key: row.get(7)?,
            korean: row.get(8)?,
        },
        occurred_at: row.get(9)?,
        end_date: row.get(10)?,
        repeat: frequency.map(|frequency| -> Result<Repeat, rusqlite::Error> {
            Ok(Repeat {
                frequency,
                month: row.get(12)?,
                day: row.get(13)?,
            })
        })
        .transpose()?,
    })
}

/// Create a new entry in the database.
///
/// # Errors
/// This function will return a:
/// - [Error::EmptyTitle] or [Error::InvalidAmount] if the entry is invalid,
/// - [Error::UserNotFound] if the owner does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_entry(new_entry: NewEntry, connection: &Connection) -> Result<AccountBookEntry, Error> {
    let title = validate_title(&new_entry.title)?;
    let amount = validate_amount(new_entry.amount)?;
    let repeat = new_entry.repeat;

    connection
        .execute(
            "INSERT INTO account_book (
                user_id, title, entry_type, amount, memo, category_id,
                occurred_at, end_date, frequency, repeat_month, repeat_day
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            rusqlite::params![
                new_entry.user_id,
                title,
                new_entry.entry_type,
                amount,
                new_entry.memo,
                new_entry.category.id,
                new_entry.occurred_at,
                new_entry.end_date,
                repeat.map(|repeat| repeat.frequency),
                repeat.and_then(|repeat| repeat.month),
                repeat.and_then(|repeat| repeat.day),
            ],
        )
        .map_err(|error| {
            if is_foreign_key_violation(&error) {
                Error::UserNotFound
            } else {
                error.into()
            }
        })?;

    Ok(AccountBookEntry {
        id: connection.last_insert_rowid(),
        user_id: new_entry.user_id,
        title,
        entry_type: new_entry.entry_type,
        amount,
        memo: new_entry.memo,
        category: new_entry.category,
        occurred_at: new_entry.occurred_at,
        end_date: new_entry.end_date,
        repeat,
    })
}

/// Retrieve the entry `id` owned by `user_id`.
///
/// # Errors
/// Returns [Error::AccountBookNotFound] if the entry does not exist or belongs
/// to another user.
pub fn get_entry(
    id: i64,
    user_id: UserID,
    connection: &Connection,
) -> Result<AccountBookEntry, Error> {
    connection
        .prepare(&format!("{SELECT_ENTRY} WHERE a.id = ?1 AND a.user_id = ?2"))?
        .query_row((id, user_id), map_entry_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::AccountBookNotFound,
            error => error.into(),
        })
}

/// Get a page of the user's entries matching `filter`, newest first.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn list_entries(
    user_id: UserID,
    filter: EntryFilter,
    page: PageRequest,
    connection: &Connection,
) -> Result<Page<AccountBookEntry>, Error> {
    let condition = "a.user_id = :user_id
        AND (:entry_type IS NULL OR a.entry_type = :entry_type)
        AND (:start IS NULL OR a.occurred_at >= :start)
        AND (:end IS NULL OR a.occurred_at <= :end)";

    let params: &[(&str, &dyn ToSql)] = &[
        (":user_id", &user_id as &dyn ToSql),
        (":entry_type", &filter.entry_type as &dyn ToSql),
        (":start", &filter.start as &dyn ToSql),
        (":end", &filter.end as &dyn ToSql),
    ];

    let total: i64 = connection
        .prepare(&format!(
            "SELECT COUNT(a.id) FROM account_book a WHERE {condition}"
        ))?
        .query_row(params, |row| row.get(0))?;

    let mut statement = connection.prepare(&format!(
        "{SELECT_ENTRY} WHERE {condition}
        ORDER BY a.occurred_at DESC, a.id DESC
        LIMIT :limit OFFSET :offset"
    ))?;

    let limit = page.limit();
    let offset = page.offset();
    let mut paged_params = params.to_vec();
    paged_params.push((":limit", &limit as &dyn ToSql));
    paged_params.push((":offset", &offset as &dyn ToSql));

    let entries = statement
        .query_map(paged_params.as_slice(), map_entry_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page::new(entries, page, total as u64))
}

/// Write all fields of `entry` back to the database.
///
/// # Errors
/// Returns [Error::AccountBookNotFound] if the entry does not exist or belongs
/// to another user.
pub fn update_entry(entry: &AccountBookEntry, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE account_book SET
            title = ?1, amount = ?2, memo = ?3, category_id = ?4, occurred_at = ?5,
            end_date = ?6, frequency = ?7, repeat_month = ?8, repeat_day = ?9
        WHERE id = ?10 AND user_id = ?11",
        rusqlite::params![
            entry.title,
            entry.amount,
            entry.memo,
            entry.category.id,
            entry.occurred_at,
            entry.end_date,
            entry.repeat.map(|repeat| repeat.frequency),
            entry.repeat.and_then(|repeat| repeat.month),
            entry.repeat.and_then(|repeat| repeat.day),
            entry.id,
            entry.user_id,
        ],
    )?;

    if rows_affected == 0 {
        return Err(Error::AccountBookNotFound);
    }

    Ok(())
}

/// Delete the entry `id` owned by `user_id`.
///
/// # Errors
/// Returns [Error::AccountBookNotFound] if the entry does not exist or belongs
/// to another user.
pub fn delete_entry(id: i64, user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM account_book WHERE id = ?1 AND user_id = ?2",
        (id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::AccountBookNotFound);
    }

    Ok(())
}

/// Sum the user's spending between `start` and `end` inclusive, optionally
/// limited to one category.
///
/// # Errors
/// Returns an [Error::SqlError] if there is an SQL error.
pub fn sum_spend(
    user_id: UserID,
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
    category_id: Option<i64>,
    connection: &Connection,
) -> Result<i64, Error> {
    connection
        .prepare(
            "SELECT COALESCE(SUM(amount), 0) FROM account_book
            WHERE user_id = :user_id
                AND entry_type = 'SPEND'
                AND occurred_at >= :start
                AND occurred_at <= :end
                AND (:category_id IS NULL OR category_id = :category_id)",
        )?
        .query_row(
            rusqlite::named_params! {
                ":user_id": user_id,
                ":start": start,
                ":end": end,
                ":category_id": category_id,
            },
            |row| row.get(0),
        )
        .map_err(Error::from)
}

// ============================================================================
// TESTS
// ============================================================================
