//! Defines the challenge models and the database queries shared by the challenge services.

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
    db::is_unique_violation,
    pagination::{Page, PageRequest},
    timezone::local_date_time,
};

// ============================================================================
// MODELS
// ============================================================================

/// Where a challenge is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeStatus {
    /// The challenge has not started and accepts participants.
    Recruiting,
    /// The challenge is running.
    InProgress,
    /// The challenge has ended.
    Completed,
}

impl ChallengeStatus {
    fn as_str(self) -> &'static str {
        match self {
            ChallengeStatus::Recruiting => "RECRUITING",
            ChallengeStatus::InProgress => "IN_PROGRESS",
            ChallengeStatus::Completed => "COMPLETED",
        }
    }
}

impl Display for ChallengeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for ChallengeStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for ChallengeStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "RECRUITING" => Ok(ChallengeStatus::Recruiting),
            "IN_PROGRESS" => Ok(ChallengeStatus::InProgress),
            "COMPLETED" => Ok(ChallengeStatus::Completed),
            other => Err(FromSqlError::Other(
                format!("unknown challenge status {other}").into(),
            )),
        }
    }
}

/// Who can find a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Release {
    /// Listed in the top and new challenge lists.
    Public,
    /// Only reachable by ID or invite.
    Private,
}

impl Release {
    fn as_str(self) -> &'static str {
        match self {
            Release::Public => "PUBLIC",
            Release::Private => "PRIVATE",
        }
    }
}

impl ToSql for Release {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Release {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "PUBLIC" => Ok(Release::Public),
            "PRIVATE" => Ok(Release::Private),
            other => Err(FromSqlError::Other(format!("unknown release {other}").into())),
        }
    }
}

/// A group savings or spending goal that users join, up to a capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// The ID of the challenge.
    pub id: i64,
    /// A short name.
    pub title: String,
    /// A description of the goal.
    pub text: String,
    /// The most participants the challenge allows.
    pub capacity: i64,
    /// The number of participants, including the creator.
    pub current_capacity: i64,
    /// Where the challenge is in its lifecycle.
    pub status: ChallengeStatus,
    /// Who can find the challenge.
    pub release: Release,
    /// The first day of the challenge.
    pub start_date: Date,
    /// The last day of the challenge.
    pub end_date: Date,
    /// The keys of the categories the challenge is about, sorted.
    pub categories: Vec<String>,
    /// The user who created the challenge.
    pub creator_id: UserID,
    /// The creator's nickname.
    pub creator_nickname: String,
    /// Increases on every change, used to detect concurrent updates.
    pub version: i64,
    /// When the challenge was created, in local time.
    #[serde(with = "local_date_time")]
    pub created_at: PrimitiveDateTime,
}

impl Challenge {
    /// Whether every place has been taken.
    pub fn is_full(&self) -> bool {
        self.current_capacity >= self.capacity
    }
}

/// The editable fields of a challenge, used for creating and changing one.
#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeFields {
    /// A short name.
    pub title: String,
    /// A description of the goal.
    pub text: String,
    /// The most participants the challenge allows.
    pub capacity: i64,
    /// Who can find the challenge.
    pub release: Release,
    /// The first day of the challenge.
    pub start_date: Date,
    /// The last day of the challenge.
    pub end_date: Date,
    /// The categories the challenge is about.
    pub categories: Vec<Category>,
}

impl ChallengeFields {
    /// Check the fields and return them with the title trimmed.
    ///
    /// # Errors
    /// Returns [Error::EmptyTitle], [Error::InvalidCapacity] or [Error::InvalidDateRange].
    pub fn validate(mut self) -> Result<Self, Error> {
        self.title = self.title.trim().to_owned();

        if self.title.is_empty() {
            return Err(Error::EmptyTitle);
        }

        if self.capacity < 1 {
            return Err(Error::InvalidCapacity(self.capacity));
        }

        if self.start_date > self.end_date {
            return Err(Error::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }

        Ok(self)
    }
}

/// A pending invitation for a user to join a challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeInvite {
    /// The ID of the invite.
    pub id: i64,
    /// The user who sent the invite.
    pub inviter_id: UserID,
    /// The nickname of the user who sent the invite.
    pub inviter_nickname: String,
    /// The user who was invited.
    pub invitee_id: UserID,
    /// The challenge the invite is for.
    pub challenge_id: i64,
    /// The title of the challenge.
    pub challenge_title: String,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the challenge, challenge category, participant and invite tables.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn create_challenge_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS challenge (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            text TEXT NOT NULL,
            capacity INTEGER NOT NULL CHECK (capacity >= 1),
            current_capacity INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL,
            release_type TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            creator_id INTEGER NOT NULL,
            version INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            FOREIGN KEY(creator_id) REFERENCES user(id) ON DELETE CASCADE,
            CHECK (current_capacity <= capacity)
        );

        CREATE TABLE IF NOT EXISTS challenge_category (
            challenge_id INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            PRIMARY KEY(challenge_id, category_id),
            FOREIGN KEY(challenge_id) REFERENCES challenge(id) ON DELETE CASCADE,
            FOREIGN KEY(category_id) REFERENCES category(id)
        );

        CREATE TABLE IF NOT EXISTS user_challenge (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            challenge_id INTEGER NOT NULL,
            UNIQUE(user_id, challenge_id),
            FOREIGN KEY(user_id) REFERENCES user(id) ON DELETE CASCADE,
            FOREIGN KEY(challenge_id) REFERENCES challenge(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS challenge_invite (
            id INTEGER PRIMARY KEY,
            inviter_id INTEGER NOT NULL,
            invitee_id INTEGER NOT NULL,
            challenge_id INTEGER NOT NULL,
            UNIQUE(invitee_id, challenge_id),
            FOREIGN KEY(inviter_id) REFERENCES user(id) ON DELETE CASCADE,
            FOREIGN KEY(invitee_id) REFERENCES user(id) ON DELETE CASCADE,
            FOREIGN KEY(challenge_id) REFERENCES challenge(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_challenge_status_release
            ON challenge(status, release_type);",
    )
}

/// Selects the columns read by [map_challenge_row], with the challenge aliased as `ch`.
const SELECT_CHALLENGE: &str = "SELECT
        ch.id, ch.title, ch.text, ch.capacity, ch.current_capacity, ch.status, ch.release_type,
        ch.start_date, ch.end_date, ch.creator_id, u.nickname, ch.version, ch.created_at,
        (SELECT GROUP_CONCAT(c.key, ',')
            FROM challenge_category cc
            INNER JOIN category c ON c.id = cc.category_id
            WHERE cc.challenge_id = ch.id)
    FROM challenge ch
    INNER JOIN user u ON u.id = ch.creator_id";

fn map_challenge_row(row: &Row) -> Result<Challenge, rusqlite::Error> {
    let categories: Option<String> = row.get(13)?;
    let mut categories: Vec<String> = categories
        .map(|keys| keys.split(',').map(str::to_owned).collect())
        .unwrap_or_default();
    categories.sort();

    Ok(Challenge {
        id: row.get(0)?,
        title: row.get(1)?,
        text: row.get(2)?,
        capacity: row.get(3)?,
        current_capacity: row.get(4)?,
        status: row.get(5)?,
        release: row.get(6)?,
        start_date: row.get(7)?,
        end_date: row.get(8)?,
        creator_id: row.get(9)?,
        creator_nickname: row.get(10)?,
        version: row.get(11)?,
        created_at: row.get(12)?,
        categories,
    })
}

fn replace_categories(
    challenge_id: i64,
    categories: &[Category],
    connection: &Connection,
) -> Result<(), rusqlite::Error> {
    connection.execute(
        "DELETE FROM challenge_category WHERE challenge_id = ?1",
        [challenge_id],
    )?;

    let mut statement = connection
        .prepare("INSERT INTO challenge_category (challenge_id, category_id) VALUES (?1, ?2)")?;

    for category in categories {
        statement.execute((challenge_id, category.id))?;
    }

    Ok(())
}

/// Insert a recruiting challenge with no participants and return its ID.
///
/// Callers are expected to add the creator as a participant in the same transaction.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn insert_challenge(
    fields: &ChallengeFields,
    creator_id: UserID,
    created_at: PrimitiveDateTime,
    connection: &Connection,
) -> Result<i64, Error> {
    connection.execute(
        "INSERT INTO challenge (
            title, text, capacity, current_capacity, status, release_type,
            start_date, end_date, creator_id, version, created_at
        ) VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?7, ?8, 0, ?9)",
        rusqlite::params![
            fields.title,
            fields.text,
            fields.capacity,
            ChallengeStatus::Recruiting,
            fields.release,
            fields.start_date,
            fields.end_date,
            creator_id,
            created_at,
        ],
    )?;

    let id = connection.last_insert_rowid();
    replace_categories(id, &fields.categories, connection)?;

    Ok(id)
}

/// Get the challenge `id`.
///
/// # Errors
/// Returns [Error::ChallengeNotFound] if the challenge does not exist.
pub fn get_challenge(id: i64, connection: &Connection) -> Result<Challenge, Error> {
    connection
        .prepare(&format!("{SELECT_CHALLENGE} WHERE ch.id = ?1"))?
        .query_row([id], map_challenge_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::ChallengeNotFound,
            error => error.into(),
        })
}

fn query_page(
    condition: &str,
    order: &str,
    params: &[(&str, &dyn ToSql)],
    page: PageRequest,
    connection: &Connection,
) -> Result<Page<Challenge>, Error> {
    let total: i64 = connection
        .prepare(&format!(
            "SELECT COUNT(ch.id) FROM challenge ch WHERE {condition}"
        ))?
        .query_row(params, |row| row.get(0))?;

    let limit = page.limit();
    let offset = page.offset();
    let mut paged_params = params.to_vec();
    paged_params.push((":limit", &limit as &dyn ToSql));
    paged_params.push((":offset", &offset as &dyn ToSql));

    let challenges = connection
        .prepare(&format!(
            "{SELECT_CHALLENGE} WHERE {condition} ORDER BY {order} LIMIT :limit OFFSET :offset"
        ))?
        .query_map(paged_params.as_slice(), map_challenge_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page::new(challenges, page, total as u64))
}

/// Get a page of challenges whose title or text contains `text`, newest first.
///
/// `None` matches every challenge.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn search_challenges(
    text: Option<&str>,
    page: PageRequest,
    connection: &Connection,
) -> Result<Page<Challenge>, Error> {
    let pattern = text
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| format!("%{text}%"));

    query_page(
        ":pattern IS NULL OR ch.title LIKE :pattern OR ch.text LIKE :pattern",
        "ch.created_at DESC, ch.id DESC",
        &[(":pattern", &pattern as &dyn ToSql)],
        page,
        connection,
    )
}

/// Get up to `limit` public, recruiting challenges with the most participants.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn get_top_challenges(limit: u64, connection: &Connection) -> Result<Vec<Challenge>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_CHALLENGE}
            WHERE ch.status = 'RECRUITING' AND ch.release_type = 'PUBLIC'
            ORDER BY ch.current_capacity DESC, ch.id DESC
            LIMIT ?1"
        ))?
        .query_map([limit as i64], map_challenge_row)?
        .map(|maybe_challenge| maybe_challenge.map_err(Error::from))
        .collect()
}

/// Get a page of public, recruiting challenges created at or after `since`, newest first.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn get_new_challenges(
    since: PrimitiveDateTime,
    page: PageRequest,
    connection: &Connection,
) -> Result<Page<Challenge>, Error> {
    query_page(
        "ch.status = 'RECRUITING' AND ch.release_type = 'PUBLIC' AND ch.created_at >= :since",
        "ch.created_at DESC, ch.id DESC",
        &[(":since", &since as &dyn ToSql)],
        page,
        connection,
    )
}

/// Get a page of the challenges the user participates in, newest first.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn get_participating_challenges(
    user_id: UserID,
    page: PageRequest,
    connection: &Connection,
) -> Result<Page<Challenge>, Error> {
    query_page(
        "EXISTS (SELECT 1 FROM user_challenge uc
            WHERE uc.challenge_id = ch.id AND uc.user_id = :user_id)",
        "ch.created_at DESC, ch.id DESC",
        &[(":user_id", &user_id as &dyn ToSql)],
        page,
        connection,
    )
}

/// Write `fields` to the challenge if it is still at `expected_version`, and bump the version.
///
/// # Errors
/// Returns [Error::VersionConflict] if the challenge changed since it was read.
pub fn update_challenge_fields(
    id: i64,
    expected_version: i64,
    fields: &ChallengeFields,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE challenge SET
            title = ?1, text = ?2, capacity = ?3, release_type = ?4,
            start_date = ?5, end_date = ?6, version = version + 1
        WHERE id = ?7 AND version = ?8",
        rusqlite::params![
            fields.title,
            fields.text,
            fields.capacity,
            fields.release,
            fields.start_date,
            fields.end_date,
            id,
            expected_version,
        ],
    )?;

    if rows_affected == 0 {
        return Err(Error::VersionConflict);
    }

    replace_categories(id, &fields.categories, connection)?;

    Ok(())
}

/// Take one place in the challenge if it is still at `expected_version` and not full.
///
/// # Errors
/// Returns [Error::VersionConflict] if no row was updated.
pub fn increment_capacity(
    id: i64,
    expected_version: i64,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE challenge
        SET current_capacity = current_capacity + 1, version = version + 1
        WHERE id = ?1 AND version = ?2 AND current_capacity < capacity",
        (id, expected_version),
    )?;

    if rows_affected == 0 {
        return Err(Error::VersionConflict);
    }

    Ok(())
}

/// Free one place in the challenge.
///
/// # Errors
/// Returns [Error::ChallengeNotFound] if the challenge does not exist.
pub fn decrement_capacity(id: i64, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE challenge
        SET current_capacity = MAX(current_capacity - 1, 0), version = version + 1
        WHERE id = ?1",
        [id],
    )?;

    if rows_affected == 0 {
        return Err(Error::ChallengeNotFound);
    }

    Ok(())
}

/// Whether the user participates in the challenge.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn is_participant(
    user_id: UserID,
    challenge_id: i64,
    connection: &Connection,
) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT EXISTS (SELECT 1 FROM user_challenge WHERE user_id = ?1 AND challenge_id = ?2)",
            (user_id, challenge_id),
            |row| row.get(0),
        )
        .map_err(Error::from)
}

/// Record the user as a participant of the challenge.
///
/// # Errors
/// Returns [Error::AlreadyParticipating] if the user already participates.
pub fn insert_participant(
    user_id: UserID,
    challenge_id: i64,
    connection: &Connection,
) -> Result<(), Error> {
    connection
        .execute(
            "INSERT INTO user_challenge (user_id, challenge_id) VALUES (?1, ?2)",
            (user_id, challenge_id),
        )
        .map_err(|error| {
            if is_unique_violation(&error) {
                Error::AlreadyParticipating
            } else {
                error.into()
            }
        })?;

    Ok(())
}

/// Remove the user from the challenge's participants.
///
/// # Errors
/// Returns [Error::NotParticipant] if the user does not participate.
pub fn remove_participant(
    user_id: UserID,
    challenge_id: i64,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM user_challenge WHERE user_id = ?1 AND challenge_id = ?2",
        (user_id, challenge_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotParticipant);
    }

    Ok(())
}

/// Set the challenge's status and bump its version.
///
/// # Errors
/// Returns [Error::ChallengeNotFound] if the challenge does not exist.
pub fn set_challenge_status(
    id: i64,
    status: ChallengeStatus,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE challenge SET status = ?1, version = version + 1 WHERE id = ?2",
        (status, id),
    )?;

    if rows_affected == 0 {
        return Err(Error::ChallengeNotFound);
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
