//! The shared category taxonomy used by account book entries, statistics and challenges.
//!
//! Categories are not user editable. The table is seeded with a fixed list on
//! start and each category is identified by a stable English key and a Korean
//! display label.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::{Connection, Row, params_from_iter};
use serde::{Deserialize, Serialize};

use crate::{AppState, Error, db::lock_connection};

/// The categories every database is seeded with, as `(key, korean label)` pairs.
pub const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("food", "식비"),
    ("cafe_snack", "카페/간식"),
    ("convenience_store", "편의점/마트"),
    ("alcohol_entertainment", "술/유흥"),
    ("shopping", "쇼핑"),
    ("hobby", "취미/여가"),
    ("health", "의료/건강"),
    ("housing_communication", "주거/통신"),
    ("transportation", "교통"),
    ("beauty", "미용"),
    ("travel", "여행/숙박"),
    ("education", "교육"),
    ("salary", "월급"),
    ("allowance", "용돈"),
    ("other", "기타"),
];

/// A node of the shared category taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// The ID of the category.
    pub id: i64,
    /// The canonical key, e.g. "food".
    pub key: String,
    /// The Korean display label, e.g. "식비".
    pub korean: String,
}

/// Create the category table and insert any missing default categories.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            key TEXT NOT NULL UNIQUE,
            korean TEXT NOT NULL UNIQUE
        );",
    )?;

    let mut statement =
        connection.prepare("INSERT OR IGNORE INTO category (key, korean) VALUES (?1, ?2)")?;

    for (key, korean) in DEFAULT_CATEGORIES {
        statement.execute((key, korean))?;
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    Ok(Category {
        id: row.get(0)?,
        key: row.get(1)?,
        korean: row.get(2)?,
    })
}

/// Get the category with the canonical `key`.
///
/// # Errors
/// Returns [Error::InvalidCategory] if no category has that key.
pub fn get_category_by_key(key: &str, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare("SELECT id, key, korean FROM category WHERE key = ?1")?
        .query_row([key], map_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::InvalidCategory(key.to_owned()),
            error => error.into(),
        })
}

/// Get the category with the Korean label `korean`.
///
/// # Errors
/// Returns [Error::InvalidCategory] if no category has that label.
pub fn get_category_by_korean(korean: &str, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare("SELECT id, key, korean FROM category WHERE korean = ?1")?
        .query_row([korean], map_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::InvalidCategory(korean.to_owned()),
            error => error.into(),
        })
}

/// Get a category by either its key or its Korean label.
///
/// # Errors
/// Returns [Error::InvalidCategory] if neither matches.
pub fn resolve_category(key_or_label: &str, connection: &Connection) -> Result<Category, Error> {
    match get_category_by_key(key_or_label, connection) {
        Err(Error::InvalidCategory(_)) => get_category_by_korean(key_or_label, connection),
        result => result,
    }
}

/// Get every category whose key is in `keys`, ordered by ID.
///
/// # Errors
/// Returns [Error::InvalidCategory] naming the first key that does not exist.
pub fn get_categories_by_keys(
    keys: &[String],
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; keys.len()].join(", ");
    let categories = connection
        .prepare(&format!(
            "SELECT id, key, korean FROM category WHERE key IN ({placeholders}) ORDER BY id"
        ))?
        .query_map(params_from_iter(keys.iter()), map_row)?
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(missing) = keys
        .iter()
        .find(|key| !categories.iter().any(|category| &category.key == *key))
    {
        return Err(Error::InvalidCategory(missing.clone()));
    }

    Ok(categories)
}

/// Get all categories ordered by ID.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn get_all_categories(connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare("SELECT id, key, korean FROM category ORDER BY id")?
        .query_map([], map_row)?
        .map(|maybe_category| maybe_category.map_err(Error::from))
        .collect()
}

/// The state needed to list categories.
#[derive(Debug, Clone)]
pub struct CategoryState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for listing all categories.
pub async fn get_categories_endpoint(
    State(state): State<CategoryState>,
) -> Result<Json<Vec<Category>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_all_categories(&connection).map(Json)
}

#[cfg(test)]
mod category_query_tests {
    use rusqlite::Connection;

    use crate::Error;

    use super::{
        DEFAULT_CATEGORIES, create_category_table, get_all_categories, get_categories_by_keys,
        get_category_by_key, get_category_by_korean, resolve_category,
    };

    fn get_test_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        create_category_table(&connection).unwrap();
        connection
    }

    #[test]
    fn seeding_is_idempotent() {
        let connection = get_test_db_connection();

        create_category_table(&connection).unwrap();

        let categories = get_all_categories(&connection).unwrap();
        assert_eq!(categories.len(), DEFAULT_CATEGORIES.len());
    }

    #[test]
    fn get_by_key_and_korean_agree() {
        let connection = get_test_db_connection();

        let by_key = get_category_by_key("food", &connection).unwrap();
        let by_korean = get_category_by_korean("식비", &connection).unwrap();

        assert_eq!(by_key, by_korean);
    }

    #[test]
    fn get_by_unknown_key_fails() {
        let connection = get_test_db_connection();

        assert_eq!(
            get_category_by_key("rockets", &connection),
            Err(Error::InvalidCategory("rockets".to_owned()))
        );
    }

    #[test]
    fn resolve_accepts_either_form() {
        let connection = get_test_db_connection();

        assert_eq!(resolve_category("교통", &connection).unwrap().key, "transportation");
        assert_eq!(resolve_category("travel", &connection).unwrap().korean, "여행/숙박");
    }

    #[test]
    fn get_by_keys_returns_all_matches() {
        let connection = get_test_db_connection();
        let keys = vec!["shopping".to_owned(), "food".to_owned()];

        let categories = get_categories_by_keys(&keys, &connection).unwrap();

        let got: Vec<&str> = categories.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(got, vec!["food", "shopping"]);
    }

    #[test]
    fn get_by_keys_reports_missing_key() {
        let connection = get_test_db_connection();
        let keys = vec!["food".to_owned(), "rockets".to_owned()];

        assert_eq!(
            get_categories_by_keys(&keys, &connection),
            Err(Error::InvalidCategory("rockets".to_owned()))
        );
    }
}
