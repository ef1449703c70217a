//! Route handlers for creating, reading, changing and deleting account book entries.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;
use time::{Date, PrimitiveDateTime};

use crate::{
    AppState, Error,
    account_book::{
        AccountBookEntry, EntryFilter, EntryType, NewEntry, Repeat, create_entry, delete_entry,
        get_entry, list_entries, update_entry,
    },
    auth::{UserID, get_user_by_id},
    category::resolve_category,
    db::lock_connection,
    events::{DomainEvent, EventPublisher},
    pagination::{Page, PageQuery, PageRequest, PaginationConfig},
    timezone::{local_date_time, local_now},
};

/// The state needed by the account book endpoints.
#[derive(Debug, Clone)]
pub struct AccountBookState {
    /// The database connection for managing entries.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Seoul".
    pub local_timezone: String,
    /// The config that controls how lists are paged.
    pub pagination_config: PaginationConfig,
    /// Where spend events are published once the entry is stored.
    pub events: EventPublisher,
}

impl FromRef<AppState> for AccountBookState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
            pagination_config: state.pagination_config.clone(),
            events: state.events.clone(),
        }
    }
}

/// The request body for creating an entry.
#[derive(Debug, Deserialize)]
pub struct CreateEntryRequest {
    /// A short description.
    pub title: String,
    /// Whether money was spent or earned.
    pub entry_type: EntryType,
    /// The amount of money, must be positive.
    pub amount: i64,
    /// Free text notes.
    #[serde(default)]
    pub memo: Option<String>,
    /// The category key or Korean label.
    pub category: String,
    /// When the money moved. Defaults to the current local time.
    #[serde(default, with = "local_date_time::option")]
    pub occurred_at: Option<PrimitiveDateTime>,
    /// The last date a repeating entry applies to.
    #[serde(default)]
    pub end_date: Option<Date>,
    /// How often the entry repeats.
    #[serde(default)]
    pub repeat: Option<Repeat>,
}

/// The request body for changing an entry.
///
/// The request replaces every editable field, so omitted optional fields are cleared.
#[derive(Debug, Deserialize)]
pub struct UpdateEntryRequest {
    /// A short description.
    pub title: String,
    /// The amount of money, must be positive.
    pub amount: i64,
    /// Free text notes.
    #[serde(default)]
    pub memo: Option<String>,
    /// The category key or Korean label.
    pub category: String,
    /// When the money moved.
    #[serde(with = "local_date_time")]
    pub occurred_at: PrimitiveDateTime,
    /// The last date a repeating entry applies to.
    #[serde(default)]
    pub end_date: Option<Date>,
    /// How often the entry repeats.
    #[serde(default)]
    pub repeat: Option<Repeat>,
}

/// The query parameters for listing entries.
#[derive(Debug, Default, Deserialize)]
pub struct ListEntriesQuery {
    /// Only return entries of this type.
    #[serde(default, rename = "type")]
    pub entry_type: Option<EntryType>,
    /// Only return entries that occurred at or after this time.
    #[serde(default, with = "local_date_time::option")]
    pub start: Option<PrimitiveDateTime>,
    /// Only return entries that occurred at or before this time.
    #[serde(default, with = "local_date_time::option")]
    pub end: Option<PrimitiveDateTime>,
    /// The one-based page number.
    pub page: Option<u64>,
    /// The number of entries per page.
    pub size: Option<u64>,
}

/// A route handler for recording a new entry.
///
/// Spend entries publish a [DomainEvent::SpendCreated] after the insert, which
/// may trigger a budget warning.
pub async fn create_entry_endpoint(
    State(state): State<AccountBookState>,
    Extension(user_id): Extension<UserID>,
    Json(request): Json<CreateEntryRequest>,
) -> Result<(StatusCode, Json<AccountBookEntry>), Error> {
    let occurred_at = match request.occurred_at {
        Some(occurred_at) => occurred_at,
        None => local_now(&state.local_timezone)?,
    };

    let (entry, nickname) = {
        let connection = lock_connection(&state.db_connection)?;
        let category = resolve_category(&request.category, &connection)?;
        let user = get_user_by_id(user_id, &connection)?;

        let entry = create_entry(
            NewEntry {
                user_id,
                title: request.title,
                entry_type: request.entry_type,
                amount: request.amount,
                memo: request.memo,
                category,
                occurred_at,
                end_date: request.end_date,
                repeat: request.repeat,
            },
            &connection,
        )?;

        (entry, user.nickname)
    };

    if entry.entry_type == EntryType::Spend {
        state
            .events
            .publish(DomainEvent::SpendCreated { user_id, nickname });
    }

    Ok((StatusCode::CREATED, Json(entry)))
}

/// A route handler for listing the user's entries, newest first.
pub async fn list_entries_endpoint(
    State(state): State<AccountBookState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<ListEntriesQuery>,
) -> Result<Json<Page<AccountBookEntry>>, Error> {
    let page = PageRequest::from_query(
        PageQuery {
            page: query.page,
            size: query.size,
        },
        &state.pagination_config,
    );
    let filter = EntryFilter {
        entry_type: query.entry_type,
        start: query.start,
        end: query.end,
    };

    let connection = lock_connection(&state.db_connection)?;

    list_entries(user_id, filter, page, &connection).map(Json)
}

/// A route handler for reading a single entry.
pub async fn get_entry_endpoint(
    State(state): State<AccountBookState>,
    Extension(user_id): Extension<UserID>,
    Path(entry_id): Path<i64>,
) -> Result<Json<AccountBookEntry>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_entry(entry_id, user_id, &connection).map(Json)
}

/// A route handler for changing an entry.
///
/// Changed spend entries publish a [DomainEvent::SpendCreated] so the budget
/// warning sees the new amount.
pub async fn update_entry_endpoint(
    State(state): State<AccountBookState>,
    Extension(user_id): Extension<UserID>,
    Path(entry_id): Path<i64>,
    Json(request): Json<UpdateEntryRequest>,
) -> Result<Json<AccountBookEntry>, Error> {
    let (entry, nickname) = {
        let connection = lock_connection(&state.db_connection)?;
        let mut entry = get_entry(entry_id, user_id, &connection)?;
        let category = resolve_category(&request.category, &connection)?;

        entry.modify_title(&request.title)?;
        entry.modify_amount(request.amount)?;
        entry.modify_memo(request.memo);
        entry.modify_category(category);
        entry.modify_occurred_at(request.occurred_at);
        entry.modify_end_date(request.end_date);
        entry.modify_repeat(request.repeat);

        update_entry(&entry, &connection)?;
        let user = get_user_by_id(user_id, &connection)?;

        (entry, user.nickname)
    };

    if entry.entry_type == EntryType::Spend {
        state
            .events
            .publish(DomainEvent::SpendCreated { user_id, nickname });
    }

    Ok(Json(entry))
}

/// A route handler for deleting an entry.
pub async fn delete_entry_endpoint(
    State(state): State<AccountBookState>,
    Extension(user_id): Extension<UserID>,
    Path(entry_id): Path<i64>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    delete_entry(entry_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}
