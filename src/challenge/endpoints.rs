//! Route handlers for challenges and challenge invites.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;
use time::{Date, Duration};

use crate::{
    AppState, Error,
    auth::UserID,
    category::get_categories_by_keys,
    challenge::{
        Challenge, ChallengeFields, ChallengeInvite, Release, accept_invite, create_challenge,
        delete_challenge, get_challenge, get_my_invites, get_new_challenges,
        get_participating_challenges, get_top_challenges, invite_friend, join_challenge,
        leave_challenge, reject_invite, search_challenges, update_challenge,
    },
    db::lock_connection,
    events::{DomainEvent, EventPublisher},
    pagination::{Page, PageQuery, PageRequest, PaginationConfig},
    timezone::local_now,
};

/// The number of challenges in the top list.
pub const TOP_CHALLENGE_LIMIT: u64 = 10;

/// How far back the new challenge list looks.
pub const NEW_CHALLENGE_WINDOW: Duration = Duration::days(7);

/// The state needed by the challenge endpoints.
#[derive(Debug, Clone)]
pub struct ChallengeState {
    /// The database connection for managing challenges.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Seoul".
    pub local_timezone: String,
    /// The config that controls how lists are paged.
    pub pagination_config: PaginationConfig,
    /// Where invite events are published.
    pub events: EventPublisher,
}

impl FromRef<AppState> for ChallengeState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
            pagination_config: state.pagination_config.clone(),
            events: state.events.clone(),
        }
    }
}

/// The request body for creating or changing a challenge.
#[derive(Debug, Deserialize)]
pub struct ChallengeRequest {
    /// A short name.
    pub title: String,
    /// A description of the goal.
    #[serde(default)]
    pub text: String,
    /// The most participants the challenge allows.
    pub capacity: i64,
    /// Who can find the challenge.
    pub release: Release,
    /// The first day of the challenge.
    pub start_date: Date,
    /// The last day of the challenge.
    pub end_date: Date,
    /// The keys of the categories the challenge is about.
    #[serde(default)]
    pub categories: Vec<String>,
}

impl ChallengeRequest {
    fn into_fields(self, connection: &Connection) -> Result<ChallengeFields, Error> {
        let categories = get_categories_by_keys(&self.categories, connection)?;

        Ok(ChallengeFields {
            title: self.title,
            text: self.text,
            capacity: self.capacity,
            release: self.release,
            start_date: self.start_date,
            end_date: self.end_date,
            categories,
        })
    }
}

/// The query parameters for searching challenges.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    /// Text to look for in the title or description.
    pub text: Option<String>,
    /// The one-based page number.
    pub page: Option<u64>,
    /// The number of challenges per page.
    pub size: Option<u64>,
}

/// The request body for inviting a friend.
#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    /// The email address the friend registered with.
    pub email: String,
}

/// A route handler for creating a challenge. The creator joins it straight away.
pub async fn create_challenge_endpoint(
    State(state): State<ChallengeState>,
    Extension(user_id): Extension<UserID>,
    Json(request): Json<ChallengeRequest>,
) -> Result<(StatusCode, Json<Challenge>), Error> {
    let now = local_now(&state.local_timezone)?;
    let connection = lock_connection(&state.db_connection)?;
    let fields = request.into_fields(&connection)?;

    let challenge = create_challenge(fields, user_id, now, &connection)?;

    Ok((StatusCode::CREATED, Json(challenge)))
}

/// A route handler for searching challenges by title or description.
pub async fn search_challenges_endpoint(
    State(state): State<ChallengeState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Page<Challenge>>, Error> {
    let page = PageRequest::from_query(
        PageQuery {
            page: query.page,
            size: query.size,
        },
        &state.pagination_config,
    );
    let connection = lock_connection(&state.db_connection)?;

    search_challenges(query.text.as_deref(), page, &connection).map(Json)
}

/// A route handler for reading a single challenge.
pub async fn get_challenge_endpoint(
    State(state): State<ChallengeState>,
    Path(challenge_id): Path<i64>,
) -> Result<Json<Challenge>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_challenge(challenge_id, &connection).map(Json)
}

/// A route handler for changing a challenge. Only the creator may do this.
pub async fn update_challenge_endpoint(
    State(state): State<ChallengeState>,
    Extension(user_id): Extension<UserID>,
    Path(challenge_id): Path<i64>,
    Json(request): Json<ChallengeRequest>,
) -> Result<Json<Challenge>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let fields = request.into_fields(&connection)?;

    update_challenge(challenge_id, user_id, fields, &connection).map(Json)
}

/// A route handler for deleting a challenge. Only the creator may do this.
pub async fn delete_challenge_endpoint(
    State(state): State<ChallengeState>,
    Extension(user_id): Extension<UserID>,
    Path(challenge_id): Path<i64>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    delete_challenge(challenge_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

/// A route handler for joining a challenge.
pub async fn participate_endpoint(
    State(state): State<ChallengeState>,
    Extension(user_id): Extension<UserID>,
    Path(challenge_id): Path<i64>,
) -> Result<Json<Challenge>, Error> {
    join_challenge(&state.db_connection, user_id, challenge_id)
        .await
        .map(Json)
}

/// A route handler for leaving a challenge.
pub async fn exit_endpoint(
    State(state): State<ChallengeState>,
    Extension(user_id): Extension<UserID>,
    Path(challenge_id): Path<i64>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    leave_challenge(user_id, challenge_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

/// A route handler for the public, recruiting challenges with the most participants.
pub async fn top_challenges_endpoint(
    State(state): State<ChallengeState>,
) -> Result<Json<Vec<Challenge>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_top_challenges(TOP_CHALLENGE_LIMIT, &connection).map(Json)
}

/// A route handler for the public, recruiting challenges created in the last week.
pub async fn new_challenges_endpoint(
    State(state): State<ChallengeState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Challenge>>, Error> {
    let page = PageRequest::from_query(query, &state.pagination_config);
    let since = local_now(&state.local_timezone)? - NEW_CHALLENGE_WINDOW;
    let connection = lock_connection(&state.db_connection)?;

    get_new_challenges(since, page, &connection).map(Json)
}

/// A route handler for the challenges the logged in user participates in.
pub async fn my_challenges_endpoint(
    State(state): State<ChallengeState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Challenge>>, Error> {
    let page = PageRequest::from_query(query, &state.pagination_config);
    let connection = lock_connection(&state.db_connection)?;

    get_participating_challenges(user_id, page, &connection).map(Json)
}

/// A route handler for inviting a friend to a challenge by email.
///
/// Publishes a [DomainEvent::FriendInvited] once the invite is stored.
pub async fn invite_endpoint(
    State(state): State<ChallengeState>,
    Extension(user_id): Extension<UserID>,
    Path(challenge_id): Path<i64>,
    Json(request): Json<InviteRequest>,
) -> Result<(StatusCode, Json<ChallengeInvite>), Error> {
    let invite = {
        let connection = lock_connection(&state.db_connection)?;
        invite_friend(user_id, challenge_id, &request.email, &connection)?
    };

    state.events.publish(DomainEvent::FriendInvited {
        inviter_id: user_id,
    });

    Ok((StatusCode::CREATED, Json(invite)))
}

/// A route handler for listing the invites sent to the logged in user.
pub async fn my_invites_endpoint(
    State(state): State<ChallengeState>,
    Extension(user_id): Extension<UserID>,
) -> Result<Json<Vec<ChallengeInvite>>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_my_invites(user_id, &connection).map(Json)
}

/// A route handler for accepting an invite.
pub async fn accept_invite_endpoint(
    State(state): State<ChallengeState>,
    Extension(user_id): Extension<UserID>,
    Path(invite_id): Path<i64>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    accept_invite(invite_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

/// A route handler for rejecting an invite.
pub async fn reject_invite_endpoint(
    State(state): State<ChallengeState>,
    Extension(user_id): Extension<UserID>,
    Path(invite_id): Path<i64>,
) -> Result<StatusCode, Error> {
    let connection = lock_connection(&state.db_connection)?;

    reject_invite(invite_id, user_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}
