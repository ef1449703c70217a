//! Defines the app level error type and its conversion to JSON error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use time::Date;

use crate::frequency::UnknownFrequency;

/// The errors that may occur in the application.
///
/// Each variant maps to a stable error code (see [Error::code]) that clients
/// can match on, and an HTTP status code (see [Error::status_code]).
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The email and password combination did not match a registered user.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The request did not carry a valid auth cookie.
    #[error("you need to log in to access this resource")]
    Unauthenticated,

    /// The auth cookie could not be created or read.
    ///
    /// Callers should pass in the original error as a string.
    #[error("could not process the auth cookie: {0}")]
    CookieError(String),

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The string is not a valid email address.
    #[error("\"{0}\" is not a valid email address")]
    InvalidEmail(String),

    /// The email address is already registered to another user.
    #[error("the email address is already registered")]
    DuplicateEmail,

    /// An empty string was used as a nickname.
    #[error("nickname cannot be empty")]
    EmptyNickname,

    /// The user referenced by the request does not exist.
    #[error("the user could not be found")]
    UserNotFound,

    /// The category key or label does not refer to a known category.
    #[error("\"{0}\" is not a known category")]
    InvalidCategory(String),

    /// An empty string was used as a title.
    #[error("title cannot be empty")]
    EmptyTitle,

    /// Amounts of money must be positive, the entry type carries the sign.
    #[error("amount must be greater than zero, got {0}")]
    InvalidAmount(i64),

    /// The account book entry does not exist or belongs to another user.
    #[error("the account book entry could not be found")]
    AccountBookNotFound,

    /// The budget does not exist or belongs to another user.
    #[error("the budget could not be found")]
    BudgetNotFound,

    /// The user already has a budget.
    #[error("a budget already exists for this user")]
    DuplicateBudget,

    /// The challenge does not exist.
    #[error("the challenge could not be found")]
    ChallengeNotFound,

    /// The invite does not exist or was sent to another user.
    #[error("the challenge invite could not be found")]
    InviteNotFound,

    /// The inviter does not participate in the challenge they invited someone to.
    #[error("you can only invite friends to challenges you participate in")]
    InviteInvalid,

    /// The invitee already has a pending invite to the challenge.
    #[error("the user has already been invited to this challenge")]
    InviteAlreadyExists,

    /// The challenge has no free places left.
    #[error("the challenge is full")]
    ChallengeFull,

    /// The user is already a participant of the challenge.
    #[error("you are already participating in this challenge")]
    AlreadyParticipating,

    /// The user is not a participant of the challenge.
    #[error("you are not participating in this challenge")]
    NotParticipant,

    /// Only the creator of a challenge may change or delete it.
    #[error("only the creator of the challenge can do that")]
    NotChallengeCreator,

    /// The challenge has started or finished and no longer accepts changes or participants.
    #[error("the challenge is no longer recruiting")]
    ChallengeNotRecruiting,

    /// A capacity below one was requested.
    #[error("capacity must be at least 1, got {0}")]
    InvalidCapacity(i64),

    /// A capacity change would leave more participants than places.
    #[error("capacity {capacity} is below the current number of participants {current}")]
    CapacityBelowParticipants {
        /// The requested capacity.
        capacity: i64,
        /// The current number of participants.
        current: i64,
    },

    /// The start date is after the end date.
    #[error("the start date {start} is after the end date {end}")]
    InvalidDateRange {
        /// The requested start date.
        start: Date,
        /// The requested end date.
        end: Date,
    },

    /// The challenge row changed between reading it and writing it.
    ///
    /// Internally this triggers a retry. It only reaches clients when an
    /// update other than a join loses the race.
    #[error("the challenge was changed by another request, please try again")]
    VersionConflict,

    /// A join kept losing the optimistic version check and gave up.
    #[error("the challenge capacity changed, please try again")]
    CapacityChanged,

    /// The period name is not one of daily, weekly, monthly or yearly.
    #[error("\"{0}\" is not a known frequency")]
    InvalidFrequency(String),

    /// The user has not registered a device for push notifications.
    #[error("no push notification token is registered for the user")]
    FcmTokenNotFound,

    /// An empty string was used as a push notification token.
    #[error("push notification token cannot be empty")]
    EmptyFcmToken,

    /// The push notification provider rejected or failed the request.
    #[error("could not send the push notification: {0}")]
    NotificationError(String),

    /// The user has not connected a bank account.
    #[error("no bank account has been connected")]
    CodefAccountNotFound,

    /// The request to Codef failed before a response was received or the
    /// response could not be parsed.
    #[error("the request to Codef failed: {0}")]
    CodefRequest(String),

    /// Codef answered with a non-success result code.
    #[error("Codef returned {code}: {message}")]
    CodefApi {
        /// The Codef result code, e.g. "CF-00401".
        code: String,
        /// The Codef result message.
        message: String,
    },

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl Error {
    /// The stable, machine readable code for the error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidCredentials => "INVALID_CREDENTIALS",
            Error::Unauthenticated => "UNAUTHENTICATED",
            Error::CookieError(_) => "COOKIE_ERROR",
            Error::TooWeak(_) => "PASSWORD_TOO_WEAK",
            Error::HashingError(_) => "HASHING_ERROR",
            Error::InvalidEmail(_) => "INVALID_EMAIL",
            Error::DuplicateEmail => "DUPLICATE_EMAIL",
            Error::EmptyNickname => "EMPTY_NICKNAME",
            Error::UserNotFound => "USER_NOT_FOUND",
            Error::InvalidCategory(_) => "INVALID_CATEGORY",
            Error::EmptyTitle => "EMPTY_TITLE",
            Error::InvalidAmount(_) => "INVALID_AMOUNT",
            Error::AccountBookNotFound => "ACCOUNT_BOOK_NOT_FOUND",
            Error::BudgetNotFound => "BUDGET_NOT_FOUND",
            Error::DuplicateBudget => "DUPLICATE_BUDGET",
            Error::ChallengeNotFound => "CHALLENGE_NOT_FOUND",
            Error::InviteNotFound => "CHALLENGE_NOT_FOUND_INVITED",
            Error::InviteInvalid => "CHALLENGE_INVITE_INVALID",
            Error::InviteAlreadyExists => "CHALLENGE_ALREADY_INVITED",
            Error::ChallengeFull => "CHALLENGE_FULL",
            Error::AlreadyParticipating => "CHALLENGE_ALREADY_PARTICIPATING",
            Error::NotParticipant => "CHALLENGE_NOT_PARTICIPANT",
            Error::NotChallengeCreator => "CHALLENGE_NOT_CREATOR",
            Error::ChallengeNotRecruiting => "CHALLENGE_NOT_RECRUITING",
            Error::InvalidCapacity(_) => "INVALID_CAPACITY",
            Error::CapacityBelowParticipants { .. } => "CAPACITY_BELOW_PARTICIPANTS",
            Error::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            Error::VersionConflict => "VERSION_CONFLICT",
            Error::CapacityChanged => "CAPACITY_CHANGED",
            Error::InvalidFrequency(_) => "INVALID_FREQUENCY",
            Error::FcmTokenNotFound => "NOT_FOUND_FCM_TOKEN",
            Error::EmptyFcmToken => "EMPTY_FCM_TOKEN",
            Error::NotificationError(_) => "NOTIFICATION_ERROR",
            Error::CodefAccountNotFound => "CODEF_ACCOUNT_NOT_FOUND",
            Error::CodefRequest(_) => "CODEF_REQUEST_FAILED",
            Error::CodefApi { .. } => "CODEF_API_ERROR",
            Error::InvalidTimezoneError(_) => "INVALID_TIMEZONE",
            Error::NotFound => "NOT_FOUND",
            Error::SqlError(_) => "INTERNAL_ERROR",
            Error::DatabaseLockError => "INTERNAL_ERROR",
        }
    }

    /// The HTTP status code to respond with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidCredentials | Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::NotChallengeCreator | Error::InviteInvalid => StatusCode::FORBIDDEN,
            Error::UserNotFound
            | Error::AccountBookNotFound
            | Error::BudgetNotFound
            | Error::ChallengeNotFound
            | Error::InviteNotFound
            | Error::FcmTokenNotFound
            | Error::CodefAccountNotFound
            | Error::NotFound => StatusCode::NOT_FOUND,
            Error::DuplicateEmail
            | Error::DuplicateBudget
            | Error::InviteAlreadyExists
            | Error::ChallengeFull
            | Error::AlreadyParticipating
            | Error::ChallengeNotRecruiting
            | Error::VersionConflict
            | Error::CapacityChanged => StatusCode::CONFLICT,
            Error::TooWeak(_)
            | Error::InvalidEmail(_)
            | Error::EmptyNickname
            | Error::InvalidCategory(_)
            | Error::EmptyTitle
            | Error::InvalidAmount(_)
            | Error::NotParticipant
            | Error::InvalidCapacity(_)
            | Error::CapacityBelowParticipants { .. }
            | Error::InvalidDateRange { .. }
            | Error::InvalidFrequency(_)
            | Error::EmptyFcmToken => StatusCode::BAD_REQUEST,
            Error::NotificationError(_) | Error::CodefRequest(_) | Error::CodefApi { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Error::CookieError(_)
            | Error::HashingError(_)
            | Error::InvalidTimezoneError(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<UnknownFrequency> for Error {
    fn from(value: UnknownFrequency) -> Self {
        Error::InvalidFrequency(value.0)
    }
}

/// The JSON body sent to clients for every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// The stable error code, see [Error::code].
    pub code: &'static str,
    /// A human readable description of the error.
    pub message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Internal details are not intended to be shown to the client.
            tracing::error!("An unexpected error occurred: {}", self);
            "An unexpected error occurred, check the server logs for more details.".to_owned()
        } else {
            if status == StatusCode::BAD_GATEWAY {
                tracing::warn!("An external service failed: {}", self);
            }
            self.to_string()
        };

        let body = ErrorBody {
            code: self.code(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod error_response_tests {
    use axum::{http::StatusCode, response::IntoResponse};
    use serde_json::Value;

    use super::Error;

    async fn into_json(error: Error) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Could not read response body");

        (
            status,
            serde_json::from_slice(&body).expect("Could not parse body as JSON"),
        )
    }

    #[tokio::test]
    async fn duplicate_budget_is_conflict_with_code() {
        let (status, body) = into_json(Error::DuplicateBudget).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "DUPLICATE_BUDGET");
        assert_eq!(body["message"], "a budget already exists for this user");
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) = into_json(Error::SqlError(rusqlite::Error::InvalidQuery)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "INTERNAL_ERROR");
        assert!(
            !body["message"].as_str().unwrap().contains("SQL"),
            "internal error message leaked: {body}"
        );
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        let error: Error = rusqlite::Error::QueryReturnedNoRows.into();

        assert_eq!(error, Error::NotFound);
    }
}
