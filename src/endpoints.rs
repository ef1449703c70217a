//! The API endpoints URIs.
//!
//! Endpoints that take a parameter, e.g., '/challenges/{challenge_id}', name it in braces
//! the way axum expects.

/// The route for registering users.
pub const USERS: &str = "/api/v1/users";
/// The route for logging in a user.
pub const LOG_IN: &str = "/api/v1/auth/log-in";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/v1/auth/log-out";

/// The route for listing the shared categories.
pub const CATEGORIES: &str = "/api/v1/categories";

/// The route to create and list account book entries.
pub const ACCOUNT_BOOK: &str = "/api/v1/accountbook";
/// The route to access a single account book entry.
pub const ACCOUNT_BOOK_ENTRY: &str = "/api/v1/accountbook/{entry_id}";

/// The route to create and read the user's budget.
pub const BUDGETS: &str = "/api/v1/budgets";
/// The route to change or delete a budget.
pub const BUDGET: &str = "/api/v1/budgets/{budget_id}";

/// The route for spend totals per category.
pub const STATS: &str = "/api/v1/stats/{frequency}";
/// The route for the spend entries of a single category.
pub const STATS_CATEGORY: &str = "/api/v1/stats/{frequency}/{category}";
/// The route comparing the current and previous period of a category.
pub const STATS_CONSUME: &str = "/api/v1/stats/{frequency}/{category}/consume";

/// The route to create and search challenges.
pub const CHALLENGES: &str = "/api/v1/challenges";
/// The route for the most popular recruiting challenges.
pub const TOP_CHALLENGES: &str = "/api/v1/challenges/top";
/// The route for recently created recruiting challenges.
pub const NEW_CHALLENGES: &str = "/api/v1/challenges/new";
/// The route for the challenges the user participates in.
pub const MY_CHALLENGES: &str = "/api/v1/challenges/me";
/// The route to access a single challenge.
pub const CHALLENGE: &str = "/api/v1/challenges/{challenge_id}";
/// The route to join a challenge.
pub const CHALLENGE_PARTICIPATION: &str = "/api/v1/challenges/{challenge_id}/participation";
/// The route to leave a challenge.
pub const CHALLENGE_EXIT: &str = "/api/v1/challenges/{challenge_id}/exit";
/// The route to invite a friend to a challenge.
pub const CHALLENGE_INVITES: &str = "/api/v1/challenges/{challenge_id}/invites";

/// The route for listing the invites sent to the user.
pub const INVITES: &str = "/api/v1/invites";
/// The route to accept an invite.
pub const INVITE_ACCEPT: &str = "/api/v1/invites/{invite_id}/accept";
/// The route to reject an invite.
pub const INVITE_REJECT: &str = "/api/v1/invites/{invite_id}/reject";

/// The route to register the device token for push notifications.
pub const FCM_TOKEN: &str = "/api/v1/fcm/token";

/// The route for the user's achievement counters.
pub const MY_ACHIEVEMENTS: &str = "/api/v1/achievements/me";

/// The route to refresh the Codef access token.
pub const CODEF_TOKEN: &str = "/api/v1/codef/token";
/// The route to connect a bank account through Codef.
pub const CODEF_CONNECT: &str = "/api/v1/codef/connect";
/// The route to fetch the bank transactions of the connected account.
pub const CODEF_TRANSACTIONS: &str = "/api/v1/codef/trans";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// Only the first parameter is replaced. Use [format_endpoint_with] for
/// endpoints with more than one parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
#[cfg(test)]
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    format_endpoint_with(endpoint_path, &[&id.to_string()])
}

/// Replace the parameters in `endpoint_path` with `values`, in order.
///
/// Parameters without a matching value are left in place.
#[cfg(test)]
pub fn format_endpoint_with(endpoint_path: &str, values: &[&str]) -> String {
    let mut formatted = String::with_capacity(endpoint_path.len());
    let mut rest = endpoint_path;
    let mut values = values.iter();

    while let Some(start) = rest.find('{') {
        let Some(length) = rest[start..].find('}') else {
            break;
        };

        let Some(value) = values.next() else {
            break;
        };

        formatted.push_str(&rest[..start]);
        formatted.push_str(value);
        rest = &rest[start + length + 1..];
    }

    formatted.push_str(rest);
    formatted
}

// These tests are here so that we know when we call `Uri::from_shared` it will not panic.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::{format_endpoint, format_endpoint_with};

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok(), "{uri} is not a valid URI");
    }

    #[test]
    fn endpoints_are_valid_uris() {
        for endpoint in [
            endpoints::USERS,
            endpoints::LOG_IN,
            endpoints::LOG_OUT,
            endpoints::CATEGORIES,
            endpoints::ACCOUNT_BOOK,
            endpoints::ACCOUNT_BOOK_ENTRY,
            endpoints::BUDGETS,
            endpoints::BUDGET,
            endpoints::STATS,
            endpoints::STATS_CATEGORY,
            endpoints::STATS_CONSUME,
            endpoints::CHALLENGES,
            endpoints::TOP_CHALLENGES,
            endpoints::NEW_CHALLENGES,
            endpoints::MY_CHALLENGES,
            endpoints::CHALLENGE,
            endpoints::CHALLENGE_PARTICIPATION,
            endpoints::CHALLENGE_EXIT,
            endpoints::CHALLENGE_INVITES,
            endpoints::INVITES,
            endpoints::INVITE_ACCEPT,
            endpoints::INVITE_REJECT,
            endpoints::FCM_TOKEN,
            endpoints::MY_ACHIEVEMENTS,
            endpoints::CODEF_TOKEN,
            endpoints::CODEF_CONNECT,
            endpoints::CODEF_TRANSACTIONS,
        ] {
            assert_endpoint_is_valid_uri(endpoint);
        }
    }

    #[test]
    fn produces_valid_uri() {
        let formatted_path = format_endpoint("/hello/{world_id}", 1);

        assert_eq!(formatted_path, "/hello/1");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn returns_original_path_with_no_parameter() {
        let formatted_path = format_endpoint("/hello/world", 1);

        assert_eq!(formatted_path, "/hello/world");
    }

    #[test]
    fn parameter_in_middle() {
        let formatted_path = format_endpoint(endpoints::CHALLENGE_EXIT, 7);

        assert_eq!(formatted_path, "/api/v1/challenges/7/exit");
    }

    #[test]
    fn replaces_multiple_parameters_in_order() {
        let formatted_path = format_endpoint_with(endpoints::STATS_CONSUME, &["weekly", "food"]);

        assert_eq!(formatted_path, "/api/v1/stats/weekly/food/consume");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn leaves_parameters_without_values() {
        let formatted_path = format_endpoint_with(endpoints::STATS_CATEGORY, &["daily"]);

        assert_eq!(formatted_path, "/api/v1/stats/daily/{category}");
    }
}
