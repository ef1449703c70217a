//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde_json::json;

use crate::{
    AppState,
    account_book::{
        create_entry_endpoint, delete_entry_endpoint, get_entry_endpoint, list_entries_endpoint,
        update_entry_endpoint,
    },
    achievement::get_my_achievements_endpoint,
    auth::{auth_guard, post_log_in, post_log_out, register_user},
    budget::{
        create_budget_endpoint, delete_budget_endpoint, get_budget_endpoint,
        update_budget_endpoint,
    },
    category::get_categories_endpoint,
    challenge::{
        accept_invite_endpoint, create_challenge_endpoint, delete_challenge_endpoint,
        exit_endpoint, get_challenge_endpoint, invite_endpoint, my_challenges_endpoint,
        my_invites_endpoint, new_challenges_endpoint, participate_endpoint,
        reject_invite_endpoint, search_challenges_endpoint, top_challenges_endpoint,
        update_challenge_endpoint,
    },
    codef::{connect_endpoint, get_token_endpoint, transactions_endpoint},
    endpoints,
    notification::put_fcm_token_endpoint,
    stats::{category_list_endpoint, consume_endpoint, stat_list_endpoint},
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::USERS, post(register_user))
        .route(endpoints::LOG_IN, post(post_log_in))
        .route(endpoints::LOG_OUT, post(post_log_out));

    let protected_routes = Router::new()
        .route(endpoints::CATEGORIES, get(get_categories_endpoint))
        .route(
            endpoints::ACCOUNT_BOOK,
            get(list_entries_endpoint).post(create_entry_endpoint),
        )
        .route(
            endpoints::ACCOUNT_BOOK_ENTRY,
            get(get_entry_endpoint)
                .put(update_entry_endpoint)
                .delete(delete_entry_endpoint),
        )
        .route(
            endpoints::BUDGETS,
            get(get_budget_endpoint).post(create_budget_endpoint),
        )
        .route(
            endpoints::BUDGET,
            put(update_budget_endpoint).delete(delete_budget_endpoint),
        )
        .route(endpoints::STATS, get(stat_list_endpoint))
        .route(endpoints::STATS_CATEGORY, get(category_list_endpoint))
        .route(endpoints::STATS_CONSUME, get(consume_endpoint))
        .route(
            endpoints::CHALLENGES,
            get(search_challenges_endpoint).post(create_challenge_endpoint),
        )
        .route(endpoints::TOP_CHALLENGES, get(top_challenges_endpoint))
        .route(endpoints::NEW_CHALLENGES, get(new_challenges_endpoint))
        .route(endpoints::MY_CHALLENGES, get(my_challenges_endpoint))
        .route(
            endpoints::CHALLENGE,
            get(get_challenge_endpoint)
                .put(update_challenge_endpoint)
                .delete(delete_challenge_endpoint),
        )
        .route(
            endpoints::CHALLENGE_PARTICIPATION,
            post(participate_endpoint),
        )
        .route(
            endpoints::CHALLENGE_EXIT,
            axum::routing::delete(exit_endpoint),
        )
        .route(endpoints::CHALLENGE_INVITES, post(invite_endpoint))
        .route(endpoints::INVITES, get(my_invites_endpoint))
        .route(endpoints::INVITE_ACCEPT, post(accept_invite_endpoint))
        .route(endpoints::INVITE_REJECT, post(reject_invite_endpoint))
        .route(endpoints::FCM_TOKEN, put(put_fcm_token_endpoint))
        .route(endpoints::MY_ACHIEVEMENTS, get(get_my_achievements_endpoint))
        .route(endpoints::CODEF_TOKEN, get(get_token_endpoint))
        .route(endpoints::CODEF_CONNECT, post(connect_endpoint))
        .route(endpoints::CODEF_TRANSACTIONS, get(transactions_endpoint))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

/// The JSON response for routes that do not exist.
async fn get_404_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "code": "NOT_FOUND",
            "message": "the requested resource could not be found",
        })),
    )
        .into_response()
}
