//! Moneybook is a personal finance tracking backend.
//!
//! Users record income and expense entries in an account book, set a monthly
//! budget, join savings challenges with friends and read spending statistics.
//! This library provides the JSON REST API, the background jobs that move
//! challenges through their lifecycle and the after-commit side effects such
//! as budget warnings.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod account_book;
mod achievement;
mod app_state;
mod auth;
mod budget;
mod category;
mod challenge;
mod codef;
mod db;
mod endpoints;
mod error;
mod events;
mod frequency;
mod logging;
mod notification;
mod pagination;
mod routing;
mod stats;
mod timezone;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use auth::{PasswordHash, User, UserID, ValidatedPassword};
pub use challenge::run_challenge_scheduler;
pub use codef::{CodefClient, CodefConfig};
pub use db::initialize as initialize_db;
pub use error::Error;
pub use events::{DomainEvent, EventContext, spawn_event_worker};
pub use frequency::{Frequency, PeriodRange};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use notification::{HttpNotifier, LogNotifier, Notifier, SpendNotification};
pub use pagination::PaginationConfig;
pub use routing::build_router;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
