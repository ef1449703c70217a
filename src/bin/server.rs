use std::{fs::OpenOptions, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{FromRef, MatchedPath, Request},
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;

use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use moneybook::{
    AppState, CodefClient, CodefConfig, EventContext, HttpNotifier, LogNotifier, Notifier,
    build_router, graceful_shutdown, run_challenge_scheduler, spawn_event_worker,
};

/// The REST API server for moneybook.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, env = "DB_PATH")]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// The canonical name of the local timezone, e.g. "Asia/Seoul".
    #[arg(long, env = "TIMEZONE", default_value = "Asia/Seoul")]
    timezone: String,

    /// The secret used to sign and encrypt auth cookies.
    #[arg(long, env = "SECRET", hide_env_values = true)]
    secret: String,

    /// The base URL of the Codef API.
    #[arg(long, env = "CODEF_API_URL", default_value = "https://development.codef.io")]
    codef_api_url: String,

    /// The base URL of the Codef OAuth server.
    #[arg(long, env = "CODEF_OAUTH_URL", default_value = "https://oauth.codef.io")]
    codef_oauth_url: String,

    /// The Codef OAuth client ID.
    #[arg(long, env = "CODEF_CLIENT_ID", default_value = "")]
    codef_client_id: String,

    /// The Codef OAuth client secret.
    #[arg(long, env = "CODEF_CLIENT_SECRET", default_value = "", hide_env_values = true)]
    codef_client_secret: String,

    /// The URL push notifications are posted to.
    #[arg(long, env = "FCM_URL", default_value = "https://fcm.googleapis.com/fcm/send")]
    fcm_url: String,

    /// The push server key. Notifications are only logged when this is not set.
    #[arg(long, env = "FCM_SERVER_KEY", hide_env_values = true)]
    fcm_server_key: Option<String>,

    /// How often, in seconds, challenge statuses are brought up to date.
    #[arg(long, env = "SCHEDULER_INTERVAL_SECS", default_value_t = 600)]
    scheduler_interval_secs: u64,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    let notifier: Arc<dyn Notifier> = match &args.fcm_server_key {
        Some(server_key) => Arc::new(HttpNotifier::new(&args.fcm_url, server_key)),
        None => {
            tracing::warn!("FCM_SERVER_KEY is not set, push notifications will only be logged.");
            Arc::new(LogNotifier)
        }
    };

    let codef_client = CodefClient::new(CodefConfig {
        api_url: args.codef_api_url,
        oauth_url: args.codef_oauth_url,
        client_id: args.codef_client_id,
        client_secret: args.codef_client_secret,
    });

    let conn = Connection::open(&args.db_path).expect("Could not open the database.");
    let (state, events) = AppState::new(conn, &args.secret, &args.timezone, notifier, codef_client)
        .expect("Could not create the app state.");

    spawn_event_worker(EventContext::from_ref(&state), events);
    tokio::spawn(run_challenge_scheduler(
        state.db_connection.clone(),
        state.local_timezone.clone(),
        Duration::from_secs(args.scheduler_interval_secs),
    ));

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(state));

    #[cfg(debug_assertions)]
    let router = router.layer(axum::middleware::from_fn(moneybook::logging_middleware));

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .expect("The server stopped with an error.");
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
