use crate::{
    app::{App, AppConfig},
    auth::{ApiKeys, identify},
    codegen::ThreadRandom,
    db::{LinksDB, MemoryDb, PostgresDb},
    db_pool::DbPool,
    handler::{
        handle_create, handle_delete, handle_health, handle_list, handle_me, handle_redirect,
        handle_stats,
    },
    migrations::run_migrations,
};
use axum::{
    Router, middleware,
    routing::{get, post},
};
use clap::Parser;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod auth;
mod codegen;
mod counter;
mod db;
mod db_pool;
mod error;
mod handler;
mod migrations;
mod models;
mod schema;
mod signals;

/// Codes must fit the `links.code` column.
const MAX_CODE_LENGTH: usize = 32;

#[cfg(not(debug_assertions))]
#[must_use]
pub const fn is_debug() -> bool {
    false
}

#[cfg(debug_assertions)]
#[must_use]
pub const fn is_debug() -> bool {
    true
}

#[derive(Default, Parser, Debug)]
struct Arguments {
    #[arg(long, default_value_t = true, help = "Relax CORS", env = "RELAX_CORS")]
    cors_relaxed: bool,

    #[arg(long, default_value_t = 8080, help = "Port to listen on", env = "PORT")]
    port: u16,

    #[arg(long, default_value_t = 6, help = "Short code length", env = "CODE_LENGTH")]
    code_length: usize,

    #[arg(
        long,
        default_value_t = 10,
        help = "Code generation attempts before giving up",
        env = "MAX_ALLOCATION_ATTEMPTS"
    )]
    max_allocation_attempts: u32,

    #[arg(
        long,
        default_value_t = false,
        help = "Allow creating links without an API key",
        env = "ALLOW_ANONYMOUS"
    )]
    allow_anonymous: bool,

    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        help = "Hand out codes of deleted links again",
        env = "REUSE_DELETED_CODES"
    )]
    reuse_deleted_codes: bool,

    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        help = "Keep a per-click event log",
        env = "RECORD_CLICK_EVENTS"
    )]
    record_click_events: bool,

    #[arg(long, help = "Logging level of the Rust log", env = "RUST_LOG")]
    #[clap(default_value_t = String::from("info,tower_http=debug"))]
    rust_log_level: String,

    #[arg(long, help = "Postgres url, in-memory store if unset", env = "DATABASE_URL")]
    db_url: Option<String>,

    #[arg(
        long,
        default_value_t = 10,
        help = "DB pool size",
        env = "DB_POOL_SIZE"
    )]
    db_pool_size: usize,

    #[arg(long, default_value_t = String::from("http://localhost:8080"), env = "URL_PREFIX")]
    url_prefix: String,

    #[arg(long, default_value_t = String::new(), help = "id:email:key,...", env = "KEYS")]
    keys: String,
}

fn setup_cors(relaxed: bool) -> CorsLayer {
    if relaxed {
        tracing::info!("cors setup: very_permissive");
        CorsLayer::very_permissive().allow_credentials(true)
    } else {
        tracing::info!("cors setup: default");
        CorsLayer::new()
    }
}

fn build_router(app: Arc<App>, api_keys: ApiKeys) -> Router {
    let api = Router::new()
        .route("/create", post(handle_create))
        .route("/links", get(handle_list))
        .route("/links/{code}", get(handle_stats).delete(handle_delete))
        .route("/me", get(handle_me))
        .route_layer(middleware::from_fn_with_state(api_keys, identify));

    Router::new()
        .nest("/api", api)
        .route("/{code}", get(handle_redirect))
        .route("/health", get(handle_health))
        .with_state(app)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Arguments::parse();

    let log_level = args.rust_log_level;

    let cors_relaxed = args.cors_relaxed;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(log_level.clone()))
        .with(tracing_subscriber::fmt::layer().with_ansi(is_debug()))
        .init();

    anyhow::ensure!(
        (1..=MAX_CODE_LENGTH).contains(&args.code_length),
        "code length must be between 1 and {MAX_CODE_LENGTH}"
    );
    anyhow::ensure!(
        args.max_allocation_attempts > 0,
        "max allocation attempts must be positive"
    );

    let db: Arc<dyn LinksDB> = match &args.db_url {
        Some(db_url) => {
            rustls::crypto::aws_lc_rs::default_provider()
                .install_default()
                .map_err(|_| anyhow::anyhow!("Could not install rustls default crypto provider."))?;

            run_migrations(db_url)?;

            let dbpool = DbPool::build(db_url, args.db_pool_size).await?;

            Arc::new(PostgresDb::new(dbpool))
        }
        None => {
            tracing::warn!("no DATABASE_URL set, links are kept in memory");
            Arc::new(MemoryDb::new())
        }
    };

    let api_keys = ApiKeys::new(&args.keys);

    let app = App::new(
        AppConfig {
            prefix: args.url_prefix.trim_end_matches('/').to_string(),
            code_length: args.code_length,
            max_attempts: args.max_allocation_attempts,
            allow_anonymous: args.allow_anonymous,
            reuse_deleted_codes: args.reuse_deleted_codes,
            record_click_events: args.record_click_events,
        },
        db,
        Arc::new(ThreadRandom),
    );

    let router = build_router(app, api_keys)
        .layer(TraceLayer::new_for_http())
        .layer(setup_cors(cors_relaxed));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    tracing::info!("listening on http://{}", addr);

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    signals::create_term_signal_handler(tx);

    let listener = TcpListener::bind(addr).await?;

    let server = axum::serve(listener, router.into_make_service());

    let graceful = server.with_graceful_shutdown(async {
        rx.await.ok();
    });

    if let Err(e) = graceful.await {
        tracing::error!("server error: {}", e);
    }

    Ok(())
}
