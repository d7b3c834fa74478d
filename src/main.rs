use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use topup_engine::services::gateway::HttpPaymentGateway;
use topup_engine::services::notify::TelegramNotifier;
use topup_engine::services::reconcile::run_reconciler;
use topup_engine::services::statement::HttpStatementFeed;
use topup_engine::{create_router, AppState, Config};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().expect("invalid configuration");

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .expect("invalid DATABASE_URL")
        .create_if_missing(true);
    // Single connection: SQLite allows one writer and the pool doubles as
    // the write serializer.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options)
        .await
        .expect("failed to open database");
    topup_engine::db::init_schema(&pool)
        .await
        .expect("failed to initialize schema");

    let client = reqwest::Client::builder()
        .timeout(config.feed_timeout)
        .build()
        .expect("failed to build http client");

    let state = AppState::new(
        pool,
        config.clone(),
        Arc::new(HttpPaymentGateway::new(
            client.clone(),
            config.qr_api_url.clone(),
            config.qr_api_key.clone(),
            config.qris_template.clone(),
        )),
        Arc::new(TelegramNotifier::new(
            client.clone(),
            config.bot_api_url.clone(),
            config.bot_token.clone(),
            config.operator_chat_id,
        )),
        Arc::new(HttpStatementFeed::new(
            client,
            config.statement_api_url.clone(),
            config.statement_auth_token.clone(),
        )),
    );

    let loaded = state
        .deposits
        .load_all()
        .await
        .expect("failed to load pending deposits");
    info!(loaded, "pending deposits recovered");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconciler = tokio::spawn(run_reconciler(state.clone(), shutdown_rx));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("failed to bind");
    info!("listening on {}", config.bind_addr);

    axum::serve(listener, create_router().with_state(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .expect("server error");

    let _ = shutdown_tx.send(true);
    let _ = reconciler.await;
}
