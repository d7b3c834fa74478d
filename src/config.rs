//! Engine configuration loaded from environment variables (or a `.env`
//! file via `dotenvy`).

use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Socket address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// SQLite connection string, e.g. `sqlite://topup.db`.
    pub database_url: String,
    /// Endpoint of the mutation/settlement statement feed.
    pub statement_api_url: String,
    /// Auth token sent with every statement request.
    pub statement_auth_token: String,
    /// Endpoint of the QR payment-target generation gateway.
    pub qr_api_url: String,
    /// API key for the QR gateway.
    pub qr_api_key: String,
    /// Static merchant QR template the gateway rewrites per amount.
    pub qris_template: String,
    /// Base URL of the bot API used for notifications.
    pub bot_api_url: String,
    /// Bot token for the notification channel.
    pub bot_token: String,
    /// Chat id of the operator group that receives settlement notices.
    pub operator_chat_id: i64,
    /// Period of the poll/sweep cycle.
    pub poll_interval: Duration,
    /// Per-request timeout for the statement feed and outbound calls.
    pub feed_timeout: Duration,
    /// Age after which an unsettled deposit is expired.
    pub deposit_expiry: Duration,
    /// Minimum accepted top-up amount.
    pub min_topup: i64,
}

impl Config {
    /// Loads configuration from the environment, falling back to defaults
    /// for everything except credentials.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let bind_addr: SocketAddr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()?;

        Ok(Self {
            bind_addr,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://topup.db".to_string()),
            statement_api_url: std::env::var("STATEMENT_API_URL").unwrap_or_default(),
            statement_auth_token: std::env::var("STATEMENT_AUTH_TOKEN").unwrap_or_default(),
            qr_api_url: std::env::var("QR_API_URL").unwrap_or_default(),
            qr_api_key: std::env::var("QR_API_KEY").unwrap_or_default(),
            qris_template: std::env::var("QRIS_TEMPLATE").unwrap_or_default(),
            bot_api_url: std::env::var("BOT_API_URL")
                .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
            bot_token: std::env::var("BOT_TOKEN").unwrap_or_default(),
            operator_chat_id: parse_env("OPERATOR_CHAT_ID", 0),
            poll_interval: Duration::from_secs(parse_env("POLL_INTERVAL_SECS", 10)),
            feed_timeout: Duration::from_secs(parse_env("FEED_TIMEOUT_SECS", 5)),
            deposit_expiry: Duration::from_secs(parse_env("DEPOSIT_EXPIRY_SECS", 300)),
            min_topup: parse_env("MIN_TOPUP", 5000),
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
