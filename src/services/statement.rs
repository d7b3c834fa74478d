//! Statement feed client and the tolerant block parser.
//!
//! The feed returns free text: transaction blocks separated by a run of
//! dashes. A block yields a transaction iff it carries a `Kredit` line;
//! `Tanggal` and `Brand` are optional. Amounts use `.` as thousands
//! separator and are normalized to plain integers.

use async_trait::async_trait;
use serde_json::json;

use crate::error::EngineError;
use crate::models::{now_ms, StatementTransaction};

const BLOCK_DELIMITER: &str = "------------------------";

#[async_trait]
pub trait StatementFeed: Send + Sync {
    /// Retrieves the raw statement body. Implementations must build a
    /// fresh request payload per call and carry a bounded timeout.
    async fn fetch(&self) -> Result<String, EngineError>;
}

/// Production feed client. The payload carries the current time because
/// the upstream rejects stale (reused) payloads.
pub struct HttpStatementFeed {
    client: reqwest::Client,
    url: String,
    auth_token: String,
}

impl HttpStatementFeed {
    pub fn new(client: reqwest::Client, url: String, auth_token: String) -> Self {
        Self {
            client,
            url,
            auth_token,
        }
    }
}

#[async_trait]
impl StatementFeed for HttpStatementFeed {
    async fn fetch(&self) -> Result<String, EngineError> {
        let payload = json!({
            "auth_token": self.auth_token,
            "request_time": now_ms(),
        });
        let body = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

/// Parses the raw statement body into transactions. Blocks missing the
/// credit pattern are skipped silently; a malformed block is never fatal.
pub fn parse_statement(body: &str) -> Vec<StatementTransaction> {
    body.split(BLOCK_DELIMITER)
        .filter(|block| !block.trim().is_empty())
        .filter_map(parse_block)
        .collect()
}

fn parse_block(block: &str) -> Option<StatementTransaction> {
    let mut credit = None;
    let mut date = None;
    let mut brand = None;

    for line in block.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "Kredit" => {
                let digits: String = value
                    .trim()
                    .chars()
                    .take_while(|c| c.is_ascii_digit() || *c == '.')
                    .filter(char::is_ascii_digit)
                    .collect();
                credit = digits.parse::<i64>().ok();
            }
            "Tanggal" => date = Some(value.trim().to_string()),
            "Brand" => brand = Some(value.trim().to_string()),
            _ => {}
        }
    }

    Some(StatementTransaction {
        date: date.unwrap_or_else(|| "-".to_string()),
        credit_amount: credit?,
        brand: brand.unwrap_or_else(|| "-".to_string()),
    })
}
