use serde::{Deserialize, Serialize};

/// A deposit awaiting settlement. Exists only while pending: removal from
/// the store (and its durable mirror) is what resolves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeposit {
    /// Globally unique code, `user-{user_id}-{unix_millis}`.
    pub unique_code: String,
    pub user_id: i64,
    /// Requested amount plus the random surcharge; the value the user
    /// must transfer and the value matched against the statement feed.
    pub final_amount: i64,
    /// Requested top-up; the value actually credited.
    pub original_amount: i64,
    /// Creation time, unix millis.
    pub created_at: i64,
    /// Message id of the user-facing QR prompt, retracted on resolution.
    pub qr_message_id: Option<i64>,
}

impl PendingDeposit {
    pub fn surcharge(&self) -> i64 {
        self.final_amount - self.original_amount
    }

    pub fn age_ms(&self, now: i64) -> i64 {
        now - self.created_at
    }
}

/// One credited transaction parsed from the statement feed. Never
/// persisted; drives a single matching pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementTransaction {
    pub date: String,
    pub credit_amount: i64,
    pub brand: String,
}

/// A row of the append-only transactions ledger.
#[derive(Debug, Serialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub reference_id: String,
    pub timestamp: i64,
}

#[derive(Deserialize)]
pub struct CreateDepositRequest {
    pub user_id: i64,
    pub amount: i64,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct CreateDepositResponse {
    pub unique_code: String,
    pub user_id: i64,
    pub amount: i64,
    pub fee: i64,
    pub total: i64,
    pub expires_in_secs: u64,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub user_id: i64,
    pub balance: i64,
}

#[derive(Deserialize)]
pub struct CreditRequest {
    pub amount: i64,
}

/// Current time as unix millis, the timestamp unit used across the
/// schema and the expiry math.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
