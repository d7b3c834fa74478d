//! Pending-deposit store and the amount disambiguator.
//!
//! The store keeps an in-memory index keyed by unique code, mirrored by
//! the `pending_deposits` table. The durable copy is written first on
//! create and deleted first on remove, so a failure at any point leaves
//! the two sides consistent (memory is never ahead of the database).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::Rng;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::db;
use crate::error::EngineError;
use crate::models::{now_ms, CreateDepositResponse, PendingDeposit};
use crate::services::notify::PromptDetails;
use crate::state::AppState;

/// Surcharge bounds, inclusive. The draw disambiguates the settlement
/// amount in a feed that only reports amounts.
pub const SURCHARGE_MIN: i64 = 1;
pub const SURCHARGE_MAX: i64 = 300;

pub struct DepositStore {
    pool: SqlitePool,
    index: Mutex<HashMap<String, PendingDeposit>>,
}

impl DepositStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            index: Mutex::new(HashMap::new()),
        }
    }

    fn index(&self) -> MutexGuard<'_, HashMap<String, PendingDeposit>> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rebuilds the in-memory index from the durable mirror. Called once
    /// at process start so a restart does not lose in-flight deposits.
    pub async fn load_all(&self) -> Result<usize, EngineError> {
        let rows = sqlx::query(
            "SELECT unique_code, user_id, amount, original_amount, timestamp, qr_message_id
             FROM pending_deposits",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut index = self.index();
        index.clear();
        for row in &rows {
            let deposit = PendingDeposit {
                unique_code: row.get("unique_code"),
                user_id: row.get("user_id"),
                final_amount: row.get("amount"),
                original_amount: row.get("original_amount"),
                created_at: row.get("timestamp"),
                qr_message_id: row.get("qr_message_id"),
            };
            index.insert(deposit.unique_code.clone(), deposit);
        }
        Ok(index.len())
    }

    pub fn get(&self, unique_code: &str) -> Option<PendingDeposit> {
        self.index().get(unique_code).cloned()
    }

    /// Snapshot of all pending deposits, oldest first. Safe to iterate
    /// while concurrent creates and removes occur.
    pub fn list_pending(&self) -> Vec<PendingDeposit> {
        let mut deposits: Vec<PendingDeposit> = self.index().values().cloned().collect();
        deposits.sort_by_key(|d| (d.created_at, d.unique_code.clone()));
        deposits
    }

    pub fn amount_in_use(&self, final_amount: i64) -> bool {
        self.index().values().any(|d| d.final_amount == final_amount)
    }

    /// Draws a surcharge and returns `(final_amount, surcharge)`. Starts
    /// at a uniform draw and probes forward (wrapping within the bounds)
    /// past final amounts already held by other pending deposits, so
    /// every in-flight deposit settles a distinct amount. Fails only when
    /// all 300 candidate amounts are in use.
    pub fn disambiguate(&self, requested: i64) -> Result<(i64, i64), EngineError> {
        let index = self.index();
        let span = SURCHARGE_MAX - SURCHARGE_MIN + 1;
        let start = draw_surcharge();
        for offset in 0..span {
            let surcharge = SURCHARGE_MIN + (start - SURCHARGE_MIN + offset) % span;
            let final_amount = requested + surcharge;
            if !index.values().any(|d| d.final_amount == final_amount) {
                return Ok((final_amount, surcharge));
            }
        }
        Err(EngineError::AmountUnavailable)
    }

    /// Writes the record durably, then mirrors it in memory. If the
    /// durable write fails nothing is inserted.
    pub async fn insert(&self, deposit: PendingDeposit) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO pending_deposits
               (unique_code, user_id, amount, original_amount, timestamp, qr_message_id)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&deposit.unique_code)
        .bind(deposit.user_id)
        .bind(deposit.final_amount)
        .bind(deposit.original_amount)
        .bind(deposit.created_at)
        .bind(deposit.qr_message_id)
        .execute(&self.pool)
        .await?;

        self.index().insert(deposit.unique_code.clone(), deposit);
        Ok(())
    }

    /// Removes the deposit from both sides. Idempotent: an absent code
    /// returns `Ok(None)`. The returned record is the claim that makes
    /// settlement and expiry mutually exclusive per deposit.
    pub async fn remove(&self, unique_code: &str) -> Result<Option<PendingDeposit>, EngineError> {
        sqlx::query("DELETE FROM pending_deposits WHERE unique_code = ?")
            .bind(unique_code)
            .execute(&self.pool)
            .await?;
        Ok(self.index().remove(unique_code))
    }
}

fn draw_surcharge() -> i64 {
    rand::thread_rng().gen_range(SURCHARGE_MIN..=SURCHARGE_MAX)
}

/// Full deposit-creation path: rate limit, minimum check, disambiguation,
/// QR generation, prompt delivery, then the durable record. Any failure
/// after a visible side effect undoes that side effect.
pub async fn create_deposit(
    state: &AppState,
    user_id: i64,
    amount: i64,
) -> Result<CreateDepositResponse, EngineError> {
    if amount < state.config.min_topup {
        return Err(EngineError::AmountBelowMinimum(state.config.min_topup));
    }
    if state.create_limiter.check().is_err() {
        return Err(EngineError::RateLimited);
    }

    db::ensure_user(&state.pool, user_id).await?;

    let (final_amount, surcharge) = state.deposits.disambiguate(amount)?;
    let created_at = now_ms();
    let unique_code = format!("user-{user_id}-{created_at}");

    let qr_image = state.gateway.create_qr(final_amount).await?;

    let details = PromptDetails {
        amount,
        fee: surcharge,
        total: final_amount,
        expires_in_secs: state.config.deposit_expiry.as_secs(),
    };
    let qr_message_id = state
        .notifier
        .send_qr_prompt(user_id, &qr_image, &details)
        .await?;

    let deposit = PendingDeposit {
        unique_code: unique_code.clone(),
        user_id,
        final_amount,
        original_amount: amount,
        created_at,
        qr_message_id: Some(qr_message_id),
    };

    if let Err(err) = state.deposits.insert(deposit).await {
        // The prompt is already visible; retract it so the user is not
        // left waiting on a deposit that was never recorded.
        let _ = state.notifier.retract_prompt(user_id, qr_message_id).await;
        return Err(err);
    }

    info!(
        user_id,
        unique_code = %unique_code,
        final_amount,
        surcharge,
        "pending deposit created"
    );

    Ok(CreateDepositResponse {
        unique_code,
        user_id,
        amount,
        fee: surcharge,
        total: final_amount,
        expires_in_secs: state.config.deposit_expiry.as_secs(),
    })
}
