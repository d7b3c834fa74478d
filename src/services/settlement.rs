//! Settlement of a matched deposit: the atomic credit plus ledger entry,
//! and the best-effort post-commit phase.
//!
//! The credit is guarded by a check-then-act existence test on
//! `(reference_id, amount)` executed inside the same storage transaction
//! as the balance update and ledger insert. That transaction is the sole
//! mutual-exclusion mechanism for balance changes; a duplicate delivery
//! of the same match is detected there and treated as a successful no-op.

use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use crate::error::EngineError;
use crate::models::{now_ms, PendingDeposit, StatementTransaction};
use crate::state::AppState;

/// Result of the atomic unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// Balance credited and ledger row inserted; carries the new balance.
    Applied { new_balance: i64 },
    /// A ledger row for this dedup key and amount already exists.
    AlreadySettled,
}

/// Executes the atomic unit: dedup check, credit by the original amount
/// (the surcharge is a fee, never credited), ledger insert, commit. Any
/// failure rolls the whole unit back and leaves the deposit pending.
pub async fn apply_settlement(
    pool: &SqlitePool,
    deposit: &PendingDeposit,
    reference_id: &str,
) -> Result<SettlementOutcome, EngineError> {
    let mut tx = pool.begin().await?;

    let existing = sqlx::query("SELECT id FROM transactions WHERE reference_id = ? AND amount = ?")
        .bind(reference_id)
        .bind(deposit.original_amount)
        .fetch_optional(&mut *tx)
        .await?;
    if existing.is_some() {
        tx.rollback().await?;
        return Ok(SettlementOutcome::AlreadySettled);
    }

    let updated = sqlx::query("UPDATE users SET saldo = saldo + ? WHERE user_id = ?")
        .bind(deposit.original_amount)
        .bind(deposit.user_id)
        .execute(&mut *tx)
        .await?;
    if updated.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(EngineError::UserNotFound(deposit.user_id));
    }

    sqlx::query(
        "INSERT INTO transactions (user_id, amount, type, reference_id, timestamp)
         VALUES (?, ?, 'deposit', ?, ?)",
    )
    .bind(deposit.user_id)
    .bind(deposit.original_amount)
    .bind(reference_id)
    .bind(now_ms())
    .execute(&mut *tx)
    .await?;

    let row = sqlx::query("SELECT saldo FROM users WHERE user_id = ?")
        .bind(deposit.user_id)
        .fetch_one(&mut *tx)
        .await?;
    let new_balance: i64 = row.get("saldo");

    tx.commit().await?;
    Ok(SettlementOutcome::Applied { new_balance })
}

/// Settles one matched `(deposit, statement line)` pair end to end.
/// Returns `true` when a credit was applied, `false` for the
/// already-settled no-op. Post-commit notification and cleanup failures
/// are logged and never reverse the credit.
pub async fn settle_deposit(
    state: &AppState,
    deposit: &PendingDeposit,
    matched: &StatementTransaction,
) -> Result<bool, EngineError> {
    let reference_id = deposit.unique_code.clone();

    let already_notified = state
        .notified
        .lock()
        .map(|set| set.contains(&reference_id))
        .unwrap_or(false);
    if already_notified {
        remove_resolved(state, deposit).await;
        return Ok(false);
    }

    match apply_settlement(&state.pool, deposit, &reference_id).await? {
        SettlementOutcome::AlreadySettled => {
            info!(
                unique_code = %deposit.unique_code,
                "settlement already recorded, skipping"
            );
            // The credit exists, so the deposit must not stay pending.
            remove_resolved(state, deposit).await;
            Ok(false)
        }
        SettlementOutcome::Applied { new_balance } => {
            info!(
                unique_code = %deposit.unique_code,
                user_id = deposit.user_id,
                amount = deposit.original_amount,
                brand = %matched.brand,
                new_balance,
                "deposit settled"
            );

            if let Err(err) = state
                .notifier
                .notify_user(
                    deposit.user_id,
                    &format!(
                        "Payment received!\n\n\
                         Top-up amount: Rp {}\n\
                         Admin fee: Rp {}\n\
                         Total paid: Rp {}\n\
                         Current balance: Rp {new_balance}",
                        deposit.original_amount,
                        deposit.surcharge(),
                        deposit.final_amount,
                    ),
                )
                .await
            {
                warn!(unique_code = %deposit.unique_code, "user notice failed: {err}");
            }

            if let Err(err) = state
                .notifier
                .notify_operator(&format!(
                    "Top-up settled\n\
                     User: {}\n\
                     Amount: Rp {} (fee Rp {}, total Rp {})\n\
                     Balance: Rp {new_balance}\n\
                     Time: {}",
                    deposit.user_id,
                    deposit.original_amount,
                    deposit.surcharge(),
                    deposit.final_amount,
                    chrono::Utc::now().to_rfc3339(),
                ))
                .await
            {
                warn!(unique_code = %deposit.unique_code, "operator notice failed: {err}");
            }

            remove_resolved(state, deposit).await;

            if let Ok(mut set) = state.notified.lock() {
                set.insert(reference_id);
            }
            Ok(true)
        }
    }
}

/// Post-commit cleanup: retract the QR prompt and drop the deposit from
/// the store. Best effort; a removal failure leaves the deposit pending
/// and the next cycle lands in the already-settled branch.
async fn remove_resolved(state: &AppState, deposit: &PendingDeposit) {
    if let Some(message_id) = deposit.qr_message_id {
        if let Err(err) = state
            .notifier
            .retract_prompt(deposit.user_id, message_id)
            .await
        {
            warn!(unique_code = %deposit.unique_code, "prompt retraction failed: {err}");
        }
    }
    if let Err(err) = state.deposits.remove(&deposit.unique_code).await {
        warn!(unique_code = %deposit.unique_code, "store removal failed: {err}");
    }
}
