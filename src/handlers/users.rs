use axum::extract::{Path, State};
use axum::Json;
use sqlx::Row;

use crate::db;
use crate::error::EngineError;
use crate::models::{now_ms, BalanceResponse, CreditRequest, LedgerEntry};
use crate::state::AppState;

pub async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<BalanceResponse>, EngineError> {
    let balance = db::get_balance(&state.pool, user_id).await?;
    Ok(Json(BalanceResponse { user_id, balance }))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<LedgerEntry>>, EngineError> {
    let entries = db::list_transactions(&state.pool, user_id).await?;
    Ok(Json(entries))
}

/// Operator-initiated balance credit. Appends an `account` ledger row so
/// every balance mutation stays paired with a transaction.
pub async fn credit(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(payload): Json<CreditRequest>,
) -> Result<Json<BalanceResponse>, EngineError> {
    if payload.amount <= 0 {
        return Err(EngineError::AmountBelowMinimum(1));
    }
    if !db::user_exists(&state.pool, user_id).await? {
        return Err(EngineError::UserNotFound(user_id));
    }

    let timestamp = now_ms();
    let reference_id = format!("account-topup-{user_id}-{timestamp}");

    let mut tx = state.pool.begin().await?;
    sqlx::query("UPDATE users SET saldo = saldo + ? WHERE user_id = ?")
        .bind(payload.amount)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "INSERT INTO transactions (user_id, amount, type, reference_id, timestamp)
         VALUES (?, ?, 'account', ?, ?)",
    )
    .bind(user_id)
    .bind(payload.amount)
    .bind(&reference_id)
    .bind(timestamp)
    .execute(&mut *tx)
    .await?;
    let row = sqlx::query("SELECT saldo FROM users WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
    let balance: i64 = row.get("saldo");
    tx.commit().await?;

    Ok(Json(BalanceResponse { user_id, balance }))
}
