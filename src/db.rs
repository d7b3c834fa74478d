use sqlx::{Row, SqlitePool};

use crate::error::EngineError;
use crate::models::LedgerEntry;

/// Creates the schema if it does not exist yet. Ran once at startup;
/// there are no migration files.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), EngineError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
           id INTEGER PRIMARY KEY AUTOINCREMENT,
           user_id INTEGER UNIQUE,
           saldo INTEGER DEFAULT 0
         )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS pending_deposits (
           unique_code TEXT PRIMARY KEY,
           user_id INTEGER,
           amount INTEGER,
           original_amount INTEGER,
           timestamp INTEGER,
           qr_message_id INTEGER
         )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS transactions (
           id INTEGER PRIMARY KEY AUTOINCREMENT,
           user_id INTEGER,
           amount INTEGER,
           type TEXT,
           reference_id TEXT,
           timestamp INTEGER
         )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Creates the user row on first interaction; a no-op afterwards.
pub async fn ensure_user(pool: &SqlitePool, user_id: i64) -> Result<(), EngineError> {
    sqlx::query("INSERT INTO users (user_id, saldo) VALUES (?, 0) ON CONFLICT(user_id) DO NOTHING")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn user_exists(pool: &SqlitePool, user_id: i64) -> Result<bool, EngineError> {
    let row = sqlx::query("SELECT id FROM users WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Current balance; 0 for users that never interacted.
pub async fn get_balance(pool: &SqlitePool, user_id: i64) -> Result<i64, EngineError> {
    let row = sqlx::query("SELECT saldo FROM users WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.get("saldo")).unwrap_or(0))
}

pub async fn list_transactions(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<LedgerEntry>, EngineError> {
    let rows = sqlx::query(
        "SELECT id, user_id, amount, type, reference_id, timestamp
         FROM transactions WHERE user_id = ? ORDER BY timestamp DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| LedgerEntry {
            id: row.get("id"),
            user_id: row.get("user_id"),
            amount: row.get("amount"),
            kind: row.get("type"),
            reference_id: row.get("reference_id"),
            timestamp: row.get("timestamp"),
        })
        .collect())
}
