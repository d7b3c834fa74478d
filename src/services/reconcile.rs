//! The periodic reconciliation task: expiry sweep, statement poll,
//! match, settle. One task drives the whole loop; deposit creation is
//! the only concurrent writer and meets it at the store's lock.

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::models::now_ms;
use crate::services::settlement::settle_deposit;
use crate::services::statement::parse_statement;
use crate::state::AppState;

/// Runs the poll/sweep loop until the shutdown signal flips. An in-flight
/// cycle always finishes before the task exits.
pub async fn run_reconciler(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(state.config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => run_cycle(&state).await,
            _ = shutdown.changed() => {
                info!("reconciler stopping");
                return;
            }
        }
    }
}

/// One cycle: sweep expired deposits, then fetch and match the statement.
/// The sweep runs first so an expired deposit is invisible to this
/// cycle's matching pass.
pub async fn run_cycle(state: &AppState) {
    sweep_expired(state).await;

    let pending = state.deposits.list_pending();
    if pending.is_empty() {
        return;
    }

    let body = match state.feed.fetch().await {
        Ok(body) => body,
        Err(err) => {
            // Transport errors and timeouts skip the cycle; the next one
            // retries with a fresh payload.
            warn!("statement fetch failed: {err}");
            return;
        }
    };

    let parsed = parse_statement(&body);
    debug!(lines = parsed.len(), pending = pending.len(), "statement parsed");
    if parsed.is_empty() {
        return;
    }

    // Oldest pending deposit first; each statement line settles at most
    // one deposit per cycle.
    let mut consumed = vec![false; parsed.len()];
    for deposit in pending {
        let matched = parsed
            .iter()
            .enumerate()
            .find(|(i, line)| !consumed[*i] && line.credit_amount == deposit.final_amount);
        let Some((i, line)) = matched else {
            continue;
        };
        consumed[i] = true;

        match settle_deposit(state, &deposit, line).await {
            Ok(_) => {}
            Err(err) => {
                // Rolled back; the deposit stays pending for retry.
                warn!(unique_code = %deposit.unique_code, "settlement failed: {err}");
            }
        }
    }
}

/// Removes every deposit older than the expiry window, then best-effort
/// retracts its prompt and notifies the user. Removal is unconditional:
/// notification failure never leaves a deposit lingering.
pub async fn sweep_expired(state: &AppState) {
    let now = now_ms();
    let expiry_ms = state.config.deposit_expiry.as_millis() as i64;

    for deposit in state.deposits.list_pending() {
        if deposit.age_ms(now) <= expiry_ms {
            continue;
        }

        match state.deposits.remove(&deposit.unique_code).await {
            Ok(Some(claimed)) => {
                info!(
                    unique_code = %claimed.unique_code,
                    user_id = claimed.user_id,
                    final_amount = claimed.final_amount,
                    "deposit expired"
                );
                if let Some(message_id) = claimed.qr_message_id {
                    if let Err(err) = state
                        .notifier
                        .retract_prompt(claimed.user_id, message_id)
                        .await
                    {
                        warn!(unique_code = %claimed.unique_code, "prompt retraction failed: {err}");
                    }
                }
                if let Err(err) = state
                    .notifier
                    .notify_user(
                        claimed.user_id,
                        "Payment expired\n\nThe payment window has closed. \
                         Request a new top-up to get a fresh QR.",
                    )
                    .await
                {
                    warn!(unique_code = %claimed.unique_code, "expiry notice failed: {err}");
                }
            }
            // Already resolved by someone else; nothing to do.
            Ok(None) => {}
            Err(err) => {
                warn!(unique_code = %deposit.unique_code, "expiry removal failed: {err}");
            }
        }
    }
}
