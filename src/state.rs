use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::services::deposits::DepositStore;
use crate::services::gateway::PaymentGateway;
use crate::services::notify::Notifier;
use crate::services::statement::StatementFeed;

/// Shared application state: the pool, the pending-deposit store and the
/// outbound collaborators behind their trait seams.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub deposits: Arc<DepositStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
    pub feed: Arc<dyn StatementFeed>,
    /// Global creation rate limit: one deposit per second, no burst.
    pub create_limiter: Arc<DefaultDirectRateLimiter>,
    /// Process-local dedup keys of settlements already notified. Defense
    /// in depth; the ledger existence check is authoritative.
    pub notified: Arc<Mutex<HashSet<String>>>,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        config: Config,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        feed: Arc<dyn StatementFeed>,
    ) -> Self {
        Self {
            deposits: Arc::new(DepositStore::new(pool.clone())),
            pool,
            config,
            gateway,
            notifier,
            feed,
            create_limiter: Arc::new(RateLimiter::direct(Quota::per_second(NonZeroU32::MIN))),
            notified: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}
