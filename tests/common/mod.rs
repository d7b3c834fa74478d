#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use topup_engine::services::gateway::PaymentGateway;
use topup_engine::services::notify::{Notifier, PromptDetails};
use topup_engine::services::statement::StatementFeed;
use topup_engine::{AppState, Config, EngineError};

pub struct MockGateway {
    pub fail: Mutex<bool>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            fail: Mutex::new(false),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_qr(&self, _amount: i64) -> Result<Vec<u8>, EngineError> {
        if *self.fail.lock().unwrap() {
            return Err(EngineError::Gateway("qr generation failed".to_string()));
        }
        Ok(b"png-bytes".to_vec())
    }
}

#[derive(Default)]
pub struct MockNotifier {
    next_message_id: AtomicI64,
    pub prompts: Mutex<Vec<(i64, i64)>>,
    pub user_msgs: Mutex<Vec<(i64, String)>>,
    pub operator_msgs: Mutex<Vec<String>>,
    pub retracted: Mutex<Vec<(i64, i64)>>,
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send_qr_prompt(
        &self,
        user_id: i64,
        _image: &[u8],
        _details: &PromptDetails,
    ) -> Result<i64, EngineError> {
        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts.lock().unwrap().push((user_id, id));
        Ok(id)
    }

    async fn retract_prompt(&self, user_id: i64, message_id: i64) -> Result<(), EngineError> {
        self.retracted.lock().unwrap().push((user_id, message_id));
        Ok(())
    }

    async fn notify_user(&self, user_id: i64, text: &str) -> Result<(), EngineError> {
        self.user_msgs
            .lock()
            .unwrap()
            .push((user_id, text.to_string()));
        Ok(())
    }

    async fn notify_operator(&self, text: &str) -> Result<(), EngineError> {
        self.operator_msgs.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockFeed {
    pub body: Mutex<String>,
    pub fail: Mutex<bool>,
}

impl MockFeed {
    pub fn set_body(&self, body: &str) {
        *self.body.lock().unwrap() = body.to_string();
    }
}

#[async_trait]
impl StatementFeed for MockFeed {
    async fn fetch(&self) -> Result<String, EngineError> {
        if *self.fail.lock().unwrap() {
            return Err(EngineError::Gateway("statement feed timeout".to_string()));
        }
        Ok(self.body.lock().unwrap().clone())
    }
}

pub fn test_config() -> Config {
    Config {
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        database_url: "sqlite::memory:".to_string(),
        statement_api_url: String::new(),
        statement_auth_token: String::new(),
        qr_api_url: String::new(),
        qr_api_key: String::new(),
        qris_template: String::new(),
        bot_api_url: String::new(),
        bot_token: String::new(),
        operator_chat_id: -1,
        poll_interval: Duration::from_secs(10),
        feed_timeout: Duration::from_secs(5),
        deposit_expiry: Duration::from_secs(300),
        min_topup: 5000,
    }
}

pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory database");
    topup_engine::db::init_schema(&pool).await.unwrap();
    pool
}

pub struct TestHarness {
    pub state: AppState,
    pub gateway: Arc<MockGateway>,
    pub notifier: Arc<MockNotifier>,
    pub feed: Arc<MockFeed>,
}

pub async fn setup() -> TestHarness {
    setup_with_pool(test_pool().await)
}

pub fn setup_with_pool(pool: SqlitePool) -> TestHarness {
    let gateway = Arc::new(MockGateway::new());
    let notifier = Arc::new(MockNotifier::default());
    let feed = Arc::new(MockFeed::default());
    let state = AppState::new(
        pool,
        test_config(),
        gateway.clone(),
        notifier.clone(),
        feed.clone(),
    );
    TestHarness {
        state,
        gateway,
        notifier,
        feed,
    }
}

/// Formats an amount the way the statement feed prints it, with `.` as
/// thousands separator (10137 -> "10.137").
pub fn group_thousands(mut n: i64) -> String {
    let mut groups = Vec::new();
    while n >= 1000 {
        groups.push(format!("{:03}", n % 1000));
        n /= 1000;
    }
    groups.push(n.to_string());
    groups.reverse();
    groups.join(".")
}

/// A statement body containing a single credit block.
pub fn statement_body(amount: i64) -> String {
    format!(
        "Tanggal : 2025/01/31 14:00\nKredit : {}\nBrand : DANA\n",
        group_thousands(amount)
    )
}
