//! Notification sink: the user-addressable channel (payment prompts,
//! settlement and expiry notices) and the operator channel.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::EngineError;

/// Payment details rendered into the QR prompt caption.
#[derive(Debug, Clone)]
pub struct PromptDetails {
    pub amount: i64,
    pub fee: i64,
    pub total: i64,
    pub expires_in_secs: u64,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends the QR prompt to the user and returns the message id used to
    /// retract it on settlement or expiry.
    async fn send_qr_prompt(
        &self,
        user_id: i64,
        image: &[u8],
        details: &PromptDetails,
    ) -> Result<i64, EngineError>;

    async fn retract_prompt(&self, user_id: i64, message_id: i64) -> Result<(), EngineError>;

    async fn notify_user(&self, user_id: i64, text: &str) -> Result<(), EngineError>;

    async fn notify_operator(&self, text: &str) -> Result<(), EngineError>;
}

/// Bot-API backed notifier (Telegram wire format).
pub struct TelegramNotifier {
    client: reqwest::Client,
    base_url: String,
    token: String,
    operator_chat_id: i64,
}

impl TelegramNotifier {
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        token: String,
        operator_chat_id: i64,
    ) -> Self {
        Self {
            client,
            base_url,
            token,
            operator_chat_id,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token)
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), EngineError> {
        self.client
            .post(self.method_url("sendMessage"))
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_qr_prompt(
        &self,
        user_id: i64,
        image: &[u8],
        details: &PromptDetails,
    ) -> Result<i64, EngineError> {
        let caption = format!(
            "Payment details\n\n\
             Total to transfer: Rp {}\n\
             - Top-up amount: Rp {}\n\
             - Admin fee: Rp {}\n\n\
             Transfer the exact total; payment is verified automatically.\n\
             Expires in {} minutes.",
            details.total,
            details.amount,
            details.fee,
            details.expires_in_secs / 60
        );

        let form = reqwest::multipart::Form::new()
            .text("chat_id", user_id.to_string())
            .text("caption", caption)
            .part(
                "photo",
                reqwest::multipart::Part::bytes(image.to_vec()).file_name("qris.png"),
            );

        let envelope: Value = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        envelope["result"]["message_id"]
            .as_i64()
            .ok_or_else(|| EngineError::Notify(format!("no message_id in response: {envelope}")))
    }

    async fn retract_prompt(&self, user_id: i64, message_id: i64) -> Result<(), EngineError> {
        self.client
            .post(self.method_url("deleteMessage"))
            .json(&json!({ "chat_id": user_id, "message_id": message_id }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn notify_user(&self, user_id: i64, text: &str) -> Result<(), EngineError> {
        self.send_message(user_id, text).await
    }

    async fn notify_operator(&self, text: &str) -> Result<(), EngineError> {
        self.send_message(self.operator_chat_id, text).await
    }
}
