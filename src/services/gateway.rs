//! QR payment-target generation gateway client.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::EngineError;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Generates a payment QR for the given target amount and returns the
    /// image bytes to present to the user.
    async fn create_qr(&self, amount: i64) -> Result<Vec<u8>, EngineError>;
}

/// Production gateway client. The gateway rewrites a static merchant QR
/// template to a dynamic QR carrying the exact target amount and answers
/// with a JSON envelope pointing at the rendered image.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    qris_template: String,
}

impl HttpPaymentGateway {
    pub fn new(
        client: reqwest::Client,
        api_url: String,
        api_key: String,
        qris_template: String,
    ) -> Self {
        Self {
            client,
            api_url,
            api_key,
            qris_template,
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_qr(&self, amount: i64) -> Result<Vec<u8>, EngineError> {
        let envelope: Value = self
            .client
            .get(&self.api_url)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("amount", &amount.to_string()),
                ("codeqr", self.qris_template.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if envelope["status"] != "success" {
            return Err(EngineError::Gateway(format!(
                "qr generation failed: {envelope}"
            )));
        }

        let image_url = envelope["result"]["imageqris"]["url"]
            .as_str()
            .unwrap_or_default();
        // An unresolved template placeholder leaks through as a literal
        // "undefined" segment; treat it like a missing URL.
        if image_url.is_empty() || image_url.contains("undefined") {
            return Err(EngineError::Gateway(format!(
                "invalid qr image url: {image_url:?}"
            )));
        }

        let image = self
            .client
            .get(image_url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(image.to_vec())
    }
}
