use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::PaymentConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gateway error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("payment gateway not configured")]
    NotConfigured,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderNotes {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub plan: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub amount: u64, // smallest currency unit
    pub currency: String,
    pub receipt: String,
    pub notes: OrderNotes,
}

/// Order as returned by the gateway; passed straight to the checkout widget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub amount: u64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, req: OrderRequest) -> Result<Order, PaymentError>;
    /// Checks the signature the checkout returned for `order_id`/`payment_id`.
    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;
}

/// `hex(HMAC-SHA256(secret, "{order_id}|{payment_id}"))`, compared in constant time.
pub fn signature_matches(secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    let expected = format!("{:x}", mac.finalize().into_bytes());
    let given = signature.trim().to_ascii_lowercase();
    expected.len() == given.len() && bool::from(expected.as_bytes().ct_eq(given.as_bytes()))
}

#[derive(Clone)]
pub struct Razorpay {
    client: Client,
    cfg: PaymentConfig,
}

impl Razorpay {
    pub fn new(cfg: PaymentConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(30)).build()?,
            cfg,
        })
    }
}

#[async_trait]
impl PaymentGateway for Razorpay {
    async fn create_order(&self, req: OrderRequest) -> Result<Order, PaymentError> {
        if self.cfg.key_id.is_empty() || self.cfg.key_secret.is_empty() {
            return Err(PaymentError::NotConfigured);
        }
        let res = self
            .client
            .post(format!("{}/orders", self.cfg.base_url.trim_end_matches('/')))
            .basic_auth(&self.cfg.key_id, Some(&self.cfg.key_secret))
            .json(&req)
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let message = res.text().await.unwrap_or_default();
            warn!(%status, "order creation rejected");
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let order: Order = res.json().await?;
        debug!(order_id = %order.id, "order created");
        Ok(order)
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        !self.cfg.key_secret.is_empty()
            && signature_matches(&self.cfg.key_secret, order_id, payment_id, signature)
    }
}
