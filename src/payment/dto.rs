use serde::{Deserialize, Serialize};

use super::gateway::Order;

fn default_plan_id() -> String {
    "premium_monthly".into()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default = "default_plan_id")]
    pub plan_id: String,
}

/// Accepts both our camelCase names and the names the checkout widget posts back.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifyPaymentRequest {
    #[serde(alias = "razorpay_order_id")]
    pub order_id: String,
    #[serde(alias = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(alias = "razorpay_signature")]
    pub signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub success: bool,
    pub order: Order,
    /// Public key the checkout widget is opened with.
    pub key_id: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub message: String,
}
