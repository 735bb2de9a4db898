use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    ai::services::detached,
    auth::{
        extractors::AuthUser,
        repo::UserRepo,
        repo_types::{Plan, User},
    },
    error::{AppError, AppJson, AppResult},
    state::AppState,
};

use super::{
    dto::{CreateOrderRequest, CreateOrderResponse, VerifyPaymentRequest, VerifyPaymentResponse},
    gateway::{OrderNotes, OrderRequest, PaymentError},
};

const CURRENCY: &str = "INR";

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/payment/create-order", post(create_order))
        .route("/payment/verify-payment", post(verify_payment))
}

/// Price in paise for a purchasable plan id.
pub fn plan_amount(plan_id: &str) -> Option<u64> {
    match plan_id {
        "premium_monthly" => Some(19_900),
        _ => None,
    }
}

/// `rcpt_{first 10 of user id}_{last 10 digits of unix millis}`; the gateway caps receipts at 40 chars.
pub fn receipt_for(user_id: Uuid, now: OffsetDateTime) -> String {
    let user: String = user_id.to_string().chars().take(10).collect();
    let millis = (now.unix_timestamp_nanos() / 1_000_000).to_string();
    let tail = &millis[millis.len().saturating_sub(10)..];
    format!("rcpt_{user}_{tail}")
}

async fn upgrade(users: Arc<dyn UserRepo>, user_id: Uuid) -> AppResult<User> {
    users
        .set_plan(user_id, Plan::Premium)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

fn gateway_failure(e: PaymentError) -> AppError {
    error!(error = %e, "payment gateway failed");
    AppError::Upstream("Could not create the payment order. Please try again.".into())
}

#[instrument(skip(state, user, payload))]
pub async fn create_order(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<CreateOrderRequest>,
) -> AppResult<Json<CreateOrderResponse>> {
    let amount = plan_amount(&payload.plan_id)
        .ok_or_else(|| AppError::Validation("Unknown plan".into()))?;

    let req = OrderRequest {
        amount,
        currency: CURRENCY.into(),
        receipt: receipt_for(user.id, OffsetDateTime::now_utc()),
        notes: OrderNotes {
            user_id: user.id.to_string(),
            plan: Plan::Premium.to_string(),
        },
    };
    let order = state
        .payments
        .create_order(req)
        .await
        .map_err(gateway_failure)?;

    info!(user_id = %user.id, order_id = %order.id, amount, "payment order created");
    Ok(Json(CreateOrderResponse {
        success: true,
        order,
        key_id: state.config.payment.key_id.clone(),
    }))
}

#[instrument(skip(state, user, payload))]
pub async fn verify_payment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<VerifyPaymentRequest>,
) -> AppResult<Json<VerifyPaymentResponse>> {
    if payload.order_id.is_empty() || payload.payment_id.is_empty() || payload.signature.is_empty() {
        return Err(AppError::Validation("Payment details are required".into()));
    }
    if !state
        .payments
        .verify_signature(&payload.order_id, &payload.payment_id, &payload.signature)
    {
        warn!(user_id = %user.id, order_id = %payload.order_id, "payment signature mismatch");
        return Err(AppError::Validation("Invalid signature".into()));
    }

    // The charge already happened; the upgrade must land even if the client hangs up.
    let user_id = user.id;
    detached(upgrade(state.users.clone(), user_id)).await?;

    info!(%user_id, order_id = %payload.order_id, "plan upgraded to premium");
    Ok(Json(VerifyPaymentResponse {
        success: true,
        message: "Payment verified. Your plan is now premium.".into(),
    }))
}
