mod dto;
pub mod gateway;
pub mod handlers;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::payment_routes()
}
