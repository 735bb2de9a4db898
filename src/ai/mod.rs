mod dto;
pub mod handlers;
pub mod provider;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::text_routes())
        .merge(handlers::upload_routes())
}
