use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::{error, warn};

use crate::{
    auth::{jwt::VerifyError, repo_types::User},
    error::AppError,
    state::AppState,
};

/// Caller resolved from the bearer token. The user row (and its plan) is
/// loaded fresh on every request.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthenticated("Missing Authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .ok_or_else(|| AppError::Unauthenticated("Invalid Authorization header".into()))?;

    if token.is_empty() {
        return Err(AppError::Unauthenticated("Missing token".into()));
    }
    Ok(token)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let user_id = match state.identity.verify(token).await {
            Ok(id) => id,
            Err(VerifyError::Expired) => {
                return Err(AppError::Unauthenticated("Token expired".into()));
            }
            Err(VerifyError::Invalid) => {
                warn!("invalid token");
                return Err(AppError::Unauthenticated("Invalid token".into()));
            }
            Err(VerifyError::Unavailable(e)) => {
                error!(error = %e, "identity verifier unavailable");
                return Err(AppError::Internal(anyhow::anyhow!(e)));
            }
        };

        match state.users.find_by_id(user_id).await? {
            Some(user) => Ok(AuthUser(user)),
            None => {
                warn!(%user_id, "token for unknown user");
                Err(AppError::Unauthenticated("User not found".into()))
            }
        }
    }
}
