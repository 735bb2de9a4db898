use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppJson, AppResult},
    state::AppState,
};

use super::{
    dto::{
        CreationIdRequest, CreationListResponse, MessageResponse, ToggleLikeResponse,
        TogglePublishResponse,
    },
    query::{ListParams, ListQuery, Scope},
    repo_types::{LikeOutcome, OwnedOutcome},
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/user/get-user-creations", get(list_own))
        .route("/user/get-published-creations", get(list_published))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/user/toggle-like-creation", post(toggle_like))
        .route("/user/toggle-publish-creation", post(toggle_publish))
        .route("/user/delete-creation/:id", delete(delete_creation))
}

fn require_id(body: &CreationIdRequest) -> AppResult<i64> {
    body.id()
        .ok_or_else(|| AppError::Validation("A valid creation id is required".into()))
}

#[instrument(skip(state, user))]
pub async fn list_own(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(params): Query<ListParams>,
) -> AppResult<Json<CreationListResponse>> {
    let q = ListQuery::from_params(Scope::Owner(user.id), &params);
    let page = state.creations.list(&q).await?;
    Ok(Json(page.into()))
}

#[instrument(skip(state, _user))]
pub async fn list_published(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(params): Query<ListParams>,
) -> AppResult<Json<CreationListResponse>> {
    let q = ListQuery::from_params(Scope::Published, &params);
    let page = state.creations.list(&q).await?;
    Ok(Json(page.into()))
}

#[instrument(skip(state, user, body))]
pub async fn toggle_like(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(body): AppJson<CreationIdRequest>,
) -> AppResult<Json<ToggleLikeResponse>> {
    let id = require_id(&body)?;
    let (liked, message) = match state.creations.toggle_like(id, user.id).await? {
        LikeOutcome::Liked => (true, "Creation Liked"),
        LikeOutcome::Unliked => (false, "Creation Unliked"),
        LikeOutcome::NotFound => return Err(AppError::NotFound("Creation not found".into())),
    };
    Ok(Json(ToggleLikeResponse {
        success: true,
        message: message.into(),
        liked,
    }))
}

#[instrument(skip(state, user, body))]
pub async fn toggle_publish(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(body): AppJson<CreationIdRequest>,
) -> AppResult<Json<TogglePublishResponse>> {
    let id = require_id(&body)?;
    match state.creations.toggle_publish(id, user.id).await? {
        OwnedOutcome::Done(publish) => {
            info!(user_id = %user.id, creation_id = id, publish, "publish toggled");
            let message = if publish { "Creation Published" } else { "Creation Unpublished" };
            Ok(Json(TogglePublishResponse {
                success: true,
                message: message.into(),
                publish,
            }))
        }
        OwnedOutcome::NotOwner => {
            warn!(user_id = %user.id, creation_id = id, "publish toggle on foreign creation");
            Err(AppError::Forbidden("You can only change your own creations".into()))
        }
        OwnedOutcome::NotFound => Err(AppError::NotFound("Creation not found".into())),
    }
}

#[instrument(skip(state, user))]
pub async fn delete_creation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id: i64 = id
        .parse()
        .map_err(|_| AppError::Validation("A valid creation id is required".into()))?;
    match state.creations.delete(id, user.id).await? {
        OwnedOutcome::Done(()) => {
            info!(user_id = %user.id, creation_id = id, "creation deleted");
            Ok(Json(MessageResponse {
                success: true,
                message: "Creation deleted".into(),
            }))
        }
        OwnedOutcome::NotOwner => {
            warn!(user_id = %user.id, creation_id = id, "delete on foreign creation");
            Err(AppError::Forbidden("You can only delete your own creations".into()))
        }
        OwnedOutcome::NotFound => Err(AppError::NotFound("Creation not found".into())),
    }
}
