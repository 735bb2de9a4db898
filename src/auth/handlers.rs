use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, GoogleLoginRequest, LoginRequest, ProfileResponse, PublicUser,
            SignupRequest, UpdatePlanRequest, UpdatePlanResponse,
        },
        extractors::AuthUser,
        google::GoogleError,
        jwt::JwtKeys,
        password::{hash_password, is_valid_email, normalize_email, verify_password, MIN_PASSWORD_LEN},
        repo_types::{NewUser, Plan, User},
    },
    error::{AppError, AppJson, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/google", post(google_login))
        .route("/auth/profile", get(profile))
}

pub fn plan_routes() -> Router<AppState> {
    Router::new().route("/user/update-plan", post(update_plan))
}

fn issue(state: &AppState, user: User, message: &str) -> AppResult<AuthResponse> {
    let token = JwtKeys::from_ref(state).sign(user.id).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        AppError::Internal(e)
    })?;
    Ok(AuthResponse {
        success: true,
        message: message.to_string(),
        token,
        user: user.into(),
    })
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SignupRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let name = payload.name.trim().to_string();
    let email = normalize_email(&payload.email);

    if name.is_empty() || email.is_empty() || payload.password.is_empty() {
        return Err(AppError::Validation("All fields are required".into()));
    }
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let hash = hash_password(&payload.password)?;
    let created = state
        .users
        .create(NewUser {
            name,
            email: email.clone(),
            password_hash: Some(hash),
            google_id: None,
            avatar: None,
        })
        .await?;
    let Some(user) = created else {
        warn!(%email, "email already registered");
        return Err(AppError::Conflict("User already exists".into()));
    };

    info!(user_id = %user.id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(issue(&state, user, "User created successfully")?),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = normalize_email(&payload.email);
    if email.is_empty() || payload.password.is_empty() {
        return Err(AppError::Validation("Email and password are required".into()));
    }

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Err(AppError::Unauthenticated("Invalid credentials".into()));
    };

    let Some(hash) = user.password_hash.as_deref() else {
        return Err(AppError::Unauthenticated("Please sign in with Google".into()));
    };

    if !verify_password(&payload.password, hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthenticated("Invalid credentials".into()));
    }

    info!(user_id = %user.id, "user logged in");
    Ok(Json(issue(&state, user, "Login successful")?))
}

#[instrument(skip(state, payload))]
pub async fn google_login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<GoogleLoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    if payload.credential.trim().is_empty() {
        return Err(AppError::Validation("Credential is required".into()));
    }

    let identity = match state.google.verify(payload.credential.trim()).await {
        Ok(id) => id,
        Err(GoogleError::Rejected(reason)) => {
            warn!(%reason, "google credential rejected");
            return Err(AppError::Unauthenticated("Invalid Google credential".into()));
        }
        Err(e) => return Err(AppError::Internal(e.into())),
    };
    let email = normalize_email(&identity.email);

    let user = match state.users.find_by_email(&email).await? {
        Some(existing) if existing.google_id.is_some() => existing,
        Some(existing) => {
            info!(user_id = %existing.id, "linking google identity");
            state
                .users
                .link_google(existing.id, &identity.google_id, identity.avatar.as_deref())
                .await?
        }
        None => {
            let new = NewUser {
                name: identity.name,
                email: email.clone(),
                password_hash: None,
                google_id: Some(identity.google_id),
                avatar: identity.avatar,
            };
            match state.users.create(new).await? {
                Some(u) => u,
                // Lost a race with a concurrent signup for the same email.
                None => state
                    .users
                    .find_by_email(&email)
                    .await?
                    .ok_or_else(|| AppError::Internal(anyhow::anyhow!("user vanished after insert")))?,
            }
        }
    };

    info!(user_id = %user.id, "google login");
    Ok(Json(issue(&state, user, "Google login successful")?))
}

#[instrument(skip(user))]
pub async fn profile(AuthUser(user): AuthUser) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        success: true,
        user: user.into(),
    })
}

#[instrument(skip(state, user, payload))]
pub async fn update_plan(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<UpdatePlanRequest>,
) -> AppResult<Json<UpdatePlanResponse>> {
    if !state.config.plan_override_enabled {
        warn!(user_id = %user.id, "plan override attempted while disabled");
        return Err(AppError::Forbidden("Plan changes require a verified payment".into()));
    }
    let plan: Plan = payload
        .plan
        .parse()
        .map_err(|_| AppError::Validation("Invalid plan. Must be \"free\" or \"premium\"".into()))?;

    let updated = state
        .users
        .set_plan(user.id, plan)
        .await?
        .ok_or_else(|| AppError::Unauthenticated("User not found".into()))?;

    info!(user_id = %updated.id, %plan, "plan overridden");
    Ok(Json(UpdatePlanResponse {
        success: true,
        message: format!("User plan updated to {plan}"),
        user: PublicUser::from(updated),
    }))
}
