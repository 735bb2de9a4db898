use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{Plan, User};

/// Request body for signup.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for password login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for Google sign-in.
#[derive(Debug, Deserialize)]
pub struct GoogleLoginRequest {
    #[serde(default)]
    pub credential: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePlanRequest {
    #[serde(default)]
    pub plan: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub plan: Plan,
    pub free_usage: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            plan: u.plan,
            free_usage: u.free_usage,
            image: u.avatar,
            created_at: u.created_at,
        }
    }
}

/// Response returned after signup or login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct UpdatePlanResponse {
    pub success: bool,
    pub message: String,
    pub user: PublicUser,
}
