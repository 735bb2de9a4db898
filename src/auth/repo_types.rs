use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Entitlement tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Premium,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Premium => "premium",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Plan::Free),
            "premium" => Ok(Plan::Premium),
            other => anyhow::bail!("unknown plan {other:?}"),
        }
    }
}

/// Row as stored in `users`.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub avatar: Option<String>,
    pub plan: String,
    pub free_usage: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// User record.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>, // argon2 PHC string; None for Google-only accounts
    pub google_id: Option<String>,
    pub avatar: Option<String>,
    pub plan: Plan,
    pub free_usage: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            name: r.name,
            email: r.email,
            password_hash: r.password_hash,
            google_id: r.google_id,
            avatar: r.avatar,
            plan: r.plan.parse()?,
            free_usage: r.free_usage,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Fields needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub avatar: Option<String>,
}
