use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, Plan, User, UserRow};

/// Persistence for user accounts.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    /// Returns `None` when the email is already taken.
    async fn create(&self, new: NewUser) -> anyhow::Result<Option<User>>;
    /// Attaches a Google identity, keeping an existing avatar.
    async fn link_google(
        &self,
        id: Uuid,
        google_id: &str,
        avatar: Option<&str>,
    ) -> anyhow::Result<User>;
    async fn set_plan(&self, id: Uuid, plan: Plan) -> anyhow::Result<Option<User>>;
    async fn increment_free_usage(&self, id: Uuid) -> anyhow::Result<()>;
}

const USER_COLUMNS: &str = "id, name, email, password_hash, google_id, avatar, plan, \
                            free_usage, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_user(row: Option<UserRow>) -> anyhow::Result<Option<User>> {
    row.map(User::try_from).transpose()
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        into_user(row)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        into_user(row)
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, google_id, avatar)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.google_id)
        .bind(&new.avatar)
        .fetch_optional(&self.db)
        .await
        .context("insert user")?;
        into_user(row)
    }

    async fn link_google(
        &self,
        id: Uuid,
        google_id: &str,
        avatar: Option<&str>,
    ) -> anyhow::Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET google_id = $2,
                   avatar = COALESCE(avatar, $3),
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(google_id)
        .bind(avatar)
        .fetch_one(&self.db)
        .await
        .context("link google identity")?;
        User::try_from(row)
    }

    async fn set_plan(&self, id: Uuid, plan: Plan) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users SET plan = $2, updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(plan.as_str())
        .fetch_optional(&self.db)
        .await
        .context("update user plan")?;
        into_user(row)
    }

    async fn increment_free_usage(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET free_usage = free_usage + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("increment free usage")?;
        Ok(())
    }
}
