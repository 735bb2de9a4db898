use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    query::{ListQuery, Page, Scope, TypeFilter},
    repo_types::{Creation, CreationRow, LikeOutcome, NewCreation, OwnedOutcome},
};

/// Persistence for creations. Each mutation targets exactly one row.
#[async_trait]
pub trait CreationRepo: Send + Sync {
    async fn insert(&self, new: NewCreation) -> anyhow::Result<Creation>;
    async fn list(&self, q: &ListQuery) -> anyhow::Result<Page<Creation>>;
    /// Flips `user_id` in the likes set in a single atomic step.
    async fn toggle_like(&self, id: i64, user_id: Uuid) -> anyhow::Result<LikeOutcome>;
    async fn toggle_publish(&self, id: i64, owner: Uuid) -> anyhow::Result<OwnedOutcome<bool>>;
    async fn delete(&self, id: i64, owner: Uuid) -> anyhow::Result<OwnedOutcome<()>>;
}

const CREATION_COLUMNS: &str = "id, user_id, prompt, content, type, publish, likes, created_at";

#[derive(Clone)]
pub struct PgCreationRepo {
    db: PgPool,
}

impl PgCreationRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn exists(&self, id: i64) -> anyhow::Result<bool> {
        let found: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM creations WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.db)
            .await
            .context("check creation exists")?;
        Ok(found)
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, q: &ListQuery) {
    match q.scope {
        Scope::Owner(user_id) => {
            qb.push(" WHERE user_id = ").push_bind(user_id);
        }
        Scope::Published => {
            qb.push(" WHERE publish = TRUE");
        }
    }
    if let Some(search) = &q.search {
        // strpos avoids LIKE wildcard escaping for user input
        qb.push(" AND strpos(lower(prompt), lower(")
            .push_bind(search.clone())
            .push(")) > 0");
    }
    if let TypeFilter::Only(kind) = q.kind {
        qb.push(" AND type = ").push_bind(kind.as_str());
    }
}

#[async_trait]
impl CreationRepo for PgCreationRepo {
    async fn insert(&self, new: NewCreation) -> anyhow::Result<Creation> {
        let row = sqlx::query_as::<_, CreationRow>(&format!(
            r#"
            INSERT INTO creations (user_id, prompt, content, type, publish)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CREATION_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(&new.prompt)
        .bind(&new.content)
        .bind(new.kind.as_str())
        .bind(new.publish)
        .fetch_one(&self.db)
        .await
        .context("insert creation")?;
        Creation::try_from(row)
    }

    async fn list(&self, q: &ListQuery) -> anyhow::Result<Page<Creation>> {
        if q.kind == TypeFilter::Unmatchable {
            return Ok(Page::empty(q));
        }

        // Count and page come from one snapshot so `total` matches `items`.
        let mut tx = self.db.begin().await.context("begin list tx")?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .context("set list isolation")?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM creations");
        push_filters(&mut count, q);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&mut *tx)
            .await
            .context("count creations")?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {CREATION_COLUMNS} FROM creations"
        ));
        push_filters(&mut select, q);
        select.push(format!(
            " ORDER BY {} {}, id ASC",
            q.sort_by.column(),
            q.sort_order.keyword()
        ));
        select
            .push(" LIMIT ")
            .push_bind(q.limit as i64)
            .push(" OFFSET ")
            .push_bind(q.offset());
        let rows: Vec<CreationRow> = select
            .build_query_as()
            .fetch_all(&mut *tx)
            .await
            .context("list creations")?;

        tx.commit().await.context("commit list tx")?;

        let items = rows
            .into_iter()
            .map(Creation::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Page {
            items,
            total,
            page: q.page,
            limit: q.limit,
        })
    }

    async fn toggle_like(&self, id: i64, user_id: Uuid) -> anyhow::Result<LikeOutcome> {
        // Single statement: the row lock serializes concurrent toggles and the
        // CASE is re-evaluated against the latest row version.
        let liked: Option<bool> = sqlx::query_scalar(
            r#"
            UPDATE creations
               SET likes = CASE
                       WHEN $2 = ANY(likes) THEN array_remove(likes, $2)
                       ELSE array_append(likes, $2)
                   END
             WHERE id = $1
               AND (publish OR user_id = $3)
            RETURNING $2 = ANY(likes)
            "#,
        )
        .bind(id)
        .bind(user_id.to_string())
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("toggle like")?;

        Ok(match liked {
            Some(true) => LikeOutcome::Liked,
            Some(false) => LikeOutcome::Unliked,
            None => LikeOutcome::NotFound,
        })
    }

    async fn toggle_publish(&self, id: i64, owner: Uuid) -> anyhow::Result<OwnedOutcome<bool>> {
        let published: Option<bool> = sqlx::query_scalar(
            r#"
            UPDATE creations SET publish = NOT publish
             WHERE id = $1 AND user_id = $2
            RETURNING publish
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await
        .context("toggle publish")?;

        match published {
            Some(p) => Ok(OwnedOutcome::Done(p)),
            None if self.exists(id).await? => Ok(OwnedOutcome::NotOwner),
            None => Ok(OwnedOutcome::NotFound),
        }
    }

    async fn delete(&self, id: i64, owner: Uuid) -> anyhow::Result<OwnedOutcome<()>> {
        let deleted = sqlx::query("DELETE FROM creations WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await
            .context("delete creation")?
            .rows_affected();

        if deleted > 0 {
            Ok(OwnedOutcome::Done(()))
        } else if self.exists(id).await? {
            Ok(OwnedOutcome::NotOwner)
        } else {
            Ok(OwnedOutcome::NotFound)
        }
    }
}
