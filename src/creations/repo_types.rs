use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum CreationType {
    Article,
    BlogTitle,
    Image,
    ResumeReview,
}

impl CreationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreationType::Article => "article",
            CreationType::BlogTitle => "blog-title",
            CreationType::Image => "image",
            CreationType::ResumeReview => "resume-review",
        }
    }
}

impl fmt::Display for CreationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CreationType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "article" => Ok(CreationType::Article),
            "blog-title" => Ok(CreationType::BlogTitle),
            "image" => Ok(CreationType::Image),
            "resume-review" => Ok(CreationType::ResumeReview),
            other => anyhow::bail!("unknown creation type {other:?}"),
        }
    }
}

#[derive(Debug, FromRow)]
pub struct CreationRow {
    pub id: i64,
    pub user_id: Uuid,
    pub prompt: String,
    pub content: String,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub publish: bool,
    pub likes: Vec<String>,
    pub created_at: OffsetDateTime,
}

/// One generated artifact and its originating prompt.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Creation {
    pub id: i64,
    pub user_id: Uuid,
    pub prompt: String,
    pub content: String, // prose, or a URL for media
    #[serde(rename = "type")]
    pub kind: CreationType,
    pub publish: bool,
    pub likes: Vec<String>, // user ids, never duplicated
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl TryFrom<CreationRow> for Creation {
    type Error = anyhow::Error;

    fn try_from(r: CreationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            prompt: r.prompt,
            content: r.content,
            kind: r.kind.parse()?,
            publish: r.publish,
            likes: r.likes,
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewCreation {
    pub user_id: Uuid,
    pub prompt: String,
    pub content: String,
    pub kind: CreationType,
    pub publish: bool,
}

/// Result of a like toggle on an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeOutcome {
    Liked,
    Unliked,
    /// Missing, or private and owned by someone else.
    NotFound,
}

/// Result of an owner-only mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnedOutcome<T> {
    Done(T),
    NotOwner,
    NotFound,
}
