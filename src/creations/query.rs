//! Normalization of listing requests.
//!
//! Client-supplied values are never rejected here: anything malformed falls
//! back to a default so a stale or hand-edited URL still renders a page.

use serde::Deserialize;
use uuid::Uuid;

use super::repo_types::CreationType;

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// Query string as sent by the client. Everything is a raw string so that a
/// bad number degrades to a default instead of a 400.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Which records a listing may see. The two never combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Owner(Uuid),
    Published,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFilter {
    Any,
    Only(CreationType),
    /// A type value we do not know; matches nothing.
    Unmatchable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    Likes,
    Type,
}

impl SortField {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "createdAt" | "created_at" => Some(SortField::CreatedAt),
            "likes" => Some(SortField::Likes),
            "type" => Some(SortField::Type),
            _ => None,
        }
    }

    /// SQL expression for ORDER BY. Only ever one of these fixed strings.
    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::Likes => "cardinality(likes)",
            SortField::Type => "type",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A validated listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub scope: Scope,
    pub search: Option<String>,
    pub kind: TypeFilter,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub page: u32,
    pub limit: u32,
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl ListQuery {
    pub fn from_params(scope: Scope, p: &ListParams) -> Self {
        let page = non_empty(&p.page)
            .and_then(|v| v.parse::<i64>().ok())
            .map(|v| v.clamp(1, u32::MAX as i64) as u32)
            .unwrap_or(1);
        let limit = non_empty(&p.limit)
            .and_then(|v| v.parse::<i64>().ok())
            .map(|v| v.clamp(1, MAX_LIMIT as i64) as u32)
            .unwrap_or(DEFAULT_LIMIT);

        let kind = match non_empty(&p.kind) {
            None => TypeFilter::Any,
            Some(v) => v
                .parse::<CreationType>()
                .map(TypeFilter::Only)
                .unwrap_or(TypeFilter::Unmatchable),
        };

        let sort_by = non_empty(&p.sort_by).map(SortField::parse);
        let sort_order = non_empty(&p.sort_order).map(SortOrder::parse);
        let (sort_by, sort_order) = match (sort_by, sort_order) {
            (Some(None), _) | (_, Some(None)) => (SortField::CreatedAt, SortOrder::Desc),
            (by, order) => (
                by.flatten().unwrap_or(SortField::CreatedAt),
                order.flatten().unwrap_or(SortOrder::Desc),
            ),
        };

        Self {
            scope,
            search: non_empty(&p.search).map(str::to_string),
            kind,
            sort_by,
            sort_order,
            page,
            limit,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }
}

/// One page of results, paired with the filtered count.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub fn empty(q: &ListQuery) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: q.page,
            limit: q.limit,
        }
    }

    pub fn total_pages(&self) -> i64 {
        let limit = self.limit.max(1) as i64;
        (self.total + limit - 1) / limit
    }
}
