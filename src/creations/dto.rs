use serde::{Deserialize, Serialize};

use super::{query::Page, repo_types::Creation};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct CreationListResponse {
    pub success: bool,
    pub creations: Vec<Creation>,
    pub pagination: Pagination,
}

impl From<Page<Creation>> for CreationListResponse {
    fn from(page: Page<Creation>) -> Self {
        let pagination = Pagination {
            total: page.total,
            page: page.page,
            limit: page.limit,
            total_pages: page.total_pages(),
        };
        Self {
            success: true,
            creations: page.items,
            pagination,
        }
    }
}

/// `{ "id": 42 }`; string ids are accepted too.
#[derive(Debug, Deserialize)]
pub struct CreationIdRequest {
    pub id: serde_json::Value,
}

impl CreationIdRequest {
    pub fn id(&self) -> Option<i64> {
        match &self.id {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ToggleLikeResponse {
    pub success: bool,
    pub message: String,
    pub liked: bool,
}

#[derive(Debug, Serialize)]
pub struct TogglePublishResponse {
    pub success: bool,
    pub message: String,
    pub publish: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}
