use serde::{Deserialize, Serialize};

pub const DEFAULT_ARTICLE_TOKENS: u32 = 800;
pub const MIN_ARTICLE_TOKENS: u32 = 100;
pub const MAX_ARTICLE_TOKENS: u32 = 4096;

#[derive(Debug, Deserialize)]
pub struct ArticleRequest {
    #[serde(default)]
    pub prompt: String,
    pub length: Option<u32>,
}

impl ArticleRequest {
    pub fn max_tokens(&self) -> u32 {
        self.length
            .unwrap_or(DEFAULT_ARTICLE_TOKENS)
            .clamp(MIN_ARTICLE_TOKENS, MAX_ARTICLE_TOKENS)
    }
}

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub publish: bool,
}

#[derive(Debug, Serialize)]
pub struct ContentResponse {
    pub success: bool,
    pub content: String,
}
