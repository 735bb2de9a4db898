use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Identity asserted by a verified Google ID token.
#[derive(Debug, Clone)]
pub struct GoogleIdentity {
    pub google_id: String,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("google sign-in is not configured")]
    NotConfigured,
    #[error("credential rejected: {0}")]
    Rejected(String),
    #[error("google unreachable: {0}")]
    Unavailable(#[from] reqwest::Error),
}

#[async_trait]
pub trait GoogleVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<GoogleIdentity, GoogleError>;
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    sub: String,
    email: Option<String>,
    email_verified: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// Checks ID tokens against Google's tokeninfo endpoint.
#[derive(Clone)]
pub struct TokenInfoVerifier {
    client: Client,
    client_id: Option<String>,
}

impl TokenInfoVerifier {
    pub fn new(client_id: Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(10)).build()?,
            client_id,
        })
    }
}

#[async_trait]
impl GoogleVerifier for TokenInfoVerifier {
    async fn verify(&self, credential: &str) -> Result<GoogleIdentity, GoogleError> {
        let client_id = self.client_id.as_deref().ok_or(GoogleError::NotConfigured)?;

        let res = self
            .client
            .get(TOKENINFO_URL)
            .query(&[("id_token", credential)])
            .send()
            .await?;
        if !res.status().is_success() {
            warn!(status = %res.status(), "google tokeninfo rejected credential");
            return Err(GoogleError::Rejected(format!("status {}", res.status())));
        }
        let info: TokenInfo = res.json().await?;
        identity_from(info, client_id)
    }
}

fn identity_from(info: TokenInfo, client_id: &str) -> Result<GoogleIdentity, GoogleError> {
    if info.aud != client_id {
        return Err(GoogleError::Rejected("audience mismatch".into()));
    }
    if info.email_verified.as_deref() != Some("true") {
        return Err(GoogleError::Rejected("email not verified".into()));
    }
    let email = info
        .email
        .ok_or_else(|| GoogleError::Rejected("no email in token".into()))?;
    let name = info
        .name
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
    Ok(GoogleIdentity {
        google_id: info.sub,
        email,
        name,
        avatar: info.picture,
    })
}
