use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    ai::provider::{GenerationProvider, HttpProvider},
    auth::{
        google::{GoogleVerifier, TokenInfoVerifier},
        jwt::{IdentityVerifier, JwtKeys},
        repo::{PgUserRepo, UserRepo},
    },
    config::AppConfig,
    creations::repo::{CreationRepo, PgCreationRepo},
    payment::gateway::{PaymentGateway, Razorpay},
    storage::{Storage, StorageClient},
};

/// Everything a handler may touch. External collaborators sit behind traits
/// so tests can swap them for in-memory fakes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub identity: Arc<dyn IdentityVerifier>,
    pub google: Arc<dyn GoogleVerifier>,
    pub users: Arc<dyn UserRepo>,
    pub creations: Arc<dyn CreationRepo>,
    pub provider: Arc<dyn GenerationProvider>,
    pub storage: Arc<dyn StorageClient>,
    pub payments: Arc<dyn PaymentGateway>,
}

impl AppState {
    pub async fn init(config: AppConfig, db: PgPool) -> anyhow::Result<Self> {
        let jwt = JwtKeys::from(&config.jwt);
        let storage = Storage::new(&config.storage).await?;
        let provider = HttpProvider::new(config.ai.clone())?;
        let google = TokenInfoVerifier::new(config.google_client_id.clone())?;
        let payments = Razorpay::new(config.payment.clone())?;

        Ok(Self {
            identity: Arc::new(jwt.clone()),
            jwt,
            google: Arc::new(google),
            users: Arc::new(PgUserRepo::new(db.clone())),
            creations: Arc::new(PgCreationRepo::new(db)),
            provider: Arc::new(provider),
            storage: Arc::new(storage),
            payments: Arc::new(payments),
            config: Arc::new(config),
        })
    }
}
