use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base URL objects are served from, without trailing slash.
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub api_key: String,
    /// OpenAI-compatible chat completions base URL.
    pub base_url: String,
    pub model: String,
    pub image_api_url: String,
    pub cloudinary_cloud_name: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub key_id: String,
    pub key_secret: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub ai: AiConfig,
    pub payment: PaymentConfig,
    pub google_client_id: Option<String>,
    /// Lets an authenticated user switch plans without paying. Off in production.
    pub plan_override_enabled: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: env_or("JWT_ISSUER", "creatorly"),
            audience: env_or("JWT_AUDIENCE", "creatorly-users"),
            ttl_minutes: parsed_or("JWT_TTL_MINUTES", 60 * 24 * 30),
        };

        let s3_endpoint = env_or("S3_ENDPOINT", "http://localhost:9000");
        let s3_bucket = env_or("S3_BUCKET", "creations");
        let storage = StorageConfig {
            public_url: std::env::var("S3_PUBLIC_URL")
                .unwrap_or_else(|_| format!("{}/{}", s3_endpoint.trim_end_matches('/'), s3_bucket)),
            endpoint: s3_endpoint,
            bucket: s3_bucket,
            access_key: env_or("S3_ACCESS_KEY", "minioadmin"),
            secret_key: env_or("S3_SECRET_KEY", "minioadmin"),
            region: env_or("S3_REGION", "us-east-1"),
        };

        let ai = AiConfig {
            api_key: env_or("AI_API_KEY", ""),
            base_url: env_or(
                "AI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta/openai",
            ),
            model: env_or("AI_MODEL", "gemini-2.0-flash"),
            image_api_url: env_or("IMAGE_API_URL", "https://image.pollinations.ai/prompt"),
            cloudinary_cloud_name: env_or("CLOUDINARY_CLOUD_NAME", ""),
            timeout_secs: parsed_or("AI_TIMEOUT_SECS", 90),
        };

        let payment = PaymentConfig {
            key_id: env_or("RAZORPAY_KEY_ID", ""),
            key_secret: env_or("RAZORPAY_KEY_SECRET", ""),
            base_url: env_or("RAZORPAY_BASE_URL", "https://api.razorpay.com/v1"),
        };

        Ok(Self {
            database_url,
            db_max_connections: parsed_or("DB_MAX_CONNECTIONS", 10),
            jwt,
            storage,
            ai,
            payment,
            google_client_id: std::env::var("GOOGLE_CLIENT_ID")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            plan_override_enabled: std::env::var("PLAN_OVERRIDE_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
