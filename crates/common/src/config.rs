use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// HTTP port for the API server (default: 3000)
    pub port: u16,

    /// Public base URL of this deployment, used for email opt-in links
    pub public_base_url: String,

    /// Shared secret for the internal trigger endpoints
    pub internal_api_token: String,

    /// Flight-data provider base URL
    pub provider_base_url: String,

    /// Flight-data provider API key
    pub provider_api_key: Option<String>,

    /// HMAC secret for verifying provider webhook signatures
    pub provider_webhook_secret: String,

    /// Telegram bot token
    pub telegram_bot_token: Option<String>,

    /// Telegram bot username, used for t.me opt-in deep links
    pub telegram_bot_username: Option<String>,

    /// Shared secret expected in Telegram webhook requests
    pub telegram_webhook_secret: Option<String>,

    /// Resend API key for email delivery
    pub resend_api_key: Option<String>,

    /// Email sender address
    pub email_from: Option<String>,

    /// Maximum messages fetched per scheduler tick (default: 50)
    pub scheduler_batch_size: i64,

    /// Scheduler lease duration in seconds (default: 55 — intentionally
    /// shorter than the external 60s trigger cadence)
    pub scheduler_lock_ttl_seconds: i64,

    /// Delivery attempts before a message fails terminally (default: 3)
    pub message_max_attempts: i32,

    /// How far ahead the poller looks for departing flights (default: 24h)
    pub poll_horizon_hours: i64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid u16"))?,
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            internal_api_token: std::env::var("INTERNAL_API_TOKEN").map_err(|_| {
                anyhow::anyhow!("INTERNAL_API_TOKEN environment variable is required")
            })?,
            provider_base_url: std::env::var("PROVIDER_BASE_URL")
                .unwrap_or_else(|_| "https://aerodatabox.p.rapidapi.com".to_string()),
            provider_api_key: std::env::var("PROVIDER_API_KEY").ok(),
            provider_webhook_secret: std::env::var("PROVIDER_WEBHOOK_SECRET").map_err(|_| {
                anyhow::anyhow!("PROVIDER_WEBHOOK_SECRET environment variable is required")
            })?,
            telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN").ok(),
            telegram_bot_username: std::env::var("TELEGRAM_BOT_USERNAME").ok(),
            telegram_webhook_secret: std::env::var("TELEGRAM_WEBHOOK_SECRET").ok(),
            resend_api_key: std::env::var("RESEND_API_KEY").ok(),
            email_from: std::env::var("EMAIL_FROM").ok(),
            scheduler_batch_size: std::env::var("SCHEDULER_BATCH_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SCHEDULER_BATCH_SIZE must be a valid i64"))?,
            scheduler_lock_ttl_seconds: std::env::var("SCHEDULER_LOCK_TTL_SECONDS")
                .unwrap_or_else(|_| "55".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SCHEDULER_LOCK_TTL_SECONDS must be a valid i64"))?,
            message_max_attempts: std::env::var("MESSAGE_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("MESSAGE_MAX_ATTEMPTS must be a valid i32"))?,
            poll_horizon_hours: std::env::var("POLL_HORIZON_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("POLL_HORIZON_HOURS must be a valid i64"))?,
        })
    }
}
