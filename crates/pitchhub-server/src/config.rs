//! Server Configuration

use std::time::Duration;

use pitchhub_billing::{DEFAULT_FALLBACK_PRICE_ID, VerifierConfig};

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address
    pub bind_addr: String,

    /// Stripe secret key (payments disabled when unset)
    pub stripe_secret_key: Option<String>,

    /// Stripe webhook signing secret
    pub stripe_webhook_secret: Option<String>,

    /// Price substituted when the caller-supplied one is missing or invalid
    pub fallback_price_id: String,

    /// Where confirmed subscribers land
    pub app_path: String,

    /// Session cookie name
    pub session_cookie: String,

    /// Post-checkout verifier tuning
    pub verifier: VerifierConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

        let stripe_secret_key = std::env::var("STRIPE_SECRET_KEY").ok();
        let stripe_webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET").ok();

        let fallback_price_id = std::env::var("FALLBACK_PRICE_ID")
            .unwrap_or_else(|_| DEFAULT_FALLBACK_PRICE_ID.into());

        let app_path = std::env::var("APP_PATH").unwrap_or_else(|_| "/app/dashboard".into());

        let session_cookie =
            std::env::var("SESSION_COOKIE").unwrap_or_else(|_| "pitchhub_session".into());

        let verify_max_attempts = std::env::var("VERIFY_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .map_err(|_| ConfigError::Invalid("VERIFY_MAX_ATTEMPTS"))?;

        let verify_poll_ms: u64 = std::env::var("VERIFY_POLL_MS")
            .unwrap_or_else(|_| "2000".into())
            .parse()
            .map_err(|_| ConfigError::Invalid("VERIFY_POLL_MS"))?;

        Ok(Self {
            bind_addr,
            stripe_secret_key,
            stripe_webhook_secret,
            fallback_price_id,
            app_path,
            session_cookie,
            verifier: VerifierConfig {
                max_attempts: verify_max_attempts,
                poll_interval: Duration::from_millis(verify_poll_ms),
            },
        })
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
