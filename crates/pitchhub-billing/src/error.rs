//! Billing Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, BillingError>;

/// Billing-related errors
#[derive(Error, Debug)]
pub enum BillingError {
    /// Payment provider error (network or API)
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// The provider rejected the price id as nonexistent
    #[error("Unknown price: {0}")]
    UnknownPrice(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl BillingError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, BillingError::Stripe(_) | BillingError::Storage(_))
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            BillingError::Stripe(_) => "Payment processing failed. Please try again.",
            BillingError::UnknownPrice(_) => "The selected plan is not available.",
            BillingError::Config(_) => "Service configuration error.",
            _ => "An error occurred processing your request.",
        }
    }
}
