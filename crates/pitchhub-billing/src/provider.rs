//! Checkout Provider Seam
//!
//! The payment provider behind a trait, so the initiator's fallback logic
//! and the server handlers can be exercised against a scriptable mock.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::error::{BillingError, Result};

/// Provider-agnostic parameters for one hosted checkout session
#[derive(Clone, Debug)]
pub struct SessionParams {
    /// Provider price id to subscribe to
    pub price_id: String,

    /// Line item quantity (always 1 for this flow)
    pub quantity: u64,

    /// Customer email
    pub customer_email: String,

    /// URL the provider redirects to on success, including the templated
    /// session-id placeholder and success flag
    pub success_url: String,

    /// URL the provider redirects to on cancel, including the canceled flag
    pub cancel_url: String,

    /// User id, also mirrored into the metadata so the webhook handler can
    /// associate the resulting subscription
    pub client_reference_id: String,

    /// Session metadata; mirrored onto the subscription as well
    pub metadata: HashMap<String, String>,

    /// Optional trial-length override in days
    pub trial_days: Option<u32>,

    /// Optional coupon code
    pub coupon: Option<String>,
}

/// A created hosted checkout session
#[derive(Clone, Debug)]
pub struct ProviderSession {
    /// Provider session id
    pub id: String,

    /// Hosted checkout page URL to redirect the user to
    pub url: String,
}

/// Payment provider trait
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    /// Create a hosted checkout session in subscription mode
    async fn create_session(&self, params: SessionParams) -> Result<ProviderSession>;
}

/// Scriptable checkout provider (for development and tests)
///
/// Records every call and can be told to reject specific price ids or to
/// fail outright.
pub struct MockCheckoutProvider {
    calls: Mutex<Vec<SessionParams>>,
    rejected_prices: HashSet<String>,
    failure: Option<String>,
    counter: AtomicU64,
}

impl Default for MockCheckoutProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCheckoutProvider {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            rejected_prices: HashSet::new(),
            failure: None,
            counter: AtomicU64::new(0),
        }
    }

    /// Reject this price id with an unknown-price error
    pub fn reject_price(mut self, price_id: impl Into<String>) -> Self {
        self.rejected_prices.insert(price_id.into());
        self
    }

    /// Fail every call with a provider error
    pub fn fail_with(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Parameters of every `create_session` call so far
    pub fn calls(&self) -> Vec<SessionParams> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CheckoutProvider for MockCheckoutProvider {
    async fn create_session(&self, params: SessionParams) -> Result<ProviderSession> {
        self.calls.lock().unwrap().push(params.clone());

        if let Some(ref message) = self.failure {
            return Err(BillingError::Stripe(message.clone()));
        }

        if self.rejected_prices.contains(&params.price_id) {
            return Err(BillingError::UnknownPrice(params.price_id));
        }

        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        Ok(ProviderSession {
            id: format!("cs_test_{n}"),
            url: format!("https://checkout.stripe.test/c/pay/cs_test_{n}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(price_id: &str) -> SessionParams {
        SessionParams {
            price_id: price_id.into(),
            quantity: 1,
            customer_email: "owner@agency.test".into(),
            success_url: "https://pitchhub.test/app?session_id={CHECKOUT_SESSION_ID}&success=true"
                .into(),
            cancel_url: "https://pitchhub.test/app?canceled=true".into(),
            client_reference_id: "usr_1".into(),
            metadata: HashMap::new(),
            trial_days: None,
            coupon: None,
        }
    }

    #[tokio::test]
    async fn test_mock_records_calls() {
        let provider = MockCheckoutProvider::new();
        provider.create_session(params("price_1")).await.unwrap();
        provider.create_session(params("price_2")).await.unwrap();

        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].price_id, "price_2");
    }

    #[tokio::test]
    async fn test_mock_rejects_scripted_price() {
        let provider = MockCheckoutProvider::new().reject_price("price_bad");
        let err = provider.create_session(params("price_bad")).await.unwrap_err();
        assert!(matches!(err, BillingError::UnknownPrice(_)));
    }
}
