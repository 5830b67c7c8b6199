//! Stripe Checkout Integration
//!
//! Creates hosted checkout sessions in subscription mode. The caller-supplied
//! price id is validated: the "no plan selected" sentinel is substituted with
//! the fallback price before the provider is called, and a provider rejection
//! of a non-fallback price triggers exactly one retry with the fallback. The
//! retry's failure is terminal.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use stripe::{
    CheckoutSession as StripeSession, CheckoutSessionMode, Client, CreateCheckoutSession,
    CreateCheckoutSessionDiscounts, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionSubscriptionData, ErrorCode, StripeError,
};

use pitchhub_core::{Plan, UserId};

use crate::error::{BillingError, Result};
use crate::provider::{CheckoutProvider, ProviderSession, SessionParams};

/// Sentinel price id meaning "no plan selected"
pub const SENTINEL_PRICE_ID: &str = "price_default";

/// Fallback price used when the caller-supplied id is missing or invalid
pub const DEFAULT_FALLBACK_PRICE_ID: &str = "price_1QhPitchHubStudioMo";

/// Configured provider price id for a plan tier
pub fn plan_price_id(plan: Plan) -> &'static str {
    match plan {
        Plan::Solo => "price_1QhPitchHubSoloMo",
        Plan::Studio => "price_1QhPitchHubStudioMo",
        Plan::Agency => "price_1QhPitchHubAgencyMo",
    }
}

/// Request to create a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Provider price id (or the sentinel)
    pub price_id: String,

    /// Identity of the purchasing user
    pub user_id: UserId,

    /// Customer email
    pub customer_email: String,

    /// URL the browser returns to after hosted checkout; the outcome flags
    /// are appended to it
    pub return_url: String,

    /// Optional trial-length override in days
    #[serde(default)]
    pub trial_days: Option<u32>,

    /// Optional coupon code
    #[serde(default)]
    pub coupon: Option<String>,
}

/// Result of creating a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider session id
    pub id: String,

    /// URL to redirect the user to
    pub checkout_url: String,

    /// Price id the session was actually created with (fallback included)
    pub price_id: String,
}

/// Create a hosted checkout session, substituting the fallback price when
/// the supplied id is the sentinel or rejected by the provider.
pub async fn initiate_checkout(
    provider: &dyn CheckoutProvider,
    fallback_price_id: &str,
    request: CheckoutRequest,
) -> Result<CheckoutSession> {
    let price_id = if request.price_id == SENTINEL_PRICE_ID || request.price_id.is_empty() {
        tracing::warn!(
            price_id = %request.price_id,
            fallback = %fallback_price_id,
            user_id = %request.user_id,
            "No plan selected, substituting fallback price"
        );
        fallback_price_id.to_string()
    } else {
        request.price_id.clone()
    };

    match provider.create_session(session_params(&price_id, &request)).await {
        Ok(session) => Ok(finish(session, price_id)),
        Err(BillingError::UnknownPrice(rejected)) if price_id != fallback_price_id => {
            tracing::warn!(
                price_id = %rejected,
                fallback = %fallback_price_id,
                user_id = %request.user_id,
                "Price rejected by provider, retrying once with fallback"
            );
            let session = provider
                .create_session(session_params(fallback_price_id, &request))
                .await?;
            Ok(finish(session, fallback_price_id.to_string()))
        }
        Err(e) => {
            tracing::error!(price_id = %price_id, error = %e, "Checkout session creation failed");
            Err(e)
        }
    }
}

fn session_params(price_id: &str, request: &CheckoutRequest) -> SessionParams {
    let mut metadata = HashMap::new();
    metadata.insert("user_id".to_string(), request.user_id.to_string());
    metadata.insert("price_id".to_string(), price_id.to_string());
    if let Some(days) = request.trial_days {
        metadata.insert("trial_days".to_string(), days.to_string());
    }

    SessionParams {
        price_id: price_id.to_string(),
        quantity: 1,
        customer_email: request.customer_email.clone(),
        success_url: format!(
            "{}?session_id={{CHECKOUT_SESSION_ID}}&success=true",
            request.return_url
        ),
        cancel_url: format!("{}?canceled=true", request.return_url),
        client_reference_id: request.user_id.to_string(),
        metadata,
        trial_days: request.trial_days,
        coupon: request.coupon.clone(),
    }
}

fn finish(session: ProviderSession, price_id: String) -> CheckoutSession {
    tracing::info!(session_id = %session.id, price_id = %price_id, "Checkout session created");
    CheckoutSession {
        id: session.id,
        checkout_url: session.url,
        price_id,
    }
}

/// Stripe-backed checkout provider
pub struct StripeCheckoutProvider {
    client: Client,
}

impl StripeCheckoutProvider {
    /// Create a new provider from a secret key
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| BillingError::Config("STRIPE_SECRET_KEY not set".into()))?;
        Ok(Self::new(&secret_key))
    }
}

#[async_trait::async_trait]
impl CheckoutProvider for StripeCheckoutProvider {
    async fn create_session(&self, params: SessionParams) -> Result<ProviderSession> {
        let mut create = CreateCheckoutSession::new();
        create.mode = Some(CheckoutSessionMode::Subscription);
        create.customer_email = Some(&params.customer_email);
        create.client_reference_id = Some(&params.client_reference_id);
        create.success_url = Some(&params.success_url);
        create.cancel_url = Some(&params.cancel_url);

        create.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price: Some(params.price_id.clone()),
            quantity: Some(params.quantity),
            ..Default::default()
        }]);

        create.metadata = Some(params.metadata.clone());

        // The trial override and the metadata are mirrored onto the
        // subscription itself, so the webhook handler can associate the
        // record even when the checkout session is not expanded.
        create.subscription_data = Some(CreateCheckoutSessionSubscriptionData {
            trial_period_days: params.trial_days,
            metadata: Some(params.metadata.clone()),
            ..Default::default()
        });

        if let Some(ref coupon) = params.coupon {
            create.discounts = Some(vec![CreateCheckoutSessionDiscounts {
                coupon: Some(coupon.clone()),
                ..Default::default()
            }]);
        }

        let session = StripeSession::create(&self.client, create)
            .await
            .map_err(|e| classify_stripe_error(e, &params.price_id))?;

        let url = session
            .url
            .ok_or_else(|| BillingError::Stripe("No checkout URL returned".into()))?;

        Ok(ProviderSession {
            id: session.id.to_string(),
            url,
        })
    }
}

/// Distinguish "this price does not exist" from every other provider failure
fn classify_stripe_error(err: StripeError, price_id: &str) -> BillingError {
    match err {
        StripeError::Stripe(ref request_error)
            if request_error.code == Some(ErrorCode::ResourceMissing) =>
        {
            BillingError::UnknownPrice(price_id.to_string())
        }
        other => BillingError::Stripe(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockCheckoutProvider;

    fn request(price_id: &str) -> CheckoutRequest {
        CheckoutRequest {
            price_id: price_id.into(),
            user_id: UserId::new("usr_1"),
            customer_email: "owner@agency.test".into(),
            return_url: "https://pitchhub.test/app/dashboard".into(),
            trial_days: None,
            coupon: None,
        }
    }

    #[tokio::test]
    async fn test_sentinel_substitutes_fallback_before_provider_call() {
        let provider = MockCheckoutProvider::new();
        let session = initiate_checkout(&provider, DEFAULT_FALLBACK_PRICE_ID, request("price_default"))
            .await
            .unwrap();

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].price_id, DEFAULT_FALLBACK_PRICE_ID);
        assert_eq!(session.price_id, DEFAULT_FALLBACK_PRICE_ID);
    }

    #[tokio::test]
    async fn test_empty_price_substitutes_fallback() {
        let provider = MockCheckoutProvider::new();
        initiate_checkout(&provider, DEFAULT_FALLBACK_PRICE_ID, request(""))
            .await
            .unwrap();

        assert_eq!(provider.calls()[0].price_id, DEFAULT_FALLBACK_PRICE_ID);
    }

    #[tokio::test]
    async fn test_rejected_price_retries_once_with_fallback() {
        let provider = MockCheckoutProvider::new().reject_price("price_gone");
        let session = initiate_checkout(&provider, DEFAULT_FALLBACK_PRICE_ID, request("price_gone"))
            .await
            .unwrap();

        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].price_id, "price_gone");
        assert_eq!(calls[1].price_id, DEFAULT_FALLBACK_PRICE_ID);
        assert_eq!(session.price_id, DEFAULT_FALLBACK_PRICE_ID);
    }

    #[tokio::test]
    async fn test_rejected_fallback_is_terminal() {
        let provider = MockCheckoutProvider::new().reject_price(DEFAULT_FALLBACK_PRICE_ID);
        let err = initiate_checkout(
            &provider,
            DEFAULT_FALLBACK_PRICE_ID,
            request(DEFAULT_FALLBACK_PRICE_ID),
        )
        .await
        .unwrap_err();

        assert_eq!(provider.calls().len(), 1);
        assert!(matches!(err, BillingError::UnknownPrice(_)));
    }

    #[tokio::test]
    async fn test_provider_failure_is_not_retried() {
        let provider = MockCheckoutProvider::new().fail_with("api down");
        let err = initiate_checkout(&provider, DEFAULT_FALLBACK_PRICE_ID, request("price_ok"))
            .await
            .unwrap_err();

        assert_eq!(provider.calls().len(), 1);
        assert!(matches!(err, BillingError::Stripe(_)));
    }

    #[tokio::test]
    async fn test_urls_carry_outcome_flags() {
        let provider = MockCheckoutProvider::new();
        initiate_checkout(&provider, DEFAULT_FALLBACK_PRICE_ID, request("price_ok"))
            .await
            .unwrap();

        let call = &provider.calls()[0];
        assert_eq!(
            call.success_url,
            "https://pitchhub.test/app/dashboard?session_id={CHECKOUT_SESSION_ID}&success=true"
        );
        assert_eq!(
            call.cancel_url,
            "https://pitchhub.test/app/dashboard?canceled=true"
        );
        assert_eq!(call.quantity, 1);
    }

    #[tokio::test]
    async fn test_metadata_carries_user_and_trial() {
        let provider = MockCheckoutProvider::new();
        let mut req = request("price_ok");
        req.trial_days = Some(14);
        initiate_checkout(&provider, DEFAULT_FALLBACK_PRICE_ID, req)
            .await
            .unwrap();

        let call = &provider.calls()[0];
        assert_eq!(call.metadata.get("user_id").unwrap(), "usr_1");
        assert_eq!(call.metadata.get("trial_days").unwrap(), "14");
        assert_eq!(call.trial_days, Some(14));
        assert_eq!(call.client_reference_id, "usr_1");
    }

    #[test]
    fn test_every_plan_has_a_price() {
        for plan in Plan::ALL {
            assert!(plan_price_id(plan).starts_with("price_"));
        }
    }
}
