//! # pitchhub-billing
//!
//! Stripe integration for PitchHub's subscription gate.
//!
//! ## The flow
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │  /pricing    │────▶│  Stripe Hosted  │────▶│  return URL       │
//! │  (initiate)  │     │  Checkout Page  │     │  (verify + poll)  │
//! └─────────────┘     └─────────────────┘     └──────────────────┘
//!                              │
//!                              ▼ (async, unordered with the redirect)
//!                      ┌─────────────────┐
//!                      │  webhook writes  │
//!                      │  subscription    │
//!                      └─────────────────┘
//! ```
//!
//! The browser redirect and the provider webhook are two independent
//! deliveries from an external system. The webhook handler is the only
//! writer of subscription records; the request path only reads them. The
//! post-checkout verifier papers over the race by polling the store with a
//! bounded attempt budget.
//!
//! ## Pieces
//!
//! * [`initiate_checkout`] — creates the hosted checkout session, with
//!   sentinel/fallback price substitution and a single fallback retry.
//! * [`CheckoutProvider`] — the payment-provider seam, implemented by
//!   [`StripeCheckoutProvider`] and a scriptable [`MockCheckoutProvider`].
//! * [`SubscriptionStore`] — subscription record storage with a single
//!   status-in-set access query.
//! * [`WebhookHandler`] — verifies signatures and applies subscription
//!   lifecycle events to the store.
//! * [`verify_return`] — the post-checkout verifier state machine.

mod checkout;
mod error;
mod provider;
mod store;
mod verifier;
mod webhook;

pub use checkout::{
    CheckoutRequest, CheckoutSession, DEFAULT_FALLBACK_PRICE_ID, SENTINEL_PRICE_ID,
    StripeCheckoutProvider, initiate_checkout, plan_price_id,
};
pub use error::{BillingError, Result};
pub use provider::{CheckoutProvider, MockCheckoutProvider, ProviderSession, SessionParams};
pub use store::{MemorySubscriptionStore, SubscriptionStore};
pub use verifier::{CheckoutReturn, VerifierConfig, VerifyOutcome, verify_return};
pub use webhook::{WebhookEvent, WebhookHandler};
