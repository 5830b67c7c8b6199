//! Application State

use std::sync::Arc;

use pitchhub_auth::{MemorySessionResolver, SessionResolver, UserStore};
use pitchhub_billing::{CheckoutProvider, SubscriptionStore};

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,

    /// Session resolution (remote provider or in-memory)
    pub sessions: Arc<dyn SessionResolver>,

    /// Set in dev mode only: the in-memory resolver that can also issue
    /// tokens for the password sign-in handler
    pub dev_sessions: Option<Arc<MemorySessionResolver>>,

    /// User records
    pub users: Arc<dyn UserStore>,

    /// Subscription records (written only by the webhook handler)
    pub subscriptions: Arc<dyn SubscriptionStore>,

    /// Checkout provider (None when Stripe is not configured)
    pub checkout: Option<Arc<dyn CheckoutProvider>>,
}
