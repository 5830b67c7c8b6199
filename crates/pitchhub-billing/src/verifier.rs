//! Post-Checkout Verification
//!
//! The browser returns from hosted checkout before the provider webhook has
//! necessarily written the subscription record. The verifier re-resolves the
//! session, then polls the subscription store with a fixed delay and an
//! explicit attempt budget. Exhausting the budget is a terminal state that
//! asks the user to contact support, never an endless spinner.

use std::time::Duration;

use serde::Serialize;

use pitchhub_core::gate::{PRICING_PATH, SIGN_IN_PATH};

use crate::store::SubscriptionStore;
use pitchhub_auth::SessionResolver;

/// Verifier tuning
#[derive(Clone, Debug)]
pub struct VerifierConfig {
    /// Maximum number of store polls before giving up
    pub max_attempts: u32,

    /// Fixed delay between polls
    pub poll_interval: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Outcome markers carried on the redirect back from hosted checkout
#[derive(Clone, Debug)]
pub enum CheckoutReturn {
    /// `session_id` + `success=true`
    Success { session_id: String },

    /// `canceled=true`
    Canceled,
}

/// Terminal state of the verifier
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VerifyOutcome {
    /// Subscription write observed; proceed into the app
    Confirmed { redirect_to: String, attempts: u32 },

    /// Session could not be resolved; sign in again
    SignedOut { redirect_to: String },

    /// User backed out of hosted checkout
    Canceled { redirect_to: String },

    /// Webhook still not visible after the attempt budget; needs manual
    /// verification
    PendingVerification { attempts: u32 },
}

/// Run the verifier for one checkout return.
///
/// `app_path` is where a confirmed user lands. The canceled path never
/// queries the store.
pub async fn verify_return(
    resolver: &dyn SessionResolver,
    store: &dyn SubscriptionStore,
    config: &VerifierConfig,
    token: Option<&str>,
    checkout_return: CheckoutReturn,
    app_path: &str,
) -> VerifyOutcome {
    let session_id = match checkout_return {
        CheckoutReturn::Canceled => {
            tracing::info!("Checkout canceled by user");
            return VerifyOutcome::Canceled {
                redirect_to: PRICING_PATH.to_string(),
            };
        }
        CheckoutReturn::Success { session_id } => session_id,
    };

    // verifying-identity
    let resolved = match token {
        Some(token) => resolver.resolve(token).await,
        None => Ok(None),
    };

    let identity = match resolved {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            tracing::warn!(session_id = %session_id, "No session while verifying checkout");
            return VerifyOutcome::SignedOut {
                redirect_to: SIGN_IN_PATH.to_string(),
            };
        }
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "Session resolution failed while verifying checkout");
            return VerifyOutcome::SignedOut {
                redirect_to: SIGN_IN_PATH.to_string(),
            };
        }
    };

    // polling
    for attempt in 1..=config.max_attempts {
        match store.has_access(&identity.user_id) {
            Ok(true) => {
                tracing::info!(
                    user_id = %identity.user_id,
                    session_id = %session_id,
                    attempt,
                    "Subscription confirmed after checkout"
                );
                return VerifyOutcome::Confirmed {
                    redirect_to: app_path.to_string(),
                    attempts: attempt,
                };
            }
            Ok(false) => {}
            // A read error is indistinguishable from the webhook not having
            // landed yet; it consumes an attempt instead of aborting.
            Err(e) => {
                tracing::warn!(
                    user_id = %identity.user_id,
                    attempt,
                    error = %e,
                    "Subscription lookup failed while verifying checkout"
                );
            }
        }

        if attempt < config.max_attempts {
            tokio::time::sleep(config.poll_interval).await;
        }
    }

    tracing::warn!(
        user_id = %identity.user_id,
        session_id = %session_id,
        attempts = config.max_attempts,
        "Checkout not confirmed within the attempt budget"
    );

    VerifyOutcome::PendingVerification {
        attempts: config.max_attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use pitchhub_auth::{Identity, MemorySessionResolver};
    use pitchhub_core::{AuthProvider, Subscription, SubscriptionStatus, UserId};

    use crate::error::{BillingError, Result};
    use crate::store::MemorySubscriptionStore;

    /// Store that reports access only from the nth `has_access` call on,
    /// standing in for the webhook landing mid-poll.
    struct LandsAfter {
        queries: AtomicU32,
        ready_at: u32,
    }

    impl LandsAfter {
        fn new(ready_at: u32) -> Self {
            Self {
                queries: AtomicU32::new(0),
                ready_at,
            }
        }

        fn query_count(&self) -> u32 {
            self.queries.load(Ordering::Relaxed)
        }
    }

    impl SubscriptionStore for LandsAfter {
        fn upsert(&self, _subscription: &Subscription) -> Result<()> {
            Ok(())
        }

        fn find_by_subscription(&self, _subscription_id: &str) -> Result<Option<Subscription>> {
            Ok(None)
        }

        fn find_for_user(&self, _user_id: &UserId) -> Result<Option<Subscription>> {
            Ok(None)
        }

        fn has_access(&self, _user_id: &UserId) -> Result<bool> {
            let n = self.queries.fetch_add(1, Ordering::Relaxed) + 1;
            Ok(n >= self.ready_at)
        }
    }

    /// Store whose reads always fail
    struct BrokenStore;

    impl SubscriptionStore for BrokenStore {
        fn upsert(&self, _subscription: &Subscription) -> Result<()> {
            Err(BillingError::Storage("down".into()))
        }

        fn find_by_subscription(&self, _subscription_id: &str) -> Result<Option<Subscription>> {
            Err(BillingError::Storage("down".into()))
        }

        fn find_for_user(&self, _user_id: &UserId) -> Result<Option<Subscription>> {
            Err(BillingError::Storage("down".into()))
        }

        fn has_access(&self, _user_id: &UserId) -> Result<bool> {
            Err(BillingError::Storage("down".into()))
        }
    }

    fn fast_config(max_attempts: u32) -> VerifierConfig {
        VerifierConfig {
            max_attempts,
            poll_interval: Duration::from_millis(1),
        }
    }

    fn signed_in() -> (Arc<MemorySessionResolver>, String, UserId) {
        let resolver = Arc::new(MemorySessionResolver::new());
        let user_id = UserId::new("usr_1");
        let token = resolver.issue(Identity::new(
            user_id.clone(),
            "owner@agency.test",
            AuthProvider::Password,
        ));
        (resolver, token, user_id)
    }

    fn success() -> CheckoutReturn {
        CheckoutReturn::Success {
            session_id: "cs_test_1".into(),
        }
    }

    #[tokio::test]
    async fn test_confirms_when_webhook_lands_mid_poll() {
        let (resolver, token, _) = signed_in();
        let store = LandsAfter::new(3);

        let outcome = verify_return(
            resolver.as_ref(),
            &store,
            &fast_config(10),
            Some(&token),
            success(),
            "/app/dashboard",
        )
        .await;

        assert_eq!(
            outcome,
            VerifyOutcome::Confirmed {
                redirect_to: "/app/dashboard".into(),
                attempts: 3,
            }
        );
    }

    #[tokio::test]
    async fn test_attempt_budget_is_terminal() {
        let (resolver, token, _) = signed_in();
        let store = LandsAfter::new(100);

        let outcome = verify_return(
            resolver.as_ref(),
            &store,
            &fast_config(4),
            Some(&token),
            success(),
            "/app/dashboard",
        )
        .await;

        assert_eq!(outcome, VerifyOutcome::PendingVerification { attempts: 4 });
        assert_eq!(store.query_count(), 4);
    }

    #[tokio::test]
    async fn test_canceled_never_queries_the_store() {
        let (resolver, token, _) = signed_in();
        let store = LandsAfter::new(1);

        let outcome = verify_return(
            resolver.as_ref(),
            &store,
            &fast_config(10),
            Some(&token),
            CheckoutReturn::Canceled,
            "/app/dashboard",
        )
        .await;

        assert_eq!(
            outcome,
            VerifyOutcome::Canceled {
                redirect_to: "/pricing".into()
            }
        );
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_session_is_signed_out() {
        let resolver = MemorySessionResolver::new();
        let store = MemorySubscriptionStore::new();

        let outcome = verify_return(
            &resolver,
            &store,
            &fast_config(2),
            None,
            success(),
            "/app/dashboard",
        )
        .await;

        assert_eq!(
            outcome,
            VerifyOutcome::SignedOut {
                redirect_to: "/sign-in".into()
            }
        );
    }

    #[tokio::test]
    async fn test_store_errors_consume_attempts() {
        let (resolver, token, _) = signed_in();

        let outcome = verify_return(
            resolver.as_ref(),
            &BrokenStore,
            &fast_config(3),
            Some(&token),
            success(),
            "/app/dashboard",
        )
        .await;

        assert_eq!(outcome, VerifyOutcome::PendingVerification { attempts: 3 });
    }

    #[tokio::test]
    async fn test_already_visible_record_confirms_immediately() {
        let (resolver, token, user_id) = signed_in();
        let store = MemorySubscriptionStore::new();
        store
            .upsert(&Subscription::new(
                user_id,
                "sub_123",
                SubscriptionStatus::Trialing,
            ))
            .unwrap();

        let outcome = verify_return(
            resolver.as_ref(),
            &store,
            &fast_config(10),
            Some(&token),
            success(),
            "/app/dashboard",
        )
        .await;

        assert!(matches!(
            outcome,
            VerifyOutcome::Confirmed { attempts: 1, .. }
        ));
    }
}
