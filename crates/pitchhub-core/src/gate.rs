//! Route-gate decision logic.
//!
//! Every request to a protected path goes through the gate: it either passes
//! unchanged or is redirected to sign-in or pricing with the originally
//! requested path carried in a `redirect_to` query parameter. The HTTP
//! middleware in `pitchhub-server` gathers the inputs (session resolution,
//! checkout-return markers, subscription lookup) and delegates the actual
//! decision here, where it can be tested without a server.

use serde::Deserialize;

/// Sign-in page, the redirect target for unauthenticated requests
pub const SIGN_IN_PATH: &str = "/sign-in";

/// Pricing page, the redirect target for unsubscribed requests
pub const PRICING_PATH: &str = "/pricing";

/// Query parameters carried on the redirect back from hosted checkout.
///
/// `success` and `canceled` are mutually exclusive outcome flags set by the
/// checkout initiator on the success/cancel URLs; `session_id` is the
/// provider-issued checkout session id, present only on success.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CheckoutReturnParams {
    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(default)]
    pub success: Option<bool>,

    #[serde(default)]
    pub canceled: Option<bool>,
}

impl CheckoutReturnParams {
    /// Parse from a raw query string. Missing or malformed queries carry no
    /// markers.
    pub fn from_query(query: Option<&str>) -> Self {
        query
            .and_then(|q| serde_urlencoded::from_str(q).ok())
            .unwrap_or_default()
    }

    /// True when the request is the success redirect from hosted checkout:
    /// a provider session id plus the success flag.
    pub fn is_checkout_return(&self) -> bool {
        self.session_id.is_some() && self.success == Some(true)
    }

    /// True when the user backed out of hosted checkout
    pub fn is_canceled(&self) -> bool {
        self.canceled == Some(true)
    }
}

/// Outcome of gating a request to a protected path
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// Let the request through unmodified
    Allow,

    /// No valid session: send to sign-in, then back to `redirect_to`
    ToSignIn { redirect_to: String },

    /// No qualifying subscription: send to pricing, then back to `redirect_to`
    ToPricing { redirect_to: String },
}

impl GateDecision {
    /// Redirect target for this decision, `None` for `Allow`
    pub fn location(&self) -> Option<String> {
        match self {
            GateDecision::Allow => None,
            GateDecision::ToSignIn { redirect_to } => Some(redirect_url(SIGN_IN_PATH, redirect_to)),
            GateDecision::ToPricing { redirect_to } => Some(redirect_url(PRICING_PATH, redirect_to)),
        }
    }
}

/// Build `base?redirect_to=path` with a percent-encoded value
pub fn redirect_url(base: &str, redirect_to: &str) -> String {
    let query =
        serde_urlencoded::to_string([("redirect_to", redirect_to)]).unwrap_or_default();
    format!("{base}?{query}")
}

/// Decide what to do with a request to a protected path.
///
/// * `authenticated` is the session resolution outcome; resolution errors
///   count as no session.
/// * `checkout_return` is true when the request carries the hosted-checkout
///   success markers. Those requests pass unconditionally: the provider
///   webhook may not have written the subscription record yet, and the
///   post-checkout verifier owns confirmation on that path.
/// * `access` is the subscription lookup outcome: `Some(bool)` for a
///   completed lookup, `None` when the store errored. A failed lookup is
///   treated as no access.
pub fn decide(
    path: &str,
    authenticated: bool,
    checkout_return: bool,
    access: Option<bool>,
) -> GateDecision {
    if !authenticated {
        return GateDecision::ToSignIn {
            redirect_to: path.to_string(),
        };
    }

    if checkout_return {
        return GateDecision::Allow;
    }

    match access {
        Some(true) => GateDecision::Allow,
        _ => GateDecision::ToPricing {
            redirect_to: path.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_session_redirects_to_sign_in() {
        let decision = decide("/app/dashboard", false, false, None);
        assert_eq!(
            decision,
            GateDecision::ToSignIn {
                redirect_to: "/app/dashboard".into()
            }
        );
        assert_eq!(
            decision.location().unwrap(),
            "/sign-in?redirect_to=%2Fapp%2Fdashboard"
        );
    }

    #[test]
    fn test_no_subscription_redirects_to_pricing() {
        let decision = decide("/app/dashboard", true, false, Some(false));
        assert_eq!(
            decision,
            GateDecision::ToPricing {
                redirect_to: "/app/dashboard".into()
            }
        );
        assert_eq!(
            decision.location().unwrap(),
            "/pricing?redirect_to=%2Fapp%2Fdashboard"
        );
    }

    #[test]
    fn test_qualifying_subscription_allows() {
        assert_eq!(decide("/app/dashboard", true, false, Some(true)), GateDecision::Allow);
    }

    #[test]
    fn test_checkout_return_bypasses_lookup() {
        // Subscription state is irrelevant on the success redirect
        assert_eq!(decide("/app/dashboard", true, true, None), GateDecision::Allow);
        assert_eq!(decide("/app/dashboard", true, true, Some(false)), GateDecision::Allow);
    }

    #[test]
    fn test_checkout_return_still_requires_session() {
        let decision = decide("/app/dashboard", false, true, None);
        assert!(matches!(decision, GateDecision::ToSignIn { .. }));
    }

    #[test]
    fn test_lookup_error_fails_closed() {
        let decision = decide("/app/dashboard", true, false, None);
        assert!(matches!(decision, GateDecision::ToPricing { .. }));
    }

    #[test]
    fn test_return_params_success_marker() {
        let params =
            CheckoutReturnParams::from_query(Some("session_id=cs_test_123&success=true"));
        assert!(params.is_checkout_return());
        assert!(!params.is_canceled());
    }

    #[test]
    fn test_return_params_success_flag_alone_is_not_a_marker() {
        let params = CheckoutReturnParams::from_query(Some("success=true"));
        assert!(!params.is_checkout_return());
    }

    #[test]
    fn test_return_params_canceled_marker() {
        let params = CheckoutReturnParams::from_query(Some("canceled=true"));
        assert!(params.is_canceled());
        assert!(!params.is_checkout_return());
    }

    #[test]
    fn test_return_params_absent_query() {
        let params = CheckoutReturnParams::from_query(None);
        assert!(!params.is_checkout_return());
        assert!(!params.is_canceled());
    }
}
