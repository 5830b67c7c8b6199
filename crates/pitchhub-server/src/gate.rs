//! Route-Gate Middleware
//!
//! Runs on every request to a protected path: resolves the session from the
//! cookie, checks the subscription store, and delegates the allow/redirect
//! decision to `pitchhub_core::gate`. Requests carrying the hosted-checkout
//! success markers skip the store check; the post-checkout verifier owns
//! that path.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use pitchhub_auth::SessionResolver as _;
use pitchhub_billing::SubscriptionStore as _;
use pitchhub_core::gate::{self, CheckoutReturnParams, GateDecision};

use crate::state::AppState;

/// Extract the session token from the request cookies
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;

    for cookie in cookie_header.split(';') {
        let cookie = cookie.trim();
        if let Some(value) = cookie.strip_prefix(cookie_name) {
            if let Some(value) = value.strip_prefix('=') {
                return Some(value.to_string());
            }
        }
    }

    None
}

/// Gate middleware for protected paths
pub async fn route_gate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let params = CheckoutReturnParams::from_query(req.uri().query());
    let token = session_token(req.headers(), &state.config.session_cookie);

    // Resolution errors count as no session: the user re-authenticates
    let identity = match token {
        Some(ref token) => match state.sessions.resolve(token).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Session resolution failed in gate");
                None
            }
        },
        None => None,
    };

    let checkout_return = params.is_checkout_return();

    // Skip the lookup entirely on the checkout-return bypass
    let access = match (&identity, checkout_return) {
        (Some(identity), false) => match state.subscriptions.has_access(&identity.user_id) {
            Ok(has_access) => Some(has_access),
            Err(e) => {
                tracing::error!(
                    user_id = %identity.user_id,
                    error = %e,
                    "Subscription lookup failed in gate"
                );
                None
            }
        },
        _ => None,
    };

    match gate::decide(&path, identity.is_some(), checkout_return, access) {
        GateDecision::Allow => next.run(req).await,
        decision => {
            // location() is Some for every non-Allow decision
            let location = decision
                .location()
                .unwrap_or_else(|| gate::SIGN_IN_PATH.to_string());
            tracing::debug!(path = %path, location = %location, "Gate redirect");
            Redirect::temporary(&location).into_response()
        }
    }
}
