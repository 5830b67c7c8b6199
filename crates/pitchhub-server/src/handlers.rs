//! HTTP Handlers

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use serde::{Deserialize, Serialize};

use pitchhub_auth::{Identity, SessionResolver as _, ensure_user};
use pitchhub_billing::{
    CheckoutRequest, CheckoutReturn, SENTINEL_PRICE_ID, SubscriptionStore as _, WebhookHandler,
    initiate_checkout, plan_price_id, verify_return,
};
use pitchhub_core::gate::{self, CheckoutReturnParams};
use pitchhub_core::{AuthProvider, Plan, UserId};

use crate::gate::session_token;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub stripe_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    /// Plan name; resolved to its configured price id
    #[serde(default)]
    pub plan: Option<String>,

    /// Explicit provider price id; wins over `plan`
    #[serde(default)]
    pub price_id: Option<String>,

    /// Where the browser returns after hosted checkout
    pub return_url: String,

    #[serde(default)]
    pub trial_days: Option<u32>,

    #[serde(default)]
    pub coupon: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SignInBody {
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub token: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub redirect_to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionInfo {
    pub status: String,
    pub price_id: Option<String>,
    pub current_period_end: Option<String>,
    pub trial_end: Option<String>,
    pub cancel_at_period_end: bool,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub has_access: bool,
    pub subscription: Option<SubscriptionInfo>,
}

#[derive(Debug, Serialize)]
pub struct PricingPlan {
    pub plan: &'static str,
    pub display_name: &'static str,
    pub price_id: &'static str,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, code: &str, message: impl Into<String>) -> HandlerError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            code: code.into(),
        }),
    )
}

/// Resolve the session cookie to an identity, or fail with 401
async fn require_identity(state: &AppState, headers: &HeaderMap) -> Result<Identity, HandlerError> {
    let token = session_token(headers, &state.config.session_cookie)
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "NO_SESSION", "Sign in required"))?;

    match state.sessions.resolve(&token).await {
        Ok(Some(identity)) => Ok(identity),
        Ok(None) => Err(error(
            StatusCode::UNAUTHORIZED,
            "INVALID_SESSION",
            "Session expired, sign in again",
        )),
        Err(e) => {
            tracing::warn!(error = %e, "Session resolution failed");
            Err(error(
                StatusCode::UNAUTHORIZED,
                "SESSION_ERROR",
                "Could not verify session",
            ))
        }
    }
}

fn set_cookie(name: &str, token: &str) -> String {
    format!("{name}={token}; Path=/; HttpOnly; SameSite=Lax")
}

fn clear_cookie(name: &str) -> String {
    format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        stripe_configured: state.checkout.is_some(),
    })
}

/// Sign-in landing target (the gate redirects here without a session)
pub async fn sign_in_page(Query(params): Query<CallbackParams>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Sign in to continue",
        "redirect_to": params.redirect_to,
    }))
}

/// Pricing landing target (the gate redirects here without a subscription)
pub async fn pricing_page(Query(params): Query<CallbackParams>) -> Json<serde_json::Value> {
    let plans: Vec<PricingPlan> = Plan::ALL
        .iter()
        .map(|&plan| PricingPlan {
            plan: plan.as_str(),
            display_name: plan.display_name(),
            price_id: plan_price_id(plan),
        })
        .collect();

    Json(serde_json::json!({
        "plans": plans,
        "redirect_to": params.redirect_to,
    }))
}

/// Password sign-in (dev mode only; production delegates to the provider)
pub async fn sign_in(
    State(state): State<AppState>,
    Json(payload): Json<SignInBody>,
) -> Result<Response, HandlerError> {
    let dev_sessions = state.dev_sessions.as_ref().ok_or_else(|| {
        error(
            StatusCode::SERVICE_UNAVAILABLE,
            "AUTH_DELEGATED",
            "Sign-in is handled by the identity provider",
        )
    })?;

    let user_id = UserId::new(format!("usr_{}", uuid::Uuid::new_v4().simple()));
    let mut identity = Identity::new(user_id.clone(), payload.email, AuthProvider::Password);
    identity.display_name = payload.display_name;

    if let Err(e) = ensure_user(state.users.as_ref(), &identity) {
        tracing::error!(error = %e, "Could not persist user at sign-in");
    }

    let token = dev_sessions.issue(identity);
    let cookie = set_cookie(&state.config.session_cookie, &token);

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(SignInResponse {
            token,
            user_id: user_id.to_string(),
        }),
    )
        .into_response())
}

/// Sign out: revoke the dev session (if any) and clear the cookie
pub async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers, &state.config.session_cookie) {
        if let Some(ref dev_sessions) = state.dev_sessions {
            dev_sessions.revoke(&token);
        }
    }

    let cookie = clear_cookie(&state.config.session_cookie);
    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        StatusCode::NO_CONTENT,
    )
        .into_response()
}

/// OAuth callback: resolve the provider token, create the user record if the
/// provider-side trigger did not, set the session cookie, and continue to
/// the originally requested path.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Some(token) = params.access_token else {
        return Redirect::temporary(gate::SIGN_IN_PATH).into_response();
    };

    let identity = match state.sessions.resolve(&token).await {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            tracing::debug!("OAuth callback with a token the provider rejected");
            return Redirect::temporary(gate::SIGN_IN_PATH).into_response();
        }
        Err(e) => {
            tracing::warn!(error = %e, "OAuth callback could not reach the provider");
            return Redirect::temporary(gate::SIGN_IN_PATH).into_response();
        }
    };

    // Defensive creation; a storage error must not block a valid sign-in
    if let Err(e) = ensure_user(state.users.as_ref(), &identity) {
        tracing::error!(user_id = %identity.user_id, error = %e, "Could not persist user at OAuth callback");
    }

    let destination = params
        .redirect_to
        .unwrap_or_else(|| state.config.app_path.clone());
    let cookie = set_cookie(&state.config.session_cookie, &token);

    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Redirect::temporary(&destination),
    )
        .into_response()
}

/// Create a hosted checkout session
pub async fn create_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CheckoutBody>,
) -> Result<Json<CheckoutResponse>, HandlerError> {
    let identity = require_identity(&state, &headers).await?;

    let checkout = state.checkout.as_ref().ok_or_else(|| {
        error(
            StatusCode::SERVICE_UNAVAILABLE,
            "PAYMENTS_DISABLED",
            "Payments not configured",
        )
    })?;

    let price_id = payload
        .price_id
        .or_else(|| {
            payload
                .plan
                .map(|plan| plan_price_id(Plan::from_str(&plan)).to_string())
        })
        .unwrap_or_else(|| SENTINEL_PRICE_ID.to_string());

    let request = CheckoutRequest {
        price_id,
        user_id: identity.user_id,
        customer_email: identity.email,
        return_url: payload.return_url,
        trial_days: payload.trial_days,
        coupon: payload.coupon,
    };

    let session = initiate_checkout(checkout.as_ref(), &state.config.fallback_price_id, request)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Checkout error");
            error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "CHECKOUT_ERROR",
                e.user_message(),
            )
        })?;

    Ok(Json(CheckoutResponse {
        checkout_url: session.checkout_url,
        session_id: session.id,
    }))
}

/// Post-checkout verification endpoint, driven by the return redirect's
/// outcome flags
pub async fn checkout_return(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<pitchhub_billing::VerifyOutcome>, HandlerError> {
    let params = CheckoutReturnParams::from_query(uri.query());

    let checkout_return = if params.is_canceled() {
        CheckoutReturn::Canceled
    } else if params.is_checkout_return() {
        CheckoutReturn::Success {
            // is_checkout_return guarantees the id is present
            session_id: params.session_id.unwrap_or_default(),
        }
    } else {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "INVALID_RETURN",
            "Expected success or canceled markers",
        ));
    };

    let token = session_token(&headers, &state.config.session_cookie);

    let outcome = verify_return(
        state.sessions.as_ref(),
        state.subscriptions.as_ref(),
        &state.config.verifier,
        token.as_deref(),
        checkout_return,
        &state.config.app_path,
    )
    .await;

    Ok(Json(outcome))
}

/// Current subscription state for the signed-in user; UI widgets fetch this
/// instead of sharing an ambient client-side cache
pub async fn subscription_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SubscriptionResponse>, HandlerError> {
    let identity = require_identity(&state, &headers).await?;

    let subscription = state
        .subscriptions
        .find_for_user(&identity.user_id)
        .map_err(|e| {
            tracing::error!(user_id = %identity.user_id, error = %e, "Subscription lookup failed");
            error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "LOOKUP_ERROR",
                "Could not load subscription",
            )
        })?;

    let has_access = subscription.as_ref().is_some_and(|s| s.grants_access());

    Ok(Json(SubscriptionResponse {
        has_access,
        subscription: subscription.map(|s| SubscriptionInfo {
            status: s.status.to_string(),
            price_id: s.price_id,
            current_period_end: s.current_period_end.map(|t| t.to_rfc3339()),
            trial_end: s.trial_end.map(|t| t.to_rfc3339()),
            cancel_at_period_end: s.cancel_at_period_end,
        }),
    }))
}

/// Stripe webhook endpoint
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, HandlerError> {
    let secret = state.config.stripe_webhook_secret.as_ref().ok_or_else(|| {
        error(
            StatusCode::SERVICE_UNAVAILABLE,
            "PAYMENTS_DISABLED",
            "Payments not configured",
        )
    })?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            error(
                StatusCode::BAD_REQUEST,
                "MISSING_SIGNATURE",
                "Missing Stripe signature",
            )
        })?;

    let handler = WebhookHandler::new(state.subscriptions.clone());

    let event = handler.parse_event(&body, signature, secret).map_err(|e| {
        tracing::warn!(error = %e, "Webhook signature failed");
        error(StatusCode::BAD_REQUEST, "INVALID_SIGNATURE", "Invalid signature")
    })?;

    handler.handle(event).await.map_err(|e| {
        tracing::error!(error = %e, "Webhook processing error");
        error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "WEBHOOK_ERROR",
            "Webhook processing failed",
        )
    })?;

    Ok(StatusCode::OK)
}

/// Protected area stub; the gate has already vouched for the request
pub async fn dashboard() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "workspace": "pitchhub",
        "message": "Proposal workspace",
    }))
}
