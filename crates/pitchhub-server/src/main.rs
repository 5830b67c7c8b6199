//! PitchHub HTTP Server
//!
//! Axum-based server for the proposal workspace: session-gated app routes,
//! Stripe hosted checkout, post-checkout verification, and the webhook
//! endpoint that owns all subscription writes.

mod config;
mod gate;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pitchhub_auth::{
    MemorySessionResolver, MemoryUserStore, RemoteSessionResolver, SessionResolver,
};
use pitchhub_billing::{CheckoutProvider, MemorySubscriptionStore, StripeCheckoutProvider};

use crate::config::Config;
use crate::gate::route_gate;
use crate::handlers::{
    checkout_return, create_checkout, dashboard, health_check, oauth_callback, pricing_page,
    sign_in, sign_in_page, sign_out, stripe_webhook, subscription_status,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = Arc::new(Config::from_env()?);

    // Session resolution: delegate to the identity provider when one is
    // configured, otherwise run the in-memory dev resolver
    let (sessions, dev_sessions): (
        Arc<dyn SessionResolver>,
        Option<Arc<MemorySessionResolver>>,
    ) = if std::env::var("AUTH_BASE_URL").is_ok() {
        let remote = Arc::new(RemoteSessionResolver::from_env()?);
        tracing::info!("✓ Auth delegated to identity provider");
        (remote, None)
    } else {
        let memory = Arc::new(MemorySessionResolver::new());
        tracing::warn!("⚠ AUTH_BASE_URL not set - using in-memory sessions (dev mode)");
        (memory.clone(), Some(memory))
    };

    // Checkout provider
    let checkout: Option<Arc<dyn CheckoutProvider>> = match config.stripe_secret_key {
        Some(ref key) => {
            tracing::info!("✓ Stripe configured");
            if config.stripe_webhook_secret.is_none() {
                tracing::warn!("⚠ STRIPE_WEBHOOK_SECRET not set - webhook endpoint disabled");
            }
            Some(Arc::new(StripeCheckoutProvider::new(key)))
        }
        None => {
            tracing::warn!("⚠ Stripe not configured - payments disabled");
            tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
            None
        }
    };

    // Build application state
    let state = AppState {
        config: config.clone(),
        sessions,
        dev_sessions,
        users: Arc::new(MemoryUserStore::new()),
        subscriptions: Arc::new(MemorySubscriptionStore::new()),
        checkout,
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Protected routes: everything here sits behind the subscription gate
    let protected = Router::new()
        .route("/app/dashboard", get(dashboard))
        .layer(middleware::from_fn_with_state(state.clone(), route_gate));

    // Build router
    let app = Router::new()
        // Health & landing targets
        .route("/health", get(health_check))
        .route("/sign-in", get(sign_in_page))
        .route("/pricing", get(pricing_page))
        // Auth
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-out", post(sign_out))
        .route("/auth/callback", get(oauth_callback))
        // Billing
        .route("/api/checkout", post(create_checkout))
        .route("/api/checkout/return", get(checkout_return))
        .route("/api/subscription", get(subscription_status))
        .route("/webhook/stripe", post(stripe_webhook))
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 pitchhub server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health               - Health check");
    tracing::info!("  GET  /sign-in              - Sign-in landing");
    tracing::info!("  GET  /pricing              - Pricing landing");
    tracing::info!("  POST /auth/sign-in         - Dev sign-in");
    tracing::info!("  POST /auth/sign-out        - Sign out");
    tracing::info!("  GET  /auth/callback        - OAuth callback");
    tracing::info!("  POST /api/checkout         - Create Stripe checkout");
    tracing::info!("  GET  /api/checkout/return  - Post-checkout verification");
    tracing::info!("  GET  /api/subscription     - Subscription status");
    tracing::info!("  POST /webhook/stripe       - Stripe webhook");
    tracing::info!("  GET  /app/dashboard        - Gated workspace");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
