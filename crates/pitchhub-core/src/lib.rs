//! # pitchhub-core
//!
//! Core domain types for PitchHub: user identity, subscription records,
//! plan tiers, and the route-gate decision logic shared by the HTTP layer.
//!
//! Everything here is pure data and pure functions. Session resolution,
//! persistence, and payment-provider calls live in `pitchhub-auth` and
//! `pitchhub-billing`; this crate only defines what those collaborators
//! agree on.

pub mod gate;
mod subscription;
mod user;

pub use gate::{CheckoutReturnParams, GateDecision, decide, redirect_url};
pub use subscription::{Plan, Subscription, SubscriptionStatus};
pub use user::{AuthProvider, User, UserId};
