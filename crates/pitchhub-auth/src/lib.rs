//! # pitchhub-auth
//!
//! Session resolution and user records.
//!
//! The identity provider is an external collaborator: given a session token
//! from a request cookie, it either yields an authenticated identity or
//! nothing. This crate wraps that contract in the [`SessionResolver`] trait
//! with two implementations:
//!
//! * [`MemorySessionResolver`] issues and resolves opaque tokens locally,
//!   for development and tests.
//! * [`RemoteSessionResolver`] delegates to a hosted identity provider over
//!   HTTP.
//!
//! It also owns the [`UserStore`] and the defensive user creation performed
//! by the OAuth callback when the provider-side trigger did not fire.

mod error;
mod remote;
mod session;
mod users;

pub use error::{AuthError, Result};
pub use remote::RemoteSessionResolver;
pub use session::{Identity, MemorySessionResolver, SessionResolver};
pub use users::{MemoryUserStore, UserStore, ensure_user};
