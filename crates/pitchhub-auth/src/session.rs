//! Session Resolution
//!
//! Wraps the identity provider's cookie/token verification contract:
//! `resolve(token) -> identity | none`.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use pitchhub_core::{AuthProvider, UserId};

use crate::error::Result;

/// Authenticated identity resolved from a session token
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Identity {
    /// Identity-provider issued user id
    pub user_id: UserId,

    /// Email address
    pub email: String,

    /// Display name, if the provider supplied one
    pub display_name: Option<String>,

    /// Avatar URL, if the provider supplied one
    pub avatar_url: Option<String>,

    /// Sign-in method
    pub provider: AuthProvider,
}

impl Identity {
    /// Create an identity with only the required fields set
    pub fn new(user_id: UserId, email: impl Into<String>, provider: AuthProvider) -> Self {
        Self {
            user_id,
            email: email.into(),
            display_name: None,
            avatar_url: None,
            provider,
        }
    }
}

/// Session resolution trait
///
/// `Ok(None)` means "no valid session" (missing, expired, or revoked);
/// `Err` is reserved for the provider itself failing.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// Resolve a session token to an identity
    async fn resolve(&self, token: &str) -> Result<Option<Identity>>;
}

/// In-memory session resolver (for development and tests)
///
/// Issues opaque tokens and resolves them from a local table. The password
/// sign-in handler uses this in dev mode; production delegates to
/// [`crate::RemoteSessionResolver`].
pub struct MemorySessionResolver {
    sessions: RwLock<HashMap<String, Identity>>,
}

impl Default for MemorySessionResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionResolver {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Issue a new session token for an identity
    pub fn issue(&self, identity: Identity) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let mut sessions = self.sessions.write().unwrap();
        sessions.insert(token.clone(), identity);
        token
    }

    /// Revoke a session token
    pub fn revoke(&self, token: &str) {
        let mut sessions = self.sessions.write().unwrap();
        sessions.remove(token);
    }
}

#[async_trait]
impl SessionResolver for MemorySessionResolver {
    async fn resolve(&self, token: &str) -> Result<Option<Identity>> {
        let sessions = self.sessions.read().unwrap();
        Ok(sessions.get(token).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity::new(UserId::new("usr_1"), "owner@agency.test", AuthProvider::Password)
    }

    #[tokio::test]
    async fn test_issue_and_resolve() {
        let resolver = MemorySessionResolver::new();
        let token = resolver.issue(identity());

        let resolved = resolver.resolve(&token).await.unwrap().unwrap();
        assert_eq!(resolved.user_id, UserId::new("usr_1"));
    }

    #[tokio::test]
    async fn test_unknown_token_resolves_to_none() {
        let resolver = MemorySessionResolver::new();
        assert!(resolver.resolve("bogus").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoked_token_resolves_to_none() {
        let resolver = MemorySessionResolver::new();
        let token = resolver.issue(identity());
        resolver.revoke(&token);
        assert!(resolver.resolve(&token).await.unwrap().is_none());
    }
}
