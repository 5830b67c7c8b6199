//! User identity types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque user identifier issued by the identity provider
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the user authenticated with the identity provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    /// Email + password sign-up
    Password,

    /// Third-party OAuth (carries the provider name, e.g. "google")
    OAuth { name: String },
}

impl AuthProvider {
    pub fn oauth(name: impl Into<String>) -> Self {
        Self::OAuth { name: name.into() }
    }
}

/// A user record
///
/// Created on first sign-in or sign-up. For OAuth users the record is also
/// created defensively by the callback handler when the provider-side
/// trigger did not fire. Never deleted by the access-control flow.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    /// Identity-provider issued id
    pub id: UserId,

    /// Email address
    pub email: String,

    /// Display name, if the provider supplied one
    pub display_name: Option<String>,

    /// Avatar URL, if the provider supplied one
    pub avatar_url: Option<String>,

    /// Sign-in method
    pub provider: AuthProvider,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user record
    pub fn new(id: UserId, email: impl Into<String>, provider: AuthProvider) -> Self {
        Self {
            id,
            email: email.into(),
            display_name: None,
            avatar_url: None,
            provider,
            created_at: Utc::now(),
        }
    }
}
