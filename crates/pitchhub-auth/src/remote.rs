//! Remote Identity Provider
//!
//! `SessionResolver` backed by a hosted auth provider's user-info endpoint.
//! The session token from the request cookie is presented as a bearer token;
//! the provider either describes the user or rejects the token.

use async_trait::async_trait;
use serde::Deserialize;

use pitchhub_core::{AuthProvider, UserId};

use crate::error::{AuthError, Result};
use crate::session::{Identity, SessionResolver};

/// Remote resolver configuration
#[derive(Clone, Debug)]
pub struct RemoteAuthConfig {
    /// Provider base URL, e.g. `https://xyz.supabase.co`
    pub base_url: String,

    /// Project API key sent alongside the bearer token, if required
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl RemoteAuthConfig {
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("AUTH_BASE_URL")
            .map_err(|_| AuthError::Config("AUTH_BASE_URL not set".into()))?;
        let api_key = std::env::var("AUTH_API_KEY").ok();

        Ok(Self {
            base_url,
            api_key,
            timeout_secs: 10,
        })
    }
}

/// `SessionResolver` delegating to a remote identity provider
pub struct RemoteSessionResolver {
    http: reqwest::Client,
    config: RemoteAuthConfig,
}

impl RemoteSessionResolver {
    /// Create from configuration
    pub fn from_config(config: RemoteAuthConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AuthError::Config(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(RemoteAuthConfig::from_env()?)
    }

    fn user_endpoint(&self) -> String {
        format!("{}/auth/v1/user", self.config.base_url.trim_end_matches('/'))
    }
}

/// Provider wire format for the user-info endpoint
#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: RemoteUserMetadata,
    #[serde(default)]
    app_metadata: RemoteAppMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct RemoteUserMetadata {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RemoteAppMetadata {
    #[serde(default)]
    provider: Option<String>,
}

impl From<RemoteUser> for Identity {
    fn from(user: RemoteUser) -> Self {
        let provider = match user.app_metadata.provider.as_deref() {
            None | Some("email") => AuthProvider::Password,
            Some(name) => AuthProvider::oauth(name),
        };

        Self {
            user_id: UserId::new(user.id),
            email: user.email.unwrap_or_default(),
            display_name: user.user_metadata.full_name,
            avatar_url: user.user_metadata.avatar_url,
            provider,
        }
    }
}

#[async_trait]
impl SessionResolver for RemoteSessionResolver {
    async fn resolve(&self, token: &str) -> Result<Option<Identity>> {
        let mut request = self
            .http
            .get(self.user_endpoint())
            .bearer_auth(token);

        if let Some(ref api_key) = self.config.api_key {
            request = request.header("apikey", api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let user: RemoteUser = response
                    .json()
                    .await
                    .map_err(|e| AuthError::Provider(e.to_string()))?;
                Ok(Some(user.into()))
            }
            // The provider rejecting the token is a normal "signed out" answer
            status if status.as_u16() == 401 || status.as_u16() == 403 => {
                tracing::debug!(status = %status, "Session token rejected by provider");
                Ok(None)
            }
            status => Err(AuthError::Provider(format!(
                "unexpected status {status} from user endpoint"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_user_maps_oauth_provider() {
        let user = RemoteUser {
            id: "usr_9".into(),
            email: Some("owner@agency.test".into()),
            user_metadata: RemoteUserMetadata {
                full_name: Some("Ada".into()),
                avatar_url: None,
            },
            app_metadata: RemoteAppMetadata {
                provider: Some("google".into()),
            },
        };

        let identity: Identity = user.into();
        assert_eq!(identity.provider, AuthProvider::oauth("google"));
        assert_eq!(identity.display_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_remote_user_email_provider_is_password() {
        let user = RemoteUser {
            id: "usr_9".into(),
            email: Some("owner@agency.test".into()),
            user_metadata: RemoteUserMetadata::default(),
            app_metadata: RemoteAppMetadata {
                provider: Some("email".into()),
            },
        };

        let identity: Identity = user.into();
        assert_eq!(identity.provider, AuthProvider::Password);
    }
}
