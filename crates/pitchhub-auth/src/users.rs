//! User Records
//!
//! Storage for `User` rows plus the defensive creation path used by the
//! OAuth callback: when the provider-side trigger did not create the row,
//! the callback creates it from the resolved identity.

use std::collections::HashMap;
use std::sync::RwLock;

use pitchhub_core::{User, UserId};

use crate::error::Result;
use crate::session::Identity;

/// User storage trait
pub trait UserStore: Send + Sync {
    /// Get a user by id
    fn get(&self, id: &UserId) -> Result<Option<User>>;

    /// Save or update a user
    fn upsert(&self, user: &User) -> Result<()>;
}

/// In-memory user store (for development)
pub struct MemoryUserStore {
    users: RwLock<HashMap<UserId, User>>,
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }
}

impl UserStore for MemoryUserStore {
    fn get(&self, id: &UserId) -> Result<Option<User>> {
        let users = self.users.read().unwrap();
        Ok(users.get(id).cloned())
    }

    fn upsert(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().unwrap();
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }
}

/// Ensure a user record exists for a resolved identity.
///
/// Returns the existing record when present; otherwise creates one from the
/// identity. Existing records are never overwritten here.
pub fn ensure_user<S: UserStore + ?Sized>(store: &S, identity: &Identity) -> Result<User> {
    if let Some(existing) = store.get(&identity.user_id)? {
        return Ok(existing);
    }

    let mut user = User::new(
        identity.user_id.clone(),
        identity.email.clone(),
        identity.provider.clone(),
    );
    user.display_name = identity.display_name.clone();
    user.avatar_url = identity.avatar_url.clone();

    store.upsert(&user)?;

    tracing::info!(
        user_id = %user.id,
        email = %user.email,
        "Created missing user record at sign-in"
    );

    Ok(user)
}
