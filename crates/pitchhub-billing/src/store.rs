//! Subscription Storage
//!
//! Subscription records are written exclusively by the webhook handler;
//! the gate and the verifier only read them. `has_access` is a single
//! lookup over the access status set, not one query per status.

use std::collections::HashMap;
use std::sync::RwLock;

use pitchhub_core::{Subscription, UserId};

use crate::error::Result;

/// Subscription storage trait
pub trait SubscriptionStore: Send + Sync {
    /// Save or update a subscription record
    fn upsert(&self, subscription: &Subscription) -> Result<()>;

    /// Get the record for a provider subscription id
    fn find_by_subscription(&self, subscription_id: &str) -> Result<Option<Subscription>>;

    /// Get the record for a user
    fn find_for_user(&self, user_id: &UserId) -> Result<Option<Subscription>>;

    /// Whether the user has a record in a status that grants access
    fn has_access(&self, user_id: &UserId) -> Result<bool>;
}

/// In-memory subscription store (for development)
pub struct MemorySubscriptionStore {
    by_user: RwLock<HashMap<UserId, Subscription>>,
    by_subscription: RwLock<HashMap<String, UserId>>,
}

impl Default for MemorySubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self {
            by_user: RwLock::new(HashMap::new()),
            by_subscription: RwLock::new(HashMap::new()),
        }
    }
}

impl SubscriptionStore for MemorySubscriptionStore {
    fn upsert(&self, subscription: &Subscription) -> Result<()> {
        let mut by_user = self.by_user.write().unwrap();
        let mut by_sub = self.by_subscription.write().unwrap();

        by_sub.insert(
            subscription.subscription_id.clone(),
            subscription.user_id.clone(),
        );
        by_user.insert(subscription.user_id.clone(), subscription.clone());

        Ok(())
    }

    fn find_by_subscription(&self, subscription_id: &str) -> Result<Option<Subscription>> {
        let by_sub = self.by_subscription.read().unwrap();
        let by_user = self.by_user.read().unwrap();

        if let Some(user_id) = by_sub.get(subscription_id) {
            Ok(by_user.get(user_id).cloned())
        } else {
            Ok(None)
        }
    }

    fn find_for_user(&self, user_id: &UserId) -> Result<Option<Subscription>> {
        let by_user = self.by_user.read().unwrap();
        Ok(by_user.get(user_id).cloned())
    }

    fn has_access(&self, user_id: &UserId) -> Result<bool> {
        let by_user = self.by_user.read().unwrap();
        Ok(by_user
            .get(user_id)
            .is_some_and(Subscription::grants_access))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitchhub_core::SubscriptionStatus;

    fn record(status: SubscriptionStatus) -> Subscription {
        Subscription::new(UserId::new("usr_1"), "sub_123", status)
    }

    #[test]
    fn test_has_access_for_active_and_trialing() {
        let store = MemorySubscriptionStore::new();
        let user = UserId::new("usr_1");

        store.upsert(&record(SubscriptionStatus::Active)).unwrap();
        assert!(store.has_access(&user).unwrap());

        store.upsert(&record(SubscriptionStatus::Trialing)).unwrap();
        assert!(store.has_access(&user).unwrap());

        store.upsert(&record(SubscriptionStatus::Canceled)).unwrap();
        assert!(!store.has_access(&user).unwrap());
    }

    #[test]
    fn test_no_record_means_no_access() {
        let store = MemorySubscriptionStore::new();
        assert!(!store.has_access(&UserId::new("usr_unknown")).unwrap());
    }

    #[test]
    fn test_find_by_subscription_id() {
        let store = MemorySubscriptionStore::new();
        store.upsert(&record(SubscriptionStatus::Active)).unwrap();

        let found = store.find_by_subscription("sub_123").unwrap().unwrap();
        assert_eq!(found.user_id, UserId::new("usr_1"));
        assert!(store.find_by_subscription("sub_other").unwrap().is_none());
    }

    #[test]
    fn test_upsert_overwrites_status() {
        let store = MemorySubscriptionStore::new();
        store.upsert(&record(SubscriptionStatus::Trialing)).unwrap();
        store.upsert(&record(SubscriptionStatus::PastDue)).unwrap();

        let found = store.find_for_user(&UserId::new("usr_1")).unwrap().unwrap();
        assert_eq!(found.status, SubscriptionStatus::PastDue);
    }
}
