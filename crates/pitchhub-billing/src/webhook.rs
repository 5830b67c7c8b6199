//! Stripe Webhook Handling
//!
//! The webhook handler is the sole writer of subscription records. It reacts
//! to the provider's subscription lifecycle events; the user-facing request
//! path never writes these records synchronously.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use stripe::{Event, EventObject, EventType, Webhook};

use pitchhub_core::{Subscription, SubscriptionStatus, UserId};

use crate::error::{BillingError, Result};
use crate::store::SubscriptionStore;

/// Parsed webhook event
#[derive(Clone, Debug)]
pub enum WebhookEvent {
    /// Hosted checkout completed; the initial subscription record is written
    CheckoutCompleted {
        session_id: String,
        subscription_id: String,
        user_id: Option<UserId>,
        customer_email: Option<String>,
    },

    /// Subscription created or updated; status/period fields change
    SubscriptionChanged {
        subscription_id: String,
        status: SubscriptionStatus,
    },

    /// Subscription deleted; the record flips to canceled
    SubscriptionDeleted { subscription_id: String },

    /// A renewal payment failed; the provider follows up with a status change
    PaymentFailed {
        subscription_id: Option<String>,
        customer_email: Option<String>,
    },

    /// Unhandled event type
    Other { event_type: String },
}

/// Webhook handler
pub struct WebhookHandler<S: SubscriptionStore + ?Sized> {
    store: Arc<S>,
}

impl<S: SubscriptionStore + ?Sized> WebhookHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Verify webhook signature and parse the event
    pub fn parse_event(&self, payload: &str, signature: &str, secret: &str) -> Result<Event> {
        Webhook::construct_event(payload, signature, secret)
            .map_err(|e| BillingError::WebhookSignature(e.to_string()))
    }

    /// Process a webhook event
    pub async fn handle(&self, event: Event) -> Result<WebhookEvent> {
        tracing::info!(event_type = ?event.type_, "Processing Stripe webhook");

        match event.type_ {
            EventType::CheckoutSessionCompleted => {
                let EventObject::CheckoutSession(session) = &event.data.object else {
                    return Err(BillingError::WebhookParse(
                        "Invalid checkout session data".into(),
                    ));
                };

                let metadata = session.metadata.clone().unwrap_or_default();
                let user_id = metadata
                    .get("user_id")
                    .cloned()
                    .or_else(|| session.client_reference_id.clone())
                    .map(UserId::new);
                let subscription_id = session
                    .subscription
                    .as_ref()
                    .map(|s| s.id().to_string())
                    .unwrap_or_default();

                match (&user_id, subscription_id.is_empty()) {
                    (Some(user_id), false) => {
                        let trialing = metadata.contains_key("trial_days");
                        self.apply_checkout_completed(
                            user_id,
                            &subscription_id,
                            metadata.get("price_id").cloned(),
                            serde_json::to_value(&metadata).unwrap_or_default(),
                            trialing,
                        )?;
                    }
                    _ => {
                        tracing::warn!(
                            session_id = %session.id,
                            "Checkout completed without a user or subscription to associate"
                        );
                    }
                }

                Ok(WebhookEvent::CheckoutCompleted {
                    session_id: session.id.to_string(),
                    subscription_id,
                    user_id,
                    customer_email: session.customer_email.clone(),
                })
            }

            EventType::CustomerSubscriptionCreated | EventType::CustomerSubscriptionUpdated => {
                let EventObject::Subscription(sub) = &event.data.object else {
                    return Err(BillingError::WebhookParse("Invalid subscription data".into()));
                };

                let status = SubscriptionStatus::from_str(&sub.status.to_string());

                if let Some(record) = self.record_from_provider(sub, status)? {
                    self.apply_subscription_change(&record)?;
                } else {
                    tracing::warn!(
                        subscription_id = %sub.id,
                        "Subscription event without a user to associate"
                    );
                }

                Ok(WebhookEvent::SubscriptionChanged {
                    subscription_id: sub.id.to_string(),
                    status,
                })
            }

            EventType::CustomerSubscriptionDeleted => {
                let EventObject::Subscription(sub) = &event.data.object else {
                    return Err(BillingError::WebhookParse("Invalid subscription data".into()));
                };

                self.apply_subscription_deleted(&sub.id.to_string())?;

                Ok(WebhookEvent::SubscriptionDeleted {
                    subscription_id: sub.id.to_string(),
                })
            }

            EventType::InvoicePaymentFailed => {
                let EventObject::Invoice(invoice) = &event.data.object else {
                    return Err(BillingError::WebhookParse("Invalid invoice data".into()));
                };

                let subscription_id = invoice.subscription.as_ref().map(|s| s.id().to_string());
                tracing::warn!(
                    subscription_id = ?subscription_id,
                    email = ?invoice.customer_email,
                    "Renewal payment failed; awaiting the provider's status transition"
                );

                Ok(WebhookEvent::PaymentFailed {
                    subscription_id,
                    customer_email: invoice.customer_email.clone(),
                })
            }

            _ => {
                tracing::debug!(event_type = ?event.type_, "Unhandled webhook event");
                Ok(WebhookEvent::Other {
                    event_type: format!("{:?}", event.type_),
                })
            }
        }
    }

    /// Build a full record from the provider's subscription object.
    ///
    /// The user association comes from the metadata mirrored onto the
    /// subscription at checkout; an existing record is the fallback when a
    /// subscription was created outside this flow.
    fn record_from_provider(
        &self,
        sub: &stripe::Subscription,
        status: SubscriptionStatus,
    ) -> Result<Option<Subscription>> {
        let user_id = match sub.metadata.get("user_id") {
            Some(id) => Some(UserId::new(id.clone())),
            None => self
                .store
                .find_by_subscription(&sub.id.to_string())?
                .map(|existing| existing.user_id),
        };

        let Some(user_id) = user_id else {
            return Ok(None);
        };

        let mut record = Subscription::new(user_id, sub.id.to_string(), status);
        record.current_period_start = timestamp(sub.current_period_start);
        record.current_period_end = timestamp(sub.current_period_end);
        record.trial_end = sub.trial_end.and_then(timestamp);
        record.cancel_at_period_end = sub.cancel_at_period_end;
        record.price_id = sub
            .items
            .data
            .first()
            .and_then(|item| item.price.as_ref())
            .map(|price| price.id.to_string());
        record.metadata = serde_json::to_value(&sub.metadata).unwrap_or_default();

        Ok(Some(record))
    }

    fn apply_checkout_completed(
        &self,
        user_id: &UserId,
        subscription_id: &str,
        price_id: Option<String>,
        metadata: serde_json::Value,
        trialing: bool,
    ) -> Result<()> {
        let status = if trialing {
            SubscriptionStatus::Trialing
        } else {
            SubscriptionStatus::Active
        };

        let mut record = Subscription::new(user_id.clone(), subscription_id, status);
        record.price_id = price_id;
        record.metadata = metadata;
        self.store.upsert(&record)?;

        tracing::info!(
            user_id = %user_id,
            subscription_id = %subscription_id,
            status = %status,
            "Created subscription record from completed checkout"
        );

        Ok(())
    }

    fn apply_subscription_change(&self, record: &Subscription) -> Result<()> {
        self.store.upsert(record)?;

        tracing::info!(
            user_id = %record.user_id,
            subscription_id = %record.subscription_id,
            status = %record.status,
            cancel_at_period_end = record.cancel_at_period_end,
            "Updated subscription record"
        );

        Ok(())
    }

    fn apply_subscription_deleted(&self, subscription_id: &str) -> Result<()> {
        if let Some(mut record) = self.store.find_by_subscription(subscription_id)? {
            record.status = SubscriptionStatus::Canceled;
            record.updated_at = Utc::now();
            self.store.upsert(&record)?;

            tracing::info!(
                user_id = %record.user_id,
                subscription_id = %subscription_id,
                "Subscription canceled"
            );
        } else {
            tracing::warn!(
                subscription_id = %subscription_id,
                "Cancellation for unknown subscription"
            );
        }

        Ok(())
    }
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySubscriptionStore;

    fn handler() -> (Arc<MemorySubscriptionStore>, WebhookHandler<MemorySubscriptionStore>) {
        let store = Arc::new(MemorySubscriptionStore::new());
        (store.clone(), WebhookHandler::new(store))
    }

    #[test]
    fn test_checkout_completed_writes_record() {
        let (store, handler) = handler();
        let user = UserId::new("usr_1");

        handler
            .apply_checkout_completed(
                &user,
                "sub_123",
                Some("price_1QhPitchHubStudioMo".into()),
                serde_json::json!({"user_id": "usr_1"}),
                false,
            )
            .unwrap();

        let record = store.find_for_user(&user).unwrap().unwrap();
        assert_eq!(record.status, SubscriptionStatus::Active);
        assert!(store.has_access(&user).unwrap());
    }

    #[test]
    fn test_checkout_with_trial_writes_trialing() {
        let (store, handler) = handler();
        let user = UserId::new("usr_1");

        handler
            .apply_checkout_completed(&user, "sub_123", None, serde_json::Value::Null, true)
            .unwrap();

        let record = store.find_for_user(&user).unwrap().unwrap();
        assert_eq!(record.status, SubscriptionStatus::Trialing);
        assert!(record.grants_access());
    }

    #[test]
    fn test_status_change_flips_access() {
        let (store, handler) = handler();
        let user = UserId::new("usr_1");

        handler
            .apply_checkout_completed(&user, "sub_123", None, serde_json::Value::Null, false)
            .unwrap();
        assert!(store.has_access(&user).unwrap());

        let past_due =
            Subscription::new(user.clone(), "sub_123", SubscriptionStatus::PastDue);
        handler.apply_subscription_change(&past_due).unwrap();
        assert!(!store.has_access(&user).unwrap());
    }

    #[test]
    fn test_deletion_cancels_record() {
        let (store, handler) = handler();
        let user = UserId::new("usr_1");

        handler
            .apply_checkout_completed(&user, "sub_123", None, serde_json::Value::Null, false)
            .unwrap();
        handler.apply_subscription_deleted("sub_123").unwrap();

        let record = store.find_for_user(&user).unwrap().unwrap();
        assert_eq!(record.status, SubscriptionStatus::Canceled);
        assert!(!store.has_access(&user).unwrap());
    }

    #[test]
    fn test_deletion_of_unknown_subscription_is_a_no_op() {
        let (_, handler) = handler();
        handler.apply_subscription_deleted("sub_missing").unwrap();
    }
}
