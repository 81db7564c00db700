//! Registry-change events
//!
//! The core hands every committed change to an [`EventSink`]. Subscriptions
//! are kept here; delivering notifications to subscribers is left to the
//! embedding process.

use async_trait::async_trait;
use capif_types::{
    CapifError, CapifEvent, DependencyError, EventNotification, EventSubscription, Result,
    SubscriptionId,
};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Receiver of committed registry changes
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: CapifEvent) -> std::result::Result<(), DependencyError>;
}

/// Sink fanning events out over a broadcast channel
#[derive(Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<CapifEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CapifEvent> {
        self.tx.subscribe()
    }

    pub fn sender(&self) -> broadcast::Sender<CapifEvent> {
        self.tx.clone()
    }
}

#[async_trait]
impl EventSink for BroadcastEventSink {
    async fn publish(&self, event: CapifEvent) -> std::result::Result<(), DependencyError> {
        // No receivers just means nobody listens yet
        if let Err(broadcast::error::SendError(event)) = self.tx.send(event) {
            debug!(event_id = %event.event_id, kind = %event.kind, "Event dropped, no receivers");
        }
        Ok(())
    }
}

struct SubscriptionEntry {
    subscriber_id: String,
    subscription: EventSubscription,
}

/// Event subscriptions keyed by subscription id
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: RwLock<IndexMap<SubscriptionId, SubscriptionEntry>>,
    sequence: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        subscriber_id: &str,
        subscription: EventSubscription,
    ) -> Result<SubscriptionId> {
        if subscriber_id.trim().is_empty() {
            return Err(CapifError::validation("subscriber id must not be blank"));
        }
        subscription.validate()?;

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let subscription_id = SubscriptionId::for_subscriber(subscriber_id, sequence);
        self.subscriptions.write().insert(
            subscription_id.clone(),
            SubscriptionEntry {
                subscriber_id: subscriber_id.to_string(),
                subscription,
            },
        );

        info!(
            subscriber_id = %subscriber_id,
            subscription_id = %subscription_id,
            "Event subscription created"
        );
        Ok(subscription_id)
    }

    pub fn unsubscribe(&self, subscriber_id: &str, subscription_id: &SubscriptionId) -> Result<()> {
        let mut subscriptions = self.subscriptions.write();
        let owned = subscriptions
            .get(subscription_id)
            .is_some_and(|entry| entry.subscriber_id == subscriber_id);
        if !owned {
            return Err(CapifError::not_found(format!(
                "subscription {} of {}",
                subscription_id, subscriber_id
            )));
        }
        subscriptions.shift_remove(subscription_id);
        drop(subscriptions);

        info!(subscription_id = %subscription_id, "Event subscription removed");
        Ok(())
    }

    pub fn get(&self, subscription_id: &SubscriptionId) -> Option<EventSubscription> {
        self.subscriptions
            .read()
            .get(subscription_id)
            .map(|entry| entry.subscription.clone())
    }

    pub fn len(&self) -> usize {
        self.subscriptions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notifications owed for an event, with their destinations
    pub fn notifications_for(&self, event: &CapifEvent) -> Vec<(String, EventNotification)> {
        self.subscriptions
            .read()
            .iter()
            .filter(|(_, entry)| entry.subscription.matches(event))
            .map(|(id, entry)| {
                (
                    entry.subscription.notification_destination.clone(),
                    EventNotification::new(id.clone(), event),
                )
            })
            .collect()
    }
}
