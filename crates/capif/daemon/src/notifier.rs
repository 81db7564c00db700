//! Event notification delivery
//!
//! Listens on the core's event channel and PUTs each matching notification
//! to its subscription's destination. Deliveries for one event run
//! concurrently; failures are logged and not retried.

use crate::error::{DaemonError, DaemonResult};
use capif_registry::CapifCore;
use capif_types::{CapifEvent, Collaborator, DependencyError, EventNotification};
use futures::future::join_all;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Delivers notifications for registry events
pub struct Notifier {
    core: Arc<CapifCore>,
    client: Client,
}

impl Notifier {
    pub fn new(core: Arc<CapifCore>, delivery_timeout: Duration) -> DaemonResult<Self> {
        let client = Client::builder()
            .timeout(delivery_timeout)
            .build()
            .map_err(|e| DaemonError::Server(format!("notification client: {}", e)))?;

        Ok(Self { core, client })
    }

    /// Deliver until the event channel closes
    pub async fn run(self, mut events: broadcast::Receiver<CapifEvent>) {
        info!("Event notifier started");
        loop {
            match events.recv().await {
                Ok(event) => {
                    self.dispatch(&event).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event notifier lagged, notifications dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        info!("Event notifier stopped");
    }

    /// Deliver one event to every matching subscription, returning the
    /// number of successful deliveries
    pub async fn dispatch(&self, event: &CapifEvent) -> usize {
        let notifications = self.core.subscriptions().notifications_for(event);
        if notifications.is_empty() {
            return 0;
        }

        let deliveries = notifications
            .iter()
            .map(|(destination, notification)| self.deliver(destination, notification));
        let results = join_all(deliveries).await;

        let mut delivered = 0;
        for ((destination, notification), result) in notifications.iter().zip(results) {
            match result {
                Ok(()) => {
                    delivered += 1;
                    debug!(
                        subscription_id = %notification.subscription_id,
                        event_id = %notification.event_id,
                        "Notification delivered"
                    );
                }
                Err(e) => {
                    warn!(
                        subscription_id = %notification.subscription_id,
                        destination = %destination,
                        error = %e,
                        "Notification delivery failed"
                    );
                }
            }
        }
        delivered
    }

    async fn deliver(
        &self,
        destination: &str,
        notification: &EventNotification,
    ) -> Result<(), DependencyError> {
        let response = self
            .client
            .put(destination)
            .json(notification)
            .send()
            .await
            .map_err(|e| DependencyError::new(Collaborator::EventNotification, e.to_string()))?;

        if !response.status().is_success() {
            return Err(DependencyError::new(
                Collaborator::EventNotification,
                format!("destination answered {}", response.status()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::put, Json, Router};
    use capif_types::{ApiInvokerId, CapifEventKind, EventSubscription};
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    type Received = Arc<Mutex<Vec<EventNotification>>>;

    async fn receiver() -> (String, Received) {
        async fn record(
            State(received): State<Received>,
            Json(notification): Json<EventNotification>,
        ) -> StatusCode {
            received.lock().await.push(notification);
            StatusCode::NO_CONTENT
        }

        let received = Received::default();
        let app = Router::new()
            .route("/notify", put(record))
            .route("/broken", put(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .with_state(received.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), received)
    }

    #[tokio::test]
    async fn test_dispatch_delivers_matching_notifications() {
        let (base, received) = receiver().await;
        let core = Arc::new(CapifCore::default());
        let subscription_id = core
            .subscribe(
                "subscriber",
                EventSubscription::new(
                    vec![CapifEventKind::ApiInvokerOnboarded],
                    format!("{}/notify", base),
                ),
            )
            .unwrap();
        core.subscribe(
            "other",
            EventSubscription::new(
                vec![CapifEventKind::ServiceApiAvailable],
                format!("{}/notify", base),
            ),
        )
        .unwrap();

        let notifier = Notifier::new(core, Duration::from_secs(2)).unwrap();
        let event = CapifEvent::invoker_onboarded(&ApiInvokerId::new("api_invoker_id_1"));
        assert_eq!(notifier.dispatch(&event).await, 1);

        let received = received.lock().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].subscription_id, subscription_id);
        assert_eq!(received[0].event_id, event.event_id);
    }

    #[tokio::test]
    async fn test_failed_delivery_is_not_counted() {
        let (base, received) = receiver().await;
        let core = Arc::new(CapifCore::default());
        for path in ["broken", "notify"] {
            core.subscribe(
                path,
                EventSubscription::new(
                    vec![CapifEventKind::ApiInvokerOffboarded],
                    format!("{}/{}", base, path),
                ),
            )
            .unwrap();
        }

        let notifier = Notifier::new(core, Duration::from_secs(2)).unwrap();
        let event = CapifEvent::invoker_offboarded(&ApiInvokerId::new("api_invoker_id_1"));
        assert_eq!(notifier.dispatch(&event).await, 1);
        assert_eq!(received.lock().await.len(), 1);
    }
}
