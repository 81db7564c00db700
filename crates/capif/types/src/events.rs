//! Registry-change events and subscriptions

use crate::error::{CapifError, Result};
use crate::features::SupportedFeatures;
use crate::ids::{ApiId, ApiInvokerId, FunctionId, SubscriptionId};
use crate::service_api::PublishedApi;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;
use uuid::Uuid;

/// Kinds of registry-change events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapifEventKind {
    ServiceApiAvailable,
    ServiceApiUnavailable,
    ServiceApiUpdate,
    ApiInvokerOnboarded,
    ApiInvokerOffboarded,
    ApiInvokerUpdated,
    ApiInvokerAuthorizationRevoked,
}

impl fmt::Display for CapifEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CapifEventKind::ServiceApiAvailable => "SERVICE_API_AVAILABLE",
            CapifEventKind::ServiceApiUnavailable => "SERVICE_API_UNAVAILABLE",
            CapifEventKind::ServiceApiUpdate => "SERVICE_API_UPDATE",
            CapifEventKind::ApiInvokerOnboarded => "API_INVOKER_ONBOARDED",
            CapifEventKind::ApiInvokerOffboarded => "API_INVOKER_OFFBOARDED",
            CapifEventKind::ApiInvokerUpdated => "API_INVOKER_UPDATED",
            CapifEventKind::ApiInvokerAuthorizationRevoked => "API_INVOKER_AUTHORIZATION_REVOKED",
        };
        f.write_str(name)
    }
}

/// Ids an event refers to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetail {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_ids: Vec<ApiId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_invoker_ids: Vec<ApiInvokerId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aef_ids: Vec<FunctionId>,
}

/// A committed registry change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapifEvent {
    pub event_id: Uuid,
    pub kind: CapifEventKind,
    pub timestamp: DateTime<Utc>,
    pub detail: EventDetail,
}

impl CapifEvent {
    pub fn new(kind: CapifEventKind, detail: EventDetail) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
            detail,
        }
    }

    fn for_api(kind: CapifEventKind, api: &PublishedApi) -> Self {
        Self::new(
            kind,
            EventDetail {
                api_ids: vec![api.api_id.clone()],
                aef_ids: api.description.aef_ids().cloned().collect(),
                ..Default::default()
            },
        )
    }

    fn for_invoker(kind: CapifEventKind, api_invoker_id: &ApiInvokerId) -> Self {
        Self::new(
            kind,
            EventDetail {
                api_invoker_ids: vec![api_invoker_id.clone()],
                ..Default::default()
            },
        )
    }

    pub fn service_api_available(api: &PublishedApi) -> Self {
        Self::for_api(CapifEventKind::ServiceApiAvailable, api)
    }

    pub fn service_api_unavailable(api: &PublishedApi) -> Self {
        Self::for_api(CapifEventKind::ServiceApiUnavailable, api)
    }

    pub fn service_api_update(api: &PublishedApi) -> Self {
        Self::for_api(CapifEventKind::ServiceApiUpdate, api)
    }

    pub fn invoker_onboarded(api_invoker_id: &ApiInvokerId) -> Self {
        Self::for_invoker(CapifEventKind::ApiInvokerOnboarded, api_invoker_id)
    }

    pub fn invoker_offboarded(api_invoker_id: &ApiInvokerId) -> Self {
        Self::for_invoker(CapifEventKind::ApiInvokerOffboarded, api_invoker_id)
    }

    pub fn invoker_updated(api_invoker_id: &ApiInvokerId) -> Self {
        Self::for_invoker(CapifEventKind::ApiInvokerUpdated, api_invoker_id)
    }

    pub fn authorization_revoked(
        api_invoker_id: &ApiInvokerId,
        api_ids: Vec<ApiId>,
        aef_ids: Vec<FunctionId>,
    ) -> Self {
        Self::new(
            CapifEventKind::ApiInvokerAuthorizationRevoked,
            EventDetail {
                api_ids,
                api_invoker_ids: vec![api_invoker_id.clone()],
                aef_ids,
            },
        )
    }
}

/// Narrows a subscription to events about specific ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_ids: Vec<ApiId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_invoker_ids: Vec<ApiInvokerId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aef_ids: Vec<FunctionId>,
}

impl EventFilter {
    /// An empty id list accepts anything; a non-empty one must contain every
    /// corresponding id of the event
    pub fn accepts(&self, detail: &EventDetail) -> bool {
        fn all_listed<T: PartialEq>(allowed: &[T], ids: &[T]) -> bool {
            allowed.is_empty() || ids.iter().all(|id| allowed.contains(id))
        }

        all_listed(&self.api_ids, &detail.api_ids)
            && all_listed(&self.api_invoker_ids, &detail.api_invoker_ids)
            && all_listed(&self.aef_ids, &detail.aef_ids)
    }
}

/// Subscription request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSubscription {
    pub events: Vec<CapifEventKind>,
    pub notification_destination: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_filters: Vec<EventFilter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_features: Option<SupportedFeatures>,
}

impl EventSubscription {
    pub fn new(events: Vec<CapifEventKind>, notification_destination: impl Into<String>) -> Self {
        Self {
            events,
            notification_destination: notification_destination.into(),
            event_filters: Vec::new(),
            supported_features: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.events.is_empty() {
            return Err(CapifError::validation(
                "subscription must name at least one event",
            ));
        }
        Url::parse(&self.notification_destination).map_err(|e| {
            CapifError::validation(format!(
                "invalid notification destination '{}': {}",
                self.notification_destination, e
            ))
        })?;
        Ok(())
    }

    pub fn matches(&self, event: &CapifEvent) -> bool {
        self.events.contains(&event.kind)
            && self
                .event_filters
                .iter()
                .all(|filter| filter.accepts(&event.detail))
    }
}

/// Payload delivered to a subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventNotification {
    pub subscription_id: SubscriptionId,
    pub events: CapifEventKind,
    pub event_detail: EventDetail,
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl EventNotification {
    pub fn new(subscription_id: SubscriptionId, event: &CapifEvent) -> Self {
        Self {
            subscription_id,
            events: event.kind,
            event_detail: event.detail.clone(),
            event_id: event.event_id,
            timestamp: event.timestamp,
        }
    }
}
