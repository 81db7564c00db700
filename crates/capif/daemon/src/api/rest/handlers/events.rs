//! CAPIF events handlers

use crate::api::rest::extract::Json;
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use capif_types::{EventSubscription, SubscriptionId};

/// Create an event subscription
pub async fn subscribe(
    State(state): State<AppState>,
    Path(subscriber_id): Path<String>,
    Json(subscription): Json<EventSubscription>,
) -> ApiResult<impl IntoResponse> {
    let subscription_id = state
        .core
        .subscribe(&subscriber_id, subscription.clone())?;
    let location = format!(
        "/capif-events/v1/{}/subscriptions/{}",
        subscriber_id, subscription_id
    );

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(subscription),
    ))
}

/// Delete an event subscription
pub async fn unsubscribe(
    State(state): State<AppState>,
    Path((subscriber_id, subscription_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state
        .core
        .unsubscribe(&subscriber_id, &SubscriptionId::new(subscription_id))?;
    Ok(StatusCode::NO_CONTENT)
}
