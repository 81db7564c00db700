//! API invoker management handlers

use crate::api::rest::extract::Json;
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use capif_types::{ApiInvokerId, GrantedApi, InvokerEnrolment, InvokerIdentity, InvokerPatch};

/// Onboard an invoker
pub async fn onboard_invoker(
    State(state): State<AppState>,
    Json(enrolment): Json<InvokerEnrolment>,
) -> ApiResult<impl IntoResponse> {
    let onboarded = state.core.onboard_invoker(enrolment).await?;
    let location = format!(
        "/api-invoker-management/v1/onboardedInvokers/{}",
        onboarded.identity.onboarding_id()
    );

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(onboarded),
    ))
}

/// Get an onboarded invoker
pub async fn get_invoker(
    State(state): State<AppState>,
    Path(onboarding_id): Path<String>,
) -> ApiResult<Json<InvokerIdentity>> {
    let identity = state.core.get_invoker(&ApiInvokerId::new(onboarding_id))?;
    Ok(Json(identity))
}

/// Update an onboarded invoker
pub async fn update_invoker(
    State(state): State<AppState>,
    Path(onboarding_id): Path<String>,
    Json(patch): Json<InvokerPatch>,
) -> ApiResult<Json<InvokerIdentity>> {
    let identity = state
        .core
        .update_invoker(&ApiInvokerId::new(onboarding_id), patch)
        .await?;
    Ok(Json(identity))
}

/// Offboard an invoker
pub async fn offboard_invoker(
    State(state): State<AppState>,
    Path(onboarding_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .core
        .deregister_invoker(&ApiInvokerId::new(onboarding_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List an invoker's granted API tuples
pub async fn list_grants(
    State(state): State<AppState>,
    Path(onboarding_id): Path<String>,
) -> ApiResult<Json<Vec<GrantedApi>>> {
    let grants = state
        .core
        .list_granted_apis(&ApiInvokerId::new(onboarding_id))?;
    Ok(Json(grants))
}

/// Grant an API tuple to an invoker
pub async fn add_grant(
    State(state): State<AppState>,
    Path(onboarding_id): Path<String>,
    Json(grant): Json<GrantedApi>,
) -> ApiResult<StatusCode> {
    state
        .core
        .grant(&ApiInvokerId::new(onboarding_id), grant)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove an API tuple from an invoker's grants
pub async fn remove_grant(
    State(state): State<AppState>,
    Path(onboarding_id): Path<String>,
    Json(grant): Json<GrantedApi>,
) -> ApiResult<StatusCode> {
    state
        .core
        .remove_grant(&ApiInvokerId::new(onboarding_id), &grant)?;
    Ok(StatusCode::NO_CONTENT)
}
