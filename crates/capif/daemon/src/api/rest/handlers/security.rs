//! CAPIF security handlers

use crate::api::rest::extract::Json;
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use capif_types::{AccessTuple, ApiInvokerId, DenyReason, RevocationScope, ServiceSecurity};
use serde::{Deserialize, Serialize};

/// Authorization decision for one access tuple
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckAuthenticationResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,
}

/// Decide whether an invoker may call an API version on an exposer
pub async fn check_authentication(
    State(state): State<AppState>,
    Json(tuple): Json<AccessTuple>,
) -> ApiResult<Json<CheckAuthenticationResponse>> {
    let decision = state.core.check_authentication(&tuple)?;
    Ok(Json(CheckAuthenticationResponse {
        allowed: decision.is_allowed(),
        reason: decision.reason(),
    }))
}

/// Revoke a single access tuple
pub async fn revoke_authorization(
    State(state): State<AppState>,
    Json(tuple): Json<AccessTuple>,
) -> ApiResult<StatusCode> {
    state.core.revoke_authorization(&tuple).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Revoke every grant of an invoker within a scope
pub async fn revoke_invoker_access(
    State(state): State<AppState>,
    Path(api_invoker_id): Path<String>,
    Json(scope): Json<RevocationScope>,
) -> ApiResult<StatusCode> {
    let revoked = state
        .core
        .revoke_invoker_access(&ApiInvokerId::new(api_invoker_id), scope)
        .await?;
    tracing::debug!(revoked = revoked.len(), "Trusted invoker access withdrawn");
    Ok(StatusCode::NO_CONTENT)
}

/// Which credentials a security-context read returns
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityContextParams {
    #[serde(default)]
    pub authentication_info: bool,
    #[serde(default)]
    pub authorization_info: bool,
}

/// Create or replace a trusted invoker's security context
pub async fn create_security_context(
    State(state): State<AppState>,
    Path(api_invoker_id): Path<String>,
    Json(context): Json<ServiceSecurity>,
) -> ApiResult<impl IntoResponse> {
    let api_invoker_id = ApiInvokerId::new(api_invoker_id);
    let stored = state
        .core
        .create_security_context(&api_invoker_id, context)?;
    let location = format!("/capif-security/v1/trustedInvokers/{}", api_invoker_id);

    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(stored)))
}

/// Read a trusted invoker's security context
pub async fn get_security_context(
    State(state): State<AppState>,
    Path(api_invoker_id): Path<String>,
    Query(params): Query<SecurityContextParams>,
) -> ApiResult<Json<ServiceSecurity>> {
    let context = state.core.get_security_context(
        &ApiInvokerId::new(api_invoker_id),
        params.authentication_info,
        params.authorization_info,
    )?;
    Ok(Json(context))
}

/// Replace an existing security context
pub async fn update_security_context(
    State(state): State<AppState>,
    Path(api_invoker_id): Path<String>,
    Json(context): Json<ServiceSecurity>,
) -> ApiResult<Json<ServiceSecurity>> {
    let updated = state
        .core
        .update_security_context(&ApiInvokerId::new(api_invoker_id), context)?;
    Ok(Json(updated))
}
