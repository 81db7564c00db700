//! API provider management handlers

use crate::api::rest::extract::Json;
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use capif_types::{DomainId, DomainPatch, DomainRegistration, ProviderDomain};

/// Register a provider domain and its functions
pub async fn register_provider(
    State(state): State<AppState>,
    Json(registration): Json<DomainRegistration>,
) -> ApiResult<impl IntoResponse> {
    let domain = state.core.register_provider(registration)?;
    let location = format!(
        "/api-provider-management/v1/registrations/{}",
        domain.domain_id
    );

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(domain),
    ))
}

/// Get a registered domain
pub async fn get_provider(
    State(state): State<AppState>,
    Path(domain_id): Path<String>,
) -> ApiResult<Json<ProviderDomain>> {
    let domain = state.core.get_provider(&DomainId::new(domain_id))?;
    Ok(Json(domain))
}

/// Update a registered domain
pub async fn update_provider(
    State(state): State<AppState>,
    Path(domain_id): Path<String>,
    Json(patch): Json<DomainPatch>,
) -> ApiResult<Json<ProviderDomain>> {
    let domain = state.core.update_provider(&DomainId::new(domain_id), patch)?;
    Ok(Json(domain))
}

/// Deregister a domain, withdrawing everything its functions published
pub async fn deregister_provider(
    State(state): State<AppState>,
    Path(domain_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .core
        .deregister_provider(&DomainId::new(domain_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
