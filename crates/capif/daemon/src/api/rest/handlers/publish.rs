//! Publish service API handlers

use crate::api::rest::extract::Json;
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use capif_types::{ApiId, FunctionId, PublishedApi, ServiceApiDescription, ServiceApiPatch};

/// List the APIs published by a publisher function
pub async fn list_service_apis(
    State(state): State<AppState>,
    Path(apf_id): Path<String>,
) -> ApiResult<Json<Vec<PublishedApi>>> {
    let apis = state.core.list_service_apis(&FunctionId::new(apf_id))?;
    Ok(Json(apis))
}

/// Publish a service API
pub async fn publish_service_api(
    State(state): State<AppState>,
    Path(apf_id): Path<String>,
    Json(description): Json<ServiceApiDescription>,
) -> ApiResult<impl IntoResponse> {
    let api = state
        .core
        .publish(&FunctionId::new(apf_id), description)
        .await?;
    let location = format!(
        "/published-apis/v1/{}/service-apis/{}",
        api.publisher, api.api_id
    );

    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(api)))
}

/// Get one of the publisher's APIs
pub async fn get_service_api(
    State(state): State<AppState>,
    Path((apf_id, api_id)): Path<(String, String)>,
) -> ApiResult<Json<PublishedApi>> {
    let api = state
        .core
        .get_service_api(&FunctionId::new(apf_id), &ApiId::new(api_id))?;
    Ok(Json(api))
}

/// Patch one of the publisher's APIs
pub async fn update_service_api(
    State(state): State<AppState>,
    Path((apf_id, api_id)): Path<(String, String)>,
    Json(patch): Json<ServiceApiPatch>,
) -> ApiResult<Json<PublishedApi>> {
    let api = state
        .core
        .update_service_api(&FunctionId::new(apf_id), &ApiId::new(api_id), patch)
        .await?;
    Ok(Json(api))
}

/// Withdraw one of the publisher's APIs
pub async fn unpublish_service_api(
    State(state): State<AppState>,
    Path((apf_id, api_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state
        .core
        .unpublish(&FunctionId::new(apf_id), &ApiId::new(api_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
