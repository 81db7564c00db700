//! Discover service API handler

use crate::api::rest::extract::Json;
use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::extract::{Query, State};
use capif_types::{
    AefLocation, ApiCriteria, ApiInvokerId, CapifError, CommType, DataFormat, DenyReason,
    FunctionId, Protocol, PublishedApi, SupportedFeatures,
};
use serde::{Deserialize, Serialize};

/// Query parameters of a discovery request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiscoverParams {
    pub api_invoker_id: Option<String>,
    pub api_name: Option<String>,
    pub api_version: Option<String>,
    pub comm_type: Option<CommType>,
    pub protocol: Option<Protocol>,
    pub aef_id: Option<String>,
    pub data_format: Option<DataFormat>,
    pub api_cat: Option<String>,
    /// JSON-encoded location
    pub preferred_aef_loc: Option<String>,
    pub supported_features: Option<String>,
    pub api_supported_features: Option<String>,
}

impl DiscoverParams {
    /// Split into the requesting invoker and the filter criteria
    pub fn into_request(self) -> ApiResult<(ApiInvokerId, ApiCriteria)> {
        let api_invoker_id = self
            .api_invoker_id
            .filter(|id| !id.trim().is_empty())
            .map(ApiInvokerId::new)
            .ok_or_else(|| ApiError::BadRequest("api-invoker-id is required".to_string()))?;

        let preferred_aef_loc = self
            .preferred_aef_loc
            .map(|raw| serde_json::from_str::<AefLocation>(&raw))
            .transpose()
            .map_err(|e| ApiError::BadRequest(format!("preferred-aef-loc: {}", e)))?;

        let criteria = ApiCriteria {
            api_name: self.api_name,
            api_version: self.api_version,
            comm_type: self.comm_type,
            protocol: self.protocol,
            aef_id: self.aef_id.map(FunctionId::new),
            data_format: self.data_format,
            api_cat: self.api_cat,
            preferred_aef_loc,
            supported_features: parse_features(self.supported_features)?,
            api_supported_features: parse_features(self.api_supported_features)?,
        };

        Ok((api_invoker_id, criteria))
    }
}

fn parse_features(raw: Option<String>) -> ApiResult<Option<SupportedFeatures>> {
    raw.map(SupportedFeatures::parse)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Discovery response
#[derive(Debug, Serialize, Deserialize)]
pub struct DiscoveredApis {
    #[serde(rename = "serviceAPIDescriptions")]
    pub service_api_descriptions: Vec<PublishedApi>,
}

/// Discover the published APIs the invoker may see
pub async fn discover_service_apis(
    State(state): State<AppState>,
    Query(params): Query<DiscoverParams>,
) -> ApiResult<Json<DiscoveredApis>> {
    let (api_invoker_id, criteria) = params.into_request()?;

    let apis = state
        .core
        .discover(&api_invoker_id, &criteria)
        .map_err(|err| match err {
            CapifError::Auth(DenyReason::UnknownInvoker) => {
                ApiError::NotFound(format!("invoker {}", api_invoker_id))
            }
            other => other.into(),
        })?;

    tracing::debug!(
        api_invoker_id = %api_invoker_id,
        matched = apis.len(),
        "Discovery served"
    );

    Ok(Json(DiscoveredApis {
        service_api_descriptions: apis,
    }))
}
