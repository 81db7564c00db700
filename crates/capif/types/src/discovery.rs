//! Discovery filter criteria

use crate::features::SupportedFeatures;
use crate::ids::FunctionId;
use crate::service_api::{AefLocation, AefProfile, CommType, DataFormat, Protocol, PublishedApi};
use serde::{Deserialize, Serialize};

/// Criteria applied to published APIs.
///
/// Api-level criteria (name, category, version, communication type, features)
/// are checked against the API as a whole. Profile-level criteria (aef id,
/// protocol, data format, location) must all hold for at least one AEF
/// profile. Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApiCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comm_type: Option<CommType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aef_id: Option<FunctionId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_format: Option<DataFormat>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_cat: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_aef_loc: Option<AefLocation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_features: Option<SupportedFeatures>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_supported_features: Option<SupportedFeatures>,
}

impl ApiCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_name(mut self, name: impl Into<String>) -> Self {
        self.api_name = Some(name.into());
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn aef_id(mut self, aef_id: impl Into<FunctionId>) -> Self {
        self.aef_id = Some(aef_id.into());
        self
    }

    pub fn supported_features(mut self, features: SupportedFeatures) -> Self {
        self.supported_features = Some(features);
        self
    }

    /// Api-level criteria
    pub fn matches_api(&self, api: &PublishedApi) -> bool {
        let description = &api.description;

        if let Some(name) = &self.api_name {
            if name != &description.api_name {
                return false;
            }
        }
        if let Some(category) = &self.api_cat {
            if description.service_api_category.as_ref() != Some(category) {
                return false;
            }
        }

        let version_ok = match (&self.api_version, self.comm_type) {
            (Some(wanted), comm_type) => api.version(wanted).is_some_and(|version| {
                comm_type.map_or(true, |ct| version.supports_comm_type(ct))
            }),
            (None, Some(comm_type)) => description
                .versions
                .iter()
                .any(|version| version.supports_comm_type(comm_type)),
            (None, None) => true,
        };
        if !version_ok {
            return false;
        }

        features_ok(
            description.supported_features.as_ref(),
            self.supported_features.as_ref(),
        ) && features_ok(
            description.api_supp_feats.as_ref(),
            self.api_supported_features.as_ref(),
        )
    }

    /// Profile-level criteria
    pub fn matches_profile(&self, profile: &AefProfile) -> bool {
        if let Some(aef_id) = &self.aef_id {
            if aef_id != &profile.aef_id {
                return false;
            }
        }
        if let Some(protocol) = self.protocol {
            if profile.protocol != Some(protocol) {
                return false;
            }
        }
        if let Some(data_format) = self.data_format {
            if profile.data_format != Some(data_format) {
                return false;
            }
        }
        if let Some(preferred) = &self.preferred_aef_loc {
            match &profile.aef_location {
                Some(location) if location.satisfies(preferred) => {}
                _ => return false,
            }
        }
        true
    }
}

/// An API that advertises nothing covers only an empty request
fn features_ok(
    advertised: Option<&SupportedFeatures>,
    requested: Option<&SupportedFeatures>,
) -> bool {
    match (advertised, requested) {
        (_, None) => true,
        (Some(advertised), Some(requested)) => advertised.covers(requested),
        (None, Some(requested)) => requested.is_empty(),
    }
}
