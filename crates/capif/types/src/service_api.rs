//! Published service API descriptions
//!
//! A [`ServiceApiDescription`] is what a publisher submits; once accepted it is
//! stored as a [`PublishedApi`] carrying the assigned id and the owning
//! publisher function.

use crate::error::{CapifError, Result};
use crate::features::SupportedFeatures;
use crate::ids::{ApiId, FunctionId};
use crate::invoker::GrantedApi;
use crate::is_blank;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Communication type of a resource or custom operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommType {
    RequestResponse,
    SubscribeNotify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "HTTP_1_1")]
    Http11,
    #[serde(rename = "HTTP_2")]
    Http2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataFormat {
    #[serde(rename = "JSON")]
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SecurityMethod {
    Psk,
    Pki,
    Oauth,
}

/// HTTP method of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// A resource exposed by an API version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub resource_name: String,
    pub comm_type: CommType,
    pub uri: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cust_op_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<Operation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A custom operation exposed by an API version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomOperation {
    pub cust_op_name: String,
    pub comm_type: CommType,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<Operation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One version of a published API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiVersion {
    pub api_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Resource>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cust_operations: Vec<CustomOperation>,
}

impl ApiVersion {
    pub fn new(api_version: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            expiry: None,
            resources: Vec::new(),
            cust_operations: Vec::new(),
        }
    }

    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// A version without expiry never expires
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| expiry < now)
    }

    pub fn supports_comm_type(&self, comm_type: CommType) -> bool {
        self.resources.iter().any(|r| r.comm_type == comm_type)
            || self.cust_operations.iter().any(|op| op.comm_type == comm_type)
    }
}

/// Location of an exposing function
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AefLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dc_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub civic_addr: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_area: Option<serde_json::Value>,
}

impl AefLocation {
    /// Every field set in `preferred` must be present and equal here
    pub fn satisfies(&self, preferred: &AefLocation) -> bool {
        fn field_ok<T: PartialEq>(have: &Option<T>, want: &Option<T>) -> bool {
            match want {
                Some(want) => have.as_ref() == Some(want),
                None => true,
            }
        }

        field_ok(&self.dc_id, &preferred.dc_id)
            && field_ok(&self.civic_addr, &preferred.civic_addr)
            && field_ok(&self.geo_area, &preferred.geo_area)
    }
}

/// Binding of an API to one exposing function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AefProfile {
    pub aef_id: FunctionId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aef_location: Option<AefLocation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_format: Option<DataFormat>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_methods: Vec<SecurityMethod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
}

impl AefProfile {
    pub fn new(aef_id: impl Into<FunctionId>) -> Self {
        Self {
            aef_id: aef_id.into(),
            aef_location: None,
            protocol: None,
            data_format: None,
            security_methods: Vec::new(),
            domain_name: None,
        }
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn with_data_format(mut self, data_format: DataFormat) -> Self {
        self.data_format = Some(data_format);
        self
    }

    pub fn with_location(mut self, location: AefLocation) -> Self {
        self.aef_location = Some(location);
        self
    }
}

/// Service API description submitted by a publisher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceApiDescription {
    pub api_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub aef_profiles: Vec<AefProfile>,

    #[serde(default)]
    pub versions: Vec<ApiVersion>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_features: Option<SupportedFeatures>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_supp_feats: Option<SupportedFeatures>,

    #[serde(
        rename = "serviceAPICategory",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub service_api_category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ccf_id: Option<String>,
}

impl ServiceApiDescription {
    pub fn new(api_name: impl Into<String>) -> Self {
        Self {
            api_name: api_name.into(),
            description: None,
            aef_profiles: Vec::new(),
            versions: Vec::new(),
            supported_features: None,
            api_supp_feats: None,
            service_api_category: None,
            ccf_id: None,
        }
    }

    pub fn with_profile(mut self, profile: AefProfile) -> Self {
        self.aef_profiles.push(profile);
        self
    }

    pub fn with_version(mut self, version: ApiVersion) -> Self {
        self.versions.push(version);
        self
    }

    pub fn with_supported_features(mut self, features: SupportedFeatures) -> Self {
        self.supported_features = Some(features);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.service_api_category = Some(category.into());
        self
    }

    /// Structural checks that need no registry lookups
    pub fn validate(&self) -> Result<()> {
        if is_blank(&self.api_name) {
            return Err(CapifError::validation("apiName must not be blank"));
        }
        validate_profiles(&self.aef_profiles)?;
        validate_versions(&self.versions)
    }

    pub fn aef_ids(&self) -> impl Iterator<Item = &FunctionId> {
        self.aef_profiles.iter().map(|p| &p.aef_id)
    }
}

fn validate_profiles(profiles: &[AefProfile]) -> Result<()> {
    if profiles.is_empty() {
        return Err(CapifError::validation(
            "a published API needs at least one AEF profile",
        ));
    }
    let mut seen = HashSet::new();
    for profile in profiles {
        if is_blank(profile.aef_id.as_str()) {
            return Err(CapifError::validation("aefId must not be blank"));
        }
        if !seen.insert(&profile.aef_id) {
            return Err(CapifError::validation(format!(
                "AEF {} is listed more than once",
                profile.aef_id
            )));
        }
    }
    Ok(())
}

fn validate_versions(versions: &[ApiVersion]) -> Result<()> {
    let mut seen = HashSet::new();
    for version in versions {
        if is_blank(&version.api_version) {
            return Err(CapifError::validation("apiVersion must not be blank"));
        }
        if !seen.insert(version.api_version.as_str()) {
            return Err(CapifError::validation(format!(
                "version {} is listed more than once",
                version.api_version
            )));
        }
    }
    Ok(())
}

/// Partial update of a published API.
///
/// Only provided fields replace stored ones; lists are replaced wholesale.
/// The api name is fixed once published: a patch may repeat it but never
/// change it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceApiPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aef_profiles: Option<Vec<AefProfile>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<Vec<ApiVersion>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_features: Option<SupportedFeatures>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_supp_feats: Option<SupportedFeatures>,

    #[serde(
        rename = "serviceAPICategory",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub service_api_category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ccf_id: Option<String>,
}

impl ServiceApiPatch {
    pub fn validate(&self) -> Result<()> {
        if self.api_name.as_deref().is_some_and(is_blank) {
            return Err(CapifError::validation("apiName must not be blank"));
        }
        if let Some(profiles) = &self.aef_profiles {
            validate_profiles(profiles)?;
        }
        if let Some(versions) = &self.versions {
            validate_versions(versions)?;
        }
        Ok(())
    }

    /// Exposer ids the patch would introduce
    pub fn aef_ids(&self) -> impl Iterator<Item = &FunctionId> {
        self.aef_profiles
            .iter()
            .flatten()
            .map(|profile| &profile.aef_id)
    }
}

/// A service API accepted into the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedApi {
    pub api_id: ApiId,

    /// Publishing function that owns this API
    #[serde(rename = "apfId")]
    pub publisher: FunctionId,

    #[serde(flatten)]
    pub description: ServiceApiDescription,

    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PublishedApi {
    pub fn new(api_id: ApiId, publisher: FunctionId, description: ServiceApiDescription) -> Self {
        let now = Utc::now();
        Self {
            api_id,
            publisher,
            description,
            published_at: now,
            updated_at: now,
        }
    }

    pub fn api_name(&self) -> &str {
        &self.description.api_name
    }

    pub fn profile(&self, aef_id: &FunctionId) -> Option<&AefProfile> {
        self.description
            .aef_profiles
            .iter()
            .find(|p| &p.aef_id == aef_id)
    }

    pub fn version(&self, api_version: &str) -> Option<&ApiVersion> {
        self.description
            .versions
            .iter()
            .find(|v| v.api_version == api_version)
    }

    pub fn exposed_by(&self, aef_id: &FunctionId) -> bool {
        self.profile(aef_id).is_some()
    }

    /// Reject a patch that would rename the API
    pub fn check_rename(&self, patch: &ServiceApiPatch) -> Result<()> {
        match patch.api_name.as_deref() {
            Some(name) if name != self.api_name() => Err(CapifError::validation(format!(
                "apiName of {} is {} and cannot be changed to {}",
                self.api_id,
                self.api_name(),
                name
            ))),
            _ => Ok(()),
        }
    }

    /// Apply a patch; the caller validates it first
    pub fn apply(&mut self, patch: ServiceApiPatch) {
        let description = &mut self.description;
        if let Some(text) = patch.description {
            description.description = Some(text);
        }
        if let Some(profiles) = patch.aef_profiles {
            description.aef_profiles = profiles;
        }
        if let Some(versions) = patch.versions {
            description.versions = versions;
        }
        if let Some(features) = patch.supported_features {
            description.supported_features = Some(features);
        }
        if let Some(features) = patch.api_supp_feats {
            description.api_supp_feats = Some(features);
        }
        if let Some(category) = patch.service_api_category {
            description.service_api_category = Some(category);
        }
        if let Some(ccf_id) = patch.ccf_id {
            description.ccf_id = Some(ccf_id);
        }
        self.updated_at = Utc::now();
    }

    /// Remove the profiles of the given exposers, returning how many went
    pub fn strip_exposers(&mut self, removed: &HashSet<FunctionId>) -> usize {
        let before = self.description.aef_profiles.len();
        self.description
            .aef_profiles
            .retain(|profile| !removed.contains(&profile.aef_id));
        let stripped = before - self.description.aef_profiles.len();
        if stripped > 0 {
            self.updated_at = Utc::now();
        }
        stripped
    }

    /// Every `(apiId, aefId, apiName, version)` combination of this API
    pub fn grantable(&self) -> Vec<GrantedApi> {
        let mut grants = Vec::new();
        for profile in &self.description.aef_profiles {
            for version in &self.description.versions {
                grants.push(GrantedApi {
                    api_id: self.api_id.clone(),
                    aef_id: profile.aef_id.clone(),
                    api_name: self.description.api_name.clone(),
                    api_version: version.api_version.clone(),
                });
            }
        }
        grants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn weather() -> ServiceApiDescription {
        ServiceApiDescription::new("weather")
            .with_profile(AefProfile::new("AEF_1").with_protocol(Protocol::Http11))
            .with_version(ApiVersion::new("v1"))
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let mut description = weather();
        description.api_name = "   ".into();
        assert!(matches!(
            description.validate(),
            Err(CapifError::Validation(_))
        ));
    }

    #[test]
    fn test_profiles_required_and_unique() {
        let mut description = weather();
        description.aef_profiles.clear();
        assert!(description.validate().is_err());

        let doubled = weather().with_profile(AefProfile::new("AEF_1"));
        assert!(doubled.validate().is_err());
    }

    #[test]
    fn test_version_expiry() {
        let now = Utc::now();
        assert!(!ApiVersion::new("v1").is_expired_at(now));
        assert!(ApiVersion::new("v1")
            .with_expiry(now - Duration::seconds(1))
            .is_expired_at(now));
        assert!(!ApiVersion::new("v1")
            .with_expiry(now + Duration::hours(1))
            .is_expired_at(now));
    }

    #[test]
    fn test_patch_replaces_only_provided_fields() {
        let mut api = PublishedApi::new(ApiId::new("api_id_1"), "APF_1".into(), weather());
        api.apply(ServiceApiPatch {
            versions: Some(vec![ApiVersion::new("v2")]),
            ..Default::default()
        });

        assert_eq!(api.description.versions[0].api_version, "v2");
        assert_eq!(api.description.aef_profiles.len(), 1);
        assert_eq!(api.api_name(), "weather");
    }

    #[test]
    fn test_strip_exposers() {
        let mut api = PublishedApi::new(
            ApiId::new("api_id_1"),
            "APF_1".into(),
            weather().with_profile(AefProfile::new("AEF_2")),
        );
        let removed: HashSet<FunctionId> = [FunctionId::new("AEF_1")].into_iter().collect();

        assert_eq!(api.strip_exposers(&removed), 1);
        assert!(!api.exposed_by(&FunctionId::new("AEF_1")));
        assert!(api.exposed_by(&FunctionId::new("AEF_2")));
    }

    #[test]
    fn test_grantable_covers_every_profile_and_version() {
        let api = PublishedApi::new(
            ApiId::new("api_id_1"),
            "APF_1".into(),
            weather()
                .with_profile(AefProfile::new("AEF_2"))
                .with_version(ApiVersion::new("v2")),
        );
        assert_eq!(api.grantable().len(), 4);
    }

    #[test]
    fn test_wire_shape() {
        let api = PublishedApi::new(ApiId::new("api_id_1"), "APF_1".into(), weather());
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["apiId"], "api_id_1");
        assert_eq!(json["apfId"], "APF_1");
        assert_eq!(json["apiName"], "weather");
        assert_eq!(json["aefProfiles"][0]["protocol"], "HTTP_1_1");
    }
}
