//! Onboarded API invokers, their grants and authorization decisions

use crate::error::{CapifError, DenyReason, Result};
use crate::features::SupportedFeatures;
use crate::ids::{ApiId, ApiInvokerId, FunctionId};
use crate::is_blank;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Credentials an invoker presents when onboarding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingInformation {
    #[serde(default)]
    pub api_invoker_public_key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_invoker_certificate: Option<String>,
}

impl OnboardingInformation {
    pub fn new(public_key: impl Into<String>) -> Self {
        Self {
            api_invoker_public_key: public_key.into(),
            api_invoker_certificate: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if is_blank(&self.api_invoker_public_key) {
            return Err(CapifError::validation(
                "onboarding information is missing the invoker public key",
            ));
        }
        Ok(())
    }
}

fn validate_destination(destination: Option<&str>) -> Result<()> {
    match destination {
        Some(destination) => Url::parse(destination).map(|_| ()).map_err(|e| {
            CapifError::validation(format!(
                "invalid notification destination '{}': {}",
                destination, e
            ))
        }),
        None => Ok(()),
    }
}

/// Onboarding request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokerEnrolment {
    pub onboarding_information: OnboardingInformation,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_destination: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_invoker_information: Option<String>,

    /// APIs the invoker asks for; the published ones become initial grants
    #[serde(rename = "apiList", default)]
    pub requested_apis: Vec<ApiId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_features: Option<SupportedFeatures>,
}

impl InvokerEnrolment {
    pub fn new(public_key: impl Into<String>) -> Self {
        Self {
            onboarding_information: OnboardingInformation::new(public_key),
            notification_destination: None,
            api_invoker_information: None,
            requested_apis: Vec::new(),
            supported_features: None,
        }
    }

    pub fn requesting(mut self, api_id: ApiId) -> Self {
        self.requested_apis.push(api_id);
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.onboarding_information.validate()?;
        validate_destination(self.notification_destination.as_deref())
    }
}

/// Partial update of an invoker; provided fields replace stored ones
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokerPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding_information: Option<OnboardingInformation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_destination: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_invoker_information: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_features: Option<SupportedFeatures>,
}

impl InvokerPatch {
    pub fn validate(&self) -> Result<()> {
        if let Some(info) = &self.onboarding_information {
            info.validate()?;
        }
        validate_destination(self.notification_destination.as_deref())
    }

    /// True when the patch rotates the onboarding credential
    pub fn rotates_credential(&self) -> bool {
        self.onboarding_information.is_some()
    }
}

/// One entry of an invoker's granted API list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantedApi {
    pub api_id: ApiId,
    pub aef_id: FunctionId,
    pub api_name: String,
    pub api_version: String,
}

impl GrantedApi {
    pub fn new(
        api_id: impl Into<ApiId>,
        aef_id: impl Into<FunctionId>,
        api_name: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            api_id: api_id.into(),
            aef_id: aef_id.into(),
            api_name: api_name.into(),
            api_version: api_version.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if is_blank(self.api_id.as_str())
            || is_blank(self.aef_id.as_str())
            || is_blank(&self.api_name)
            || is_blank(&self.api_version)
        {
            return Err(CapifError::validation(
                "grant needs apiId, aefId, apiName and apiVersion",
            ));
        }
        Ok(())
    }

    pub fn access_tuple(&self, api_invoker_id: &ApiInvokerId) -> AccessTuple {
        AccessTuple {
            api_invoker_id: api_invoker_id.clone(),
            aef_id: self.aef_id.clone(),
            api_name: self.api_name.clone(),
            api_version: self.api_version.clone(),
        }
    }

    /// Whether this grant authorizes the given call
    pub fn covers(&self, tuple: &AccessTuple) -> bool {
        self.aef_id == tuple.aef_id
            && self.api_name == tuple.api_name
            && self.api_version == tuple.api_version
    }
}

/// An onboarded invoker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokerIdentity {
    pub api_invoker_id: ApiInvokerId,
    pub onboarding_information: OnboardingInformation,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_destination: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_invoker_information: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_features: Option<SupportedFeatures>,

    #[serde(rename = "apiList", default)]
    pub granted_apis: Vec<GrantedApi>,

    pub onboarded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InvokerIdentity {
    pub fn from_enrolment(api_invoker_id: ApiInvokerId, enrolment: InvokerEnrolment) -> Self {
        let now = Utc::now();
        Self {
            api_invoker_id,
            onboarding_information: enrolment.onboarding_information,
            notification_destination: enrolment.notification_destination,
            api_invoker_information: enrolment.api_invoker_information,
            supported_features: enrolment.supported_features,
            granted_apis: Vec::new(),
            onboarded_at: now,
            updated_at: now,
        }
    }

    /// The onboarding resource id is the invoker id
    pub fn onboarding_id(&self) -> &ApiInvokerId {
        &self.api_invoker_id
    }

    pub fn apply(&mut self, patch: InvokerPatch) {
        if let Some(info) = patch.onboarding_information {
            self.onboarding_information = info;
        }
        if let Some(destination) = patch.notification_destination {
            self.notification_destination = Some(destination);
        }
        if let Some(information) = patch.api_invoker_information {
            self.api_invoker_information = Some(information);
        }
        if let Some(features) = patch.supported_features {
            self.supported_features = Some(features);
        }
        self.updated_at = Utc::now();
    }

    pub fn is_granted(&self, grant: &GrantedApi) -> bool {
        self.granted_apis.contains(grant)
    }
}

/// Client credentials issued by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Result of a successful onboarding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardedInvoker {
    #[serde(flatten)]
    pub identity: InvokerIdentity,
    pub client_credentials: ClientCredentials,
}

/// Key of an authorization decision and of the revocation ledger
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTuple {
    pub api_invoker_id: ApiInvokerId,
    pub aef_id: FunctionId,
    pub api_name: String,
    pub api_version: String,
}

impl AccessTuple {
    pub fn new(
        api_invoker_id: impl Into<ApiInvokerId>,
        aef_id: impl Into<FunctionId>,
        api_name: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            api_invoker_id: api_invoker_id.into(),
            aef_id: aef_id.into(),
            api_name: api_name.into(),
            api_version: api_version.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if is_blank(self.api_invoker_id.as_str())
            || is_blank(self.aef_id.as_str())
            || is_blank(&self.api_name)
            || is_blank(&self.api_version)
        {
            return Err(CapifError::validation(
                "apiInvokerId, aefId, apiName and apiVersion are all required",
            ));
        }
        Ok(())
    }
}

/// Outcome of an authentication check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthDecision {
    Allow,
    Deny(DenyReason),
}

impl AuthDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthDecision::Allow)
    }

    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            AuthDecision::Allow => None,
            AuthDecision::Deny(reason) => Some(*reason),
        }
    }

    /// Turn a denial into an `Auth` error
    pub fn into_result(self) -> Result<()> {
        match self {
            AuthDecision::Allow => Ok(()),
            AuthDecision::Deny(reason) => Err(CapifError::Auth(reason)),
        }
    }
}

/// Which of an invoker's grants a bulk revocation targets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationScope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aef_id: Option<FunctionId>,

    #[serde(default)]
    pub api_ids: Vec<ApiId>,
}

impl RevocationScope {
    pub fn is_empty(&self) -> bool {
        self.aef_id.is_none() && self.api_ids.is_empty()
    }

    pub fn matches(&self, grant: &GrantedApi) -> bool {
        self.aef_id.as_ref() == Some(&grant.aef_id) || self.api_ids.contains(&grant.api_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrolment_requires_public_key() {
        assert!(InvokerEnrolment::new("pk").validate().is_ok());
        assert!(matches!(
            InvokerEnrolment::new(" ").validate(),
            Err(CapifError::Validation(_))
        ));
    }

    #[test]
    fn test_notification_destination_must_be_a_url() {
        let mut enrolment = InvokerEnrolment::new("pk");
        enrolment.notification_destination = Some("not a url".into());
        assert!(enrolment.validate().is_err());

        enrolment.notification_destination = Some("http://invoker.example/cb".into());
        assert!(enrolment.validate().is_ok());
    }

    #[test]
    fn test_grant_covers_matching_tuple_only() {
        let grant = GrantedApi::new("api_id_1", "AEF_1", "weather", "v1");
        let invoker = ApiInvokerId::new("api_invoker_id_1");
        let tuple = grant.access_tuple(&invoker);
        assert!(grant.covers(&tuple));

        let other_version = AccessTuple {
            api_version: "v2".into(),
            ..tuple
        };
        assert!(!grant.covers(&other_version));
    }

    #[test]
    fn test_decision_into_result() {
        assert!(AuthDecision::Allow.into_result().is_ok());
        assert_eq!(
            AuthDecision::Deny(DenyReason::Expired).into_result(),
            Err(CapifError::Auth(DenyReason::Expired))
        );
    }

    #[test]
    fn test_revocation_scope() {
        let grant = GrantedApi::new("api_id_1", "AEF_1", "weather", "v1");
        assert!(RevocationScope::default().is_empty());

        let by_aef = RevocationScope {
            aef_id: Some("AEF_1".into()),
            api_ids: Vec::new(),
        };
        assert!(by_aef.matches(&grant));

        let by_api = RevocationScope {
            aef_id: None,
            api_ids: vec!["api_id_2".into()],
        };
        assert!(!by_api.matches(&grant));
    }
}
