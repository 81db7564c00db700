//! Security contexts of trusted invokers
//!
//! A trusted invoker registers one [`ServiceSecurity`] document listing, per
//! API or interface it intends to call, the security methods it prefers. The
//! core answers with the method it selected for each entry.

use crate::error::{CapifError, Result};
use crate::features::SupportedFeatures;
use crate::ids::{ApiId, FunctionId};
use crate::invoker::RevocationScope;
use crate::is_blank;
use crate::service_api::SecurityMethod;
use serde::{Deserialize, Serialize};
use url::Url;

/// Address of a single AEF interface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_addr: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_addr: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Methods this interface supports; they override the AEF profile's
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_methods: Vec<SecurityMethod>,
}

/// Security negotiation for one API or interface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityInformation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_id: Option<ApiId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aef_id: Option<FunctionId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_details: Option<InterfaceDescription>,

    #[serde(default)]
    pub pref_security_methods: Vec<SecurityMethod>,

    /// Filled in by the core
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sel_security_method: Option<SecurityMethod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_info: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_info: Option<String>,
}

impl SecurityInformation {
    /// Entry for a published API
    pub fn for_api(api_id: impl Into<ApiId>, preferred: Vec<SecurityMethod>) -> Self {
        Self {
            api_id: Some(api_id.into()),
            pref_security_methods: preferred,
            ..Default::default()
        }
    }

    /// Entry for an interface addressed directly
    pub fn for_interface(interface: InterfaceDescription, preferred: Vec<SecurityMethod>) -> Self {
        Self {
            interface_details: Some(interface),
            pref_security_methods: preferred,
            ..Default::default()
        }
    }

    pub fn with_aef(mut self, aef_id: impl Into<FunctionId>) -> Self {
        self.aef_id = Some(aef_id.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.pref_security_methods.is_empty() {
            return Err(CapifError::validation(
                "security information is missing prefSecurityMethods",
            ));
        }
        if self.interface_details.is_none() && self.api_id.is_none() {
            return Err(CapifError::validation(
                "security information needs either interfaceDetails or an apiId",
            ));
        }
        Ok(())
    }

    /// Select a method and record it in `sel_security_method`.
    ///
    /// Interface details take precedence over `profile_methods`, the methods
    /// of the API's AEF profiles. The first preferred method on offer wins;
    /// otherwise the first offered one. An interface that lists no methods
    /// accepts the first preferred method.
    pub fn negotiate(&mut self, profile_methods: &[SecurityMethod]) -> Result<SecurityMethod> {
        let offered = match &self.interface_details {
            Some(interface) => interface.security_methods.as_slice(),
            None => profile_methods,
        };
        let selected = self
            .pref_security_methods
            .iter()
            .find(|method| offered.contains(method))
            .or_else(|| offered.first())
            .or_else(|| {
                self.interface_details
                    .as_ref()
                    .and_then(|_| self.pref_security_methods.first())
            })
            .copied()
            .ok_or_else(|| {
                CapifError::validation(format!(
                    "no compatible security method for API {}",
                    self.api_id
                        .as_ref()
                        .map(ApiId::as_str)
                        .unwrap_or("<unspecified>")
                ))
            })?;
        self.sel_security_method = Some(selected);
        Ok(selected)
    }

    /// Whether a bulk revocation removes this entry
    pub fn revoked_by(&self, scope: &RevocationScope) -> bool {
        let by_aef = scope.aef_id.is_some() && scope.aef_id == self.aef_id;
        let by_api = self
            .api_id
            .as_ref()
            .is_some_and(|api_id| scope.api_ids.contains(api_id));
        by_aef || by_api
    }
}

/// Security context of a trusted invoker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSecurity {
    pub security_info: Vec<SecurityInformation>,

    pub notification_destination: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_features: Option<SupportedFeatures>,
}

impl ServiceSecurity {
    pub fn new(notification_destination: impl Into<String>) -> Self {
        Self {
            security_info: Vec::new(),
            notification_destination: notification_destination.into(),
            supported_features: None,
        }
    }

    pub fn with_info(mut self, info: SecurityInformation) -> Self {
        self.security_info.push(info);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if is_blank(&self.notification_destination) {
            return Err(CapifError::validation(
                "service security is missing notificationDestination",
            ));
        }
        Url::parse(&self.notification_destination).map_err(|e| {
            CapifError::validation(format!(
                "invalid notification destination '{}': {}",
                self.notification_destination, e
            ))
        })?;
        if self.security_info.is_empty() {
            return Err(CapifError::validation(
                "service security is missing securityInfo",
            ));
        }
        self.security_info
            .iter()
            .try_for_each(SecurityInformation::validate)
    }

    /// API ids referenced by entries without interface details
    pub fn profile_api_ids(&self) -> impl Iterator<Item = &ApiId> {
        self.security_info
            .iter()
            .filter(|info| info.interface_details.is_none())
            .filter_map(|info| info.api_id.as_ref())
    }

    /// Drop the credentials the caller did not ask for
    pub fn redacted(mut self, authentication_info: bool, authorization_info: bool) -> Self {
        for info in &mut self.security_info {
            if !authentication_info {
                info.authentication_info = None;
            }
            if !authorization_info {
                info.authorization_info = None;
            }
        }
        self
    }

    /// Remove the entries a bulk revocation covers, returning how many went
    pub fn revoke(&mut self, scope: &RevocationScope) -> usize {
        let before = self.security_info.len();
        self.security_info.retain(|info| !info.revoked_by(scope));
        before - self.security_info.len()
    }
}
