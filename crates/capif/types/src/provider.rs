//! API provider domains and functions

use crate::error::{CapifError, Result};
use crate::ids::{DomainId, FunctionId};
use crate::is_blank;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a provider function plays within its domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionRole {
    /// API publishing function (APF)
    #[serde(rename = "APF")]
    Publisher,

    /// API exposing function (AEF)
    #[serde(rename = "AEF")]
    Exposer,

    /// API management function (AMF)
    #[serde(rename = "AMF")]
    Manager,
}

impl FunctionRole {
    /// Prefix used when generating function ids
    pub fn id_prefix(&self) -> &'static str {
        match self {
            FunctionRole::Publisher => "APF",
            FunctionRole::Exposer => "AEF",
            FunctionRole::Manager => "AMF",
        }
    }
}

impl fmt::Display for FunctionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionRole::Publisher => write!(f, "publisher"),
            FunctionRole::Exposer => write!(f, "exposer"),
            FunctionRole::Manager => write!(f, "manager"),
        }
    }
}

/// Registration credentials of a provider function.
///
/// Opaque to the registries; only presence of the public key is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationInfo {
    pub api_prov_pub_key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_prov_cert: Option<String>,
}

impl RegistrationInfo {
    pub fn new(api_prov_pub_key: impl Into<String>) -> Self {
        Self {
            api_prov_pub_key: api_prov_pub_key.into(),
            api_prov_cert: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if is_blank(&self.api_prov_pub_key) {
            return Err(CapifError::validation(
                "registration info is missing the provider public key",
            ));
        }
        Ok(())
    }
}

/// A registered provider function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFunction {
    #[serde(rename = "apiProvFuncId")]
    pub function_id: FunctionId,

    #[serde(rename = "apiProvFuncRole")]
    pub role: FunctionRole,

    #[serde(
        rename = "apiProvFuncInfo",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub function_info: Option<String>,

    #[serde(rename = "regInfo")]
    pub reg_info: RegistrationInfo,
}

/// A registered API provider domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDomain {
    #[serde(rename = "apiProvDomId")]
    pub domain_id: DomainId,

    #[serde(
        rename = "apiProvDomInfo",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub domain_info: Option<String>,

    #[serde(rename = "regSec")]
    pub reg_sec: String,

    #[serde(rename = "apiProvFuncs")]
    pub functions: Vec<ProviderFunction>,

    #[serde(rename = "registeredAt")]
    pub registered_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl ProviderDomain {
    pub fn function(&self, function_id: &FunctionId) -> Option<&ProviderFunction> {
        self.functions.iter().find(|f| &f.function_id == function_id)
    }

    pub fn function_ids(&self) -> impl Iterator<Item = &FunctionId> {
        self.functions.iter().map(|f| &f.function_id)
    }

    /// Function ids holding the given role
    pub fn functions_with_role(&self, role: FunctionRole) -> Vec<FunctionId> {
        self.functions
            .iter()
            .filter(|f| f.role == role)
            .map(|f| f.function_id.clone())
            .collect()
    }
}

/// Function entry of a registration or update request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRegistration {
    /// Present when an update targets an existing function; ignored on
    /// registration, where every function gets a fresh id.
    #[serde(
        rename = "apiProvFuncId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub function_id: Option<FunctionId>,

    #[serde(
        rename = "apiProvFuncRole",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub role: Option<FunctionRole>,

    #[serde(
        rename = "apiProvFuncInfo",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub function_info: Option<String>,

    #[serde(rename = "regInfo", default, skip_serializing_if = "Option::is_none")]
    pub reg_info: Option<RegistrationInfo>,
}

impl FunctionRegistration {
    pub fn new(role: FunctionRole, api_prov_pub_key: impl Into<String>) -> Self {
        Self {
            function_id: None,
            role: Some(role),
            function_info: None,
            reg_info: Some(RegistrationInfo::new(api_prov_pub_key)),
        }
    }

    /// Validate an entry that will become a new function
    pub fn validate(&self) -> Result<()> {
        if self.role.is_none() {
            return Err(CapifError::validation("provider function is missing a role"));
        }
        match &self.reg_info {
            Some(info) => info.validate(),
            None => Err(CapifError::validation(
                "provider function is missing registration info",
            )),
        }
    }

    /// Build a new function under the given id
    pub fn into_function(self, function_id: FunctionId) -> Result<ProviderFunction> {
        self.validate()?;
        match (self.role, self.reg_info) {
            (Some(role), Some(reg_info)) => Ok(ProviderFunction {
                function_id,
                role,
                function_info: self.function_info,
                reg_info,
            }),
            _ => Err(CapifError::validation("incomplete provider function")),
        }
    }
}

/// Provider domain registration request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRegistration {
    #[serde(
        rename = "apiProvDomInfo",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub domain_info: Option<String>,

    #[serde(rename = "regSec", default)]
    pub reg_sec: String,

    #[serde(rename = "apiProvFuncs", default)]
    pub functions: Vec<FunctionRegistration>,
}

impl DomainRegistration {
    pub fn new(reg_sec: impl Into<String>) -> Self {
        Self {
            domain_info: None,
            reg_sec: reg_sec.into(),
            functions: Vec::new(),
        }
    }

    pub fn with_function(mut self, function: FunctionRegistration) -> Self {
        self.functions.push(function);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if is_blank(&self.reg_sec) {
            return Err(CapifError::validation(
                "provider domain is missing the registration security credential",
            ));
        }
        self.functions.iter().try_for_each(FunctionRegistration::validate)
    }
}

/// Partial update of a provider domain.
///
/// Functions carrying an id are merged into the existing function, the rest
/// are appended as new functions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainPatch {
    #[serde(
        rename = "apiProvDomInfo",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub domain_info: Option<String>,

    #[serde(rename = "regSec", default, skip_serializing_if = "Option::is_none")]
    pub reg_sec: Option<String>,

    #[serde(rename = "apiProvFuncs", default)]
    pub functions: Vec<FunctionRegistration>,
}

/// Result of resolving a function id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedFunction {
    pub domain_id: DomainId,
    pub role: FunctionRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_requires_reg_sec() {
        let registration = DomainRegistration::new("  ")
            .with_function(FunctionRegistration::new(FunctionRole::Exposer, "key"));
        assert!(matches!(
            registration.validate(),
            Err(CapifError::Validation(_))
        ));
    }

    #[test]
    fn test_function_requires_role_and_key() {
        let mut function = FunctionRegistration::new(FunctionRole::Publisher, "key");
        assert!(function.validate().is_ok());

        function.role = None;
        assert!(function.validate().is_err());

        let blank_key = FunctionRegistration::new(FunctionRole::Publisher, "");
        assert!(blank_key.validate().is_err());

        let no_info = FunctionRegistration {
            reg_info: None,
            ..FunctionRegistration::new(FunctionRole::Manager, "key")
        };
        assert!(no_info.validate().is_err());
    }

    #[test]
    fn test_wire_names() {
        let json = r#"{
            "regSec": "secret",
            "apiProvFuncs": [
                {"apiProvFuncRole": "AEF", "regInfo": {"apiProvPubKey": "pk"}}
            ]
        }"#;
        let registration: DomainRegistration = serde_json::from_str(json).unwrap();
        assert_eq!(registration.functions[0].role, Some(FunctionRole::Exposer));
        assert!(registration.validate().is_ok());
    }
}
