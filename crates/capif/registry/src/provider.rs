//! Provider registry
//!
//! Owns provider domains and their functions. Every other registry treats a
//! function id as valid only while it resolves here.

use capif_types::{
    CapifError, DomainId, DomainPatch, DomainRegistration, FunctionId, FunctionRole,
    ProviderDomain, ResolvedFunction, Result,
};
use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Default)]
struct ProviderState {
    domains: IndexMap<DomainId, ProviderDomain>,
    functions: HashMap<FunctionId, ResolvedFunction>,
}

/// Registry of API provider domains
#[derive(Default)]
pub struct ProviderRegistry {
    state: RwLock<ProviderState>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a domain, assigning fresh domain and function ids
    pub fn register(&self, registration: DomainRegistration) -> Result<ProviderDomain> {
        registration.validate()?;

        let domain_id = DomainId::generate();
        let functions = registration
            .functions
            .into_iter()
            .map(|function| {
                let role = function
                    .role
                    .ok_or_else(|| CapifError::validation("provider function is missing a role"))?;
                function.into_function(FunctionId::generate(role))
            })
            .collect::<Result<Vec<_>>>()?;

        let now = Utc::now();
        let domain = ProviderDomain {
            domain_id: domain_id.clone(),
            domain_info: registration.domain_info,
            reg_sec: registration.reg_sec,
            functions,
            registered_at: now,
            updated_at: now,
        };

        let mut state = self.state.write();
        for function in &domain.functions {
            state.functions.insert(
                function.function_id.clone(),
                ResolvedFunction {
                    domain_id: domain_id.clone(),
                    role: function.role,
                },
            );
        }
        state.domains.insert(domain_id.clone(), domain.clone());
        drop(state);

        info!(
            domain_id = %domain_id,
            functions = domain.functions.len(),
            "Provider domain registered"
        );
        Ok(domain)
    }

    /// Merge a patch into a domain.
    ///
    /// Functions are matched by id and updated in place; entries without an
    /// id are appended. No function is ever removed by an update.
    pub fn update(&self, domain_id: &DomainId, patch: DomainPatch) -> Result<ProviderDomain> {
        if let Some(reg_sec) = &patch.reg_sec {
            if reg_sec.trim().is_empty() {
                return Err(CapifError::validation(
                    "registration security credential must not be blank",
                ));
            }
        }

        let mut state = self.state.write();
        let mut domain = state
            .domains
            .get(domain_id)
            .cloned()
            .ok_or_else(|| CapifError::not_found(format!("provider domain {}", domain_id)))?;

        let mut added = Vec::new();
        for entry in patch.functions {
            match entry.function_id.clone() {
                Some(function_id) => {
                    let existing = domain
                        .functions
                        .iter_mut()
                        .find(|f| f.function_id == function_id)
                        .ok_or_else(|| {
                            CapifError::not_found(format!(
                                "function {} in domain {}",
                                function_id, domain_id
                            ))
                        })?;
                    if let Some(role) = entry.role {
                        if role != existing.role {
                            return Err(CapifError::validation(format!(
                                "function {} cannot change role from {} to {}",
                                function_id, existing.role, role
                            )));
                        }
                    }
                    if let Some(reg_info) = entry.reg_info {
                        reg_info.validate()?;
                        existing.reg_info = reg_info;
                    }
                    if let Some(info) = entry.function_info {
                        existing.function_info = Some(info);
                    }
                }
                None => {
                    entry.validate()?;
                    let role = entry
                        .role
                        .ok_or_else(|| CapifError::validation("provider function is missing a role"))?;
                    let function = entry.into_function(FunctionId::generate(role))?;
                    added.push(function.function_id.clone());
                    domain.functions.push(function);
                }
            }
        }

        if let Some(info) = patch.domain_info {
            domain.domain_info = Some(info);
        }
        if let Some(reg_sec) = patch.reg_sec {
            domain.reg_sec = reg_sec;
        }
        domain.updated_at = Utc::now();

        for function_id in &added {
            if let Some(function) = domain.function(function_id) {
                state.functions.insert(
                    function_id.clone(),
                    ResolvedFunction {
                        domain_id: domain_id.clone(),
                        role: function.role,
                    },
                );
            }
        }
        state.domains.insert(domain_id.clone(), domain.clone());
        drop(state);

        info!(domain_id = %domain_id, added = added.len(), "Provider domain updated");
        Ok(domain)
    }

    /// Remove a domain unconditionally, returning the ids of its functions
    /// so dependent publications can be invalidated
    pub fn deregister(&self, domain_id: &DomainId) -> Result<Vec<FunctionId>> {
        let mut state = self.state.write();
        let domain = state
            .domains
            .shift_remove(domain_id)
            .ok_or_else(|| CapifError::not_found(format!("provider domain {}", domain_id)))?;

        let removed: Vec<FunctionId> = domain.function_ids().cloned().collect();
        for function_id in &removed {
            state.functions.remove(function_id);
        }
        drop(state);

        info!(domain_id = %domain_id, functions = removed.len(), "Provider domain deregistered");
        Ok(removed)
    }

    pub fn resolve_function(&self, function_id: &FunctionId) -> Result<ResolvedFunction> {
        self.state
            .read()
            .functions
            .get(function_id)
            .cloned()
            .ok_or_else(|| CapifError::not_found(format!("provider function {}", function_id)))
    }

    pub fn get(&self, domain_id: &DomainId) -> Result<ProviderDomain> {
        self.state
            .read()
            .domains
            .get(domain_id)
            .cloned()
            .ok_or_else(|| CapifError::not_found(format!("provider domain {}", domain_id)))
    }

    pub fn list(&self) -> Vec<ProviderDomain> {
        self.state.read().domains.values().cloned().collect()
    }

    /// Roles of every registered function, taken under one read lock
    pub fn roles(&self) -> HashMap<FunctionId, FunctionRole> {
        let state = self.state.read();
        debug!(functions = state.functions.len(), "Snapshotting function roles");
        state
            .functions
            .iter()
            .map(|(id, resolved)| (id.clone(), resolved.role))
            .collect()
    }

    /// Hold a read lock while validating references from another registry
    pub(crate) fn read(&self) -> ProviderView<'_> {
        ProviderView {
            state: self.state.read(),
        }
    }
}

/// Read-locked view of the provider registry
pub(crate) struct ProviderView<'a> {
    state: RwLockReadGuard<'a, ProviderState>,
}

impl ProviderView<'_> {
    pub(crate) fn role_of(&self, function_id: &FunctionId) -> Option<FunctionRole> {
        self.state.functions.get(function_id).map(|f| f.role)
    }

    /// The function must resolve to a publisher
    pub(crate) fn require_publisher(&self, function_id: &FunctionId) -> Result<()> {
        match self.role_of(function_id) {
            Some(FunctionRole::Publisher) => Ok(()),
            Some(role) => Err(CapifError::validation(format!(
                "function {} is a {}, not a publisher",
                function_id, role
            ))),
            None => Err(CapifError::not_found(format!(
                "publisher function {}",
                function_id
            ))),
        }
    }

    /// Every id must resolve to an exposer
    pub(crate) fn require_exposers<'i>(
        &self,
        aef_ids: impl IntoIterator<Item = &'i FunctionId>,
    ) -> Result<()> {
        for aef_id in aef_ids {
            if self.role_of(aef_id) != Some(FunctionRole::Exposer) {
                return Err(CapifError::validation(format!(
                    "AEF {} is not a registered exposer function",
                    aef_id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capif_types::{FunctionRegistration, RegistrationInfo};

    fn registration() -> DomainRegistration {
        DomainRegistration::new("secret")
            .with_function(FunctionRegistration::new(FunctionRole::Publisher, "apf-key"))
            .with_function(FunctionRegistration::new(FunctionRole::Exposer, "aef-key"))
    }

    #[test]
    fn test_register_assigns_ids() {
        let registry = ProviderRegistry::new();
        let domain = registry.register(registration()).unwrap();

        assert!(domain.domain_id.as_str().starts_with("domain_"));
        assert_eq!(domain.functions.len(), 2);
        assert!(domain.functions[0].function_id.as_str().starts_with("APF_"));
        assert!(domain.functions[1].function_id.as_str().starts_with("AEF_"));

        let resolved = registry
            .resolve_function(&domain.functions[1].function_id)
            .unwrap();
        assert_eq!(resolved.domain_id, domain.domain_id);
        assert_eq!(resolved.role, FunctionRole::Exposer);
    }

    #[test]
    fn test_client_supplied_function_ids_are_ignored() {
        let registry = ProviderRegistry::new();
        let mut function = FunctionRegistration::new(FunctionRole::Exposer, "key");
        function.function_id = Some(FunctionId::new("chosen"));
        let domain = registry
            .register(DomainRegistration::new("secret").with_function(function))
            .unwrap();

        assert_ne!(domain.functions[0].function_id.as_str(), "chosen");
    }

    #[test]
    fn test_register_rejects_function_without_credential() {
        let registry = ProviderRegistry::new();
        let function = FunctionRegistration {
            reg_info: None,
            ..FunctionRegistration::new(FunctionRole::Exposer, "key")
        };
        let result = registry.register(DomainRegistration::new("secret").with_function(function));

        assert!(matches!(result, Err(CapifError::Validation(_))));
        assert!(registry.list().is_empty());
    }

    #[test]
    fn test_update_merges_and_appends() {
        let registry = ProviderRegistry::new();
        let domain = registry.register(registration()).unwrap();
        let aef_id = domain.functions[1].function_id.clone();

        let patch = DomainPatch {
            domain_info: Some("updated".into()),
            reg_sec: None,
            functions: vec![
                FunctionRegistration {
                    function_id: Some(aef_id.clone()),
                    role: None,
                    function_info: None,
                    reg_info: Some(RegistrationInfo::new("rotated")),
                },
                FunctionRegistration::new(FunctionRole::Manager, "amf-key"),
            ],
        };
        let updated = registry.update(&domain.domain_id, patch).unwrap();

        assert_eq!(updated.functions.len(), 3);
        assert_eq!(updated.domain_info.as_deref(), Some("updated"));
        assert_eq!(
            updated.function(&aef_id).unwrap().reg_info.api_prov_pub_key,
            "rotated"
        );
        let amf = &updated.functions[2];
        assert_eq!(
            registry.resolve_function(&amf.function_id).unwrap().role,
            FunctionRole::Manager
        );
    }

    #[test]
    fn test_update_errors() {
        let registry = ProviderRegistry::new();
        assert!(matches!(
            registry.update(&DomainId::new("missing"), DomainPatch::default()),
            Err(CapifError::NotFound(_))
        ));

        let domain = registry.register(registration()).unwrap();
        let unknown_function = DomainPatch {
            functions: vec![FunctionRegistration {
                function_id: Some(FunctionId::new("AEF_unknown")),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(matches!(
            registry.update(&domain.domain_id, unknown_function),
            Err(CapifError::NotFound(_))
        ));

        let role_change = DomainPatch {
            functions: vec![FunctionRegistration {
                function_id: Some(domain.functions[1].function_id.clone()),
                role: Some(FunctionRole::Publisher),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(matches!(
            registry.update(&domain.domain_id, role_change),
            Err(CapifError::Validation(_))
        ));
    }

    #[test]
    fn test_deregister_stops_resolution() {
        let registry = ProviderRegistry::new();
        let domain = registry.register(registration()).unwrap();

        let removed = registry.deregister(&domain.domain_id).unwrap();
        assert_eq!(removed.len(), 2);
        for function_id in &removed {
            assert!(matches!(
                registry.resolve_function(function_id),
                Err(CapifError::NotFound(_))
            ));
        }
        assert!(registry.deregister(&domain.domain_id).is_err());
    }

    #[test]
    fn test_view_role_checks() {
        let registry = ProviderRegistry::new();
        let domain = registry.register(registration()).unwrap();
        let apf = domain.functions[0].function_id.clone();
        let aef = domain.functions[1].function_id.clone();

        let view = registry.read();
        assert!(view.require_publisher(&apf).is_ok());
        assert!(matches!(
            view.require_publisher(&aef),
            Err(CapifError::Validation(_))
        ));
        assert!(view.require_exposers([&aef]).is_ok());
        assert!(view.require_exposers([&apf]).is_err());
    }
}
