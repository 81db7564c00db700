//! Trusted-invoker security contexts
//!
//! One [`ServiceSecurity`] per onboarded invoker. Every write re-runs the
//! security-method negotiation against the published APIs, and a context is
//! committed only while the invoker registry confirms the invoker is still
//! onboarded.

use crate::invoker::InvokerRegistry;
use crate::publish::PublishedApiStore;
use capif_types::{ApiInvokerId, CapifError, Result, RevocationScope, ServiceSecurity};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Security contexts keyed by invoker
pub struct TrustedInvokerRegistry {
    store: Arc<PublishedApiStore>,
    invokers: Arc<InvokerRegistry>,
    contexts: RwLock<IndexMap<ApiInvokerId, ServiceSecurity>>,
}

impl TrustedInvokerRegistry {
    pub fn new(store: Arc<PublishedApiStore>, invokers: Arc<InvokerRegistry>) -> Self {
        Self {
            store,
            invokers,
            contexts: RwLock::new(IndexMap::new()),
        }
    }

    fn negotiate(&self, context: &mut ServiceSecurity) -> Result<()> {
        for info in &mut context.security_info {
            let offered = match (&info.interface_details, &info.api_id) {
                (None, Some(api_id)) => self.store.security_methods(api_id, info.aef_id.as_ref()),
                _ => Vec::new(),
            };
            info.negotiate(&offered)?;
        }
        Ok(())
    }

    /// Create or replace the invoker's context
    pub fn create(
        &self,
        api_invoker_id: &ApiInvokerId,
        mut context: ServiceSecurity,
    ) -> Result<ServiceSecurity> {
        context.validate()?;
        self.negotiate(&mut context)?;

        let invokers = self.invokers.read();
        invokers.require_onboarded(api_invoker_id)?;
        let replaced = self
            .contexts
            .write()
            .insert(api_invoker_id.clone(), context.clone())
            .is_some();
        drop(invokers);

        info!(
            api_invoker_id = %api_invoker_id,
            entries = context.security_info.len(),
            replaced,
            "Security context stored"
        );
        Ok(context)
    }

    /// Replace an existing context
    pub fn update(
        &self,
        api_invoker_id: &ApiInvokerId,
        mut context: ServiceSecurity,
    ) -> Result<ServiceSecurity> {
        context.validate()?;
        self.negotiate(&mut context)?;

        let mut contexts = self.contexts.write();
        let stored = contexts
            .get_mut(api_invoker_id)
            .ok_or_else(|| unknown(api_invoker_id))?;
        *stored = context.clone();
        drop(contexts);

        info!(api_invoker_id = %api_invoker_id, "Security context updated");
        Ok(context)
    }

    /// The context with credentials the caller did not ask for removed
    pub fn get(
        &self,
        api_invoker_id: &ApiInvokerId,
        authentication_info: bool,
        authorization_info: bool,
    ) -> Result<ServiceSecurity> {
        self.contexts
            .read()
            .get(api_invoker_id)
            .cloned()
            .map(|context| context.redacted(authentication_info, authorization_info))
            .ok_or_else(|| unknown(api_invoker_id))
    }

    /// Strip the entries `scope` covers; a context left empty is dropped.
    /// Returns how many entries went.
    pub fn revoke(&self, api_invoker_id: &ApiInvokerId, scope: &RevocationScope) -> usize {
        let mut contexts = self.contexts.write();
        let Some(context) = contexts.get_mut(api_invoker_id) else {
            return 0;
        };
        let removed = context.revoke(scope);
        let emptied = context.security_info.is_empty();
        if emptied {
            contexts.shift_remove(api_invoker_id);
        }
        drop(contexts);

        if removed > 0 {
            debug!(
                api_invoker_id = %api_invoker_id,
                removed,
                emptied,
                "Security context entries revoked"
            );
        }
        removed
    }

    pub fn remove(&self, api_invoker_id: &ApiInvokerId) -> Option<ServiceSecurity> {
        self.contexts.write().shift_remove(api_invoker_id)
    }

    pub fn contains(&self, api_invoker_id: &ApiInvokerId) -> bool {
        self.contexts.read().contains_key(api_invoker_id)
    }
}

fn unknown(api_invoker_id: &ApiInvokerId) -> CapifError {
    CapifError::not_found(format!("trusted invoker {}", api_invoker_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderRegistry;
    use capif_types::{
        AefProfile, ApiId, ApiVersion, DomainRegistration, FunctionRegistration, FunctionRole,
        InvokerEnrolment, SecurityInformation, SecurityMethod, ServiceApiDescription,
    };

    struct Fixture {
        registry: TrustedInvokerRegistry,
        invokers: Arc<InvokerRegistry>,
        api_id: ApiId,
    }

    fn fixture() -> Fixture {
        let providers = Arc::new(ProviderRegistry::new());
        let domain = providers
            .register(
                DomainRegistration::new("secret")
                    .with_function(FunctionRegistration::new(FunctionRole::Publisher, "k1"))
                    .with_function(FunctionRegistration::new(FunctionRole::Exposer, "k2")),
            )
            .unwrap();
        let apf = domain.functions[0].function_id.clone();
        let mut profile = AefProfile::new(domain.functions[1].function_id.clone());
        profile.security_methods = vec![SecurityMethod::Pki];

        let store = Arc::new(PublishedApiStore::new(providers));
        let api = store
            .publish(
                &apf,
                ServiceApiDescription::new("weather")
                    .with_profile(profile)
                    .with_version(ApiVersion::new("v1")),
            )
            .unwrap();
        let invokers = Arc::new(InvokerRegistry::new());
        Fixture {
            registry: TrustedInvokerRegistry::new(store, invokers.clone()),
            invokers,
            api_id: api.api_id,
        }
    }

    fn context(api_id: &ApiId) -> ServiceSecurity {
        ServiceSecurity::new("http://invoker.example/security").with_info(
            SecurityInformation::for_api(api_id.clone(), vec![SecurityMethod::Psk]),
        )
    }

    #[test]
    fn test_create_requires_onboarded_invoker() {
        let f = fixture();
        assert!(matches!(
            f.registry.create(&ApiInvokerId::new("nobody"), context(&f.api_id)),
            Err(CapifError::Validation(_))
        ));
        assert!(!f.registry.contains(&ApiInvokerId::new("nobody")));
    }

    #[test]
    fn test_create_selects_profile_method() {
        let f = fixture();
        let invoker = f.invokers.onboard(InvokerEnrolment::new("pk"), Vec::new()).unwrap();

        let stored = f
            .registry
            .create(&invoker.api_invoker_id, context(&f.api_id))
            .unwrap();
        assert_eq!(
            stored.security_info[0].sel_security_method,
            Some(SecurityMethod::Pki)
        );

        let unpublished = context(&ApiId::new("api_id_missing"));
        assert!(matches!(
            f.registry.create(&invoker.api_invoker_id, unpublished),
            Err(CapifError::Validation(_))
        ));
        // The failed write left the stored context alone
        assert_eq!(
            f.registry
                .get(&invoker.api_invoker_id, true, true)
                .unwrap()
                .security_info[0]
                .api_id,
            Some(f.api_id.clone())
        );
    }

    #[test]
    fn test_update_requires_existing_context() {
        let f = fixture();
        let invoker = f.invokers.onboard(InvokerEnrolment::new("pk"), Vec::new()).unwrap();

        assert!(matches!(
            f.registry.update(&invoker.api_invoker_id, context(&f.api_id)),
            Err(CapifError::NotFound(_))
        ));
        f.registry
            .create(&invoker.api_invoker_id, context(&f.api_id))
            .unwrap();
        assert!(f
            .registry
            .update(&invoker.api_invoker_id, context(&f.api_id))
            .is_ok());
    }

    #[test]
    fn test_revoke_drops_emptied_context() {
        let f = fixture();
        let invoker = f.invokers.onboard(InvokerEnrolment::new("pk"), Vec::new()).unwrap();
        f.registry
            .create(&invoker.api_invoker_id, context(&f.api_id))
            .unwrap();

        let scope = RevocationScope {
            aef_id: None,
            api_ids: vec![f.api_id.clone()],
        };
        assert_eq!(f.registry.revoke(&invoker.api_invoker_id, &scope), 1);
        assert!(!f.registry.contains(&invoker.api_invoker_id));
        assert_eq!(f.registry.revoke(&invoker.api_invoker_id, &scope), 0);
    }
}
