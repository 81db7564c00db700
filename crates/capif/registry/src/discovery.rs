//! Access-scoped discovery
//!
//! Discovery is not a public catalog: an invoker only sees the APIs and AEF
//! profiles it holds grants for.

use crate::invoker::InvokerRegistry;
use crate::provider::ProviderRegistry;
use crate::publish::PublishedApiStore;
use capif_types::{
    ApiCriteria, ApiId, ApiInvokerId, CapifError, DenyReason, FunctionId, FunctionRole,
    PublishedApi, Result,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Filters published APIs for one invoker
pub struct DiscoveryEngine {
    providers: Arc<ProviderRegistry>,
    store: Arc<PublishedApiStore>,
    invokers: Arc<InvokerRegistry>,
}

impl DiscoveryEngine {
    pub fn new(
        providers: Arc<ProviderRegistry>,
        store: Arc<PublishedApiStore>,
        invokers: Arc<InvokerRegistry>,
    ) -> Self {
        Self {
            providers,
            store,
            invokers,
        }
    }

    /// APIs the invoker may see that match `criteria`, in publication order.
    ///
    /// Each returned API carries only the AEF profiles that match the
    /// profile criteria and are granted to the invoker. The provider view is
    /// held throughout, so publications whose publisher or exposers were
    /// deregistered ahead of the store cascade are skipped.
    pub fn discover(
        &self,
        api_invoker_id: &ApiInvokerId,
        criteria: &ApiCriteria,
    ) -> Result<Vec<PublishedApi>> {
        let providers = self.providers.read();
        let candidates = self.store.query(criteria);
        let granted: HashSet<(ApiId, FunctionId)> = self
            .invokers
            .list_granted_apis(api_invoker_id)
            .map_err(|e| match e {
                CapifError::NotFound(_) => CapifError::Auth(DenyReason::UnknownInvoker),
                other => other,
            })?
            .into_iter()
            .map(|grant| (grant.api_id, grant.aef_id))
            .collect();

        let is_live = |id: &FunctionId, role: FunctionRole| providers.role_of(id) == Some(role);

        let mut visible = Vec::new();
        for api in candidates {
            if !is_live(&api.publisher, FunctionRole::Publisher) {
                continue;
            }
            let profiles: Vec<_> = api
                .description
                .aef_profiles
                .iter()
                .filter(|profile| {
                    criteria.matches_profile(profile)
                        && is_live(&profile.aef_id, FunctionRole::Exposer)
                        && granted.contains(&(api.api_id.clone(), profile.aef_id.clone()))
                })
                .cloned()
                .collect();
            if profiles.is_empty() {
                continue;
            }

            let mut api = api.as_ref().clone();
            api.description.aef_profiles = profiles;
            visible.push(api);
        }

        debug!(
            api_invoker_id = %api_invoker_id,
            grants = granted.len(),
            visible = visible.len(),
            "Discovery completed"
        );
        Ok(visible)
    }
}
