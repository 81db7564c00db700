//! Published API store
//!
//! Publications reference provider functions by id only. References are
//! re-validated against the provider registry while this store's write lock
//! is held, and provider deregistration is propagated through
//! [`PublishedApiStore::cascade_invalidate`].

use crate::provider::ProviderRegistry;
use capif_types::{
    ApiCriteria, ApiId, CapifError, FunctionId, GrantedApi, PublishedApi, Result,
    SecurityMethod, ServiceApiDescription, ServiceApiPatch,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Default)]
struct StoreState {
    /// Insertion order is the discovery order
    apis: IndexMap<ApiId, Arc<PublishedApi>>,
    /// (publisher, apiName) -> apiId
    names: HashMap<(FunctionId, String), ApiId>,
}

impl StoreState {
    fn insert(&mut self, api: PublishedApi) {
        self.names.insert(
            (api.publisher.clone(), api.api_name().to_string()),
            api.api_id.clone(),
        );
        self.apis.insert(api.api_id.clone(), Arc::new(api));
    }

    fn remove(&mut self, api_id: &ApiId) -> Option<Arc<PublishedApi>> {
        let api = self.apis.shift_remove(api_id)?;
        self.names
            .remove(&(api.publisher.clone(), api.api_name().to_string()));
        Some(api)
    }

    fn check_name_free(&self, publisher: &FunctionId, api_name: &str) -> Result<()> {
        if self
            .names
            .contains_key(&(publisher.clone(), api_name.to_string()))
        {
            return Err(CapifError::conflict(format!(
                "API {} is already published by {}",
                api_name, publisher
            )));
        }
        Ok(())
    }
}

/// A live publication of an `(aefId, apiName, version)` combination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exposure {
    pub api_id: ApiId,
    pub publisher: FunctionId,
    pub expiry: Option<DateTime<Utc>>,
}

/// APIs removed or changed by a cascade
#[derive(Debug, Default)]
pub struct CascadeOutcome {
    pub removed: Vec<PublishedApi>,
    pub updated: Vec<PublishedApi>,
}

/// Store of published service APIs
pub struct PublishedApiStore {
    providers: Arc<ProviderRegistry>,
    state: RwLock<StoreState>,
}

impl PublishedApiStore {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        Self {
            providers,
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Check a publication without recording it
    pub fn validate_publication(
        &self,
        publisher: &FunctionId,
        description: &ServiceApiDescription,
    ) -> Result<()> {
        description.validate()?;
        {
            let providers = self.providers.read();
            providers.require_publisher(publisher)?;
            providers.require_exposers(description.aef_ids())?;
        }
        self.state
            .read()
            .check_name_free(publisher, &description.api_name)
    }

    pub fn publish(
        &self,
        publisher: &FunctionId,
        description: ServiceApiDescription,
    ) -> Result<PublishedApi> {
        self.publish_as(ApiId::generate(), publisher, description)
    }

    /// Record a publication under an id chosen by the caller.
    ///
    /// Provider references are checked with the provider read lock held
    /// across the insert, so a concurrent deregistration either precedes the
    /// check or is followed by a cascade that sees this API.
    pub fn publish_as(
        &self,
        api_id: ApiId,
        publisher: &FunctionId,
        description: ServiceApiDescription,
    ) -> Result<PublishedApi> {
        description.validate()?;

        let providers = self.providers.read();
        providers.require_publisher(publisher)?;
        providers.require_exposers(description.aef_ids())?;

        let mut state = self.state.write();
        state.check_name_free(publisher, &description.api_name)?;
        if state.apis.contains_key(&api_id) {
            return Err(CapifError::conflict(format!("API id {} is taken", api_id)));
        }

        let api = PublishedApi::new(api_id.clone(), publisher.clone(), description);
        state.insert(api.clone());
        drop(state);
        drop(providers);

        info!(
            api_id = %api_id,
            publisher = %publisher,
            api_name = %api.api_name(),
            "Service API published"
        );
        Ok(api)
    }

    /// Apply a partial update
    pub fn update(&self, api_id: &ApiId, patch: ServiceApiPatch) -> Result<PublishedApi> {
        self.update_owned(None, api_id, patch)
    }

    /// Apply a partial update to an API owned by `publisher`
    pub fn update_for(
        &self,
        publisher: &FunctionId,
        api_id: &ApiId,
        patch: ServiceApiPatch,
    ) -> Result<PublishedApi> {
        self.update_owned(Some(publisher), api_id, patch)
    }

    fn update_owned(
        &self,
        owner: Option<&FunctionId>,
        api_id: &ApiId,
        patch: ServiceApiPatch,
    ) -> Result<PublishedApi> {
        patch.validate()?;

        let providers = self.providers.read();
        let mut state = self.state.write();
        let entry = state
            .apis
            .get_mut(api_id)
            .filter(|api| owner.map_or(true, |owner| &api.publisher == owner))
            .ok_or_else(|| CapifError::not_found(format!("service API {}", api_id)))?;
        entry.check_rename(&patch)?;
        providers.require_exposers(patch.aef_ids())?;

        let api = Arc::make_mut(entry);
        api.apply(patch);
        let updated = api.clone();
        drop(state);
        drop(providers);

        info!(api_id = %api_id, "Service API updated");
        Ok(updated)
    }

    pub fn unpublish(&self, api_id: &ApiId) -> Result<PublishedApi> {
        let removed = self
            .state
            .write()
            .remove(api_id)
            .ok_or_else(|| CapifError::not_found(format!("service API {}", api_id)))?;

        info!(api_id = %api_id, "Service API unpublished");
        Ok(Arc::unwrap_or_clone(removed))
    }

    /// Drop everything that depends on removed provider functions.
    ///
    /// APIs published by a removed function go away; profiles of removed
    /// exposers are stripped, and an API left without profiles goes away.
    pub fn cascade_invalidate(&self, removed_functions: &[FunctionId]) -> CascadeOutcome {
        let removed_set: HashSet<FunctionId> = removed_functions.iter().cloned().collect();
        let mut outcome = CascadeOutcome::default();
        if removed_set.is_empty() {
            return outcome;
        }

        let mut state = self.state.write();
        let affected: Vec<ApiId> = state
            .apis
            .values()
            .filter(|api| {
                removed_set.contains(&api.publisher)
                    || api.description.aef_ids().any(|id| removed_set.contains(id))
            })
            .map(|api| api.api_id.clone())
            .collect();

        for api_id in affected {
            let Some(entry) = state.apis.get_mut(&api_id) else {
                continue;
            };
            if removed_set.contains(&entry.publisher) {
                if let Some(api) = state.remove(&api_id) {
                    outcome.removed.push(Arc::unwrap_or_clone(api));
                }
                continue;
            }

            let api = Arc::make_mut(entry);
            api.strip_exposers(&removed_set);
            if api.description.aef_profiles.is_empty() {
                if let Some(api) = state.remove(&api_id) {
                    outcome.removed.push(Arc::unwrap_or_clone(api));
                }
            } else {
                outcome.updated.push(api.clone());
            }
        }
        drop(state);

        debug!(
            functions = removed_functions.len(),
            removed = outcome.removed.len(),
            updated = outcome.updated.len(),
            "Cascade invalidation applied"
        );
        outcome
    }

    /// Query the store.
    ///
    /// The snapshot is taken now; filtering happens lazily as the returned
    /// iterator is consumed. Calling again with the same criteria and no
    /// intervening mutation yields the same sequence.
    pub fn query(&self, criteria: &ApiCriteria) -> ApiQuery {
        let snapshot: Vec<Arc<PublishedApi>> = self.state.read().apis.values().cloned().collect();
        ApiQuery {
            snapshot: snapshot.into_iter(),
            criteria: criteria.clone(),
        }
    }

    pub fn get(&self, api_id: &ApiId) -> Result<PublishedApi> {
        self.state
            .read()
            .apis
            .get(api_id)
            .map(|api| api.as_ref().clone())
            .ok_or_else(|| CapifError::not_found(format!("service API {}", api_id)))
    }

    /// Get an API only if `publisher` owns it
    pub fn get_for(&self, publisher: &FunctionId, api_id: &ApiId) -> Result<PublishedApi> {
        self.get(api_id)
            .ok()
            .filter(|api| &api.publisher == publisher)
            .ok_or_else(|| CapifError::not_found(format!("service API {}", api_id)))
    }

    pub fn list_for_publisher(&self, publisher: &FunctionId) -> Vec<PublishedApi> {
        self.state
            .read()
            .apis
            .values()
            .filter(|api| &api.publisher == publisher)
            .map(|api| api.as_ref().clone())
            .collect()
    }

    pub fn contains(&self, api_id: &ApiId) -> bool {
        self.state.read().apis.contains_key(api_id)
    }

    pub fn len(&self) -> usize {
        self.state.read().apis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live publications of `(aef_id, api_name, api_version)`
    pub fn exposures(&self, aef_id: &FunctionId, api_name: &str, api_version: &str) -> Vec<Exposure> {
        self.state
            .read()
            .apis
            .values()
            .filter(|api| api.api_name() == api_name && api.exposed_by(aef_id))
            .filter_map(|api| {
                api.version(api_version).map(|version| Exposure {
                    api_id: api.api_id.clone(),
                    publisher: api.publisher.clone(),
                    expiry: version.expiry,
                })
            })
            .collect()
    }

    /// Security methods an API's AEF profiles offer, in profile order.
    ///
    /// With `aef_id` only that exposer's profile counts. Unknown APIs offer
    /// nothing.
    pub fn security_methods(&self, api_id: &ApiId, aef_id: Option<&FunctionId>) -> Vec<SecurityMethod> {
        let state = self.state.read();
        let mut methods = Vec::new();
        let profiles = state
            .apis
            .get(api_id)
            .into_iter()
            .flat_map(|api| api.description.aef_profiles.iter())
            .filter(|profile| aef_id.map_or(true, |aef_id| &profile.aef_id == aef_id));
        for method in profiles.flat_map(|profile| profile.security_methods.iter()) {
            if !methods.contains(method) {
                methods.push(*method);
            }
        }
        methods
    }

    /// Every grantable tuple of each listed API that is currently published
    pub fn grantable(&self, api_ids: &[ApiId]) -> Vec<GrantedApi> {
        let state = self.state.read();
        api_ids
            .iter()
            .filter_map(|id| state.apis.get(id))
            .flat_map(|api| api.grantable())
            .collect()
    }
}

/// Lazy, finite result of [`PublishedApiStore::query`]
#[derive(Clone)]
pub struct ApiQuery {
    snapshot: std::vec::IntoIter<Arc<PublishedApi>>,
    criteria: ApiCriteria,
}

impl Iterator for ApiQuery {
    type Item = Arc<PublishedApi>;

    fn next(&mut self) -> Option<Self::Item> {
        let criteria = &self.criteria;
        self.snapshot.by_ref().find(|api| {
            criteria.matches_api(api)
                && api
                    .description
                    .aef_profiles
                    .iter()
                    .any(|profile| criteria.matches_profile(profile))
        })
    }
}
