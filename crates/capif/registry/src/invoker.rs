//! Invoker registry
//!
//! Owns onboarded invokers and their granted API lists. Grants may dangle
//! after an unpublish; readers treat a grant whose API is gone as absent.

use capif_types::{
    ApiInvokerId, CapifError, GrantedApi, InvokerEnrolment, InvokerIdentity, InvokerPatch,
    Result, RevocationScope,
};
use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, info};

/// Registry of onboarded API invokers
#[derive(Default)]
pub struct InvokerRegistry {
    invokers: RwLock<IndexMap<ApiInvokerId, InvokerIdentity>>,
}

impl InvokerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Onboard under a fresh id
    pub fn onboard(
        &self,
        enrolment: InvokerEnrolment,
        initial_grants: Vec<GrantedApi>,
    ) -> Result<InvokerIdentity> {
        self.onboard_as(ApiInvokerId::generate(), enrolment, initial_grants)
    }

    /// Onboard under an id the caller already registered elsewhere
    pub fn onboard_as(
        &self,
        api_invoker_id: ApiInvokerId,
        enrolment: InvokerEnrolment,
        initial_grants: Vec<GrantedApi>,
    ) -> Result<InvokerIdentity> {
        enrolment.validate()?;

        let mut identity = InvokerIdentity::from_enrolment(api_invoker_id.clone(), enrolment);
        for grant in initial_grants {
            if !identity.is_granted(&grant) {
                identity.granted_apis.push(grant);
            }
        }

        let mut invokers = self.invokers.write();
        if invokers.contains_key(&api_invoker_id) {
            return Err(CapifError::conflict(format!(
                "invoker {} is already onboarded",
                api_invoker_id
            )));
        }
        invokers.insert(api_invoker_id.clone(), identity.clone());
        drop(invokers);

        info!(
            api_invoker_id = %api_invoker_id,
            grants = identity.granted_apis.len(),
            "Invoker onboarded"
        );
        Ok(identity)
    }

    pub fn update(&self, onboarding_id: &ApiInvokerId, patch: InvokerPatch) -> Result<InvokerIdentity> {
        patch.validate()?;
        let rotated = patch.rotates_credential();

        let mut invokers = self.invokers.write();
        let identity = invokers
            .get_mut(onboarding_id)
            .ok_or_else(|| unknown(onboarding_id))?;
        identity.apply(patch);
        let updated = identity.clone();
        drop(invokers);

        info!(api_invoker_id = %onboarding_id, rotated, "Invoker updated");
        Ok(updated)
    }

    /// Remove an invoker, returning it with the grants it held
    pub fn deregister(&self, onboarding_id: &ApiInvokerId) -> Result<InvokerIdentity> {
        let removed = self
            .invokers
            .write()
            .shift_remove(onboarding_id)
            .ok_or_else(|| unknown(onboarding_id))?;

        info!(
            api_invoker_id = %onboarding_id,
            grants = removed.granted_apis.len(),
            "Invoker deregistered"
        );
        Ok(removed)
    }

    /// Add a grant; returns false when it was already present
    pub fn grant(&self, api_invoker_id: &ApiInvokerId, grant: GrantedApi) -> Result<bool> {
        grant.validate()?;

        let mut invokers = self.invokers.write();
        let identity = invokers
            .get_mut(api_invoker_id)
            .ok_or_else(|| unknown(api_invoker_id))?;
        if identity.is_granted(&grant) {
            return Ok(false);
        }
        debug!(
            api_invoker_id = %api_invoker_id,
            api_id = %grant.api_id,
            aef_id = %grant.aef_id,
            "Grant added"
        );
        identity.granted_apis.push(grant);
        Ok(true)
    }

    pub fn remove_grant(&self, api_invoker_id: &ApiInvokerId, grant: &GrantedApi) -> Result<()> {
        let mut invokers = self.invokers.write();
        let identity = invokers
            .get_mut(api_invoker_id)
            .ok_or_else(|| unknown(api_invoker_id))?;

        let before = identity.granted_apis.len();
        identity.granted_apis.retain(|g| g != grant);
        if identity.granted_apis.len() == before {
            return Err(CapifError::not_found(format!(
                "grant of {} on {} for invoker {}",
                grant.api_id, grant.aef_id, api_invoker_id
            )));
        }
        debug!(api_invoker_id = %api_invoker_id, api_id = %grant.api_id, "Grant removed");
        Ok(())
    }

    pub fn list_granted_apis(&self, api_invoker_id: &ApiInvokerId) -> Result<Vec<GrantedApi>> {
        self.invokers
            .read()
            .get(api_invoker_id)
            .map(|identity| identity.granted_apis.clone())
            .ok_or_else(|| unknown(api_invoker_id))
    }

    /// Grants within a revocation scope
    pub fn grants_matching(
        &self,
        api_invoker_id: &ApiInvokerId,
        scope: &RevocationScope,
    ) -> Result<Vec<GrantedApi>> {
        Ok(self
            .list_granted_apis(api_invoker_id)?
            .into_iter()
            .filter(|grant| scope.matches(grant))
            .collect())
    }

    pub fn get(&self, onboarding_id: &ApiInvokerId) -> Result<InvokerIdentity> {
        self.invokers
            .read()
            .get(onboarding_id)
            .cloned()
            .ok_or_else(|| unknown(onboarding_id))
    }

    pub fn list(&self) -> Vec<InvokerIdentity> {
        self.invokers.read().values().cloned().collect()
    }

    pub fn contains(&self, api_invoker_id: &ApiInvokerId) -> bool {
        self.invokers.read().contains_key(api_invoker_id)
    }

    /// Hold a read lock while another registry commits state keyed by invoker
    pub(crate) fn read(&self) -> InvokerView<'_> {
        InvokerView {
            invokers: self.invokers.read(),
        }
    }
}

/// Read-locked view of the invoker registry
pub(crate) struct InvokerView<'a> {
    invokers: RwLockReadGuard<'a, IndexMap<ApiInvokerId, InvokerIdentity>>,
}

impl InvokerView<'_> {
    pub(crate) fn require_onboarded(&self, api_invoker_id: &ApiInvokerId) -> Result<()> {
        if self.invokers.contains_key(api_invoker_id) {
            Ok(())
        } else {
            Err(CapifError::validation(format!(
                "invoker {} is not onboarded",
                api_invoker_id
            )))
        }
    }
}

fn unknown(api_invoker_id: &ApiInvokerId) -> CapifError {
    CapifError::not_found(format!("invoker {}", api_invoker_id))
}
