//! The CAPIF core
//!
//! [`CapifCore`] wires the registries together and runs the flows that span
//! more than one of them or involve an external collaborator. Collaborator
//! calls are made with no registry lock held, and events go out only after
//! the change they describe has committed.

use crate::discovery::DiscoveryEngine;
use crate::events::{BroadcastEventSink, EventSink, SubscriptionRegistry};
use crate::external::{DeploymentClient, IdentityProvider, LocalIdentityProvider, NoopDeploymentClient};
use crate::invoker::InvokerRegistry;
use crate::provider::ProviderRegistry;
use crate::publish::PublishedApiStore;
use crate::security::{AuthorizationEngine, RevocationLedger};
use crate::trusted::TrustedInvokerRegistry;
use capif_types::{
    AccessTuple, ApiCriteria, ApiId, ApiInvokerId, AuthDecision, CapifError, CapifEvent,
    DomainId, DomainPatch, DomainRegistration, EventSubscription, FunctionId, GrantedApi,
    InvokerEnrolment, InvokerIdentity, InvokerPatch, OnboardedInvoker, ProviderDomain,
    PublishedApi, ResolvedFunction, Result, RevocationScope, ServiceApiDescription,
    ServiceApiPatch, ServiceSecurity, SubscriptionId,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Builder for [`CapifCore`]
#[derive(Default)]
pub struct CapifCoreBuilder {
    identity: Option<Arc<dyn IdentityProvider>>,
    deployment: Option<Arc<dyn DeploymentClient>>,
    events: Option<Arc<dyn EventSink>>,
}

impl CapifCoreBuilder {
    pub fn identity_provider(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn deployment_client(mut self, deployment: Arc<dyn DeploymentClient>) -> Self {
        self.deployment = Some(deployment);
        self
    }

    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Unset collaborators default to the in-process ones
    pub fn build(self) -> CapifCore {
        let providers = Arc::new(ProviderRegistry::new());
        let store = Arc::new(PublishedApiStore::new(providers.clone()));
        let invokers = Arc::new(InvokerRegistry::new());

        CapifCore {
            discovery: DiscoveryEngine::new(providers.clone(), store.clone(), invokers.clone()),
            authorization: AuthorizationEngine::new(
                providers.clone(),
                store.clone(),
                invokers.clone(),
            ),
            trusted: TrustedInvokerRegistry::new(store.clone(), invokers.clone()),
            providers,
            store,
            invokers,
            subscriptions: SubscriptionRegistry::new(),
            identity: self
                .identity
                .unwrap_or_else(|| Arc::new(LocalIdentityProvider::new())),
            deployment: self
                .deployment
                .unwrap_or_else(|| Arc::new(NoopDeploymentClient)),
            events: self
                .events
                .unwrap_or_else(|| Arc::new(BroadcastEventSink::new(DEFAULT_EVENT_CAPACITY))),
        }
    }
}

/// Provider, publication, invoker and security registries behind one API
pub struct CapifCore {
    providers: Arc<ProviderRegistry>,
    store: Arc<PublishedApiStore>,
    invokers: Arc<InvokerRegistry>,
    discovery: DiscoveryEngine,
    authorization: AuthorizationEngine,
    trusted: TrustedInvokerRegistry,
    subscriptions: SubscriptionRegistry,
    identity: Arc<dyn IdentityProvider>,
    deployment: Arc<dyn DeploymentClient>,
    events: Arc<dyn EventSink>,
}

impl CapifCore {
    pub fn builder() -> CapifCoreBuilder {
        CapifCoreBuilder::default()
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn store(&self) -> &PublishedApiStore {
        &self.store
    }

    pub fn invokers(&self) -> &InvokerRegistry {
        &self.invokers
    }

    pub fn ledger(&self) -> &RevocationLedger {
        self.authorization.ledger()
    }

    pub fn trusted_invokers(&self) -> &TrustedInvokerRegistry {
        &self.trusted
    }

    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    async fn emit(&self, event: CapifEvent) {
        let event_id = event.event_id;
        let kind = event.kind;
        if let Err(e) = self.events.publish(event).await {
            warn!(event_id = %event_id, kind = %kind, error = %e, "Event sink rejected event");
        }
    }

    // Provider management

    pub fn register_provider(&self, registration: DomainRegistration) -> Result<ProviderDomain> {
        self.providers.register(registration)
    }

    pub fn update_provider(&self, domain_id: &DomainId, patch: DomainPatch) -> Result<ProviderDomain> {
        self.providers.update(domain_id, patch)
    }

    /// Remove a domain and everything published through its functions
    pub async fn deregister_provider(&self, domain_id: &DomainId) -> Result<Vec<FunctionId>> {
        let removed = self.providers.deregister(domain_id)?;
        let outcome = self.store.cascade_invalidate(&removed);

        for api in &outcome.removed {
            if let Err(e) = self.deployment.deprovision(&api.api_id, &api.publisher).await {
                warn!(api_id = %api.api_id, error = %e, "Deprovisioning after cascade failed");
            }
            self.emit(CapifEvent::service_api_unavailable(api)).await;
        }
        for api in &outcome.updated {
            self.emit(CapifEvent::service_api_update(api)).await;
        }
        Ok(removed)
    }

    pub fn get_provider(&self, domain_id: &DomainId) -> Result<ProviderDomain> {
        self.providers.get(domain_id)
    }

    pub fn list_providers(&self) -> Vec<ProviderDomain> {
        self.providers.list()
    }

    pub fn resolve_function(&self, function_id: &FunctionId) -> Result<ResolvedFunction> {
        self.providers.resolve_function(function_id)
    }

    // Publication

    /// Provision the endpoints, then record the publication.
    ///
    /// Validation runs before the deployment call and again under the
    /// store's locks, since providers may change while provisioning.
    pub async fn publish(
        &self,
        publisher: &FunctionId,
        description: ServiceApiDescription,
    ) -> Result<PublishedApi> {
        self.store.validate_publication(publisher, &description)?;

        let api_id = ApiId::generate();
        self.deployment
            .provision(&api_id, publisher, &description)
            .await?;

        let api = match self.store.publish_as(api_id.clone(), publisher, description) {
            Ok(api) => api,
            Err(e) => {
                if let Err(rollback) = self.deployment.deprovision(&api_id, publisher).await {
                    warn!(api_id = %api_id, error = %rollback, "Rollback deprovisioning failed");
                }
                return Err(e);
            }
        };

        self.emit(CapifEvent::service_api_available(&api)).await;
        Ok(api)
    }

    pub async fn update_service_api(
        &self,
        publisher: &FunctionId,
        api_id: &ApiId,
        patch: ServiceApiPatch,
    ) -> Result<PublishedApi> {
        let api = self.store.update_for(publisher, api_id, patch)?;
        self.emit(CapifEvent::service_api_update(&api)).await;
        Ok(api)
    }

    /// Deprovision, then remove. A deployment failure leaves the API published.
    pub async fn unpublish(&self, publisher: &FunctionId, api_id: &ApiId) -> Result<()> {
        let api = self.store.get_for(publisher, api_id)?;
        self.deployment.deprovision(&api.api_id, publisher).await?;

        let removed = self.store.unpublish(api_id)?;
        self.emit(CapifEvent::service_api_unavailable(&removed)).await;
        Ok(())
    }

    pub fn get_service_api(&self, publisher: &FunctionId, api_id: &ApiId) -> Result<PublishedApi> {
        self.store.get_for(publisher, api_id)
    }

    pub fn list_service_apis(&self, publisher: &FunctionId) -> Result<Vec<PublishedApi>> {
        self.providers.read().require_publisher(publisher)?;
        Ok(self.store.list_for_publisher(publisher))
    }

    // Invoker management

    /// Register an identity-provider client, then onboard the invoker with
    /// grants for every requested API that is currently published
    pub async fn onboard_invoker(&self, enrolment: InvokerEnrolment) -> Result<OnboardedInvoker> {
        enrolment.validate()?;

        let api_invoker_id = ApiInvokerId::generate();
        let client_credentials = self.identity.register_client(&api_invoker_id).await?;

        let grants = self.store.grantable(&enrolment.requested_apis);
        let identity = match self
            .invokers
            .onboard_as(api_invoker_id.clone(), enrolment, grants)
        {
            Ok(identity) => identity,
            Err(e) => {
                if let Err(cleanup) = self.identity.remove_client(&api_invoker_id).await {
                    warn!(api_invoker_id = %api_invoker_id, error = %cleanup, "Client cleanup failed");
                }
                return Err(e);
            }
        };

        self.emit(CapifEvent::invoker_onboarded(&api_invoker_id)).await;
        Ok(OnboardedInvoker {
            identity,
            client_credentials,
        })
    }

    pub async fn update_invoker(
        &self,
        onboarding_id: &ApiInvokerId,
        patch: InvokerPatch,
    ) -> Result<InvokerIdentity> {
        let identity = self.invokers.update(onboarding_id, patch)?;
        self.emit(CapifEvent::invoker_updated(onboarding_id)).await;
        Ok(identity)
    }

    /// Offboard an invoker, revoking every grant it held.
    ///
    /// The identity-provider client goes first; if that fails the invoker
    /// stays registered.
    pub async fn deregister_invoker(&self, onboarding_id: &ApiInvokerId) -> Result<()> {
        if !self.invokers.contains(onboarding_id) {
            return Err(CapifError::not_found(format!("invoker {}", onboarding_id)));
        }
        self.identity.remove_client(onboarding_id).await?;

        let removed = self.invokers.deregister(onboarding_id)?;
        for grant in &removed.granted_apis {
            self.ledger().revoke(grant.access_tuple(onboarding_id));
        }
        self.trusted.remove(onboarding_id);
        info!(
            api_invoker_id = %onboarding_id,
            revoked = removed.granted_apis.len(),
            "Invoker grants revoked on offboarding"
        );

        self.emit(CapifEvent::invoker_offboarded(onboarding_id)).await;
        Ok(())
    }

    pub fn get_invoker(&self, onboarding_id: &ApiInvokerId) -> Result<InvokerIdentity> {
        self.invokers.get(onboarding_id)
    }

    pub fn list_granted_apis(&self, api_invoker_id: &ApiInvokerId) -> Result<Vec<GrantedApi>> {
        self.invokers.list_granted_apis(api_invoker_id)
    }

    /// Grant an API tuple, clearing any revocation recorded for it
    pub fn grant(&self, api_invoker_id: &ApiInvokerId, grant: GrantedApi) -> Result<()> {
        grant.validate()?;

        let api = self.store.get(&grant.api_id)?;
        if !api.exposed_by(&grant.aef_id)
            || api.api_name() != grant.api_name
            || api.version(&grant.api_version).is_none()
        {
            return Err(CapifError::validation(format!(
                "grant does not match service API {}",
                grant.api_id
            )));
        }

        let tuple = grant.access_tuple(api_invoker_id);
        self.invokers.grant(api_invoker_id, grant)?;
        if self.ledger().reinstate(&tuple) {
            info!(
                api_invoker_id = %api_invoker_id,
                aef_id = %tuple.aef_id,
                api_name = %tuple.api_name,
                "Revoked access re-granted"
            );
        }
        Ok(())
    }

    pub fn remove_grant(&self, api_invoker_id: &ApiInvokerId, grant: &GrantedApi) -> Result<()> {
        self.invokers.remove_grant(api_invoker_id, grant)
    }

    // Discovery and security

    pub fn discover(
        &self,
        api_invoker_id: &ApiInvokerId,
        criteria: &ApiCriteria,
    ) -> Result<Vec<PublishedApi>> {
        self.discovery.discover(api_invoker_id, criteria)
    }

    pub fn check_authentication(&self, tuple: &AccessTuple) -> Result<AuthDecision> {
        self.authorization.check_authentication(tuple)
    }

    pub async fn revoke_authorization(&self, tuple: &AccessTuple) -> Result<()> {
        self.authorization.revoke_authorization(tuple)?;
        self.emit(CapifEvent::authorization_revoked(
            &tuple.api_invoker_id,
            Vec::new(),
            vec![tuple.aef_id.clone()],
        ))
        .await;
        Ok(())
    }

    /// Revoke every grant of the invoker within `scope`, and strip the
    /// matching entries from its security context
    pub async fn revoke_invoker_access(
        &self,
        api_invoker_id: &ApiInvokerId,
        scope: RevocationScope,
    ) -> Result<Vec<GrantedApi>> {
        if scope.is_empty() {
            return Err(CapifError::validation(
                "revocation scope needs an aefId or apiIds",
            ));
        }

        let grants = self.invokers.grants_matching(api_invoker_id, &scope)?;
        for grant in &grants {
            self.authorization
                .revoke_authorization(&grant.access_tuple(api_invoker_id))?;
        }
        self.trusted.revoke(api_invoker_id, &scope);

        if !grants.is_empty() {
            let api_ids: BTreeSet<ApiId> = grants.iter().map(|g| g.api_id.clone()).collect();
            let aef_ids: BTreeSet<FunctionId> = grants.iter().map(|g| g.aef_id.clone()).collect();
            self.emit(CapifEvent::authorization_revoked(
                api_invoker_id,
                api_ids.into_iter().collect(),
                aef_ids.into_iter().collect(),
            ))
            .await;
        }
        Ok(grants)
    }

    // Trusted-invoker security contexts

    pub fn create_security_context(
        &self,
        api_invoker_id: &ApiInvokerId,
        context: ServiceSecurity,
    ) -> Result<ServiceSecurity> {
        self.trusted.create(api_invoker_id, context)
    }

    pub fn update_security_context(
        &self,
        api_invoker_id: &ApiInvokerId,
        context: ServiceSecurity,
    ) -> Result<ServiceSecurity> {
        self.trusted.update(api_invoker_id, context)
    }

    pub fn get_security_context(
        &self,
        api_invoker_id: &ApiInvokerId,
        authentication_info: bool,
        authorization_info: bool,
    ) -> Result<ServiceSecurity> {
        self.trusted
            .get(api_invoker_id, authentication_info, authorization_info)
    }

    // Event subscriptions

    pub fn subscribe(
        &self,
        subscriber_id: &str,
        subscription: EventSubscription,
    ) -> Result<SubscriptionId> {
        self.subscriptions.subscribe(subscriber_id, subscription)
    }

    pub fn unsubscribe(&self, subscriber_id: &str, subscription_id: &SubscriptionId) -> Result<()> {
        self.subscriptions.unsubscribe(subscriber_id, subscription_id)
    }
}

impl Default for CapifCore {
    fn default() -> Self {
        Self::builder().build()
    }
}
