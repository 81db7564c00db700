//! External collaborators
//!
//! The core calls these without holding any registry lock. A failure is a
//! [`DependencyError`] and is never turned into an authorization decision.

use async_trait::async_trait;
use capif_types::{
    ApiId, ApiInvokerId, ClientCredentials, Collaborator, DependencyError, FunctionId,
    ServiceApiDescription,
};
use dashmap::DashMap;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::debug;

/// Identity provider holding one client per onboarded invoker
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create a client for the invoker and return its credentials
    async fn register_client(
        &self,
        api_invoker_id: &ApiInvokerId,
    ) -> Result<ClientCredentials, DependencyError>;

    /// Remove the invoker's client. Removing an unknown client succeeds.
    async fn remove_client(&self, api_invoker_id: &ApiInvokerId) -> Result<(), DependencyError>;
}

/// Automation that provisions the network endpoints behind a publication
#[async_trait]
pub trait DeploymentClient: Send + Sync {
    async fn provision(
        &self,
        api_id: &ApiId,
        publisher: &FunctionId,
        description: &ServiceApiDescription,
    ) -> Result<(), DependencyError>;

    async fn deprovision(
        &self,
        api_id: &ApiId,
        publisher: &FunctionId,
    ) -> Result<(), DependencyError>;
}

const SECRET_LEN: usize = 32;

/// In-process identity provider issuing random client secrets
#[derive(Default)]
pub struct LocalIdentityProvider {
    clients: DashMap<ApiInvokerId, ClientCredentials>,
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a presented secret against the invoker's client
    pub fn verify(&self, api_invoker_id: &ApiInvokerId, client_secret: &str) -> bool {
        self.clients
            .get(api_invoker_id)
            .is_some_and(|credentials| credentials.client_secret == client_secret)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn register_client(
        &self,
        api_invoker_id: &ApiInvokerId,
    ) -> Result<ClientCredentials, DependencyError> {
        if self.clients.contains_key(api_invoker_id) {
            return Err(DependencyError::new(
                Collaborator::IdentityProvider,
                format!("client {} already exists", api_invoker_id),
            ));
        }

        let client_secret: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SECRET_LEN)
            .map(char::from)
            .collect();
        let credentials = ClientCredentials {
            client_id: api_invoker_id.to_string(),
            client_secret,
        };
        self.clients
            .insert(api_invoker_id.clone(), credentials.clone());

        debug!(client_id = %api_invoker_id, "Identity client registered");
        Ok(credentials)
    }

    async fn remove_client(&self, api_invoker_id: &ApiInvokerId) -> Result<(), DependencyError> {
        self.clients.remove(api_invoker_id);
        debug!(client_id = %api_invoker_id, "Identity client removed");
        Ok(())
    }
}

/// Deployment client for setups where endpoints are managed elsewhere
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDeploymentClient;

#[async_trait]
impl DeploymentClient for NoopDeploymentClient {
    async fn provision(
        &self,
        api_id: &ApiId,
        publisher: &FunctionId,
        _description: &ServiceApiDescription,
    ) -> Result<(), DependencyError> {
        debug!(api_id = %api_id, publisher = %publisher, "Provisioning skipped");
        Ok(())
    }

    async fn deprovision(
        &self,
        api_id: &ApiId,
        publisher: &FunctionId,
    ) -> Result<(), DependencyError> {
        debug!(api_id = %api_id, publisher = %publisher, "Deprovisioning skipped");
        Ok(())
    }
}
