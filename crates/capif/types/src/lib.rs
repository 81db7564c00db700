//! CAPIF Types - Core types for the common API framework registries
//!
//! This crate defines the data model shared by every registry:
//!
//! - **Identifiers**: Strongly-typed ids for domains, functions, APIs and invokers
//! - **Provider**: API provider domains and their publisher/exposer/manager functions
//! - **Service API**: Published API descriptions, AEF profiles and versions
//! - **Invoker**: Onboarded invoker identities and their granted API tuples
//! - **Discovery**: Filter criteria applied to published APIs
//! - **Security**: Security contexts negotiated by trusted invokers
//! - **Events**: Registry-change notifications and subscriptions
//!
//! Nothing here locks or performs I/O; the registries live in `capif-registry`.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod discovery;
pub mod error;
pub mod events;
pub mod features;
pub mod ids;
pub mod invoker;
pub mod provider;
pub mod security;
pub mod service_api;

pub use discovery::ApiCriteria;
pub use error::{CapifError, Collaborator, DenyReason, DependencyError, ErrorKind, Result};
pub use events::{
    CapifEvent, CapifEventKind, EventDetail, EventFilter, EventNotification, EventSubscription,
};
pub use features::{FeaturesError, SupportedFeatures};
pub use ids::{ApiId, ApiInvokerId, DomainId, FunctionId, SubscriptionId};
pub use invoker::{
    AccessTuple, AuthDecision, ClientCredentials, GrantedApi, InvokerEnrolment, InvokerIdentity,
    InvokerPatch, OnboardedInvoker, OnboardingInformation, RevocationScope,
};
pub use provider::{
    DomainPatch, DomainRegistration, FunctionRegistration, FunctionRole, ProviderDomain,
    ProviderFunction, RegistrationInfo, ResolvedFunction,
};
pub use security::{InterfaceDescription, SecurityInformation, ServiceSecurity};
pub use service_api::{
    AefLocation, AefProfile, ApiVersion, CommType, CustomOperation, DataFormat, Operation,
    Protocol, PublishedApi, Resource, SecurityMethod, ServiceApiDescription, ServiceApiPatch,
};

/// Returns true when the value is empty or whitespace only.
pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
