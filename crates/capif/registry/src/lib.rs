//! CAPIF Registry - The registries of the common API framework core
//!
//! This crate provides the stateful half of the core:
//!
//! - **ProviderRegistry**: Provider domains and their publisher/exposer/manager functions
//! - **PublishedApiStore**: Published service APIs, keyed to their publisher function
//! - **InvokerRegistry**: Onboarded invokers and their granted API lists
//! - **DiscoveryEngine**: Access-scoped filtering of published APIs
//! - **AuthorizationEngine**: Per-call authorization backed by a revocation ledger
//! - **TrustedInvokerRegistry**: Negotiated security contexts of trusted invokers
//! - **CapifCore**: Wires the above to the identity provider, deployment
//!   automation and event sink
//!
//! ## Locking
//!
//! Each registry guards its state with its own reader-writer lock. When an
//! operation holds more than one at a time it acquires them in the order
//! providers, published APIs, invokers, revocation ledger, security
//! contexts. Discovery and authorization checks keep the provider read lock
//! while they read the store, so a deregistered function is never treated
//! as live.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod discovery;
pub mod events;
pub mod external;
pub mod invoker;
pub mod provider;
pub mod publish;
pub mod security;
pub mod service;
pub mod trusted;

// Re-exports
pub use discovery::DiscoveryEngine;
pub use events::{BroadcastEventSink, EventSink, SubscriptionRegistry};
pub use external::{DeploymentClient, IdentityProvider, LocalIdentityProvider, NoopDeploymentClient};
pub use invoker::InvokerRegistry;
pub use provider::ProviderRegistry;
pub use publish::{ApiQuery, CascadeOutcome, Exposure, PublishedApiStore};
pub use security::{AuthorizationEngine, LedgerEntry, LedgerState, RevocationLedger};
pub use service::{CapifCore, CapifCoreBuilder};
pub use trusted::TrustedInvokerRegistry;
