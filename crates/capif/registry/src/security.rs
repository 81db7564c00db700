//! Authorization decisions and the revocation ledger
//!
//! Per `(invoker, aefId, apiName, version)` tuple the lifecycle is
//! unknown -> granted -> revoked -> granted. Revocation never clears on its
//! own; only an explicit grant reinstates the tuple.

use crate::invoker::InvokerRegistry;
use crate::provider::ProviderRegistry;
use crate::publish::{Exposure, PublishedApiStore};
use capif_types::{
    AccessTuple, AuthDecision, CapifError, DenyReason, FunctionRole, Result,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// State recorded for a tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerState {
    Revoked,
    /// Revocation cleared by a later grant
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    pub state: LedgerState,
    pub changed_at: DateTime<Utc>,
}

/// Record of explicit revocations.
///
/// Entries never expire; a tuple stays revoked until [`reinstate`] is called
/// for it.
///
/// [`reinstate`]: RevocationLedger::reinstate
#[derive(Default)]
pub struct RevocationLedger {
    entries: RwLock<HashMap<AccessTuple, LedgerEntry>>,
}

impl RevocationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a tuple revoked, whatever its prior state
    pub fn revoke(&self, tuple: AccessTuple) -> LedgerEntry {
        let entry = LedgerEntry {
            state: LedgerState::Revoked,
            changed_at: Utc::now(),
        };
        self.entries.write().insert(tuple, entry);
        entry
    }

    /// Clear a revocation; returns true if the tuple was revoked
    pub fn reinstate(&self, tuple: &AccessTuple) -> bool {
        let mut entries = self.entries.write();
        match entries.get_mut(tuple) {
            Some(entry) if entry.state == LedgerState::Revoked => {
                entry.state = LedgerState::Active;
                entry.changed_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    pub fn is_revoked(&self, tuple: &AccessTuple) -> bool {
        self.entries
            .read()
            .get(tuple)
            .is_some_and(|entry| entry.state == LedgerState::Revoked)
    }

    pub fn entry(&self, tuple: &AccessTuple) -> Option<LedgerEntry> {
        self.entries.read().get(tuple).copied()
    }

    pub fn revoked_count(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|entry| entry.state == LedgerState::Revoked)
            .count()
    }
}

/// Answers whether an invoker may call an API right now
pub struct AuthorizationEngine {
    providers: Arc<ProviderRegistry>,
    store: Arc<PublishedApiStore>,
    invokers: Arc<InvokerRegistry>,
    ledger: RevocationLedger,
}

impl AuthorizationEngine {
    pub fn new(
        providers: Arc<ProviderRegistry>,
        store: Arc<PublishedApiStore>,
        invokers: Arc<InvokerRegistry>,
    ) -> Self {
        Self {
            providers,
            store,
            invokers,
            ledger: RevocationLedger::new(),
        }
    }

    pub fn ledger(&self) -> &RevocationLedger {
        &self.ledger
    }

    /// Decide on a call.
    ///
    /// The provider view stays held while the store is read, so an exposure
    /// counts only if both its exposer and its publisher are still
    /// registered. Denials are reported in a fixed order so the most
    /// specific reason wins: unknown invoker, not granted, revoked, expired.
    pub fn check_authentication(&self, tuple: &AccessTuple) -> Result<AuthDecision> {
        tuple.validate()?;

        let exposures: Vec<Exposure> = {
            let providers = self.providers.read();
            if providers.role_of(&tuple.aef_id) == Some(FunctionRole::Exposer) {
                self.store
                    .exposures(&tuple.aef_id, &tuple.api_name, &tuple.api_version)
                    .into_iter()
                    .filter(|exposure| {
                        providers.role_of(&exposure.publisher) == Some(FunctionRole::Publisher)
                    })
                    .collect()
            } else {
                Vec::new()
            }
        };
        let grants = match self.invokers.list_granted_apis(&tuple.api_invoker_id) {
            Ok(grants) => grants,
            Err(CapifError::NotFound(_)) => {
                return Ok(self.deny(tuple, DenyReason::UnknownInvoker));
            }
            Err(e) => return Err(e),
        };
        let revoked = self.ledger.is_revoked(tuple);

        // Grants whose API is gone are dangling and ignored
        let live_grant = grants.iter().filter(|grant| grant.covers(tuple)).find_map(|grant| {
            exposures
                .iter()
                .find(|exposure| exposure.api_id == grant.api_id)
        });
        let Some(exposure) = live_grant else {
            return Ok(self.deny(tuple, DenyReason::NotGranted));
        };
        if revoked {
            return Ok(self.deny(tuple, DenyReason::Revoked));
        }
        if exposure.expiry.is_some_and(|expiry| expiry < Utc::now()) {
            return Ok(self.deny(tuple, DenyReason::Expired));
        }

        debug!(
            api_invoker_id = %tuple.api_invoker_id,
            aef_id = %tuple.aef_id,
            api_name = %tuple.api_name,
            "Access allowed"
        );
        Ok(AuthDecision::Allow)
    }

    fn deny(&self, tuple: &AccessTuple, reason: DenyReason) -> AuthDecision {
        debug!(
            api_invoker_id = %tuple.api_invoker_id,
            aef_id = %tuple.aef_id,
            api_name = %tuple.api_name,
            reason = %reason,
            "Access denied"
        );
        AuthDecision::Deny(reason)
    }

    /// Revoke a tuple. Idempotent, and accepted for tuples never granted so
    /// a later grant has to be explicit.
    pub fn revoke_authorization(&self, tuple: &AccessTuple) -> Result<()> {
        tuple.validate()?;
        self.ledger.revoke(tuple.clone());
        info!(
            api_invoker_id = %tuple.api_invoker_id,
            aef_id = %tuple.aef_id,
            api_name = %tuple.api_name,
            api_version = %tuple.api_version,
            "Authorization revoked"
        );
        Ok(())
    }
}
