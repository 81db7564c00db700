//! Error taxonomy shared by every registry
//!
//! All variants except `Dependency` are expected outcomes of normal operation
//! and go back to the caller as-is. `Dependency` means an external
//! collaborator could not be reached; it is retryable and never stands in for
//! an authorization decision.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapifError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Access denied: {0}")]
    Auth(DenyReason),

    #[error(transparent)]
    Dependency(#[from] DependencyError),
}

impl CapifError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Dependency(_) => ErrorKind::Dependency,
        }
    }

    /// Only collaborator outages are worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Dependency(_))
    }
}

/// Coarse error classification, used by boundary adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Auth,
    Dependency,
}

/// Machine-readable reason for an authorization denial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    UnknownInvoker,
    NotGranted,
    Revoked,
    Expired,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownInvoker => "unknown_invoker",
            Self::NotGranted => "not_granted",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// External collaborators consumed by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collaborator {
    IdentityProvider,
    DeploymentAutomation,
    EventNotification,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::IdentityProvider => "identity provider",
            Self::DeploymentAutomation => "deployment automation",
            Self::EventNotification => "event notification",
        };
        f.write_str(name)
    }
}

/// Failure to reach an external collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{collaborator} unavailable: {message}")]
pub struct DependencyError {
    pub collaborator: Collaborator,
    pub message: String,
}

impl DependencyError {
    pub fn new(collaborator: Collaborator, message: impl Into<String>) -> Self {
        Self {
            collaborator,
            message: message.into(),
        }
    }
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, CapifError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_dependency_errors_are_retryable() {
        let outage = CapifError::from(DependencyError::new(
            Collaborator::IdentityProvider,
            "connection refused",
        ));
        assert!(outage.is_retryable());
        assert_eq!(outage.kind(), ErrorKind::Dependency);

        assert!(!CapifError::Auth(DenyReason::Revoked).is_retryable());
        assert!(!CapifError::not_found("api").is_retryable());
    }

    #[test]
    fn test_deny_reason_codes() {
        assert_eq!(DenyReason::UnknownInvoker.code(), "unknown_invoker");
        assert_eq!(DenyReason::NotGranted.code(), "not_granted");
        assert_eq!(
            serde_json::to_string(&DenyReason::Expired).unwrap(),
            "\"expired\""
        );
        assert_eq!(
            CapifError::Auth(DenyReason::Revoked).to_string(),
            "Access denied: revoked"
        );
    }
}
