//! Health and status handlers

use crate::api::rest::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
    })
}

/// Daemon status response
#[derive(Debug, Serialize, Deserialize)]
pub struct DaemonStatusResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub stats: RegistryStats,
}

/// Registry sizes
#[derive(Debug, Serialize, Deserialize)]
pub struct RegistryStats {
    pub provider_domains: usize,
    pub published_apis: usize,
    pub onboarded_invokers: usize,
    pub revoked_tuples: usize,
    pub subscriptions: usize,
}

/// Daemon status endpoint
pub async fn daemon_status(State(state): State<AppState>) -> Json<DaemonStatusResponse> {
    let core = &state.core;

    Json(DaemonStatusResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
        started_at: state.started_at,
        stats: RegistryStats {
            provider_domains: core.providers().list().len(),
            published_apis: core.store().len(),
            onboarded_invokers: core.invokers().list().len(),
            revoked_tuples: core.ledger().revoked_count(),
            subscriptions: core.subscriptions().len(),
        },
    })
}
