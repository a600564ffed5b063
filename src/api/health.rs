// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::time::Duration;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Upper bound on the chain probe so a hung node cannot stall the probe.
const CHAIN_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Embedded database ("ok" or "unavailable").
    pub database: String,
    /// Chain RPC ("ok" or "unavailable").
    pub chain: String,
    /// Latest block seen by the RPC node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// "verified" when token signatures are checked, otherwise "development".
    pub auth: String,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

fn check_database(state: &AppState) -> String {
    match state.db.ping() {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            "unavailable".to_string()
        }
    }
}

async fn check_chain(state: &AppState) -> Option<u64> {
    match tokio::time::timeout(CHAIN_PROBE_TIMEOUT, state.rpc.block_number()).await {
        Ok(Ok(block)) => Some(block),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Chain health check failed");
            None
        }
        Err(_) => {
            tracing::warn!("Chain health check timed out");
            None
        }
    }
}

/// Health check endpoint handler.
///
/// Returns 200 if all checks pass, 503 if any check fails.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = ReadyResponse),
        (status = 503, description = "Service is unhealthy", body = ReadyResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let database = check_database(&state);
    let block_number = check_chain(&state).await;
    let all_ok = database == "ok" && block_number.is_some();

    let response = ReadyResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            database,
            chain: if block_number.is_some() { "ok" } else { "unavailable" }.to_string(),
            block_number,
            auth: if state.auth.is_production() {
                "verified"
            } else {
                "development"
            }
            .to_string(),
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
/// Does not check dependencies - use readiness for that.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness probe handler.
///
/// Returns 200 only if the database and the chain RPC are reachable.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse),
        (status = 503, description = "Service is not ready", body = ReadyResponse)
    )
)]
pub async fn readiness(state: State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    health(state).await
}

#[cfg(test)]
mod tests {
    use crate::test_support::TestApp;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn healthy_when_database_and_chain_respond() {
        let app = TestApp::new();
        app.chain.set_head(42);

        let (status, body) = app.request("GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["checks"]["block_number"], 42);
        assert_eq!(body["checks"]["auth"], "development");
    }

    #[tokio::test]
    async fn degraded_when_chain_is_down() {
        let app = TestApp::new();
        app.chain.fail_all();

        let (status, body) = app.request("GET", "/health/ready", None, None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["checks"]["chain"], "unavailable");
        assert_eq!(body["checks"]["database"], "ok");

        let (status, _) = app.request("GET", "/health/live", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
