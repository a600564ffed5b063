// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::blockchain::RpcError;
use crate::holdings::HoldingsError;
use crate::storage::DbError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// 425: the transaction is not (sufficiently) confirmed yet.
    pub fn too_early(message: impl Into<String>) -> Self {
        // `http` has no named constant for 425
        let status = StatusCode::from_u16(425).unwrap_or(StatusCode::CONFLICT);
        Self::new(status, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// 500 with the detail logged; release builds hide it from the client.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        tracing::error!(error = %detail, "Internal error");
        let message = if cfg!(debug_assertions) {
            format!("Internal error: {detail}")
        } else {
            "Internal server error".to_string()
        };
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => Self::not_found(what),
            DbError::Conflict(what) => Self::conflict(what),
            other => Self::internal(other),
        }
    }
}

impl From<RpcError> for ApiError {
    fn from(err: RpcError) -> Self {
        tracing::warn!(error = %err, "Chain RPC unavailable");
        Self::service_unavailable("Blockchain RPC unavailable, try again later")
    }
}

impl From<HoldingsError> for ApiError {
    fn from(err: HoldingsError) -> Self {
        match err {
            HoldingsError::Rpc(e) => e.into(),
            HoldingsError::Db(e) => e.into(),
        }
    }
}
