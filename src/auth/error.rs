// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token rejections.

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::error::ApiError;

/// Why a request's bearer token was not accepted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization header is required")]
    MissingAuthHeader,
    #[error("Authorization header must be 'Bearer <token>'")]
    InvalidAuthHeader,
    #[error("Token could not be decoded")]
    MalformedToken,
    #[error("Token signature does not match")]
    InvalidSignature,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Token was issued by an unexpected issuer")]
    InvalidIssuer,
    #[error("Token is not valid yet")]
    TokenNotYetValid,
    #[error("Admin role required")]
    InsufficientPermissions,
}

impl AuthError {
    fn status(&self) -> StatusCode {
        match self {
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::MalformedToken
            | AuthError::InvalidSignature
            | AuthError::TokenExpired
            | AuthError::InvalidIssuer
            | AuthError::TokenNotYetValid => StatusCode::UNAUTHORIZED,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        tracing::debug!(error = %err, "Rejected bearer token");
        ApiError::new(err.status(), err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let challenge = self.status() == StatusCode::UNAUTHORIZED;
        let mut response = ApiError::from(self).into_response();
        if challenge {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
