// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Claims read from a bearer token.
///
/// The role may be a top-level `role` claim or sit in `publicMetadata.role`
/// (as issued by hosted identity providers).
#[derive(Debug, Clone, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration timestamp
    #[serde(default)]
    pub exp: i64,
    #[serde(default)]
    pub iss: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, rename = "publicMetadata")]
    pub public_metadata: Option<PublicMetadata>,
}

/// Provider metadata carrying the role.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PublicMetadata {
    #[serde(default)]
    pub role: Option<String>,
}

/// Authenticated user information extracted from JWT.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical user ID (`sub` claim)
    pub user_id: String,

    pub role: Role,

    #[serde(skip)]
    pub issuer: String,

    /// Token expiration (Unix timestamp)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    /// Build from verified claims. Unknown or missing roles become `User`.
    pub fn from_claims(claims: JwtClaims) -> Self {
        let role = claims
            .role
            .as_deref()
            .or_else(|| claims.public_metadata.as_ref().and_then(|m| m.role.as_deref()))
            .and_then(Role::from_str)
            .unwrap_or_default();

        Self {
            user_id: claims.sub,
            role,
            issuer: claims.iss,
            expires_at: claims.exp,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.has_privilege(Role::Admin)
    }
}
