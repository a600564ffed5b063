// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use super::validate_user_id;
use crate::auth::{Auth, Role};
use crate::error::ApiError;
use crate::models::WalletAddress;
use crate::state::AppState;
use crate::storage::UserProfile;

/// Response for GET /api/users/me
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserMeResponse {
    /// Subject of the bearer token
    pub user_id: String,
    pub role: Role,
    /// Linked wallet (lowercase)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Profile changes; omitted fields keep their current value and an empty
/// string clears them.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

fn me(role: Role, profile: UserProfile) -> UserMeResponse {
    UserMeResponse {
        user_id: profile.user_id,
        role,
        wallet_address: profile.wallet_address,
        username: profile.username,
    }
}

/// The authenticated user and their linked wallet.
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn get_current_user(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<UserMeResponse>, ApiError> {
    let profile = state.db.get_user(&user.user_id)?.unwrap_or(UserProfile {
        user_id: user.user_id.clone(),
        wallet_address: None,
        username: None,
        updated_at: Utc::now(),
    });
    Ok(Json(me(user.role, profile)))
}

/// Link a wallet address or set a username.
#[utoipa::path(
    put,
    path = "/api/users/me",
    tag = "Users",
    request_body = UpdateProfileRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated profile", body = UserMeResponse),
        (status = 400, description = "Invalid wallet address"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn update_current_user(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserMeResponse>, ApiError> {
    validate_user_id(&user.user_id)?;

    let mut profile = state.db.get_user(&user.user_id)?.unwrap_or(UserProfile {
        user_id: user.user_id.clone(),
        wallet_address: None,
        username: None,
        updated_at: Utc::now(),
    });

    if let Some(raw) = req.wallet_address {
        profile.wallet_address = match raw.trim() {
            "" => None,
            address => Some(
                WalletAddress::parse(address)
                    .map_err(|e| ApiError::bad_request(e.to_string()))?
                    .to_string(),
            ),
        };
    }
    if let Some(username) = req.username {
        let username = username.trim();
        profile.username = (!username.is_empty()).then(|| username.to_string());
    }
    profile.updated_at = Utc::now();

    state.db.upsert_user(&profile)?;
    info!(
        user_id = %profile.user_id,
        wallet = ?profile.wallet_address,
        "Profile updated"
    );
    Ok(Json(me(user.role, profile)))
}

#[cfg(test)]
mod tests {
    use crate::auth::extractor::tests::dev_token;
    use crate::auth::Role;
    use crate::test_support::TestApp;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn profile_round_trip() {
        let app = TestApp::new();
        let token = dev_token("user_1", Role::User);

        let (status, body) = app.request("GET", "/api/users/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["userId"], "user_1");
        assert_eq!(body["role"], "user");
        assert!(body.get("walletAddress").is_none());

        let (status, body) = app
            .request(
                "PUT",
                "/api/users/me",
                Some(&token),
                Some(json!({ "walletAddress": "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", "username": " pebbles " })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["walletAddress"], "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        assert_eq!(body["username"], "pebbles");

        // omitted fields are kept
        let (_, body) = app
            .request("PUT", "/api/users/me", Some(&token), Some(json!({ "username": "" })))
            .await;
        assert_eq!(body["walletAddress"], "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        assert!(body.get("username").is_none());
    }

    #[tokio::test]
    async fn invalid_wallet_is_rejected() {
        let app = TestApp::new();
        let token = dev_token("user_1", Role::User);
        let (status, _) = app
            .request("PUT", "/api/users/me", Some(&token), Some(json!({ "walletAddress": "0x12" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app.request("GET", "/api/users/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
