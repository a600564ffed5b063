// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::any::Any;

use alloy::primitives::Address;
use axum::{
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{AuthenticatedUser, Role},
    error::ApiError,
    models::{
        Nft, NftCollection, TokenBalance, WalletAddress, WalletBalanceResponse, WalletNftsResponse,
    },
    state::AppState,
    storage::{DiscoveredToken, HiddenItem, HiddenKind, StoredTip, TipStatus, TokenRecord},
};

pub mod health;
pub mod tips;
pub mod tokens;
pub mod users;
pub mod wallet;

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/wallet/balance", get(wallet::get_wallet_balance))
        .route("/wallet/nfts", get(wallet::get_wallet_nfts))
        .route("/tips", get(tips::list_tips).post(tips::create_tip))
        .route("/tips/{id}/verify", post(tips::verify_tip))
        .route(
            "/tokens/hidden",
            get(tokens::list_hidden)
                .put(tokens::hide)
                .delete(tokens::unhide),
        )
        .route("/admin/tokens", get(tokens::list_tokens))
        .route("/admin/tokens/discovered", get(tokens::list_discovered))
        .route("/admin/tokens/{address}", put(tokens::upsert_token))
        .route(
            "/users/me",
            get(users::get_current_user).put(users::update_current_user),
        );

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(CorsLayer::permissive()),
        )
}

/// Panics inside a handler become a 500 with the usual error body.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    ApiError::internal(format!("handler panicked: {detail}")).into_response()
}

// =============================================================================
// Shared request validation
// =============================================================================

/// User ids are opaque, but `|` separates key parts in storage.
pub(crate) fn validate_user_id(user_id: &str) -> Result<(), ApiError> {
    if user_id.trim().is_empty() {
        return Err(ApiError::bad_request("userId must not be empty"));
    }
    if user_id.contains('|') || user_id.chars().any(char::is_control) {
        return Err(ApiError::bad_request("userId contains invalid characters"));
    }
    Ok(())
}

/// Viewer for hidden-list filtering: explicit `userId`, else the caller.
pub(crate) fn viewer_id(
    query: Option<&str>,
    user: Option<&AuthenticatedUser>,
) -> Result<Option<String>, ApiError> {
    let viewer = query
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| user.map(|u| u.user_id.clone()));
    if let Some(ref id) = viewer {
        validate_user_id(id)?;
    }
    Ok(viewer)
}

/// Contract address in its stored form (lowercase, 0x prefixed).
pub(crate) fn parse_contract(raw: &str) -> Result<String, ApiError> {
    WalletAddress::parse(raw)
        .map(|a| a.to_string())
        .map_err(|e| ApiError::bad_request(format!("Invalid contract address: {e}")))
}

pub(crate) fn parse_address(raw: &str) -> Result<Address, ApiError> {
    WalletAddress::parse(raw)
        .map(|a| a.to_address())
        .map_err(|e| ApiError::bad_request(format!("Invalid address: {e}")))
}

// =============================================================================
// OpenAPI
// =============================================================================

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        wallet::get_wallet_balance,
        wallet::get_wallet_nfts,
        tips::list_tips,
        tips::create_tip,
        tips::verify_tip,
        tokens::list_hidden,
        tokens::hide,
        tokens::unhide,
        tokens::list_tokens,
        tokens::list_discovered,
        tokens::upsert_token,
        users::get_current_user,
        users::update_current_user
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            WalletAddress,
            TokenBalance,
            WalletBalanceResponse,
            Nft,
            NftCollection,
            WalletNftsResponse,
            StoredTip,
            TipStatus,
            tips::CreateTipRequest,
            tips::TipResponse,
            tips::TipListResponse,
            HiddenKind,
            HiddenItem,
            tokens::HideRequest,
            tokens::HiddenListResponse,
            tokens::UnhideResponse,
            TokenRecord,
            DiscoveredToken,
            tokens::TokenListResponse,
            tokens::DiscoveredListResponse,
            tokens::UpsertTokenRequest,
            Role,
            users::UserMeResponse,
            users::UpdateProfileRequest
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Wallet", description = "Wallet balances and NFTs"),
        (name = "Tips", description = "Community tips verified on-chain"),
        (name = "Tokens", description = "Per-user hidden tokens and NFTs"),
        (name = "Admin", description = "Token registry administration"),
        (name = "Users", description = "Profile and wallet link")
    )
)]
struct ApiDoc;
