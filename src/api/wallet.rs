// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet holdings endpoints.
//!
//! Both endpoints are public. The viewer whose hidden lists apply is the
//! `userId` query parameter, or the authenticated user when it is absent.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use super::viewer_id;
use crate::{
    auth::OptionalAuth,
    error::ApiError,
    models::{WalletAddress, WalletBalanceResponse, WalletNftsResponse},
    state::AppState,
};

/// Query parameters of the holdings endpoints.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(rename_all = "camelCase", parameter_in = Query)]
pub struct WalletQuery {
    /// Wallet address (0x + 40 hex chars)
    pub address: Option<String>,
    /// Viewer whose hidden tokens and NFTs are filtered out
    pub user_id: Option<String>,
    /// Bypass and replace the snapshot cache
    #[param(default = false)]
    pub refresh: Option<bool>,
}

impl WalletQuery {
    fn wallet(&self) -> Result<WalletAddress, ApiError> {
        let raw = self
            .address
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("address query parameter is required"))?;
        WalletAddress::parse(raw).map_err(|e| ApiError::bad_request(e.to_string()))
    }
}

/// Native and ERC-20 balances of a wallet.
#[utoipa::path(
    get,
    path = "/api/wallet/balance",
    tag = "Wallet",
    params(WalletQuery),
    responses(
        (status = 200, description = "Wallet balances", body = WalletBalanceResponse),
        (status = 400, description = "Missing or malformed address"),
        (status = 503, description = "Blockchain RPC unavailable")
    )
)]
pub async fn get_wallet_balance(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<WalletQuery>,
) -> Result<Json<WalletBalanceResponse>, ApiError> {
    let wallet = query.wallet()?;
    let viewer = viewer_id(query.user_id.as_deref(), user.as_ref())?;

    let response = state
        .holdings
        .wallet_balance(&wallet, viewer.as_deref(), query.refresh.unwrap_or(false))
        .await?;
    Ok(Json(response))
}

/// NFT collections of a wallet.
#[utoipa::path(
    get,
    path = "/api/wallet/nfts",
    tag = "Wallet",
    params(WalletQuery),
    responses(
        (status = 200, description = "Wallet NFTs", body = WalletNftsResponse),
        (status = 400, description = "Missing or malformed address"),
        (status = 503, description = "Blockchain RPC unavailable")
    )
)]
pub async fn get_wallet_nfts(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<WalletQuery>,
) -> Result<Json<WalletNftsResponse>, ApiError> {
    let wallet = query.wallet()?;
    let viewer = viewer_id(query.user_id.as_deref(), user.as_ref())?;

    let response = state
        .holdings
        .wallet_nfts(&wallet, viewer.as_deref(), query.refresh.unwrap_or(false))
        .await?;
    Ok(Json(response))
}
