// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tip endpoints.
//!
//! A tip is recorded only after its transaction has been located on-chain
//! and matched against the sender's and recipient's linked wallets and the
//! tipped amount.

use std::str::FromStr;

use alloy::primitives::{Address, B256, U256};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{parse_contract, validate_user_id};
use crate::{
    auth::{AdminOnly, Auth},
    blockchain::{
        erc20::{self, ContractCallError},
        lower_hex,
        transactions::{check_transfer, parse_amount, TransferCheck, TransferExpectation},
    },
    error::ApiError,
    state::AppState,
    storage::{StoredTip, TipDirection, TipQuery, TipStatus},
};

pub const DEFAULT_TIP_LIMIT: usize = 50;
pub const MAX_TIP_LIMIT: usize = 200;

/// Precision accepted for tip amounts, and the decimals of the native coin.
const AMOUNT_DECIMALS: u8 = 18;

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(rename_all = "camelCase", parameter_in = Query)]
pub struct TipListQuery {
    /// Only tips sent or received by this user
    pub user_id: Option<String>,
    /// `sent`, `received` or `all` (default)
    pub direction: Option<String>,
    /// `PENDING`, `COMPLETED` or `FAILED`
    pub status: Option<String>,
    /// Max results (default 50, max 200)
    #[param(default = 50)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTipRequest {
    pub recipient_id: String,
    /// Human-readable amount, e.g. "0.5"
    pub amount: String,
    /// Used only for unregistered tokens whose contract has no symbol;
    /// native tips always carry the network's symbol
    #[serde(default)]
    pub token_symbol: Option<String>,
    /// ERC-20 contract; absent for native tips
    #[serde(default)]
    pub token_address: Option<String>,
    pub tx_hash: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// A tip with a link to the block explorer.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TipResponse {
    #[serde(flatten)]
    pub tip: StoredTip,
    pub explorer_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TipListResponse {
    pub tips: Vec<TipResponse>,
}

impl TipResponse {
    fn new(tip: StoredTip, state: &AppState) -> Self {
        let explorer_url = state.tips.network.tx_url(&tip.tx_hash);
        Self { tip, explorer_url }
    }
}

// =============================================================================
// Validation
// =============================================================================

/// `0x` + 64 hex chars, returned lowercased.
fn parse_tx_hash(raw: &str) -> Result<(String, B256), ApiError> {
    let raw = raw.trim();
    let hex = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| ApiError::bad_request("txHash must start with 0x"))?;
    if hex.len() != 64 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ApiError::bad_request("txHash must be 0x followed by 64 hex characters"));
    }
    let normalized = format!("0x{}", hex.to_ascii_lowercase());
    let hash = B256::from_str(&normalized)
        .map_err(|_| ApiError::bad_request("txHash must be 0x followed by 64 hex characters"))?;
    Ok((normalized, hash))
}

/// Positive decimal amount with at most 18 fractional digits.
fn validate_amount(raw: &str) -> Result<String, ApiError> {
    let amount = raw.trim();
    let units = parse_amount(amount, AMOUNT_DECIMALS)
        .map_err(|e| ApiError::bad_request(format!("amount: {e}")))?;
    if units == U256::ZERO {
        return Err(ApiError::bad_request("amount must be greater than zero"));
    }
    Ok(amount.to_string())
}

fn parse_direction(raw: Option<&str>) -> Result<TipDirection, ApiError> {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        None | Some("all") => Ok(TipDirection::All),
        Some("sent") => Ok(TipDirection::Sent),
        Some("received") => Ok(TipDirection::Received),
        Some(other) => Err(ApiError::bad_request(format!(
            "direction must be sent, received or all, got {other}"
        ))),
    }
}

/// Wallet stored on a tip or profile.
fn stored_wallet(raw: &str) -> Result<Address, ApiError> {
    Address::from_str(raw).map_err(|e| ApiError::internal(format!("stored wallet {raw}: {e}")))
}

/// Linked wallet of a user, or 404.
fn linked_wallet(state: &AppState, user_id: &str, role: &str) -> Result<String, ApiError> {
    let profile = state
        .db
        .get_user(user_id)?
        .ok_or_else(|| ApiError::not_found(format!("{role} {user_id} not found")))?;
    profile
        .wallet_address
        .ok_or_else(|| ApiError::not_found(format!("{role} {user_id} has no linked wallet")))
}

/// Symbol and decimals of the tipped asset.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TipToken {
    symbol: String,
    decimals: u8,
}

/// Resolve the tipped asset: the native coin, a registry entry, or the
/// contract itself. The client's symbol is a last resort for tokens.
async fn resolve_tip_token(
    state: &AppState,
    token_address: Option<&str>,
    token: Option<Address>,
    requested_symbol: Option<String>,
) -> Result<TipToken, ApiError> {
    let (Some(address), Some(token)) = (token_address, token) else {
        let symbol = state.tips.network.native_symbol.clone();
        if let Some(requested) = requested_symbol.filter(|s| *s != symbol) {
            warn!(requested = %requested, native = %symbol, "Ignoring tokenSymbol on native tip");
        }
        return Ok(TipToken {
            symbol,
            decimals: AMOUNT_DECIMALS,
        });
    };
    if let Some(record) = state.db.get_token(address)? {
        return Ok(TipToken {
            symbol: record.symbol,
            decimals: record.decimals,
        });
    }

    let rpc = state.rpc.as_ref();
    let (decimals, symbol) = tokio::join!(erc20::decimals(rpc, token), erc20::symbol(rpc, token));
    let decimals = match decimals {
        Ok(decimals) => decimals,
        Err(ContractCallError::Rpc(e)) => return Err(e.into()),
        Err(ContractCallError::Decode(_)) => {
            return Err(ApiError::bad_request(format!("{address} is not an ERC-20 token")));
        }
    };
    let symbol = symbol
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or(requested_symbol)
        .unwrap_or_else(|| erc20::UNKNOWN_SYMBOL.to_string());
    Ok(TipToken { symbol, decimals })
}

/// Tip amount in base units of its token.
fn base_units(amount: &str, decimals: u8) -> Result<U256, ApiError> {
    let units = parse_amount(amount, decimals)
        .map_err(|e| ApiError::bad_request(format!("amount: {e}")))?;
    if units == U256::ZERO {
        return Err(ApiError::bad_request("amount must be greater than zero"));
    }
    Ok(units)
}

/// Error for a transaction that does not move value as expected.
fn mismatch_error(check: TransferCheck) -> ApiError {
    match check {
        TransferCheck::SenderMismatch { actual } => ApiError::forbidden(format!(
            "Transaction was sent by {}, not the sender's wallet",
            lower_hex(&actual)
        )),
        TransferCheck::RecipientMismatch { actual: Some(actual) } => ApiError::bad_request(format!(
            "Transaction goes to {}, not the expected destination",
            lower_hex(&actual)
        )),
        TransferCheck::RecipientMismatch { actual: None } => {
            ApiError::bad_request("Transaction does not transfer to the recipient's wallet")
        }
        TransferCheck::AmountShortfall { expected, actual } => ApiError::bad_request(format!(
            "Transaction moves {actual} base units, tip claims {expected}"
        )),
        other => ApiError::internal(format!("unexpected transfer outcome {other:?}")),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// List tips, newest first.
#[utoipa::path(
    get,
    path = "/api/tips",
    tag = "Tips",
    params(TipListQuery),
    responses(
        (status = 200, description = "Tips", body = TipListResponse),
        (status = 400, description = "Invalid filter")
    )
)]
pub async fn list_tips(
    State(state): State<AppState>,
    Query(query): Query<TipListQuery>,
) -> Result<Json<TipListResponse>, ApiError> {
    if let Some(user_id) = query.user_id.as_deref() {
        validate_user_id(user_id)?;
    }
    let direction = parse_direction(query.direction.as_deref())?;
    let status = query
        .status
        .as_deref()
        .map(TipStatus::from_str)
        .transpose()
        .map_err(ApiError::bad_request)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TIP_LIMIT)
        .clamp(1, MAX_TIP_LIMIT);

    let tips = state.db.list_tips(&TipQuery {
        user_id: query.user_id,
        direction,
        status,
        limit,
    })?;

    Ok(Json(TipListResponse {
        tips: tips.into_iter().map(|t| TipResponse::new(t, &state)).collect(),
    }))
}

/// Record a tip sent by the authenticated user.
///
/// The transaction must already be known to the node. A mined and
/// confirmed transfer is stored as `COMPLETED`; one that is not yet deep
/// enough is stored as `PENDING` for later verification.
#[utoipa::path(
    post,
    path = "/api/tips",
    tag = "Tips",
    request_body = CreateTipRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Tip recorded", body = TipResponse),
        (status = 400, description = "Invalid request, or a reverted, misdirected or short transaction"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Transaction not sent by the sender's wallet"),
        (status = 404, description = "Recipient or linked wallet not found"),
        (status = 409, description = "Transaction already recorded"),
        (status = 425, description = "Transaction not found yet"),
        (status = 503, description = "Blockchain RPC unavailable")
    )
)]
pub async fn create_tip(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(req): Json<CreateTipRequest>,
) -> Result<(StatusCode, Json<TipResponse>), ApiError> {
    let recipient_id = req.recipient_id.trim().to_string();
    validate_user_id(&recipient_id)?;
    let amount = validate_amount(&req.amount)?;
    let (tx_hash, hash) = parse_tx_hash(&req.tx_hash)?;
    let token_address = req
        .token_address
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .map(parse_contract)
        .transpose()?;

    if recipient_id == user.user_id {
        return Err(ApiError::bad_request("Cannot tip yourself"));
    }

    let sender_wallet = linked_wallet(&state, &user.user_id, "Sender")?;
    let recipient_wallet = linked_wallet(&state, &recipient_id, "Recipient")?;

    if state.db.get_tip_by_tx_hash(&tx_hash)?.is_some() {
        return Err(ApiError::conflict(format!("Transaction {tx_hash} already recorded")));
    }

    let token = token_address.as_deref().map(stored_wallet).transpose()?;
    let tip_token =
        resolve_tip_token(&state, token_address.as_deref(), token, req.token_symbol).await?;
    let amount_raw = base_units(&amount, tip_token.decimals)?;

    let expected = TransferExpectation {
        sender: stored_wallet(&sender_wallet)?,
        recipient: stored_wallet(&recipient_wallet)?,
        token,
        amount: amount_raw,
    };
    let check = check_transfer(
        state.rpc.as_ref(),
        hash,
        &expected,
        state.tips.min_confirmations,
    )
    .await?;

    let (status, block_number) = match check {
        TransferCheck::NotFound => {
            return Err(ApiError::too_early("Transaction not found yet, retry shortly"));
        }
        TransferCheck::Reverted { block_number } => {
            warn!(tx_hash = %tx_hash, block_number, "Tip transaction reverted");
            return Err(ApiError::bad_request("Transaction reverted"));
        }
        TransferCheck::Pending { .. } => (TipStatus::Pending, None),
        TransferCheck::Confirmed { block_number } => (TipStatus::Completed, Some(block_number)),
        mismatch => {
            warn!(tx_hash = %tx_hash, sender = %user.user_id, outcome = ?mismatch, "Tip transaction mismatch");
            return Err(mismatch_error(mismatch));
        }
    };

    let now = Utc::now();
    let tip = StoredTip {
        id: Uuid::new_v4().to_string(),
        sender_id: user.user_id.clone(),
        recipient_id,
        sender_wallet,
        recipient_wallet,
        amount,
        amount_raw: amount_raw.to_string(),
        token_symbol: tip_token.symbol,
        token_address,
        tx_hash,
        message: req.message.filter(|m| !m.trim().is_empty()),
        status,
        block_number,
        created_at: now,
        updated_at: now,
        verified_at: (status == TipStatus::Completed).then_some(now),
    };
    state.db.insert_tip(&tip)?;

    info!(
        tip_id = %tip.id,
        tx_hash = %tip.tx_hash,
        sender = %tip.sender_id,
        recipient = %tip.recipient_id,
        status = ?tip.status,
        "Tip recorded"
    );

    Ok((StatusCode::CREATED, Json(TipResponse::new(tip, &state))))
}

/// Re-check a pending tip against the chain.
#[utoipa::path(
    post,
    path = "/api/tips/{id}/verify",
    tag = "Tips",
    params(("id" = String, Path, description = "Tip ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Tip completed or failed", body = TipResponse),
        (status = 400, description = "Transaction misdirected or short of the tip amount"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only, or transaction not sent by the sender's wallet"),
        (status = 404, description = "Tip not found"),
        (status = 409, description = "Tip is not pending"),
        (status = 425, description = "Transaction not confirmed yet"),
        (status = 503, description = "Blockchain RPC unavailable")
    )
)]
pub async fn verify_tip(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TipResponse>, ApiError> {
    let tip = state
        .db
        .get_tip(&id)?
        .ok_or_else(|| ApiError::not_found(format!("Tip {id} not found")))?;
    if tip.status != TipStatus::Pending {
        return Err(ApiError::conflict(format!("Tip {id} is not pending")));
    }

    let (_, hash) = parse_tx_hash(&tip.tx_hash)?;
    let expected = TransferExpectation {
        sender: stored_wallet(&tip.sender_wallet)?,
        recipient: stored_wallet(&tip.recipient_wallet)?,
        token: tip.token_address.as_deref().map(stored_wallet).transpose()?,
        amount: U256::from_str_radix(&tip.amount_raw, 10)
            .map_err(|e| ApiError::internal(format!("stored amount {}: {e}", tip.amount_raw)))?,
    };
    let check = check_transfer(
        state.rpc.as_ref(),
        hash,
        &expected,
        state.tips.min_confirmations,
    )
    .await?;

    let updated = match check {
        TransferCheck::NotFound => {
            return Err(ApiError::too_early("Transaction not found yet"));
        }
        TransferCheck::Pending { confirmations } => {
            return Err(ApiError::too_early(format!(
                "Transaction has {confirmations} of {} confirmations",
                state.tips.min_confirmations.max(1)
            )));
        }
        TransferCheck::Reverted { block_number } => {
            state.db.update_pending_tip(&id, |t| t.mark_failed(block_number))?
        }
        TransferCheck::Confirmed { block_number } => {
            state.db.update_pending_tip(&id, |t| t.mark_completed(block_number))?
        }
        mismatch => {
            warn!(tip_id = %id, outcome = ?mismatch, "Tip verification mismatch");
            return Err(mismatch_error(mismatch));
        }
    };

    info!(
        tip_id = %updated.id,
        admin = %admin.user_id,
        status = ?updated.status,
        "Tip verified"
    );

    Ok(Json(TipResponse::new(updated, &state)))
}
