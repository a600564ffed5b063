// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Hidden-list and token registry endpoints.

use alloy::primitives::U256;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use super::{parse_contract, validate_user_id};
use crate::{
    auth::{AdminOnly, Auth},
    blockchain::erc20,
    error::ApiError,
    state::AppState,
    storage::{DiscoveredToken, HiddenItem, HiddenKind, TokenRecord},
};

// =============================================================================
// Hidden lists
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HideRequest {
    pub kind: HiddenKind,
    pub contract_address: String,
    /// Single NFT (decimal or 0x hex); omit to target the whole collection
    #[serde(default)]
    pub token_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HiddenListResponse {
    pub items: Vec<HiddenItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnhideResponse {
    /// Whether the item was hidden before
    pub removed: bool,
}

/// Validated hide/unhide target.
struct HideTarget {
    kind: HiddenKind,
    contract: String,
    token_id: Option<String>,
}

impl HideRequest {
    fn target(&self) -> Result<HideTarget, ApiError> {
        let contract = parse_contract(&self.contract_address)?;
        let token_id = match self.token_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(normalize_token_id(raw)?),
        };
        if self.kind == HiddenKind::Token && token_id.is_some() {
            return Err(ApiError::bad_request("tokenId is only valid for kind nft"));
        }
        Ok(HideTarget {
            kind: self.kind,
            contract,
            token_id,
        })
    }
}

/// Token ids are compared as decimal strings.
fn normalize_token_id(raw: &str) -> Result<String, ApiError> {
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(raw, 10),
    };
    parsed
        .map(|id| id.to_string())
        .map_err(|_| ApiError::bad_request(format!("Invalid tokenId: {raw}")))
}

/// The authenticated user's hidden tokens, collections and NFTs.
#[utoipa::path(
    get,
    path = "/api/tokens/hidden",
    tag = "Tokens",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Hidden items", body = HiddenListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_hidden(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<HiddenListResponse>, ApiError> {
    validate_user_id(&user.user_id)?;
    let items = state.db.list_hidden(&user.user_id)?;
    Ok(Json(HiddenListResponse { items }))
}

/// Hide a token, an NFT collection or a single NFT.
#[utoipa::path(
    put,
    path = "/api/tokens/hidden",
    tag = "Tokens",
    request_body = HideRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Hidden"),
        (status = 400, description = "Invalid contract address or token id"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn hide(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(req): Json<HideRequest>,
) -> Result<StatusCode, ApiError> {
    validate_user_id(&user.user_id)?;
    let target = req.target()?;
    match target.kind {
        HiddenKind::Token => state.db.hide_token(&user.user_id, &target.contract)?,
        HiddenKind::Nft => {
            state
                .db
                .hide_nft(&user.user_id, &target.contract, target.token_id.as_deref())?
        }
    }
    info!(
        user_id = %user.user_id,
        kind = ?target.kind,
        contract = %target.contract,
        token_id = ?target.token_id,
        "Item hidden"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Unhide a token, an NFT collection or a single NFT.
#[utoipa::path(
    delete,
    path = "/api/tokens/hidden",
    tag = "Tokens",
    request_body = HideRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Unhidden", body = UnhideResponse),
        (status = 400, description = "Invalid contract address or token id"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn unhide(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(req): Json<HideRequest>,
) -> Result<Json<UnhideResponse>, ApiError> {
    validate_user_id(&user.user_id)?;
    let target = req.target()?;
    let removed = match target.kind {
        HiddenKind::Token => state.db.unhide_token(&user.user_id, &target.contract)?,
        HiddenKind::Nft => {
            state
                .db
                .unhide_nft(&user.user_id, &target.contract, target.token_id.as_deref())?
        }
    };
    Ok(Json(UnhideResponse { removed }))
}

// =============================================================================
// Admin registry
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenListResponse {
    pub tokens: Vec<TokenRecord>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DiscoveredListResponse {
    pub tokens: Vec<DiscoveredToken>,
}

/// Registry changes; omitted fields keep their current value.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertTokenRequest {
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub decimals: Option<u8>,
    pub logo_url: Option<String>,
    pub verified: Option<bool>,
    pub blacklisted: Option<bool>,
    pub exclude_from_total: Option<bool>,
}

/// All registry entries.
#[utoipa::path(
    get,
    path = "/api/admin/tokens",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Token registry", body = TokenListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    )
)]
pub async fn list_tokens(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<TokenListResponse>, ApiError> {
    Ok(Json(TokenListResponse {
        tokens: state.db.list_tokens()?,
    }))
}

/// Tokens seen in wallets but not in the registry, most seen first.
#[utoipa::path(
    get,
    path = "/api/admin/tokens/discovered",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Discovered tokens", body = DiscoveredListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    )
)]
pub async fn list_discovered(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<DiscoveredListResponse>, ApiError> {
    let registry = state.db.token_registry()?;
    let mut tokens: Vec<DiscoveredToken> = state
        .db
        .list_discovered()?
        .into_iter()
        .filter(|t| !registry.contains_key(&t.address))
        .collect();
    tokens.sort_by(|a, b| {
        b.seen_count
            .cmp(&a.seen_count)
            .then_with(|| a.address.cmp(&b.address))
    });
    Ok(Json(DiscoveredListResponse { tokens }))
}

/// Create or update a registry entry.
///
/// Missing metadata is taken from the existing entry, then the discovered
/// sighting, then the contract itself.
#[utoipa::path(
    put,
    path = "/api/admin/tokens/{address}",
    tag = "Admin",
    params(("address" = String, Path, description = "Token contract address")),
    request_body = UpsertTokenRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Registry entry", body = TokenRecord),
        (status = 400, description = "Invalid address"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    )
)]
pub async fn upsert_token(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(req): Json<UpsertTokenRequest>,
) -> Result<Json<TokenRecord>, ApiError> {
    let address = parse_contract(&address)?;
    let now = Utc::now();

    let mut record = match state.db.get_token(&address)? {
        Some(existing) => existing,
        None => new_record(&state, &address, &req, now).await?,
    };

    if let Some(symbol) = req.symbol.filter(|s| !s.trim().is_empty()) {
        record.symbol = symbol;
    }
    if let Some(name) = req.name.filter(|s| !s.trim().is_empty()) {
        record.name = name;
    }
    if let Some(decimals) = req.decimals {
        record.decimals = decimals;
    }
    if let Some(logo) = req.logo_url {
        record.logo_url = Some(logo).filter(|l| !l.trim().is_empty());
    }
    if let Some(verified) = req.verified {
        record.verified = verified;
    }
    if let Some(blacklisted) = req.blacklisted {
        record.blacklisted = blacklisted;
    }
    if let Some(exclude) = req.exclude_from_total {
        record.exclude_from_total = exclude;
    }
    record.updated_at = now;

    state.db.upsert_token(&record)?;
    info!(
        admin = %admin.user_id,
        token = %record.address,
        verified = record.verified,
        blacklisted = record.blacklisted,
        exclude_from_total = record.exclude_from_total,
        "Token registry updated"
    );
    Ok(Json(record))
}

/// First registry entry for `address`, seeded without touching the chain
/// when the request or a sighting already carries the metadata.
async fn new_record(
    state: &AppState,
    address: &str,
    req: &UpsertTokenRequest,
    now: chrono::DateTime<Utc>,
) -> Result<TokenRecord, ApiError> {
    let (symbol, name, decimals) = match state.db.get_discovered(address)? {
        Some(seen) => (seen.symbol, seen.name, seen.decimals),
        None if req.symbol.is_some() && req.name.is_some() && req.decimals.is_some() => {
            (String::new(), String::new(), 0)
        }
        None => {
            let contract = super::parse_address(address)?;
            let meta = erc20::token_metadata(state.rpc.as_ref(), contract).await;
            (meta.symbol, meta.name, meta.decimals)
        }
    };
    Ok(TokenRecord {
        address: address.to_string(),
        symbol,
        name,
        decimals,
        logo_url: None,
        verified: false,
        blacklisted: false,
        exclude_from_total: false,
        created_at: now,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::extractor::tests::dev_token;
    use crate::auth::Role;
    use crate::blockchain::{erc20::IERC20, lower_hex};
    use crate::test_support::{erc20_transfer, TestApp};
    use alloy::primitives::Address;
    use alloy::sol_types::{SolCall, SolValue};
    use serde_json::json;

    fn wallet() -> Address {
        Address::repeat_byte(0xaa)
    }

    /// Fund `wallet` with 5 units of an 18-decimal token named `symbol`.
    fn fund(app: &TestApp, token: Address, symbol: &str) {
        app.chain
            .add_log(erc20_transfer(token, Address::repeat_byte(0xbb), wallet(), 1, 0));
        app.chain.set_call(
            token,
            IERC20::balanceOfCall { account: wallet() }.abi_encode(),
            U256::from(5u64).abi_encode(),
        );
        app.chain
            .set_call(token, IERC20::symbolCall {}.abi_encode(), symbol.to_string().abi_encode());
        app.chain
            .set_call(token, IERC20::decimalsCall {}.abi_encode(), U256::from(0u8).abi_encode());
    }

    fn symbols(body: &serde_json::Value) -> Vec<String> {
        body["tokens"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["symbol"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn token_ids_are_normalized_to_decimal() {
        assert_eq!(normalize_token_id("42").unwrap(), "42");
        assert_eq!(normalize_token_id("0x2a").unwrap(), "42");
        assert_eq!(normalize_token_id("007").unwrap(), "7");
        assert!(normalize_token_id("abc").is_err());
    }

    #[test]
    fn token_kind_rejects_token_id() {
        let req = HideRequest {
            kind: HiddenKind::Token,
            contract_address: lower_hex(&Address::repeat_byte(1)),
            token_id: Some("1".to_string()),
        };
        assert!(req.target().is_err());
    }

    #[tokio::test]
    async fn hiding_is_per_user() {
        let app = TestApp::new();
        let token = Address::repeat_byte(0x10);
        fund(&app, token, "AAA");
        let alice = dev_token("alice", Role::User);
        let uri = format!("/api/wallet/balance?address={}", lower_hex(&wallet()));

        let hide = json!({ "kind": "token", "contractAddress": lower_hex(&token).to_uppercase().replace("0X", "0x") });
        let (status, _) = app.request("PUT", "/api/tokens/hidden", Some(&alice), Some(hide.clone())).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, hidden) = app.request("GET", "/api/tokens/hidden", Some(&alice), None).await;
        assert_eq!(hidden["items"][0]["contractAddress"], lower_hex(&token));

        let (_, for_alice) = app.request("GET", &format!("{uri}&userId=alice"), None, None).await;
        assert!(symbols(&for_alice).is_empty());

        // the bearer token identifies the viewer when userId is absent
        let (_, as_alice) = app.request("GET", &uri, Some(&alice), None).await;
        assert!(symbols(&as_alice).is_empty());

        let (_, for_bob) = app.request("GET", &format!("{uri}&userId=bob"), None, None).await;
        assert_eq!(symbols(&for_bob), vec!["AAA"]);

        let (status, body) = app.request("DELETE", "/api/tokens/hidden", Some(&alice), Some(hide.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], true);
        let (_, body) = app.request("DELETE", "/api/tokens/hidden", Some(&alice), Some(hide)).await;
        assert_eq!(body["removed"], false);

        let (_, for_alice) = app.request("GET", &format!("{uri}&userId=alice"), None, None).await;
        assert_eq!(symbols(&for_alice), vec!["AAA"]);
    }

    #[tokio::test]
    async fn hidden_endpoints_require_auth() {
        let app = TestApp::new();
        let (status, _) = app.request("GET", "/api/tokens/hidden", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let alice = dev_token("alice", Role::User);
        let bad = json!({ "kind": "token", "contractAddress": "0x1234" });
        let (status, _) = app.request("PUT", "/api/tokens/hidden", Some(&alice), Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn blacklist_applies_to_all_users() {
        let app = TestApp::new();
        let good = Address::repeat_byte(0x10);
        let spam = Address::repeat_byte(0x20);
        fund(&app, good, "GOOD");
        fund(&app, spam, "SPAM");
        let admin = dev_token("root", Role::Admin);
        let uri = format!("/api/wallet/balance?address={}", lower_hex(&wallet()));

        let (_, before) = app.request("GET", &uri, None, None).await;
        assert_eq!(symbols(&before), vec!["GOOD", "SPAM"]);

        let (status, record) = app
            .request(
                "PUT",
                &format!("/api/admin/tokens/{}", lower_hex(&spam)),
                Some(&admin),
                Some(json!({ "blacklisted": true })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(record["symbol"], "SPAM");
        assert_eq!(record["blacklisted"], true);

        for viewer in ["alice", "bob"] {
            let (_, after) = app.request("GET", &format!("{uri}&userId={viewer}"), None, None).await;
            assert_eq!(symbols(&after), vec!["GOOD"]);
        }
        let (_, anonymous) = app.request("GET", &uri, None, None).await;
        assert_eq!(symbols(&anonymous), vec!["GOOD"]);
    }

    #[tokio::test]
    async fn admin_endpoints_require_admin() {
        let app = TestApp::new();
        let user = dev_token("alice", Role::User);
        let (status, _) = app.request("GET", "/api/admin/tokens", Some(&user), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = app.request("GET", "/api/admin/tokens/discovered", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn upsert_merges_request_over_existing_record() {
        let app = TestApp::new();
        let admin = dev_token("root", Role::Admin);
        let token = Address::repeat_byte(0x30);
        let uri = format!("/api/admin/tokens/{}", lower_hex(&token));

        let (status, created) = app
            .request(
                "PUT",
                &uri,
                Some(&admin),
                Some(json!({ "symbol": "PEB", "name": "PeBloq", "decimals": 18, "verified": true })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["verified"], true);
        assert_eq!(created["excludeFromTotal"], false);

        let (_, updated) = app
            .request("PUT", &uri, Some(&admin), Some(json!({ "excludeFromTotal": true })))
            .await;
        assert_eq!(updated["symbol"], "PEB");
        assert_eq!(updated["verified"], true);
        assert_eq!(updated["excludeFromTotal"], true);

        let (_, list) = app.request("GET", "/api/admin/tokens", Some(&admin), None).await;
        assert_eq!(list["tokens"].as_array().unwrap().len(), 1);

        let (status, _) = app
            .request("PUT", "/api/admin/tokens/not-an-address", Some(&admin), Some(json!({})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn discovered_list_skips_registered_tokens() {
        let app = TestApp::new();
        let admin = dev_token("root", Role::Admin);
        let now = Utc::now();
        for (byte, count) in [(0x41u8, 1u64), (0x42, 5)] {
            app.db
                .upsert_discovered(&DiscoveredToken {
                    address: lower_hex(&Address::repeat_byte(byte)),
                    symbol: format!("T{byte}"),
                    name: "Token".to_string(),
                    decimals: 18,
                    first_seen_wallet: lower_hex(&wallet()),
                    first_seen_at: now,
                    last_seen_at: now,
                    seen_count: count,
                })
                .unwrap();
        }

        let (_, body) = app.request("GET", "/api/admin/tokens/discovered", Some(&admin), None).await;
        assert_eq!(symbols(&body), vec!["T66", "T65"]);

        // registering seeds metadata from the sighting
        let (_, record) = app
            .request(
                "PUT",
                &format!("/api/admin/tokens/{}", lower_hex(&Address::repeat_byte(0x42))),
                Some(&admin),
                Some(json!({ "verified": true })),
            )
            .await;
        assert_eq!(record["symbol"], "T66");

        let (_, body) = app.request("GET", "/api/admin/tokens/discovered", Some(&admin), None).await;
        assert_eq!(symbols(&body), vec!["T65"]);
    }
}
