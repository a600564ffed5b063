// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Records persisted in the embedded database.
//!
//! Records are stored as JSON and share their wire shape with the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Token registry entry, keyed by lowercase contract address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    /// Contract address (lowercase, 0x prefixed)
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    /// Reviewed by an admin
    #[serde(default)]
    pub verified: bool,
    /// Hidden from every user
    #[serde(default)]
    pub blacklisted: bool,
    /// Shown but not counted in `totalValueUsd`
    #[serde(default)]
    pub exclude_from_total: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Token seen by the holdings pipeline that is not in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredToken {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    /// Wallet of the earliest sighting
    pub first_seen_wallet: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub seen_count: u64,
}

impl DiscoveredToken {
    /// Fold another sighting of the same token into this one.
    ///
    /// Merging is commutative and associative, so concurrent writers can
    /// apply sightings in any order and converge on the same record.
    pub fn merge(&mut self, other: &DiscoveredToken) {
        let other_first = (other.first_seen_at, other.first_seen_wallet.as_str());
        if other_first < (self.first_seen_at, self.first_seen_wallet.as_str()) {
            self.first_seen_at = other.first_seen_at;
            self.first_seen_wallet = other.first_seen_wallet.clone();
        }
        if other.last_seen_at > self.last_seen_at
            || (other.last_seen_at == self.last_seen_at
                && (&other.symbol, &other.name, other.decimals)
                    > (&self.symbol, &self.name, self.decimals))
        {
            self.last_seen_at = other.last_seen_at;
            self.symbol = other.symbol.clone();
            self.name = other.name.clone();
            self.decimals = other.decimals;
        }
        self.seen_count = self.seen_count.saturating_add(other.seen_count);
    }
}

/// Link between an application user and their wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    /// Linked wallet (lowercase, 0x prefixed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Tip lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum TipStatus {
    /// Recorded, waiting for on-chain confirmation
    Pending,
    /// Verified on-chain
    Completed,
    /// Transaction reverted
    Failed,
}

impl std::str::FromStr for TipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("Unknown tip status: {other}")),
        }
    }
}

/// Stored tip record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredTip {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    /// Sender wallet at the time of the tip (lowercase)
    pub sender_wallet: String,
    /// Recipient wallet at the time of the tip (lowercase)
    pub recipient_wallet: String,
    /// Human-readable amount, e.g. "0.5"
    pub amount: String,
    /// Amount in base units (wei or token units), decimal string
    pub amount_raw: String,
    pub token_symbol: String,
    /// ERC-20 contract; absent for native tips
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_address: Option<String>,
    /// Transaction hash (lowercase), unique across tips
    pub tx_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: TipStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

impl StoredTip {
    /// Mark the tip as verified on-chain.
    pub fn mark_completed(&mut self, block_number: u64) {
        let now = Utc::now();
        self.status = TipStatus::Completed;
        self.block_number = Some(block_number);
        self.updated_at = now;
        self.verified_at = Some(now);
    }

    /// Mark the tip as failed (reverted on-chain).
    pub fn mark_failed(&mut self, block_number: u64) {
        let now = Utc::now();
        self.status = TipStatus::Failed;
        self.block_number = Some(block_number);
        self.updated_at = now;
        self.verified_at = Some(now);
    }
}

/// Kind of a hidden item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HiddenKind {
    Token,
    Nft,
}

/// One entry of a user's hidden list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HiddenItem {
    pub kind: HiddenKind,
    /// Contract address (lowercase)
    pub contract_address: String,
    /// Single NFT; absent when the whole collection is hidden
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    pub hidden_at: DateTime<Utc>,
}
