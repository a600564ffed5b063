// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Response payloads of the holdings endpoints and the shared
//! [`WalletAddress`] type. All payloads use camelCase field names.
//!
//! Handler-specific request types live next to their handlers in
//! [`crate::api`]; persisted records double as API types (see
//! [`crate::storage::records`]).

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// Wallet Address Type
// =============================================================================

/// Ethereum-compatible wallet address.
///
/// Format: `0x` followed by 40 hexadecimal characters (20 bytes). Parsing is
/// case-insensitive and the address is always rendered lowercase.
///
/// # Example
///
/// ```rust,ignore
/// let addr = WalletAddress::parse("0x742d35Cc6634C0532925a3b844Bc9e7595f4aB12")?;
/// assert_eq!(addr.as_str(), "0x742d35cc6634c0532925a3b844bc9e7595f4ab12");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String, example = "0x742d35cc6634c0532925a3b844bc9e7595f4ab12")]
pub struct WalletAddress(String);

/// Reason an address string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("Address must start with 0x")]
    MissingPrefix,

    #[error("Address must be 42 characters (0x + 40 hex)")]
    Length,

    #[error("Address must contain only hex characters")]
    NotHex,
}

impl WalletAddress {
    /// Validate and normalise an address.
    pub fn parse(value: &str) -> Result<Self, AddressError> {
        let value = value.trim();
        let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) else {
            return Err(AddressError::MissingPrefix);
        };
        if hex.len() != 40 {
            return Err(AddressError::Length);
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressError::NotHex);
        }
        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The address as a 20-byte value.
    pub fn to_address(&self) -> Address {
        // Validated in `parse`
        self.0.parse().unwrap_or(Address::ZERO)
    }
}

impl std::fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WalletAddress> for String {
    fn from(value: WalletAddress) -> Self {
        value.0
    }
}

impl From<Address> for WalletAddress {
    fn from(value: Address) -> Self {
        Self(crate::blockchain::lower_hex(&value))
    }
}

// =============================================================================
// Balance Models
// =============================================================================

/// One ERC-20 position of a wallet.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    /// Token contract (lowercase)
    pub contract_address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    /// Balance in base units, decimal string
    pub raw_balance: String,
    /// Balance with exactly 6 fractional digits, truncated
    #[schema(example = "1.500000")]
    pub balance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_usd: Option<f64>,
    pub verified: bool,
    pub exclude_from_total: bool,
}

/// Response for `GET /api/wallet/balance`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalanceResponse {
    pub wallet_address: WalletAddress,
    /// Native balance with exactly 6 fractional digits, rounded half-up
    #[schema(example = "0.000000")]
    pub native_balance: String,
    /// Native balance in wei, decimal string
    pub native_balance_raw: String,
    pub native_symbol: String,
    /// Visible tokens, highest value first
    pub tokens: Vec<TokenBalance>,
    /// Sum of visible `valueUsd`, excluding `excludeFromTotal` tokens
    pub total_value_usd: f64,
}

// =============================================================================
// NFT Models
// =============================================================================

/// One owned NFT.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Nft {
    /// Token id, decimal string
    pub token_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
}

/// Owned NFTs of one contract.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NftCollection {
    /// Collection contract (lowercase)
    pub contract_address: String,
    pub name: String,
    pub symbol: String,
    /// Number of visible NFTs in this collection
    pub count: usize,
    pub nfts: Vec<Nft>,
}

/// Response for `GET /api/wallet/nfts`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WalletNftsResponse {
    pub wallet_address: WalletAddress,
    pub collections: Vec<NftCollection>,
    /// Visible token ids across all collections
    #[serde(rename = "totalNFTs")]
    pub total_nfts: usize,
}
