// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Unfiltered holdings snapshots produced by the pipeline.

use alloy::primitives::{Address, U256};

use crate::blockchain::units_to_f64;

/// A resolved ERC-20 position.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenHolding {
    pub contract: Address,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    /// Always non-zero
    pub raw_balance: U256,
    pub logo_url: Option<String>,
    pub price_usd: Option<f64>,
    pub verified: bool,
    pub exclude_from_total: bool,
}

impl TokenHolding {
    /// `balance * priceUsd`, when a price is known and the decimals are
    /// in range.
    pub fn value_usd(&self) -> Option<f64> {
        let price = self.price_usd?;
        units_to_f64(self.raw_balance, self.decimals)
            .ok()
            .map(|balance| balance * price)
    }
}

/// One owned NFT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftItem {
    pub token_id: U256,
    pub name: Option<String>,
    pub image: Option<String>,
    pub token_uri: Option<String>,
}

/// Owned NFTs of one contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionHolding {
    pub contract: Address,
    pub name: String,
    pub symbol: String,
    /// Ascending token id; never empty
    pub items: Vec<NftItem>,
}

/// Native and ERC-20 balances of a wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceSnapshot {
    pub wallet: Address,
    pub native_raw: U256,
    pub tokens: Vec<TokenHolding>,
}

/// NFT collections of a wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftSnapshot {
    pub wallet: Address,
    pub collections: Vec<CollectionHolding>,
}
