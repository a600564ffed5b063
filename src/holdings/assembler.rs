// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Builds the JSON payloads from filtered snapshots.

use tracing::warn;

use super::types::{BalanceSnapshot, CollectionHolding, NftSnapshot, TokenHolding};
use super::visibility::Visibility;
use crate::blockchain::{format_units, lower_hex, Rounding};
use crate::models::{
    Nft, NftCollection, TokenBalance, WalletAddress, WalletBalanceResponse, WalletNftsResponse,
};

/// Decimals of the native currency.
const NATIVE_DECIMALS: u8 = 18;

/// None when the balance cannot be rendered at the token's decimals.
fn token_balance(holding: TokenHolding) -> Option<TokenBalance> {
    let balance = match format_units(holding.raw_balance, holding.decimals, Rounding::Truncate) {
        Ok(balance) => balance,
        Err(e) => {
            warn!(contract = %lower_hex(&holding.contract), error = %e, "Dropping unrenderable token balance");
            return None;
        }
    };
    let value_usd = holding.value_usd();
    Some(TokenBalance {
        contract_address: lower_hex(&holding.contract),
        balance,
        raw_balance: holding.raw_balance.to_string(),
        symbol: holding.symbol,
        name: holding.name,
        decimals: holding.decimals,
        logo_url: holding.logo_url,
        price_usd: holding.price_usd,
        value_usd,
        verified: holding.verified,
        exclude_from_total: holding.exclude_from_total,
    })
}

fn nft_collection(collection: CollectionHolding) -> NftCollection {
    let nfts: Vec<Nft> = collection
        .items
        .into_iter()
        .map(|item| Nft {
            token_id: item.token_id.to_string(),
            name: item.name,
            image: item.image,
            token_uri: item.token_uri,
        })
        .collect();
    NftCollection {
        contract_address: lower_hex(&collection.contract),
        name: collection.name,
        symbol: collection.symbol,
        count: nfts.len(),
        nfts,
    }
}

/// Filter a balance snapshot for one viewer and compute its total.
pub fn balance_response(
    snapshot: BalanceSnapshot,
    visibility: &Visibility,
    native_symbol: &str,
) -> WalletBalanceResponse {
    let tokens: Vec<TokenBalance> = visibility
        .filter_tokens(snapshot.tokens)
        .into_iter()
        .filter_map(token_balance)
        .collect();

    let total_value_usd = tokens
        .iter()
        .filter(|t| !t.exclude_from_total)
        .filter_map(|t| t.value_usd)
        .sum();

    let native_balance = format_units(snapshot.native_raw, NATIVE_DECIMALS, Rounding::HalfUp)
        .unwrap_or_else(|e| {
            warn!(error = %e, "Native balance not renderable, showing raw units");
            snapshot.native_raw.to_string()
        });

    WalletBalanceResponse {
        wallet_address: WalletAddress::from(snapshot.wallet),
        native_balance,
        native_balance_raw: snapshot.native_raw.to_string(),
        native_symbol: native_symbol.to_string(),
        tokens,
        total_value_usd,
    }
}

/// Filter an NFT snapshot for one viewer.
pub fn nfts_response(snapshot: NftSnapshot, visibility: &Visibility) -> WalletNftsResponse {
    let collections: Vec<NftCollection> = visibility
        .filter_collections(snapshot.collections)
        .into_iter()
        .map(nft_collection)
        .collect();
    let total_nfts = collections.iter().map(|c| c.count).sum();

    WalletNftsResponse {
        wallet_address: WalletAddress::from(snapshot.wallet),
        collections,
        total_nfts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holdings::types::NftItem;
    use crate::storage::HiddenSets;
    use alloy::primitives::{Address, U256};

    fn holding(byte: u8, whole_tokens: u64, price: Option<f64>, exclude: bool) -> TokenHolding {
        TokenHolding {
            contract: Address::repeat_byte(byte),
            symbol: format!("T{byte}"),
            name: format!("Token {byte}"),
            decimals: 6,
            raw_balance: U256::from(whole_tokens * 1_000_000),
            logo_url: None,
            price_usd: price,
            verified: false,
            exclude_from_total: exclude,
        }
    }

    #[test]
    fn empty_wallet_has_zero_balance() {
        let snapshot = BalanceSnapshot {
            wallet: Address::with_last_byte(1),
            native_raw: U256::ZERO,
            tokens: vec![],
        };
        let response = balance_response(snapshot, &Visibility::default(), "ETH");
        assert_eq!(response.native_balance, "0.000000");
        assert_eq!(response.native_balance_raw, "0");
        assert!(response.tokens.is_empty());
        assert_eq!(response.total_value_usd, 0.0);
        assert_eq!(
            response.wallet_address.as_str(),
            "0x0000000000000000000000000000000000000001"
        );
    }

    #[test]
    fn native_balance_rounds_half_up() {
        // 1.2345675 ETH
        let snapshot = BalanceSnapshot {
            wallet: Address::with_last_byte(1),
            native_raw: U256::from(1_234_567_500_000_000_000u64),
            tokens: vec![],
        };
        let response = balance_response(snapshot, &Visibility::default(), "ETH");
        assert_eq!(response.native_balance, "1.234568");
    }

    #[test]
    fn total_skips_excluded_unpriced_and_hidden() {
        let mut hidden = HiddenSets::default();
        hidden.tokens.insert(lower_hex(&Address::repeat_byte(0x04)));
        let visibility = Visibility {
            hidden,
            ..Visibility::default()
        };
        let snapshot = BalanceSnapshot {
            wallet: Address::with_last_byte(1),
            native_raw: U256::ZERO,
            tokens: vec![
                holding(0x01, 2, Some(1.5), false),
                holding(0x02, 10, Some(100.0), true),
                holding(0x03, 5, None, false),
                holding(0x04, 1, Some(50.0), false),
            ],
        };

        let response = balance_response(snapshot, &visibility, "ETH");
        assert_eq!(response.tokens.len(), 3);
        assert_eq!(response.total_value_usd, 3.0);
        assert_eq!(response.tokens[0].balance, "2.000000");
        assert_eq!(response.tokens[0].raw_balance, "2000000");
        assert_eq!(response.tokens[1].value_usd, Some(1000.0), "excluded tokens keep their value");
    }

    #[test]
    fn tokens_with_impossible_decimals_are_dropped() {
        let mut broken = holding(0x05, 1, Some(2.0), false);
        broken.decimals = 200;
        let snapshot = BalanceSnapshot {
            wallet: Address::with_last_byte(1),
            native_raw: U256::ZERO,
            tokens: vec![holding(0x01, 3, Some(1.0), false), broken],
        };

        let response = balance_response(snapshot, &Visibility::default(), "ETH");
        assert_eq!(response.tokens.len(), 1);
        assert_eq!(response.tokens[0].symbol, "T1");
        assert_eq!(response.total_value_usd, 3.0);
    }

    #[test]
    fn nft_totals_count_visible_ids() {
        let item = |id: u64| NftItem {
            token_id: U256::from(id),
            name: None,
            image: None,
            token_uri: None,
        };
        let mut hidden = HiddenSets::default();
        hidden
            .nfts
            .insert((lower_hex(&Address::repeat_byte(0x10)), "2".to_string()));
        let visibility = Visibility {
            hidden,
            ..Visibility::default()
        };
        let snapshot = NftSnapshot {
            wallet: Address::with_last_byte(1),
            collections: vec![CollectionHolding {
                contract: Address::repeat_byte(0x10),
                name: "Penguins".to_string(),
                symbol: "PPG".to_string(),
                items: vec![item(1), item(2), item(3)],
            }],
        };

        let response = nfts_response(snapshot, &visibility);
        assert_eq!(response.total_nfts, 2);
        assert_eq!(response.collections[0].count, 2);
        let ids: Vec<_> = response.collections[0].nfts.iter().map(|n| n.token_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }
}
