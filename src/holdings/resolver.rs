// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Balance Resolver
//!
//! Turns scan candidates into priced holdings.
//!
//! Every contract is resolved in its own task on a [`JoinSet`], bounded by a
//! semaphore, and all tasks are joined before the caller filters. A failure
//! for one contract only affects that contract:
//!
//! - failed or zero `balanceOf` → the token is absent
//! - failed `symbol()` → `UNKNOWN`, failed `name()` → the symbol,
//!   failed `decimals()` → 18
//! - failed price lookup → no price, no value
//! - failed `tokenURI` / metadata fetch → empty metadata fields

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::metadata::NftMetadataClient;
use super::pricing::{known_logo, PriceSource};
use super::types::{CollectionHolding, NftItem, TokenHolding};
use crate::blockchain::{erc20, lower_hex, ChainRpc};
use crate::storage::{DiscoveredToken, TokenRecord};

/// Default number of contracts resolved at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Default number of NFTs per collection whose metadata is fetched.
pub const DEFAULT_METADATA_LIMIT: usize = 10;

/// Result of resolving the ERC-20 candidates of one wallet.
#[derive(Debug, Default)]
pub struct ResolvedTokens {
    /// Non-zero positions, highest value first
    pub holdings: Vec<TokenHolding>,
    /// Positions in tokens the registry does not know
    pub discovered: Vec<DiscoveredToken>,
}

/// Shared inputs of the per-contract tasks.
#[derive(Clone)]
pub struct TokenResolver {
    pub rpc: Arc<dyn ChainRpc>,
    pub prices: Arc<dyn PriceSource>,
    pub concurrency: usize,
}

impl TokenResolver {
    /// Resolve balances, metadata and prices for `candidates`.
    ///
    /// Blacklisted registry entries are skipped without any RPC traffic.
    pub async fn resolve(
        &self,
        wallet: Address,
        candidates: &BTreeSet<Address>,
        registry: &HashMap<String, TokenRecord>,
    ) -> ResolvedTokens {
        let semaphore = Arc::new(Semaphore::new(self.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for &contract in candidates {
            let known = registry.get(&lower_hex(&contract)).cloned();
            if known.as_ref().is_some_and(|r| r.blacklisted) {
                continue;
            }

            let rpc = self.rpc.clone();
            let prices = self.prices.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                resolve_token(rpc.as_ref(), prices.as_ref(), wallet, contract, known).await
            });
        }

        let mut resolved = ResolvedTokens::default();
        let now = Utc::now();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some((holding, unknown))) => {
                    if unknown {
                        resolved.discovered.push(DiscoveredToken {
                            address: lower_hex(&holding.contract),
                            symbol: holding.symbol.clone(),
                            name: holding.name.clone(),
                            decimals: holding.decimals,
                            first_seen_wallet: lower_hex(&wallet),
                            first_seen_at: now,
                            last_seen_at: now,
                            seen_count: 1,
                        });
                    }
                    resolved.holdings.push(holding);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Token resolution task failed"),
            }
        }

        sort_holdings(&mut resolved.holdings);
        resolved
    }
}

/// Resolve one contract. Returns the holding and whether it is unregistered.
async fn resolve_token(
    rpc: &dyn ChainRpc,
    prices: &dyn PriceSource,
    wallet: Address,
    contract: Address,
    known: Option<TokenRecord>,
) -> Option<(TokenHolding, bool)> {
    let raw_balance = match erc20::balance_of(rpc, contract, wallet).await {
        Ok(balance) if !balance.is_zero() => balance,
        Ok(_) => return None,
        Err(e) => {
            debug!(contract = %contract, error = %e, "balanceOf failed, skipping token");
            return None;
        }
    };

    let unknown = known.is_none();
    let (symbol, name, decimals, verified, exclude_from_total, registry_logo) = match known {
        Some(record) => (
            record.symbol,
            record.name,
            record.decimals,
            record.verified,
            record.exclude_from_total,
            record.logo_url,
        ),
        None => {
            let meta = erc20::token_metadata(rpc, contract).await;
            (meta.symbol, meta.name, meta.decimals, false, false, None)
        }
    };

    let quote = match prices.quote(contract).await {
        Ok(quote) => quote,
        Err(e) => {
            debug!(contract = %contract, error = %e, "Price lookup failed");
            None
        }
    };

    let (price_usd, pair_logo) = match quote {
        Some(q) => (Some(q.price_usd), q.image_url),
        None => (None, None),
    };
    // curated logo first, then the pair image, then the built-in table
    let logo_url = registry_logo
        .or(pair_logo)
        .or_else(|| known_logo(&lower_hex(&contract)).map(str::to_string));

    Some((
        TokenHolding {
            contract,
            symbol,
            name,
            decimals,
            raw_balance,
            logo_url,
            price_usd,
            verified,
            exclude_from_total,
        },
        unknown,
    ))
}

/// Highest value first; unpriced tokens after priced ones; then by symbol.
pub fn sort_holdings(holdings: &mut [TokenHolding]) {
    holdings.sort_by(|a, b| {
        let by_value = match (a.value_usd(), b.value_usd()) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_value
            .then_with(|| a.symbol.to_lowercase().cmp(&b.symbol.to_lowercase()))
            .then_with(|| a.contract.cmp(&b.contract))
    });
}

/// Shared inputs of the per-collection tasks.
#[derive(Clone)]
pub struct CollectionResolver {
    pub rpc: Arc<dyn ChainRpc>,
    pub metadata: Arc<NftMetadataClient>,
    pub concurrency: usize,
    /// NFTs per collection whose metadata is fetched
    pub metadata_limit: usize,
}

impl CollectionResolver {
    /// Resolve collection names and per-token metadata.
    pub async fn resolve(&self, nfts: &BTreeMap<Address, BTreeSet<U256>>) -> Vec<CollectionHolding> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (&contract, ids) in nfts {
            let ids: Vec<U256> = ids.iter().copied().collect();
            let this = self.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                Some(this.resolve_collection(contract, ids).await)
            });
        }

        let mut collections = Vec::with_capacity(nfts.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(collection)) => collections.push(collection),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Collection resolution task failed"),
            }
        }

        collections.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.contract.cmp(&b.contract))
        });
        collections
    }

    async fn resolve_collection(&self, contract: Address, ids: Vec<U256>) -> CollectionHolding {
        let meta = erc20::collection_metadata(self.rpc.as_ref(), contract).await;

        let mut items = Vec::with_capacity(ids.len());
        for (index, token_id) in ids.into_iter().enumerate() {
            let mut item = NftItem {
                token_id,
                name: None,
                image: None,
                token_uri: None,
            };
            if index < self.metadata_limit {
                self.fill_metadata(contract, &mut item).await;
            }
            items.push(item);
        }

        CollectionHolding {
            contract,
            name: meta.name,
            symbol: meta.symbol,
            items,
        }
    }

    async fn fill_metadata(&self, contract: Address, item: &mut NftItem) {
        let uri = match erc20::token_uri(self.rpc.as_ref(), contract, item.token_id).await {
            Ok(uri) => uri,
            Err(e) => {
                debug!(contract = %contract, token_id = %item.token_id, error = %e, "tokenURI failed");
                return;
            }
        };

        match self.metadata.fetch(&uri).await {
            Ok(meta) => {
                item.name = meta.name;
                item.image = meta.image;
            }
            Err(e) => {
                debug!(contract = %contract, token_id = %item.token_id, error = %e, "Metadata fetch failed");
            }
        }
        item.token_uri = Some(uri);
    }
}
