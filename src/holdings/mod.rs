// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Holdings Pipeline
//!
//! Discovers and values what a wallet holds:
//!
//! ```text
//! scanner ──► resolver ──► pricing ──► visibility ──► assembler
//!  (logs)    (eth_call)   (HTTP API)   (per user)     (JSON)
//! ```
//!
//! The first three stages produce an unfiltered snapshot that does not
//! depend on the viewer and may be cached. Visibility filtering and totals
//! run on every request against the current registry and hidden sets, so a
//! new blacklist entry or hide takes effect immediately.

pub mod assembler;
pub mod metadata;
pub mod pricing;
pub mod resolver;
pub mod scanner;
pub mod types;
pub mod visibility;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use tracing::{debug, info};

use crate::blockchain::{ChainRpc, RpcError};
use crate::discovery::DiscoverySink;
use crate::models::{WalletAddress, WalletBalanceResponse, WalletNftsResponse};
use crate::storage::{snapshot_cache, DbError, HoldingsDb, SnapshotCache, TokenRecord};

pub use metadata::NftMetadataClient;
pub use pricing::{DexScreenerClient, PriceQuote, PriceSource};
pub use resolver::{CollectionResolver, TokenResolver};
pub use scanner::ScanConfig;
pub use types::{BalanceSnapshot, NftSnapshot};
pub use visibility::Visibility;

/// Errors that fail a holdings request as a whole.
///
/// Per-contract failures never surface here; they only remove or degrade
/// the affected item.
#[derive(Debug, thiserror::Error)]
pub enum HoldingsError {
    /// Log scan or native balance failed; a partial scan would misreport
    /// ownership.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Tunables of the pipeline.
#[derive(Debug, Clone)]
pub struct HoldingsSettings {
    pub scan: ScanConfig,
    pub concurrency: usize,
    pub metadata_limit: usize,
    pub native_symbol: String,
    /// Zero disables the snapshot caches
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
}

impl Default for HoldingsSettings {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            concurrency: resolver::DEFAULT_CONCURRENCY,
            metadata_limit: resolver::DEFAULT_METADATA_LIMIT,
            native_symbol: "ETH".to_string(),
            cache_ttl: Duration::ZERO,
            cache_capacity: 1_000,
        }
    }
}

/// Entry point used by the wallet handlers.
pub struct HoldingsService {
    rpc: Arc<dyn ChainRpc>,
    tokens: TokenResolver,
    collections: CollectionResolver,
    db: Arc<HoldingsDb>,
    discovery: DiscoverySink,
    balances: Box<dyn SnapshotCache<BalanceSnapshot>>,
    nfts: Box<dyn SnapshotCache<NftSnapshot>>,
    scan: ScanConfig,
    native_symbol: String,
}

impl HoldingsService {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        prices: Arc<dyn PriceSource>,
        metadata: Arc<NftMetadataClient>,
        db: Arc<HoldingsDb>,
        discovery: DiscoverySink,
        settings: HoldingsSettings,
    ) -> Self {
        Self {
            tokens: TokenResolver {
                rpc: rpc.clone(),
                prices,
                concurrency: settings.concurrency,
            },
            collections: CollectionResolver {
                rpc: rpc.clone(),
                metadata,
                concurrency: settings.concurrency,
                metadata_limit: settings.metadata_limit,
            },
            rpc,
            db,
            discovery,
            balances: snapshot_cache(settings.cache_capacity, settings.cache_ttl),
            nfts: snapshot_cache(settings.cache_capacity, settings.cache_ttl),
            scan: settings.scan,
            native_symbol: settings.native_symbol,
        }
    }

    /// Native and ERC-20 balances of `wallet` as seen by `user_id`.
    ///
    /// `refresh` bypasses and replaces any cached snapshot.
    pub async fn wallet_balance(
        &self,
        wallet: &WalletAddress,
        user_id: Option<&str>,
        refresh: bool,
    ) -> Result<WalletBalanceResponse, HoldingsError> {
        let registry = self.db.token_registry()?;

        let cached = if refresh {
            self.balances.invalidate(wallet.as_str());
            None
        } else {
            self.balances.get(wallet.as_str())
        };

        let snapshot = match cached {
            Some(snapshot) => {
                debug!(wallet = %wallet, "Balance snapshot served from cache");
                snapshot
            }
            None => {
                let snapshot = self.compute_balances(wallet.to_address(), &registry).await?;
                self.balances.put(wallet.as_str(), snapshot.clone());
                snapshot
            }
        };

        let visibility = self.visibility(&registry, user_id)?;
        Ok(assembler::balance_response(snapshot, &visibility, &self.native_symbol))
    }

    /// NFT collections of `wallet` as seen by `user_id`.
    pub async fn wallet_nfts(
        &self,
        wallet: &WalletAddress,
        user_id: Option<&str>,
        refresh: bool,
    ) -> Result<WalletNftsResponse, HoldingsError> {
        let cached = if refresh {
            self.nfts.invalidate(wallet.as_str());
            None
        } else {
            self.nfts.get(wallet.as_str())
        };

        let snapshot = match cached {
            Some(snapshot) => {
                debug!(wallet = %wallet, "NFT snapshot served from cache");
                snapshot
            }
            None => {
                let snapshot = self.compute_nfts(wallet.to_address()).await?;
                self.nfts.put(wallet.as_str(), snapshot.clone());
                snapshot
            }
        };

        let registry = self.db.token_registry()?;
        let visibility = self.visibility(&registry, user_id)?;
        Ok(assembler::nfts_response(snapshot, &visibility))
    }

    fn visibility(
        &self,
        registry: &HashMap<String, TokenRecord>,
        user_id: Option<&str>,
    ) -> Result<Visibility, DbError> {
        let hidden = user_id.map(|user| self.db.hidden_sets(user)).transpose()?;
        Ok(Visibility::new(registry.values(), hidden))
    }

    async fn compute_balances(
        &self,
        wallet: Address,
        registry: &HashMap<String, TokenRecord>,
    ) -> Result<BalanceSnapshot, HoldingsError> {
        let (native_raw, scan) = tokio::try_join!(
            self.rpc.get_balance(wallet),
            scanner::scan_wallet(self.rpc.as_ref(), wallet, &self.scan),
        )?;

        let resolved = self
            .tokens
            .resolve(wallet, &scan.erc20_candidates, registry)
            .await;

        for sighting in resolved.discovered {
            self.discovery.record(sighting);
        }

        info!(
            wallet = %wallet,
            candidates = scan.erc20_candidates.len(),
            tokens = resolved.holdings.len(),
            "Resolved wallet balances"
        );

        Ok(BalanceSnapshot {
            wallet,
            native_raw,
            tokens: resolved.holdings,
        })
    }

    async fn compute_nfts(&self, wallet: Address) -> Result<NftSnapshot, HoldingsError> {
        let scan = scanner::scan_wallet(self.rpc.as_ref(), wallet, &self.scan).await?;
        let collections = self.collections.resolve(&scan.nfts).await;

        info!(
            wallet = %wallet,
            collections = collections.len(),
            "Resolved wallet NFTs"
        );

        Ok(NftSnapshot { wallet, collections })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::erc20::IERC20;
    use crate::blockchain::lower_hex;
    use crate::discovery;
    use crate::test_support::{erc20_transfer, nft_transfer, FakeChain, FakePrices};
    use alloy::primitives::U256;
    use alloy::sol_types::{SolCall, SolValue};
    use chrono::Utc;
    use tempfile::TempDir;

    struct Harness {
        _dir: TempDir,
        chain: Arc<FakeChain>,
        db: Arc<HoldingsDb>,
        writer: Option<discovery::DiscoveryWriter>,
        service: HoldingsService,
    }

    fn harness(settings: HoldingsSettings) -> Harness {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(HoldingsDb::open(&dir.path().join("holdings.redb")).unwrap());
        let chain = Arc::new(FakeChain::default());
        let (sink, writer) = discovery::channel(db.clone(), 16);
        let service = HoldingsService::new(
            chain.clone(),
            Arc::new(FakePrices::default()),
            Arc::new(NftMetadataClient::new("https://gateway.example/ipfs/").unwrap()),
            db.clone(),
            sink,
            settings,
        );
        Harness {
            _dir: dir,
            chain,
            db,
            writer: Some(writer),
            service,
        }
    }

    fn wallet() -> WalletAddress {
        WalletAddress::from(Address::repeat_byte(0xaa))
    }

    fn fund(chain: &FakeChain, token: Address, amount: u64) {
        chain.add_log(erc20_transfer(token, Address::repeat_byte(0xbb), wallet().to_address(), 1, 0));
        chain.set_call(
            token,
            IERC20::balanceOfCall { account: wallet().to_address() }.abi_encode(),
            U256::from(amount).abi_encode(),
        );
        chain.set_call(token, IERC20::symbolCall {}.abi_encode(), "TKN".to_string().abi_encode());
    }

    #[tokio::test]
    async fn empty_wallet_example() {
        let h = harness(HoldingsSettings::default());
        let address = WalletAddress::parse("0x0000000000000000000000000000000000000001").unwrap();

        let balance = h.service.wallet_balance(&address, None, false).await.unwrap();
        assert!(balance.tokens.is_empty());
        assert_eq!(balance.native_balance, "0.000000");
        assert_eq!(balance.total_value_usd, 0.0);

        let nfts = h.service.wallet_nfts(&address, None, false).await.unwrap();
        assert_eq!(nfts.total_nfts, 0);
        assert!(nfts.collections.is_empty());
    }

    #[tokio::test]
    async fn unknown_tokens_reach_the_discovery_queue() {
        let mut h = harness(HoldingsSettings::default());
        let token = Address::repeat_byte(0x01);
        fund(&h.chain, token, 42);

        let balance = h.service.wallet_balance(&wallet(), None, false).await.unwrap();
        assert_eq!(balance.tokens.len(), 1);
        assert_eq!(balance.tokens[0].symbol, "TKN");

        // Dropping the service closes the channel so the writer drains and exits
        let writer = h.writer.take().unwrap();
        drop(h.service);
        writer.run(tokio_util::sync::CancellationToken::new()).await;

        let discovered = h.db.get_discovered(&lower_hex(&token)).unwrap().unwrap();
        assert_eq!(discovered.first_seen_wallet, wallet().as_str());
    }

    #[tokio::test]
    async fn blacklist_applies_to_cached_snapshots() {
        let settings = HoldingsSettings {
            cache_ttl: Duration::from_secs(60),
            ..HoldingsSettings::default()
        };
        let h = harness(settings);
        let token = Address::repeat_byte(0x02);
        fund(&h.chain, token, 7);

        let first = h.service.wallet_balance(&wallet(), None, false).await.unwrap();
        assert_eq!(first.tokens.len(), 1);

        let now = Utc::now();
        h.db.upsert_token(&TokenRecord {
            address: lower_hex(&token),
            symbol: "TKN".to_string(),
            name: "TKN".to_string(),
            decimals: 18,
            logo_url: None,
            verified: false,
            blacklisted: true,
            exclude_from_total: false,
            created_at: now,
            updated_at: now,
        })
        .unwrap();

        let second = h.service.wallet_balance(&wallet(), Some("alice"), false).await.unwrap();
        assert!(second.tokens.is_empty());
    }

    #[tokio::test]
    async fn cache_serves_until_refresh() {
        let settings = HoldingsSettings {
            cache_ttl: Duration::from_secs(60),
            ..HoldingsSettings::default()
        };
        let h = harness(settings);
        let contract = Address::repeat_byte(0x10);
        h.chain.add_log(nft_transfer(contract, Address::repeat_byte(0xbb), wallet().to_address(), 1, 5, 0));

        let first = h.service.wallet_nfts(&wallet(), None, false).await.unwrap();
        assert_eq!(first.total_nfts, 1);

        h.chain.add_log(nft_transfer(contract, Address::repeat_byte(0xbb), wallet().to_address(), 2, 6, 0));
        let cached = h.service.wallet_nfts(&wallet(), None, false).await.unwrap();
        assert_eq!(cached.total_nfts, 1);

        let refreshed = h.service.wallet_nfts(&wallet(), None, true).await.unwrap();
        assert_eq!(refreshed.total_nfts, 2);
    }

    #[tokio::test]
    async fn scan_failure_fails_the_request() {
        let h = harness(HoldingsSettings::default());
        h.chain.fail_logs();
        let err = h.service.wallet_balance(&wallet(), None, false).await.unwrap_err();
        assert!(matches!(err, HoldingsError::Rpc(_)));
    }
}
