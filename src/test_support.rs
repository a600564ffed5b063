// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory chain and price source for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;

use crate::blockchain::{
    BlockBound, ChainReceipt, ChainRpc, ChainTransaction, LogQuery, RawLog, RpcError,
    TRANSFER_TOPIC,
};
use crate::holdings::pricing::{PriceError, PriceQuote, PriceSource};

#[derive(Default)]
struct ChainState {
    head: u64,
    logs: Vec<RawLog>,
    calls: HashMap<(Address, Vec<u8>), Vec<u8>>,
    balances: HashMap<Address, U256>,
    transactions: HashMap<B256, ChainTransaction>,
    receipts: HashMap<B256, ChainReceipt>,
    fail_logs: bool,
    fail_all: bool,
    log_queries: usize,
}

/// Scriptable [`ChainRpc`].
///
/// Unscripted `eth_call`s return empty data, like a call to an address
/// without code.
#[derive(Default)]
pub struct FakeChain {
    state: Mutex<ChainState>,
}

impl FakeChain {
    fn with<R>(&self, f: impl FnOnce(&mut ChainState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn set_head(&self, head: u64) {
        self.with(|s| s.head = head);
    }

    pub fn add_log(&self, log: RawLog) {
        self.with(|s| {
            if let Some(block) = log.block_number {
                s.head = s.head.max(block);
            }
            s.logs.push(log);
        });
    }

    pub fn set_call(&self, to: Address, data: Vec<u8>, result: Vec<u8>) {
        self.with(|s| s.calls.insert((to, data), result));
    }

    pub fn set_balance(&self, address: Address, wei: U256) {
        self.with(|s| s.balances.insert(address, wei));
    }

    pub fn add_transaction(&self, tx: ChainTransaction, receipt: Option<ChainReceipt>) {
        self.with(|s| {
            if let Some(receipt) = receipt {
                s.receipts.insert(tx.hash, receipt);
            }
            s.transactions.insert(tx.hash, tx);
        });
    }

    /// Make every `eth_getLogs` fail.
    pub fn fail_logs(&self) {
        self.with(|s| s.fail_logs = true);
    }

    /// Make every request fail.
    pub fn fail_all(&self) {
        self.with(|s| s.fail_all = true);
    }

    /// Number of `eth_getLogs` requests served so far.
    pub fn log_queries(&self) -> usize {
        self.with(|s| s.log_queries)
    }

    fn check(&self) -> Result<(), RpcError> {
        if self.with(|s| s.fail_all) {
            Err(RpcError::Transport("node unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

fn matches(query: &LogQuery, log: &RawLog) -> bool {
    let topic = |i: usize| log.topics.get(i).copied();
    if topic(0) != Some(query.signature) {
        return false;
    }
    if let Some(from) = query.topic1 {
        if topic(1) != Some(from.into_word()) {
            return false;
        }
    }
    if let Some(to) = query.topic2 {
        if topic(2) != Some(to.into_word()) {
            return false;
        }
    }
    let block = log.block_number.unwrap_or_default();
    let below_upper = match query.to_block {
        BlockBound::Latest => true,
        BlockBound::Number(to) => block <= to,
    };
    block >= query.from_block && below_upper
}

#[async_trait]
impl ChainRpc for FakeChain {
    async fn block_number(&self) -> Result<u64, RpcError> {
        self.check()?;
        Ok(self.with(|s| s.head))
    }

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, RpcError> {
        self.check()?;
        self.with(|s| {
            if s.fail_logs {
                return Err(RpcError::Transport("query returned more than 10000 results".to_string()));
            }
            s.log_queries += 1;
            Ok(s.logs.iter().filter(|log| matches(query, log)).cloned().collect())
        })
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError> {
        self.check()?;
        Ok(self.with(|s| {
            s.calls
                .get(&(to, data.to_vec()))
                .cloned()
                .map(Bytes::from)
                .unwrap_or_default()
        }))
    }

    async fn get_balance(&self, address: Address) -> Result<U256, RpcError> {
        self.check()?;
        Ok(self.with(|s| s.balances.get(&address).copied().unwrap_or_default()))
    }

    async fn get_transaction(&self, hash: B256) -> Result<Option<ChainTransaction>, RpcError> {
        self.check()?;
        Ok(self.with(|s| s.transactions.get(&hash).cloned()))
    }

    async fn get_receipt(&self, hash: B256) -> Result<Option<ChainReceipt>, RpcError> {
        self.check()?;
        Ok(self.with(|s| s.receipts.get(&hash).cloned()))
    }
}

/// 3-topic Transfer log.
pub fn erc20_transfer(token: Address, from: Address, to: Address, block: u64, log_index: u64) -> RawLog {
    RawLog {
        address: token,
        topics: vec![TRANSFER_TOPIC, from.into_word(), to.into_word()],
        data: Bytes::from(U256::from(1u64).to_be_bytes::<32>().to_vec()),
        block_number: Some(block),
        log_index: Some(log_index),
        transaction_hash: Some(B256::from(U256::from(block * 1_000 + log_index))),
    }
}

/// 4-topic Transfer log.
pub fn nft_transfer(
    contract: Address,
    from: Address,
    to: Address,
    token_id: u64,
    block: u64,
    log_index: u64,
) -> RawLog {
    RawLog {
        address: contract,
        topics: vec![
            TRANSFER_TOPIC,
            from.into_word(),
            to.into_word(),
            B256::from(U256::from(token_id)),
        ],
        data: Bytes::new(),
        block_number: Some(block),
        log_index: Some(log_index),
        transaction_hash: Some(B256::from(U256::from(block * 1_000 + log_index))),
    }
}

/// Scriptable [`PriceSource`]; unknown tokens have no market.
#[derive(Default)]
pub struct FakePrices {
    quotes: Mutex<HashMap<Address, PriceQuote>>,
    failing: Mutex<Vec<Address>>,
}

impl FakePrices {
    pub fn set(&self, token: Address, quote: PriceQuote) {
        self.quotes.lock().unwrap().insert(token, quote);
    }

    pub fn fail(&self, token: Address) {
        self.failing.lock().unwrap().push(token);
    }
}

#[async_trait]
impl PriceSource for FakePrices {
    async fn quote(&self, token: Address) -> Result<Option<PriceQuote>, PriceError> {
        if self.failing.lock().unwrap().contains(&token) {
            return Err(PriceError::Status(503));
        }
        Ok(self.quotes.lock().unwrap().get(&token).cloned())
    }
}

/// Application state over a temporary database, [`FakeChain`] and
/// [`FakePrices`], with development-mode auth.
pub struct TestApp {
    _dir: tempfile::TempDir,
    pub chain: std::sync::Arc<FakeChain>,
    pub prices: std::sync::Arc<FakePrices>,
    pub db: std::sync::Arc<crate::storage::HoldingsDb>,
    pub state: crate::state::AppState,
}

impl TestApp {
    pub fn new() -> Self {
        use crate::auth::JwtVerifier;
        use crate::blockchain::NetworkConfig;
        use crate::config::AuthSettings;
        use crate::holdings::{HoldingsService, HoldingsSettings, NftMetadataClient};
        use crate::state::{AppState, TipSettings};
        use std::sync::Arc;

        let dir = tempfile::TempDir::new().unwrap();
        let db = Arc::new(crate::storage::HoldingsDb::open(&dir.path().join("holdings.redb")).unwrap());
        let chain = Arc::new(FakeChain::default());
        let prices = Arc::new(FakePrices::default());
        // Writer dropped: sightings are discarded, router tests never read them.
        let (sink, _writer) = crate::discovery::channel(db.clone(), 16);

        let holdings = HoldingsService::new(
            chain.clone(),
            prices.clone(),
            Arc::new(NftMetadataClient::new("https://gateway.example/ipfs/").unwrap()),
            db.clone(),
            sink,
            HoldingsSettings::default(),
        );
        let state = AppState::new(
            db.clone(),
            chain.clone(),
            holdings,
            JwtVerifier::new(&AuthSettings::default()),
            TipSettings {
                min_confirmations: 1,
                network: NetworkConfig::abstract_mainnet(),
            },
        );

        Self {
            _dir: dir,
            chain,
            prices,
            db,
            state,
        }
    }

    /// Link `user_id` to `wallet`.
    pub fn link_wallet(&self, user_id: &str, wallet: Address) {
        self.db
            .upsert_user(&crate::storage::UserProfile {
                user_id: user_id.to_string(),
                wallet_address: Some(crate::blockchain::lower_hex(&wallet)),
                username: None,
                updated_at: chrono::Utc::now(),
            })
            .unwrap();
    }

    /// Send a request through the full router.
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (axum::http::StatusCode, serde_json::Value) {
        use axum::body::Body;
        use axum::http::{header, Request};
        use tower::ServiceExt;

        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = crate::api::router(self.state.clone())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }
}
