// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EVM JSON-RPC client for blockchain interactions.
//!
//! The pipeline and the tip verifier only see the [`ChainRpc`] trait; the
//! alloy-backed [`AlloyChainClient`] is the production implementation.

use std::future::Future;
use std::time::Duration;

use alloy::{
    consensus::Transaction as _,
    eips::BlockNumberOrTag,
    network::{Ethereum, TransactionBuilder, TransactionResponse},
    primitives::{Address, Bytes, B256, U256},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    rpc::types::{Filter, Log, TransactionRequest},
};
use async_trait::async_trait;

use super::types::*;

/// HTTP provider type (with all fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Default timeout applied to each JSON-RPC request.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper block bound of a log query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockBound {
    Latest,
    Number(u64),
}

/// Filter for `eth_getLogs` on a single event signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    /// Event signature (topic0)
    pub signature: B256,
    /// Required value of topic1 (the `from` of a Transfer)
    pub topic1: Option<Address>,
    /// Required value of topic2 (the `to` of a Transfer)
    pub topic2: Option<Address>,
    pub from_block: u64,
    pub to_block: BlockBound,
}

/// Operations the service needs from an EVM node.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// `eth_blockNumber`
    async fn block_number(&self) -> Result<u64, RpcError>;

    /// `eth_getLogs`
    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, RpcError>;

    /// `eth_call` against the latest block.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError>;

    /// `eth_getBalance` in wei.
    async fn get_balance(&self, address: Address) -> Result<U256, RpcError>;

    /// `eth_getTransactionByHash`
    async fn get_transaction(&self, hash: B256) -> Result<Option<ChainTransaction>, RpcError>;

    /// `eth_getTransactionReceipt`
    async fn get_receipt(&self, hash: B256) -> Result<Option<ChainReceipt>, RpcError>;
}

/// Alloy-backed JSON-RPC client.
pub struct AlloyChainClient {
    /// Network configuration
    network: NetworkConfig,
    /// Alloy HTTP provider
    provider: HttpProvider,
    /// Per-request timeout
    timeout: Duration,
}

impl AlloyChainClient {
    /// Create a new client for the specified network.
    pub fn new(network: NetworkConfig, timeout: Duration) -> Result<Self, RpcError> {
        let url: url::Url = network
            .rpc_url
            .parse()
            .map_err(|e: url::ParseError| RpcError::InvalidRpcUrl(e.to_string()))?;

        let provider = ProviderBuilder::new().connect_http(url);

        Ok(Self {
            network,
            provider,
            timeout,
        })
    }

    /// Get the network configuration.
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Run one request under the configured timeout.
    async fn timed<T, E, F>(&self, method: &'static str, request: F) -> Result<T, RpcError>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(RpcError::Transport(format!("{method}: {e}"))),
            Err(_) => Err(RpcError::Timeout {
                method,
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

#[async_trait]
impl ChainRpc for AlloyChainClient {
    async fn block_number(&self) -> Result<u64, RpcError> {
        self.timed("eth_blockNumber", async {
            self.provider.get_block_number().await
        })
        .await
    }

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, RpcError> {
        let mut filter = Filter::new()
            .event_signature(query.signature)
            .from_block(query.from_block);

        filter = match query.to_block {
            BlockBound::Latest => filter.to_block(BlockNumberOrTag::Latest),
            BlockBound::Number(n) => filter.to_block(n),
        };
        if let Some(from) = query.topic1 {
            filter = filter.topic1(from.into_word());
        }
        if let Some(to) = query.topic2 {
            filter = filter.topic2(to.into_word());
        }

        let logs = self
            .timed("eth_getLogs", self.provider.get_logs(&filter))
            .await?;
        Ok(logs.iter().map(raw_log).collect())
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError> {
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        self.timed("eth_call", async { self.provider.call(tx).await })
            .await
    }

    async fn get_balance(&self, address: Address) -> Result<U256, RpcError> {
        self.timed("eth_getBalance", async {
            self.provider.get_balance(address).await
        })
        .await
    }

    async fn get_transaction(&self, hash: B256) -> Result<Option<ChainTransaction>, RpcError> {
        let tx = self
            .timed("eth_getTransactionByHash", async {
                self.provider.get_transaction_by_hash(hash).await
            })
            .await?;

        Ok(tx.map(|tx| ChainTransaction {
            hash,
            from: TransactionResponse::from(&tx),
            to: tx.to(),
            value: tx.value(),
            block_number: tx.block_number,
        }))
    }

    async fn get_receipt(&self, hash: B256) -> Result<Option<ChainReceipt>, RpcError> {
        let receipt = self
            .timed("eth_getTransactionReceipt", async {
                self.provider.get_transaction_receipt(hash).await
            })
            .await?;

        Ok(receipt.map(|r| ChainReceipt {
            success: r.status(),
            block_number: r.block_number,
            logs: r.inner.logs().iter().map(raw_log).collect(),
        }))
    }
}

/// Convert an alloy RPC log into the crate's log type.
fn raw_log(log: &Log) -> RawLog {
    RawLog {
        address: log.address(),
        topics: log.topics().to_vec(),
        data: log.data().data.clone(),
        block_number: log.block_number,
        log_index: log.log_index,
        transaction_hash: log.transaction_hash,
    }
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RpcError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("RPC error: {0}")]
    Transport(String),

    #[error("RPC timeout: {method} exceeded {seconds}s")]
    Timeout { method: &'static str, seconds: u64 },
}
