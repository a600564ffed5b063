// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Transfer Log Scanner
//!
//! Finds the contracts a wallet may hold by reading ERC-20 / ERC-721
//! `Transfer` logs in both directions.
//!
//! ## Strategy
//!
//! 1. `eth_getLogs` with topic0 = Transfer and topic2 = wallet (incoming),
//!    then topic1 = wallet (outgoing), over `[from_block, latest]`.
//! 2. 3-topic incoming logs are ERC-20 transfers and only nominate their
//!    contract for a `balanceOf` check.
//! 3. 4-topic logs are ERC-721 transfers. Both directions are merged,
//!    de-duplicated and replayed in `(block, logIndex)` order: incoming
//!    inserts `(contract, tokenId)`, outgoing removes it.
//!
//! ## Block range
//!
//! The default range starts at genesis. That is correct but grows with chain
//! history; `SCAN_FROM_BLOCK` narrows it and `SCAN_CHUNK_SIZE` splits it into
//! bounded `eth_getLogs` requests for nodes that cap the range.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use alloy::primitives::{Address, B256, U256};

use crate::blockchain::{BlockBound, ChainRpc, LogQuery, RawLog, RpcError, TRANSFER_TOPIC};

/// Topic count of an ERC-20 Transfer (signature, from, to).
const ERC20_TOPICS: usize = 3;

/// Topic count of an ERC-721 Transfer (signature, from, to, tokenId).
const ERC721_TOPICS: usize = 4;

/// Block range settings for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    /// First block to scan
    pub from_block: u64,
    /// Maximum blocks per `eth_getLogs` request; None for a single request
    pub chunk_size: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            from_block: 0,
            chunk_size: None,
        }
    }
}

/// What a wallet may hold according to its Transfer history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Contracts that sent ERC-20 tokens to the wallet
    pub erc20_candidates: BTreeSet<Address>,
    /// NFT contract → token ids currently owned (never empty)
    pub nfts: BTreeMap<Address, BTreeSet<U256>>,
}

/// Direction of a log relative to the scanned wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Incoming,
    Outgoing,
}

/// Scan a wallet's Transfer history.
pub async fn scan_wallet(
    rpc: &dyn ChainRpc,
    wallet: Address,
    config: &ScanConfig,
) -> Result<ScanResult, RpcError> {
    let incoming = fetch_logs(rpc, None, Some(wallet), config).await?;
    let outgoing = fetch_logs(rpc, Some(wallet), None, config).await?;

    tracing::debug!(
        wallet = %wallet,
        incoming = incoming.len(),
        outgoing = outgoing.len(),
        "Fetched transfer logs"
    );

    Ok(build_result(wallet, &incoming, &outgoing))
}

/// Fetch Transfer logs for one direction, chunking the range if configured.
async fn fetch_logs(
    rpc: &dyn ChainRpc,
    topic1: Option<Address>,
    topic2: Option<Address>,
    config: &ScanConfig,
) -> Result<Vec<RawLog>, RpcError> {
    let query = |from_block, to_block| LogQuery {
        signature: TRANSFER_TOPIC,
        topic1,
        topic2,
        from_block,
        to_block,
    };

    let Some(chunk_size) = config.chunk_size.filter(|c| *c > 0) else {
        return rpc.get_logs(&query(config.from_block, BlockBound::Latest)).await;
    };

    let head = rpc.block_number().await?;
    let mut logs = Vec::new();
    let mut from = config.from_block;
    while from <= head {
        let to = from.saturating_add(chunk_size - 1).min(head);
        let chunk = rpc.get_logs(&query(from, BlockBound::Number(to))).await?;
        tracing::trace!(from_block = from, to_block = to, logs = chunk.len(), "Scanned chunk");
        logs.extend(chunk);
        from = to + 1;
    }
    Ok(logs)
}

/// Sort key placing logs in chain order; logs without a position sort last.
fn chain_position(log: &RawLog) -> (u64, u64) {
    (
        log.block_number.unwrap_or(u64::MAX),
        log.log_index.unwrap_or(u64::MAX),
    )
}

/// Identity of a log for de-duplication across the two queries.
fn log_identity(log: &RawLog) -> (Option<B256>, Option<u64>, Option<u64>, Address, Vec<B256>) {
    (
        log.transaction_hash,
        log.block_number,
        log.log_index,
        log.address,
        log.topics.clone(),
    )
}

/// Replay incoming and outgoing logs into a [`ScanResult`].
pub fn build_result(wallet: Address, incoming: &[RawLog], outgoing: &[RawLog]) -> ScanResult {
    let wallet_topic = wallet.into_word();
    let mut result = ScanResult::default();

    for log in incoming {
        if log.topics.len() == ERC20_TOPICS && log.topics[0] == TRANSFER_TOPIC {
            result.erc20_candidates.insert(log.address);
        }
    }

    // Collect NFT transfers from both queries, tagged with their direction.
    // A self-transfer shows up in both queries and counts as incoming.
    let mut seen = HashSet::new();
    let mut nft_events: Vec<(&RawLog, Direction)> = Vec::new();
    for log in incoming.iter().chain(outgoing) {
        if log.topics.len() != ERC721_TOPICS || log.topics[0] != TRANSFER_TOPIC {
            continue;
        }
        if !seen.insert(log_identity(log)) {
            continue;
        }
        let direction = if log.topics[2] == wallet_topic {
            Direction::Incoming
        } else if log.topics[1] == wallet_topic {
            Direction::Outgoing
        } else {
            continue;
        };
        nft_events.push((log, direction));
    }
    nft_events.sort_by_key(|(log, _)| chain_position(log));

    for (log, direction) in nft_events {
        let token_id = U256::from_be_bytes(log.topics[3].0);
        match direction {
            Direction::Incoming => {
                result.nfts.entry(log.address).or_default().insert(token_id);
            }
            Direction::Outgoing => {
                if let Some(ids) = result.nfts.get_mut(&log.address) {
                    ids.remove(&token_id);
                }
            }
        }
    }

    result.nfts.retain(|_, ids| !ids.is_empty());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{erc20_transfer, nft_transfer, FakeChain};

    fn wallet() -> Address {
        Address::repeat_byte(0xaa)
    }

    fn other() -> Address {
        Address::repeat_byte(0xbb)
    }

    fn collection() -> Address {
        Address::repeat_byte(0xc0)
    }

    #[test]
    fn erc20_incoming_logs_nominate_contracts() {
        let token = Address::repeat_byte(0x20);
        let incoming = vec![erc20_transfer(token, other(), wallet(), 10, 0)];
        // Outgoing ERC-20 logs do not nominate anything
        let outgoing = vec![erc20_transfer(Address::repeat_byte(0x21), wallet(), other(), 11, 0)];

        let result = build_result(wallet(), &incoming, &outgoing);
        assert_eq!(result.erc20_candidates, BTreeSet::from([token]));
        assert!(result.nfts.is_empty());
    }

    #[test]
    fn nft_received_and_kept_is_owned() {
        let incoming = vec![nft_transfer(collection(), other(), wallet(), 1, 10, 0)];
        let result = build_result(wallet(), &incoming, &[]);
        assert_eq!(result.nfts[&collection()], BTreeSet::from([U256::from(1u64)]));
    }

    #[test]
    fn nft_received_then_sent_is_not_owned() {
        let incoming = vec![nft_transfer(collection(), other(), wallet(), 1, 10, 0)];
        let outgoing = vec![nft_transfer(collection(), wallet(), other(), 1, 20, 0)];
        let result = build_result(wallet(), &incoming, &outgoing);
        assert!(result.nfts.is_empty(), "empty collections are dropped");
    }

    #[test]
    fn nft_sent_then_received_back_is_owned() {
        let incoming = vec![
            nft_transfer(collection(), other(), wallet(), 7, 10, 0),
            nft_transfer(collection(), other(), wallet(), 7, 30, 2),
        ];
        let outgoing = vec![nft_transfer(collection(), wallet(), other(), 7, 20, 1)];
        let result = build_result(wallet(), &incoming, &outgoing);
        assert_eq!(result.nfts[&collection()], BTreeSet::from([U256::from(7u64)]));
    }

    #[test]
    fn same_block_uses_log_index() {
        let incoming = vec![nft_transfer(collection(), other(), wallet(), 3, 10, 5)];
        let outgoing = vec![nft_transfer(collection(), wallet(), other(), 3, 10, 4)];
        let result = build_result(wallet(), &incoming, &outgoing);
        assert_eq!(result.nfts[&collection()], BTreeSet::from([U256::from(3u64)]));
    }

    #[test]
    fn self_transfer_counts_once_as_incoming() {
        let log = nft_transfer(collection(), wallet(), wallet(), 9, 10, 0);
        let result = build_result(wallet(), &[log.clone()], &[log]);
        assert_eq!(result.nfts[&collection()], BTreeSet::from([U256::from(9u64)]));
    }

    #[test]
    fn other_topic_counts_are_ignored() {
        let mut odd = erc20_transfer(Address::repeat_byte(0x22), other(), wallet(), 1, 0);
        odd.topics.truncate(2);
        let result = build_result(wallet(), &[odd], &[]);
        assert_eq!(result, ScanResult::default());
    }

    #[tokio::test]
    async fn scan_queries_both_directions() {
        let chain = FakeChain::default();
        let token = Address::repeat_byte(0x20);
        chain.add_log(erc20_transfer(token, other(), wallet(), 5, 0));
        chain.add_log(nft_transfer(collection(), other(), wallet(), 1, 6, 0));
        chain.add_log(nft_transfer(collection(), other(), wallet(), 2, 6, 1));
        chain.add_log(nft_transfer(collection(), wallet(), other(), 1, 8, 0));
        // Unrelated traffic
        chain.add_log(erc20_transfer(Address::repeat_byte(0x23), other(), other(), 9, 0));

        let result = scan_wallet(&chain, wallet(), &ScanConfig::default())
            .await
            .unwrap();
        assert_eq!(result.erc20_candidates, BTreeSet::from([token]));
        assert_eq!(result.nfts[&collection()], BTreeSet::from([U256::from(2u64)]));
    }

    #[tokio::test]
    async fn chunked_scan_covers_whole_range() {
        let chain = FakeChain::default();
        chain.set_head(25);
        let token = Address::repeat_byte(0x20);
        chain.add_log(erc20_transfer(token, other(), wallet(), 3, 0));
        chain.add_log(nft_transfer(collection(), other(), wallet(), 4, 25, 0));

        let config = ScanConfig {
            from_block: 0,
            chunk_size: Some(10),
        };
        let result = scan_wallet(&chain, wallet(), &config).await.unwrap();
        assert!(result.erc20_candidates.contains(&token));
        assert!(result.nfts.contains_key(&collection()));
        // 3 chunks per direction
        assert_eq!(chain.log_queries(), 6);

        // from_block beyond the logs finds nothing
        let config = ScanConfig {
            from_block: 26,
            chunk_size: Some(10),
        };
        let result = scan_wallet(&chain, wallet(), &config).await.unwrap();
        assert_eq!(result, ScanResult::default());
    }

    #[tokio::test]
    async fn rpc_failure_propagates() {
        let chain = FakeChain::default();
        chain.fail_logs();
        let err = scan_wallet(&chain, wallet(), &ScanConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }
}
