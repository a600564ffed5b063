// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! On-chain verification of tip transfers.
//!
//! A tip is a plain native transfer or an ERC-20 `transfer` call. Before a
//! tip is recorded as completed its transaction must exist, be mined with a
//! success status and at least `min_confirmations` confirmations, and move
//! at least the tipped amount from the sender's wallet to the recipient's
//! wallet.

use alloy::primitives::{Address, B256, U256};

use super::client::{ChainRpc, RpcError};
use super::types::{ChainTransaction, RawLog, MAX_DECIMALS, TRANSFER_TOPIC};

/// What a tip transaction is expected to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferExpectation {
    /// Wallet that must have sent the transaction
    pub sender: Address,
    /// Wallet that must receive the value
    pub recipient: Address,
    /// ERC-20 contract for token tips; None for native tips
    pub token: Option<Address>,
    /// Minimum value moved, in base units of the native coin or the token
    pub amount: U256,
}

/// Result of checking a transaction against a [`TransferExpectation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferCheck {
    /// The node does not know the transaction.
    NotFound,
    /// Known, but not mined or not yet deep enough.
    Pending { confirmations: u64 },
    /// Mined with a failure status.
    Reverted { block_number: u64 },
    /// The transaction was sent by someone else.
    SenderMismatch { actual: Address },
    /// The value did not go to the expected recipient.
    RecipientMismatch { actual: Option<Address> },
    /// Right parties, but less value than the tip claims.
    AmountShortfall { expected: U256, actual: U256 },
    /// Mined, successful, and moves value as expected.
    Confirmed { block_number: u64 },
}

/// Check a transaction hash against the expected transfer.
///
/// Sender and recipient are checked before the receipt so that a mismatch
/// is reported even while the transaction is still pending.
pub async fn check_transfer(
    rpc: &dyn ChainRpc,
    tx_hash: B256,
    expected: &TransferExpectation,
    min_confirmations: u64,
) -> Result<TransferCheck, RpcError> {
    let Some(tx) = rpc.get_transaction(tx_hash).await? else {
        return Ok(TransferCheck::NotFound);
    };

    if tx.from != expected.sender {
        return Ok(TransferCheck::SenderMismatch { actual: tx.from });
    }
    if let Some(mismatch) = check_destination(&tx, expected) {
        return Ok(mismatch);
    }
    if expected.token.is_none() && tx.value < expected.amount {
        return Ok(TransferCheck::AmountShortfall {
            expected: expected.amount,
            actual: tx.value,
        });
    }

    let Some(receipt) = rpc.get_receipt(tx_hash).await? else {
        return Ok(TransferCheck::Pending { confirmations: 0 });
    };
    let Some(block_number) = receipt.block_number.or(tx.block_number) else {
        return Ok(TransferCheck::Pending { confirmations: 0 });
    };

    let head = rpc.block_number().await?;
    let confirmations = head.saturating_sub(block_number).saturating_add(1);
    if confirmations < min_confirmations.max(1) {
        return Ok(TransferCheck::Pending { confirmations });
    }

    if !receipt.success {
        return Ok(TransferCheck::Reverted { block_number });
    }

    if let Some(token) = expected.token {
        let mut transfers = receipt
            .logs
            .iter()
            .filter(|log| is_token_transfer(log, token, expected.sender, expected.recipient))
            .peekable();
        if transfers.peek().is_none() {
            return Ok(TransferCheck::RecipientMismatch { actual: None });
        }
        let moved = transfers.fold(U256::ZERO, |sum, log| sum.saturating_add(log_value(log)));
        if moved < expected.amount {
            return Ok(TransferCheck::AmountShortfall {
                expected: expected.amount,
                actual: moved,
            });
        }
    }

    Ok(TransferCheck::Confirmed { block_number })
}

/// Native tips must be sent to the recipient; token tips to the token contract.
fn check_destination(tx: &ChainTransaction, expected: &TransferExpectation) -> Option<TransferCheck> {
    let wanted = expected.token.unwrap_or(expected.recipient);
    if tx.to == Some(wanted) {
        None
    } else {
        Some(TransferCheck::RecipientMismatch { actual: tx.to })
    }
}

/// ERC-20 Transfer(from, to, value) emitted by `token`.
fn is_token_transfer(log: &RawLog, token: Address, from: Address, to: Address) -> bool {
    log.address == token
        && log.topics.len() == 3
        && log.topics[0] == TRANSFER_TOPIC
        && log.topics[1] == from.into_word()
        && log.topics[2] == to.into_word()
}

/// The uint256 `value` word of a Transfer log; short data counts as zero.
fn log_value(log: &RawLog) -> U256 {
    log.data
        .get(..32)
        .map(U256::from_be_slice)
        .unwrap_or(U256::ZERO)
}

/// Errors from parsing a human-readable amount.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Invalid amount format")]
    Format,

    #[error("Too many decimal places (max {0})")]
    Precision(u8),

    #[error("Amount overflow")]
    Overflow,
}

/// Parse a human-readable amount to the smallest unit.
///
/// # Arguments
/// * `amount` - Amount as a string (e.g., "1.5")
/// * `decimals` - Number of decimals (18 for ETH, 6 for USDC)
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256, AmountError> {
    if decimals > MAX_DECIMALS {
        return Err(AmountError::Overflow);
    }
    let (whole, fraction) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };

    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !digits(whole) || !digits(fraction) {
        return Err(AmountError::Format);
    }
    if fraction.len() > decimals as usize {
        return Err(AmountError::Precision(decimals));
    }

    // Pad with zeros to match decimals
    let combined = format!("{}{:0<width$}", whole, fraction, width = decimals as usize);
    let trimmed = combined.trim_start_matches('0');
    if trimmed.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(trimmed, 10).map_err(|_| AmountError::Overflow)
}
