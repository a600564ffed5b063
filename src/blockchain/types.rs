// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain types and constants.

use alloy::primitives::{Address, Bytes, FixedBytes, B256, U256};

/// keccak256("Transfer(address,address,uint256)")
///
/// Shared by ERC-20 and ERC-721; the two are told apart by topic count.
pub const TRANSFER_TOPIC: FixedBytes<32> = FixedBytes::new([
    0xdd, 0xf2, 0x52, 0xad, 0x1b, 0xe2, 0xc8, 0x9b, 0x69, 0xc2, 0xb0, 0x68, 0xfc, 0x37, 0x8d, 0xaa,
    0x95, 0x2b, 0xa7, 0xf1, 0x63, 0xc4, 0xa1, 0x16, 0x28, 0xf5, 0x5a, 0x4d, 0xf5, 0x23, 0xb3, 0xef,
]);

/// Number of fractional digits shown for every balance.
pub const DISPLAY_DECIMALS: u8 = 6;

/// Largest decimals value for which `10^decimals` fits in a U256.
pub const MAX_DECIMALS: u8 = 77;

/// EVM network configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: String,
    /// Chain ID
    pub chain_id: u64,
    /// RPC endpoint URL
    pub rpc_url: String,
    /// Block explorer URL
    pub explorer_url: String,
    /// Native currency symbol
    pub native_symbol: String,
}

/// Abstract mainnet chain ID.
pub const ABSTRACT_MAINNET_CHAIN_ID: u64 = 2741;

/// Abstract testnet chain ID.
pub const ABSTRACT_TESTNET_CHAIN_ID: u64 = 11124;

impl NetworkConfig {
    /// Abstract mainnet configuration.
    pub fn abstract_mainnet() -> Self {
        Self {
            name: "Abstract".to_string(),
            chain_id: ABSTRACT_MAINNET_CHAIN_ID,
            rpc_url: "https://api.mainnet.abs.xyz".to_string(),
            explorer_url: "https://abscan.org".to_string(),
            native_symbol: "ETH".to_string(),
        }
    }

    /// Abstract testnet configuration.
    pub fn abstract_testnet() -> Self {
        Self {
            name: "Abstract Testnet".to_string(),
            chain_id: ABSTRACT_TESTNET_CHAIN_ID,
            rpc_url: "https://api.testnet.abs.xyz".to_string(),
            explorer_url: "https://sepolia.abscan.org".to_string(),
            native_symbol: "ETH".to_string(),
        }
    }

    /// Preset for a known chain ID.
    pub fn for_chain_id(chain_id: u64) -> Option<Self> {
        match chain_id {
            ABSTRACT_MAINNET_CHAIN_ID => Some(Self::abstract_mainnet()),
            ABSTRACT_TESTNET_CHAIN_ID => Some(Self::abstract_testnet()),
            _ => None,
        }
    }

    /// Explorer link for a transaction hash.
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), tx_hash)
    }
}

/// A log entry as returned by `eth_getLogs` or inside a receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    /// Emitting contract
    pub address: Address,
    /// Indexed topics, signature first
    pub topics: Vec<B256>,
    /// Non-indexed data
    pub data: Bytes,
    /// Block the log was included in (None while pending)
    pub block_number: Option<u64>,
    /// Position of the log within its block
    pub log_index: Option<u64>,
    /// Transaction that emitted the log
    pub transaction_hash: Option<B256>,
}

/// A transaction as returned by `eth_getTransactionByHash`.
#[derive(Debug, Clone)]
pub struct ChainTransaction {
    pub hash: B256,
    pub from: Address,
    /// None for contract creation
    pub to: Option<Address>,
    pub value: U256,
    /// None while the transaction is still in the mempool
    pub block_number: Option<u64>,
}

/// A receipt as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Clone)]
pub struct ChainReceipt {
    pub success: bool,
    pub block_number: Option<u64>,
    pub logs: Vec<RawLog>,
}

/// How the digits below the sixth fractional place are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Drop them.
    Truncate,
    /// Round half away from zero.
    HalfUp,
}

/// Why a raw amount cannot be rendered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitsError {
    #[error("{0} decimals exceeds the maximum of {MAX_DECIMALS}")]
    Decimals(u8),

    #[error("amount does not fit at display precision")]
    Overflow,
}

/// Format a raw integer amount as `whole.ffffff` (always 6 fractional digits).
pub fn format_units(value: U256, decimals: u8, rounding: Rounding) -> Result<String, UnitsError> {
    if decimals > MAX_DECIMALS {
        return Err(UnitsError::Decimals(decimals));
    }
    let display = U256::from(10u64).pow(U256::from(DISPLAY_DECIMALS));

    // Scale the amount to units of 10^-6.
    let scaled = if decimals <= DISPLAY_DECIMALS {
        let up = U256::from(10u64).pow(U256::from(DISPLAY_DECIMALS - decimals));
        value.checked_mul(up).ok_or(UnitsError::Overflow)?
    } else {
        let down = U256::from(10u64).pow(U256::from(decimals - DISPLAY_DECIMALS));
        let quotient = value / down;
        let remainder = value % down;
        // remainder < down <= 10^71, so doubling it cannot overflow
        if rounding == Rounding::HalfUp && remainder * U256::from(2u8) >= down {
            quotient.checked_add(U256::from(1u8)).ok_or(UnitsError::Overflow)?
        } else {
            quotient
        }
    };

    let whole = scaled / display;
    let fraction = (scaled % display).to_string();
    Ok(format!("{}.{:0>6}", whole, fraction))
}

/// Convert a raw integer amount to a floating point value for valuation.
pub fn units_to_f64(value: U256, decimals: u8) -> Result<f64, UnitsError> {
    if decimals > MAX_DECIMALS {
        return Err(UnitsError::Decimals(decimals));
    }
    if decimals == 0 {
        return Ok(value.to_string().parse().unwrap_or(0.0));
    }

    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = value / divisor;
    let fraction = (value % divisor).to_string();
    Ok(format!("{}.{:0>width$}", whole, fraction, width = decimals as usize)
        .parse()
        .unwrap_or(0.0))
}

/// Lowercase `0x`-prefixed rendering of an address.
pub fn lower_hex(address: &Address) -> String {
    format!("{address:#x}")
}
