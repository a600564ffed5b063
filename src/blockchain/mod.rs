// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain integration for Abstract (EVM).
//!
//! This module provides functionality for:
//! - Reading Transfer logs, balances and contract metadata over JSON-RPC
//! - Tolerant decoding of ERC-20 / ERC-721 call results
//! - Verifying tip transactions against their receipts

pub mod abi;
pub mod client;
pub mod erc20;
pub mod transactions;
pub mod types;

pub use client::{AlloyChainClient, BlockBound, ChainRpc, LogQuery, RpcError};
pub use types::*;
