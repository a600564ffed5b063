// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! PeBloq Holdings Server - wallet holdings discovery, valuation and tips
//!
//! Reconstructs what a wallet on Abstract holds by replaying ERC-20 and
//! ERC-721 `Transfer` logs, confirms balances with `eth_call`, values them
//! against a market-data API and filters them per viewer. Community tips
//! are recorded only after their transaction is matched on-chain.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Bearer JWT authentication and roles
//! - `blockchain` - JSON-RPC client, ABI decoding, tip verification
//! - `holdings` - Scan, resolve, price, filter and assemble holdings
//! - `discovery` - Background persistence of unregistered tokens
//! - `storage` - Embedded database (redb) and snapshot caches

pub mod api;
pub mod auth;
pub mod blockchain;
pub mod config;
pub mod discovery;
pub mod error;
pub mod holdings;
pub mod models;
pub mod state;
pub mod storage;

#[cfg(test)]
mod test_support;
