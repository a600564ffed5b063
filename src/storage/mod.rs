// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state lives in a single redb database under `DATA_DIR`:
//! the token registry, the discovered-token queue, per-user hidden sets,
//! user wallet links and tips. Holdings themselves are never persisted;
//! an optional in-process [`SnapshotCache`] may hold recent snapshots.
//!
//! ## Storage Layout
//!
//! ```text
//! $DATA_DIR/
//!   holdings.redb     # All tables, see `database`
//! ```

pub mod cache;
pub mod database;
pub mod records;

pub use cache::{snapshot_cache, DisabledCache, LruTtlCache, SnapshotCache};
pub use database::{DbError, DbResult, HiddenSets, HoldingsDb, TipDirection, TipQuery};
pub use records::{
    DiscoveredToken, HiddenItem, HiddenKind, StoredTip, TipStatus, TokenRecord, UserProfile,
};
