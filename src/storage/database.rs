// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `tokens`: contract address → serialized TokenRecord
//! - `discovered_tokens`: contract address → serialized DiscoveredToken
//! - `hidden_tokens`: `user|contract` → hidden-at millis
//! - `hidden_nfts`: `user|contract|tokenId` (or `user|contract|*`) → hidden-at millis
//! - `users`: user id → serialized UserProfile
//! - `tips`: tip id → serialized StoredTip
//! - `tip_tx_index`: tx hash → tip id (uniqueness)
//! - `tip_user_index`: `user|!timestamp_be|tip_id` → direction ("sent"|"received")
//!
//! All addresses and hashes are stored lowercase.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::records::{
    DiscoveredToken, HiddenItem, HiddenKind, StoredTip, TipStatus, TokenRecord, UserProfile,
};

// =============================================================================
// Table Definitions
// =============================================================================

const TOKENS: TableDefinition<&str, &[u8]> = TableDefinition::new("tokens");

const DISCOVERED_TOKENS: TableDefinition<&str, &[u8]> = TableDefinition::new("discovered_tokens");

const HIDDEN_TOKENS: TableDefinition<&[u8], u64> = TableDefinition::new("hidden_tokens");

const HIDDEN_NFTS: TableDefinition<&[u8], u64> = TableDefinition::new("hidden_nfts");

type HiddenTable = TableDefinition<'static, &'static [u8], u64>;

const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

const TIPS: TableDefinition<&str, &[u8]> = TableDefinition::new("tips");

const TIP_TX_INDEX: TableDefinition<&str, &str> = TableDefinition::new("tip_tx_index");

/// Key format: `user_id|!timestamp_be|tip_id` for newest-first range scans.
const TIP_USER_INDEX: TableDefinition<&[u8], &str> = TableDefinition::new("tip_user_index");

/// Token-id component marking a whole hidden collection.
const WHOLE_COLLECTION: &str = "*";

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Query types
// =============================================================================

/// Which side of a tip a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipDirection {
    Sent,
    Received,
    All,
}

impl TipDirection {
    fn matches(self, stored: &str) -> bool {
        match self {
            TipDirection::Sent => stored == "sent",
            TipDirection::Received => stored == "received",
            TipDirection::All => true,
        }
    }
}

/// Filter for tip listings.
#[derive(Debug, Clone)]
pub struct TipQuery {
    /// Restrict to tips sent or received by this user
    pub user_id: Option<String>,
    pub direction: TipDirection,
    pub status: Option<TipStatus>,
    pub limit: usize,
}

/// Per-user hidden sets, keyed by lowercase contract address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HiddenSets {
    pub tokens: HashSet<String>,
    pub nft_collections: HashSet<String>,
    /// (contract, token id)
    pub nfts: HashSet<(String, String)>,
}

// =============================================================================
// Key Helpers
// =============================================================================

fn join_key(parts: &[&str]) -> Vec<u8> {
    parts.join("|").into_bytes()
}

/// Build a prefix key for range scanning all rows of one user.
fn make_prefix(user_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(user_id.len() + 1);
    prefix.extend_from_slice(user_id.as_bytes());
    prefix.push(b'|');
    prefix
}

/// Build the upper bound for a range scan (prefix with 0xFF bytes appended).
fn make_prefix_end(user_id: &str) -> Vec<u8> {
    let mut end = make_prefix(user_id);
    // 0xFF never occurs in UTF-8, so this sorts after every key with the prefix
    end.extend_from_slice(&[0xFF; 8]);
    end
}

/// Composite key for the tip user index.
///
/// The inverted timestamp ensures newest-first ordering when scanning forward.
fn make_tip_index_key(user_id: &str, created_at: DateTime<Utc>, tip_id: &str) -> Vec<u8> {
    let mut key = make_prefix(user_id);
    key.extend_from_slice(&(!(created_at.timestamp_millis() as u64)).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(tip_id.as_bytes());
    key
}

/// Extract the tip id from a tip index key (everything after the 8 timestamp bytes).
fn tip_id_from_key(key: &[u8], user_id: &str) -> Option<String> {
    let start = user_id.len() + 1 + 8 + 1;
    key.get(start..)
        .and_then(|id| String::from_utf8(id.to_vec()).ok())
}

fn millis_to_datetime(millis: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis as i64)
        .single()
        .unwrap_or_default()
}

fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

// =============================================================================
// HoldingsDb
// =============================================================================

/// Embedded ACID database for tokens, visibility, users and tips.
pub struct HoldingsDb {
    db: Database,
}

impl HoldingsDb {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(TOKENS)?;
            let _ = write_txn.open_table(DISCOVERED_TOKENS)?;
            let _ = write_txn.open_table(HIDDEN_TOKENS)?;
            let _ = write_txn.open_table(HIDDEN_NFTS)?;
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(TIPS)?;
            let _ = write_txn.open_table(TIP_TX_INDEX)?;
            let _ = write_txn.open_table(TIP_USER_INDEX)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Cheap read used by the readiness probe.
    pub fn ping(&self) -> DbResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(TOKENS)?;
        Ok(())
    }

    // =========================================================================
    // Token registry
    // =========================================================================

    /// Look up a single registry record.
    pub fn get_token(&self, address: &str) -> DbResult<Option<TokenRecord>> {
        let addr = address.to_lowercase();
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TOKENS)?;
        match table.get(addr.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All registry records, sorted by address.
    pub fn list_tokens(&self) -> DbResult<Vec<TokenRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TOKENS)?;
        let mut tokens = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            tokens.push(serde_json::from_slice(value.value())?);
        }
        Ok(tokens)
    }

    /// The registry as a map keyed by lowercase address.
    pub fn token_registry(&self) -> DbResult<HashMap<String, TokenRecord>> {
        Ok(self
            .list_tokens()?
            .into_iter()
            .map(|t| (t.address.clone(), t))
            .collect())
    }

    /// Insert or replace a registry record.
    ///
    /// A token entering the registry leaves the discovered queue.
    pub fn upsert_token(&self, record: &TokenRecord) -> DbResult<()> {
        let addr = record.address.to_lowercase();
        let mut record = record.clone();
        record.address = addr.clone();
        let json = serde_json::to_vec(&record)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut tokens = write_txn.open_table(TOKENS)?;
            tokens.insert(addr.as_str(), json.as_slice())?;

            let mut discovered = write_txn.open_table(DISCOVERED_TOKENS)?;
            discovered.remove(addr.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // =========================================================================
    // Discovered tokens
    // =========================================================================

    /// Record a sighting of an unregistered token.
    ///
    /// Sightings of tokens already in the registry are ignored.
    pub fn upsert_discovered(&self, sighting: &DiscoveredToken) -> DbResult<()> {
        let addr = sighting.address.to_lowercase();

        let write_txn = self.db.begin_write()?;
        {
            let tokens = write_txn.open_table(TOKENS)?;
            let registered = tokens.get(addr.as_str())?.is_some();
            drop(tokens);

            if !registered {
                let mut table = write_txn.open_table(DISCOVERED_TOKENS)?;
                let existing_bytes = table.get(addr.as_str())?.map(|v| v.value().to_vec());

                let merged = match existing_bytes {
                    Some(bytes) => {
                        let mut existing: DiscoveredToken = serde_json::from_slice(&bytes)?;
                        existing.merge(sighting);
                        existing
                    }
                    None => {
                        let mut fresh = sighting.clone();
                        fresh.address = addr.clone();
                        fresh
                    }
                };

                let json = serde_json::to_vec(&merged)?;
                table.insert(addr.as_str(), json.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// The discovered-token review queue, most frequently seen first.
    pub fn list_discovered(&self) -> DbResult<Vec<DiscoveredToken>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DISCOVERED_TOKENS)?;
        let mut tokens: Vec<DiscoveredToken> = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            tokens.push(serde_json::from_slice(value.value())?);
        }
        tokens.sort_by(|a, b| {
            b.seen_count
                .cmp(&a.seen_count)
                .then_with(|| a.address.cmp(&b.address))
        });
        Ok(tokens)
    }

    /// Look up one discovered token.
    pub fn get_discovered(&self, address: &str) -> DbResult<Option<DiscoveredToken>> {
        let addr = address.to_lowercase();
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DISCOVERED_TOKENS)?;
        match table.get(addr.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Hidden sets
    // =========================================================================

    /// Hide a fungible token for a user. Hiding twice is a no-op.
    pub fn hide_token(&self, user_id: &str, contract: &str) -> DbResult<()> {
        let key = join_key(&[user_id, &contract.to_lowercase()]);
        self.insert_hidden(HIDDEN_TOKENS, &key)
    }

    /// Hide an NFT collection (`token_id` None) or a single NFT for a user.
    pub fn hide_nft(&self, user_id: &str, contract: &str, token_id: Option<&str>) -> DbResult<()> {
        let key = join_key(&[
            user_id,
            &contract.to_lowercase(),
            token_id.unwrap_or(WHOLE_COLLECTION),
        ]);
        self.insert_hidden(HIDDEN_NFTS, &key)
    }

    /// Unhide a fungible token. Returns whether it was hidden.
    pub fn unhide_token(&self, user_id: &str, contract: &str) -> DbResult<bool> {
        let key = join_key(&[user_id, &contract.to_lowercase()]);
        self.remove_hidden(HIDDEN_TOKENS, &key)
    }

    /// Unhide an NFT collection or single NFT. Returns whether it was hidden.
    pub fn unhide_nft(
        &self,
        user_id: &str,
        contract: &str,
        token_id: Option<&str>,
    ) -> DbResult<bool> {
        let key = join_key(&[
            user_id,
            &contract.to_lowercase(),
            token_id.unwrap_or(WHOLE_COLLECTION),
        ]);
        self.remove_hidden(HIDDEN_NFTS, &key)
    }

    fn insert_hidden(&self, table: HiddenTable, key: &[u8]) -> DbResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(table)?;
            let exists = table.get(key)?.is_some();
            if !exists {
                table.insert(key, now_millis())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove_hidden(&self, table: HiddenTable, key: &[u8]) -> DbResult<bool> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(table)?;
            let removed = table.remove(key)?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(removed)
    }

    /// Everything a user has hidden, as lookup sets.
    pub fn hidden_sets(&self, user_id: &str) -> DbResult<HiddenSets> {
        let mut sets = HiddenSets::default();
        for item in self.list_hidden(user_id)? {
            match (item.kind, item.token_id) {
                (HiddenKind::Token, _) => {
                    sets.tokens.insert(item.contract_address);
                }
                (HiddenKind::Nft, None) => {
                    sets.nft_collections.insert(item.contract_address);
                }
                (HiddenKind::Nft, Some(id)) => {
                    sets.nfts.insert((item.contract_address, id));
                }
            }
        }
        Ok(sets)
    }

    /// Everything a user has hidden, newest first.
    pub fn list_hidden(&self, user_id: &str) -> DbResult<Vec<HiddenItem>> {
        let prefix = make_prefix(user_id);
        let prefix_end = make_prefix_end(user_id);

        let read_txn = self.db.begin_read()?;
        let mut items = Vec::new();

        let tokens = read_txn.open_table(HIDDEN_TOKENS)?;
        for entry in tokens.range(prefix.as_slice()..prefix_end.as_slice())? {
            let (key, value) = entry?;
            let rest = &key.value()[prefix.len()..];
            items.push(HiddenItem {
                kind: HiddenKind::Token,
                contract_address: String::from_utf8_lossy(rest).into_owned(),
                token_id: None,
                hidden_at: millis_to_datetime(value.value()),
            });
        }

        let nfts = read_txn.open_table(HIDDEN_NFTS)?;
        for entry in nfts.range(prefix.as_slice()..prefix_end.as_slice())? {
            let (key, value) = entry?;
            let rest = String::from_utf8_lossy(&key.value()[prefix.len()..]).into_owned();
            let Some((contract, token_id)) = rest.split_once('|') else {
                continue;
            };
            items.push(HiddenItem {
                kind: HiddenKind::Nft,
                contract_address: contract.to_string(),
                token_id: (token_id != WHOLE_COLLECTION).then(|| token_id.to_string()),
                hidden_at: millis_to_datetime(value.value()),
            });
        }

        items.sort_by(|a, b| b.hidden_at.cmp(&a.hidden_at));
        Ok(items)
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub fn get_user(&self, user_id: &str) -> DbResult<Option<UserProfile>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn upsert_user(&self, profile: &UserProfile) -> DbResult<()> {
        let json = serde_json::to_vec(profile)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(USERS)?;
            table.insert(profile.user_id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // =========================================================================
    // Tips
    // =========================================================================

    /// Insert a new tip.
    ///
    /// The tx-hash uniqueness check and the insert run in one write
    /// transaction; a second tip with the same hash fails with `Conflict`.
    pub fn insert_tip(&self, tip: &StoredTip) -> DbResult<()> {
        let tx_hash = tip.tx_hash.to_lowercase();
        let json = serde_json::to_vec(tip)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut tx_index = write_txn.open_table(TIP_TX_INDEX)?;
            if let Some(existing) = tx_index.get(tx_hash.as_str())? {
                return Err(DbError::Conflict(format!(
                    "Transaction {tx_hash} already recorded as tip {}",
                    existing.value()
                )));
            }
            tx_index.insert(tx_hash.as_str(), tip.id.as_str())?;

            let mut tips = write_txn.open_table(TIPS)?;
            tips.insert(tip.id.as_str(), json.as_slice())?;

            let mut user_index = write_txn.open_table(TIP_USER_INDEX)?;
            let sent = make_tip_index_key(&tip.sender_id, tip.created_at, &tip.id);
            user_index.insert(sent.as_slice(), "sent")?;
            let received = make_tip_index_key(&tip.recipient_id, tip.created_at, &tip.id);
            user_index.insert(received.as_slice(), "received")?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_tip(&self, id: &str) -> DbResult<Option<StoredTip>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TIPS)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Look up a tip by transaction hash.
    pub fn get_tip_by_tx_hash(&self, tx_hash: &str) -> DbResult<Option<StoredTip>> {
        let hash = tx_hash.to_lowercase();
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(TIP_TX_INDEX)?;
        let Some(id) = index.get(hash.as_str())?.map(|v| v.value().to_string()) else {
            return Ok(None);
        };
        let tips = read_txn.open_table(TIPS)?;
        match tips.get(id.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Apply `update` to a tip that is still `PENDING`.
    ///
    /// Read, check and write happen in one write transaction so that two
    /// verifications of the same tip cannot both succeed.
    pub fn update_pending_tip<F>(&self, id: &str, update: F) -> DbResult<StoredTip>
    where
        F: FnOnce(&mut StoredTip),
    {
        let write_txn = self.db.begin_write()?;
        let tip = {
            let mut table = write_txn.open_table(TIPS)?;

            // Read existing value and deserialize before mutating
            let existing_bytes = {
                let existing = table
                    .get(id)?
                    .ok_or_else(|| DbError::NotFound(format!("Tip {id}")))?;
                existing.value().to_vec()
            };

            let mut tip: StoredTip = serde_json::from_slice(&existing_bytes)?;
            if tip.status != TipStatus::Pending {
                return Err(DbError::Conflict(format!(
                    "Tip {id} is {:?}, not pending",
                    tip.status
                )));
            }
            update(&mut tip);

            let json = serde_json::to_vec(&tip)?;
            table.insert(id, json.as_slice())?;
            tip
        };
        write_txn.commit()?;
        Ok(tip)
    }

    /// List tips newest first.
    pub fn list_tips(&self, query: &TipQuery) -> DbResult<Vec<StoredTip>> {
        let status_ok = |tip: &StoredTip| query.status.map_or(true, |s| tip.status == s);

        let read_txn = self.db.begin_read()?;
        let tips = read_txn.open_table(TIPS)?;

        let Some(user_id) = query.user_id.as_deref() else {
            let mut all = Vec::new();
            for entry in tips.iter()? {
                let (_, value) = entry?;
                let tip: StoredTip = serde_json::from_slice(value.value())?;
                if status_ok(&tip) {
                    all.push(tip);
                }
            }
            all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
            all.truncate(query.limit);
            return Ok(all);
        };

        let index = read_txn.open_table(TIP_USER_INDEX)?;
        let prefix = make_prefix(user_id);
        let prefix_end = make_prefix_end(user_id);

        let mut results = Vec::with_capacity(query.limit.min(64));
        for entry in index.range(prefix.as_slice()..prefix_end.as_slice())? {
            if results.len() >= query.limit {
                break;
            }
            let (key, direction) = entry?;
            if !query.direction.matches(direction.value()) {
                continue;
            }
            let Some(tip_id) = tip_id_from_key(key.value(), user_id) else {
                continue;
            };
            if let Some(value) = tips.get(tip_id.as_str())? {
                let tip: StoredTip = serde_json::from_slice(value.value())?;
                if status_ok(&tip) {
                    results.push(tip);
                }
            }
        }

        Ok(results)
    }
}

// =============================================================================
// Tests
// =============================================================================
