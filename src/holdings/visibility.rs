// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Global blacklist and per-user hidden sets.
//!
//! Filtering is a pure function of its inputs: applying it twice, or to a
//! reordered list, gives the same result.

use std::collections::HashSet;

use super::types::{CollectionHolding, TokenHolding};
use crate::blockchain::lower_hex;
use crate::storage::{HiddenSets, TokenRecord};

/// Everything that can remove an item from one user's view.
#[derive(Debug, Clone, Default)]
pub struct Visibility {
    /// Lowercase addresses blacklisted for everyone
    pub blacklist: HashSet<String>,
    /// The requesting user's hidden items; empty for anonymous requests
    pub hidden: HiddenSets,
}

impl Visibility {
    /// Build from the registry and an optional user's hidden sets.
    pub fn new<'a>(
        registry: impl IntoIterator<Item = &'a TokenRecord>,
        hidden: Option<HiddenSets>,
    ) -> Self {
        Self {
            blacklist: registry
                .into_iter()
                .filter(|r| r.blacklisted)
                .map(|r| r.address.to_lowercase())
                .collect(),
            hidden: hidden.unwrap_or_default(),
        }
    }

    fn token_visible(&self, contract: &str) -> bool {
        !self.blacklist.contains(contract) && !self.hidden.tokens.contains(contract)
    }

    /// Drop blacklisted and hidden tokens.
    pub fn filter_tokens(&self, tokens: Vec<TokenHolding>) -> Vec<TokenHolding> {
        tokens
            .into_iter()
            .filter(|t| self.token_visible(&lower_hex(&t.contract)))
            .collect()
    }

    /// Drop blacklisted and hidden collections, hidden NFTs, and collections
    /// left empty by the latter.
    pub fn filter_collections(&self, collections: Vec<CollectionHolding>) -> Vec<CollectionHolding> {
        collections
            .into_iter()
            .filter_map(|mut collection| {
                let contract = lower_hex(&collection.contract);
                if self.blacklist.contains(&contract)
                    || self.hidden.nft_collections.contains(&contract)
                {
                    return None;
                }
                collection.items.retain(|item| {
                    !self
                        .hidden
                        .nfts
                        .contains(&(contract.clone(), item.token_id.to_string()))
                });
                (!collection.items.is_empty()).then_some(collection)
            })
            .collect()
    }
}
