// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::JwtVerifier;
use crate::blockchain::{ChainRpc, NetworkConfig};
use crate::holdings::HoldingsService;
use crate::storage::HoldingsDb;

/// Tip verification settings.
#[derive(Debug, Clone)]
pub struct TipSettings {
    pub min_confirmations: u64,
    pub network: NetworkConfig,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<HoldingsDb>,
    pub rpc: Arc<dyn ChainRpc>,
    pub holdings: Arc<HoldingsService>,
    pub auth: Arc<JwtVerifier>,
    pub tips: Arc<TipSettings>,
}

impl AppState {
    pub fn new(
        db: Arc<HoldingsDb>,
        rpc: Arc<dyn ChainRpc>,
        holdings: HoldingsService,
        auth: JwtVerifier,
        tips: TipSettings,
    ) -> Self {
        Self {
            db,
            rpc,
            holdings: Arc::new(holdings),
            auth: Arc::new(auth),
            tips: Arc::new(tips),
        }
    }
}
