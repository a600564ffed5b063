// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! USD prices and logos from a DexScreener-compatible market-data API.
//!
//! `GET {base}/latest/dex/tokens/{address}` returns every trading pair that
//! involves the token. The quote comes from the most liquid pair on the
//! configured chain, or from the most liquid pair overall when the chain has
//! none.

use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use serde::Deserialize;

use crate::blockchain::lower_hex;

/// Default market-data endpoint.
pub const DEFAULT_PRICE_API_URL: &str = "https://api.dexscreener.com";

/// Default DexScreener chain identifier for Abstract.
pub const DEFAULT_PRICE_CHAIN_ID: &str = "abstract";

/// Request timeout for the market-data API.
const PRICE_TIMEOUT: Duration = Duration::from_secs(10);

/// Logos for well-known Abstract tokens, keyed by lowercase address.
const KNOWN_LOGOS: &[(&str, &str)] = &[
    (
        // WETH
        "0x3439153eb7af838ad19d56e1571fbd09333c2809",
        "https://assets.coingecko.com/coins/images/2518/large/weth.png",
    ),
    (
        // USDC.e
        "0x84a71ccd554cc1b02749b35d22f684cc8ec987e1",
        "https://assets.coingecko.com/coins/images/6319/large/usdc.png",
    ),
    (
        // PENGU
        "0x9ebe3a824ca958e4b3da772d2065518f009cba62",
        "https://assets.coingecko.com/coins/images/52622/large/PUDGY_PENGUINS_PENGU_PFP.png",
    ),
];

/// Hardcoded logo for a token, if it is a well-known one.
pub fn known_logo(address: &str) -> Option<&'static str> {
    let addr = address.to_lowercase();
    KNOWN_LOGOS
        .iter()
        .find(|(known, _)| *known == addr)
        .map(|(_, logo)| *logo)
}

/// Price and logo for one token.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub price_usd: f64,
    pub image_url: Option<String>,
}

/// Errors from the market-data API.
#[derive(Debug, thiserror::Error)]
pub enum PriceError {
    #[error("price request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("price API returned status {0}")]
    Status(u16),
}

/// Source of USD quotes.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Quote for a token; `Ok(None)` when the market has no usable pair.
    async fn quote(&self, token: Address) -> Result<Option<PriceQuote>, PriceError>;
}

// =============================================================================
// DexScreener wire format
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokensResponse {
    #[serde(default)]
    pairs: Option<Vec<Pair>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pair {
    #[serde(default)]
    chain_id: String,
    #[serde(default)]
    price_usd: Option<String>,
    #[serde(default)]
    liquidity: Option<Liquidity>,
    #[serde(default)]
    info: Option<PairInfo>,
}

#[derive(Debug, Deserialize)]
struct Liquidity {
    #[serde(default)]
    usd: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PairInfo {
    #[serde(default)]
    image_url: Option<String>,
}

impl Pair {
    fn liquidity_usd(&self) -> f64 {
        self.liquidity
            .as_ref()
            .and_then(|l| l.usd)
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }

    fn price(&self) -> Option<f64> {
        self.price_usd
            .as_deref()
            .and_then(|p| p.parse::<f64>().ok())
            .filter(|p| p.is_finite() && *p >= 0.0)
    }
}

/// Pick the most liquid priced pair, preferring pairs on `chain_id`.
fn select_pair<'a>(pairs: &'a [Pair], chain_id: &str) -> Option<&'a Pair> {
    let most_liquid = |on_chain_only: bool| {
        pairs
            .iter()
            .filter(|p| p.price().is_some())
            .filter(|p| !on_chain_only || p.chain_id.eq_ignore_ascii_case(chain_id))
            .max_by(|a, b| a.liquidity_usd().total_cmp(&b.liquidity_usd()))
    };
    most_liquid(true).or_else(|| most_liquid(false))
}

// =============================================================================
// DexScreenerClient
// =============================================================================

/// HTTP client for the DexScreener token endpoint.
pub struct DexScreenerClient {
    client: reqwest::Client,
    base_url: String,
    chain_id: String,
}

impl DexScreenerClient {
    /// Create a client for `base_url`, preferring pairs on `chain_id`.
    pub fn new(base_url: impl Into<String>, chain_id: impl Into<String>) -> Result<Self, PriceError> {
        let client = reqwest::Client::builder().timeout(PRICE_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            chain_id: chain_id.into(),
        })
    }
}

#[async_trait]
impl PriceSource for DexScreenerClient {
    async fn quote(&self, token: Address) -> Result<Option<PriceQuote>, PriceError> {
        let url = format!("{}/latest/dex/tokens/{}", self.base_url, lower_hex(&token));
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(PriceError::Status(response.status().as_u16()));
        }

        let body: TokensResponse = response.json().await?;
        let pairs = body.pairs.unwrap_or_default();

        Ok(select_pair(&pairs, &self.chain_id).and_then(|pair| {
            pair.price().map(|price_usd| PriceQuote {
                price_usd,
                image_url: pair.info.as_ref().and_then(|i| i.image_url.clone()),
            })
        }))
    }
}
