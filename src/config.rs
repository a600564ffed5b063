// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup by
//! [`AppConfig::from_env`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory of the embedded database | `./data` |
//! | `ABSTRACT_RPC_URL` | EVM JSON-RPC endpoint | Abstract mainnet public RPC |
//! | `CHAIN_ID` | Chain id (selects explorer and defaults) | `2741` |
//! | `NATIVE_SYMBOL` | Symbol of the native currency | `ETH` |
//! | `RPC_TIMEOUT_SECS` | Per-request JSON-RPC timeout | `30` |
//! | `PRICE_API_URL` | DexScreener-compatible market-data API | `https://api.dexscreener.com` |
//! | `PRICE_CHAIN_ID` | Preferred market-data chain id | `abstract` |
//! | `SCAN_FROM_BLOCK` | First block of Transfer log scans | `0` |
//! | `SCAN_CHUNK_SIZE` | Blocks per `eth_getLogs` request | unset (single request) |
//! | `RESOLVER_CONCURRENCY` | Contracts resolved in parallel | `8` |
//! | `HOLDINGS_CACHE_TTL_SECS` | Snapshot cache TTL, `0` disables | `0` |
//! | `HOLDINGS_CACHE_CAPACITY` | Wallets kept per snapshot cache | `1000` |
//! | `NFT_METADATA_LIMIT` | NFTs per collection with fetched metadata | `10` |
//! | `IPFS_GATEWAY` | Gateway for `ipfs://` URIs | `https://ipfs.io/ipfs/` |
//! | `TIP_MIN_CONFIRMATIONS` | Confirmations before a tip completes | `1` |
//! | `AUTH_JWT_SECRET` | HS256 secret; unset enables development mode | unset |
//! | `AUTH_JWT_ISSUER` | Expected JWT issuer claim | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::blockchain::{NetworkConfig, ABSTRACT_MAINNET_CHAIN_ID};
use crate::holdings::metadata::DEFAULT_IPFS_GATEWAY;
use crate::holdings::pricing::{DEFAULT_PRICE_API_URL, DEFAULT_PRICE_CHAIN_ID};
use crate::holdings::resolver::{DEFAULT_CONCURRENCY, DEFAULT_METADATA_LIMIT};
use crate::holdings::{HoldingsSettings, ScanConfig};

/// Environment variable name for the database directory.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Database file name inside `DATA_DIR`.
pub const DB_FILE_NAME: &str = "holdings.redb";

/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Default `RUST_LOG` filter.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Configuration errors, reported before the server starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid bind address {0}")]
    BindAddress(String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Bearer token verification settings.
#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
    /// HS256 shared secret; None accepts unsigned tokens (development only)
    pub jwt_secret: Option<String>,
    pub issuer: Option<String>,
}

/// Fully validated service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub network: NetworkConfig,
    pub rpc_timeout: Duration,
    pub price_api_url: String,
    pub price_chain_id: String,
    pub ipfs_gateway: String,
    pub holdings: HoldingsSettings,
    pub tip_min_confirmations: u64,
    pub auth: AuthSettings,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_or(&var, "PORT", 8080)?;
        let bind_addr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::BindAddress(format!("{host}:{port}")))?;

        let chain_id: u64 = parse_or(&var, "CHAIN_ID", ABSTRACT_MAINNET_CHAIN_ID)?;
        let mut network = NetworkConfig::for_chain_id(chain_id).ok_or_else(|| ConfigError::Invalid {
            name: "CHAIN_ID",
            value: chain_id.to_string(),
            reason: "unsupported chain".to_string(),
        })?;
        if let Some(rpc_url) = var("ABSTRACT_RPC_URL") {
            url::Url::parse(&rpc_url).map_err(|e| ConfigError::Invalid {
                name: "ABSTRACT_RPC_URL",
                value: rpc_url.clone(),
                reason: e.to_string(),
            })?;
            network.rpc_url = rpc_url;
        }
        if let Some(symbol) = var("NATIVE_SYMBOL") {
            network.native_symbol = symbol;
        }

        let scan = ScanConfig {
            from_block: parse_or(&var, "SCAN_FROM_BLOCK", 0)?,
            chunk_size: parse_opt::<u64>(&var, "SCAN_CHUNK_SIZE")?.filter(|c| *c > 0),
        };

        let holdings = HoldingsSettings {
            scan,
            concurrency: positive(parse_or(&var, "RESOLVER_CONCURRENCY", DEFAULT_CONCURRENCY)?, "RESOLVER_CONCURRENCY")?,
            metadata_limit: parse_or(&var, "NFT_METADATA_LIMIT", DEFAULT_METADATA_LIMIT)?,
            native_symbol: network.native_symbol.clone(),
            cache_ttl: Duration::from_secs(parse_or(&var, "HOLDINGS_CACHE_TTL_SECS", 0)?),
            cache_capacity: positive(parse_or(&var, "HOLDINGS_CACHE_CAPACITY", 1_000)?, "HOLDINGS_CACHE_CAPACITY")?,
        };

        let log_format = match var(LOG_FORMAT_ENV).as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    value: other.to_string(),
                    reason: "expected json or pretty".to_string(),
                })
            }
        };

        Ok(Self {
            bind_addr,
            data_dir: PathBuf::from(var(DATA_DIR_ENV).unwrap_or_else(|| "./data".to_string())),
            network,
            rpc_timeout: Duration::from_secs(positive(parse_or(&var, "RPC_TIMEOUT_SECS", 30)?, "RPC_TIMEOUT_SECS")?),
            price_api_url: var("PRICE_API_URL").unwrap_or_else(|| DEFAULT_PRICE_API_URL.to_string()),
            price_chain_id: var("PRICE_CHAIN_ID").unwrap_or_else(|| DEFAULT_PRICE_CHAIN_ID.to_string()),
            ipfs_gateway: var("IPFS_GATEWAY").unwrap_or_else(|| DEFAULT_IPFS_GATEWAY.to_string()),
            holdings,
            tip_min_confirmations: parse_or(&var, "TIP_MIN_CONFIRMATIONS", 1)?,
            auth: AuthSettings {
                jwt_secret: var("AUTH_JWT_SECRET"),
                issuer: var("AUTH_JWT_ISSUER"),
            },
            log_format,
        })
    }

    /// Path of the database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }
}

fn parse_opt<T>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(name)
        .map(|value| {
            value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                value,
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn parse_or<T>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_opt(var, name)?.unwrap_or(default))
}

fn positive<T: PartialOrd + Default + ToString>(value: T, name: &'static str) -> Result<T, ConfigError> {
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.network.chain_id, ABSTRACT_MAINNET_CHAIN_ID);
        assert_eq!(config.holdings.scan, ScanConfig::default());
        assert!(config.holdings.cache_ttl.is_zero());
        assert_eq!(config.tip_min_confirmations, 1);
        assert!(config.auth.jwt_secret.is_none());
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.db_path(), PathBuf::from("./data").join(DB_FILE_NAME));
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("PORT", "3000"),
            ("ABSTRACT_RPC_URL", "http://localhost:8545"),
            ("SCAN_FROM_BLOCK", "1000"),
            ("SCAN_CHUNK_SIZE", "5000"),
            ("HOLDINGS_CACHE_TTL_SECS", "30"),
            ("NATIVE_SYMBOL", "ETH"),
            ("AUTH_JWT_SECRET", "s3cret"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.network.rpc_url, "http://localhost:8545");
        assert_eq!(config.holdings.scan.from_block, 1000);
        assert_eq!(config.holdings.scan.chunk_size, Some(5000));
        assert_eq!(config.holdings.cache_ttl, Duration::from_secs(30));
        assert_eq!(config.auth.jwt_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            load(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid { name: "PORT", .. })
        ));
        assert!(matches!(
            load(&[("RESOLVER_CONCURRENCY", "0")]),
            Err(ConfigError::Invalid { name: "RESOLVER_CONCURRENCY", .. })
        ));
        assert!(matches!(
            load(&[("CHAIN_ID", "1")]),
            Err(ConfigError::Invalid { name: "CHAIN_ID", .. })
        ));
        assert!(matches!(
            load(&[("ABSTRACT_RPC_URL", "not a url")]),
            Err(ConfigError::Invalid { name: "ABSTRACT_RPC_URL", .. })
        ));
        assert!(matches!(
            load(&[("LOG_FORMAT", "xml")]),
            Err(ConfigError::Invalid { name: "LOG_FORMAT", .. })
        ));
    }

    #[test]
    fn zero_chunk_size_means_single_request() {
        let config = load(&[("SCAN_CHUNK_SIZE", "0")]).unwrap();
        assert_eq!(config.holdings.scan.chunk_size, None);
    }
}
