// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Off-chain NFT metadata referenced by `tokenURI`.
//!
//! Supported URI schemes: `http(s)://`, `ipfs://` (through the configured
//! gateway), `ar://` (through arweave.net) and inline
//! `data:application/json[;base64],...`.
//!
//! Token URIs are chosen by whoever deployed the contract, so HTTP fetches
//! only go to public addresses (the configured gateway excepted), follow a
//! bounded number of redirects, and read at most [`MAX_METADATA_BYTES`].

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use base64::Engine as _;
use reqwest::{header::LOCATION, redirect::Policy};
use serde::Deserialize;
use url::{Host, Url};

/// Default IPFS HTTP gateway.
pub const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.io/ipfs/";

/// Arweave HTTP gateway.
const ARWEAVE_GATEWAY: &str = "https://arweave.net/";

/// Timeout for a metadata fetch.
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest metadata document read, inline or over HTTP.
pub const MAX_METADATA_BYTES: usize = 256 * 1024;

/// Redirect hops followed per fetch.
const MAX_REDIRECTS: usize = 3;

/// The fields the holdings view shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NftMetadata {
    pub name: Option<String>,
    /// Image URL, already rewritten to HTTP
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetadataDocument {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("unsupported token URI: {0}")]
    UnsupportedUri(String),

    #[error("invalid inline metadata: {0}")]
    InvalidInline(String),

    #[error("metadata request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("metadata server returned status {0}")]
    Status(u16),

    #[error("metadata is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("metadata host is not public: {0}")]
    BlockedHost(String),

    #[error("could not resolve metadata host {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("metadata redirect not followed: {0}")]
    Redirect(String),

    #[error("metadata document exceeds {MAX_METADATA_BYTES} bytes")]
    TooLarge,
}

/// Where a token URI's document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Http(Url),
    Inline(Vec<u8>),
}

/// HTTP client for NFT metadata documents.
pub struct NftMetadataClient {
    client: reqwest::Client,
    ipfs_gateway: String,
    /// Origin of the configured gateway, exempt from the public-address check
    gateway_origin: Option<url::Origin>,
}

impl NftMetadataClient {
    /// Create a client that resolves `ipfs://` through `ipfs_gateway`.
    pub fn new(ipfs_gateway: impl Into<String>) -> Result<Self, MetadataError> {
        let client = reqwest::Client::builder()
            .timeout(METADATA_TIMEOUT)
            .redirect(Policy::none())
            .build()?;
        let mut gateway = ipfs_gateway.into();
        if !gateway.ends_with('/') {
            gateway.push('/');
        }
        let gateway_origin = Url::parse(&gateway).ok().map(|u| u.origin());
        Ok(Self {
            client,
            ipfs_gateway: gateway,
            gateway_origin,
        })
    }

    /// Rewrite `ipfs://` and `ar://` URIs to HTTP; other URIs pass through.
    pub fn http_url(&self, uri: &str) -> String {
        let uri = uri.trim();
        if let Some(rest) = uri.strip_prefix("ipfs://") {
            let rest = rest.strip_prefix("ipfs/").unwrap_or(rest);
            format!("{}{}", self.ipfs_gateway, rest)
        } else if let Some(rest) = uri.strip_prefix("ar://") {
            format!("{ARWEAVE_GATEWAY}{rest}")
        } else {
            uri.to_string()
        }
    }

    fn locate(&self, uri: &str) -> Result<Location, MetadataError> {
        let uri = uri.trim();
        if let Some(rest) = uri.strip_prefix("data:") {
            return decode_data_uri(rest).map(Location::Inline);
        }

        match Url::parse(&self.http_url(uri)) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Location::Http(url)),
            _ => Err(MetadataError::UnsupportedUri(uri.to_string())),
        }
    }

    /// Refuse hosts that resolve to loopback, private or otherwise
    /// non-public addresses.
    async fn check_host(&self, url: &Url) -> Result<(), MetadataError> {
        if self.gateway_origin.as_ref() == Some(&url.origin()) {
            return Ok(());
        }
        let blocked = || MetadataError::BlockedHost(url.to_string());
        match url.host().ok_or_else(blocked)? {
            Host::Ipv4(ip) if is_public_v4(ip) => Ok(()),
            Host::Ipv6(ip) if is_public_ip(IpAddr::V6(ip)) => Ok(()),
            Host::Ipv4(_) | Host::Ipv6(_) => Err(blocked()),
            Host::Domain(name) => {
                let name = name.trim_end_matches('.').to_ascii_lowercase();
                if name == "localhost" || name.ends_with(".localhost") {
                    return Err(blocked());
                }
                let port = url.port_or_known_default().unwrap_or(443);
                let addrs: Vec<_> = tokio::net::lookup_host((name.as_str(), port))
                    .await
                    .map_err(|source| MetadataError::Resolve {
                        host: name.clone(),
                        source,
                    })?
                    .collect();
                if addrs.is_empty() || addrs.iter().any(|a| !is_public_ip(a.ip())) {
                    return Err(blocked());
                }
                Ok(())
            }
        }
    }

    /// GET with the host check applied to every redirect hop.
    async fn get(&self, mut url: Url) -> Result<Vec<u8>, MetadataError> {
        for _ in 0..=MAX_REDIRECTS {
            self.check_host(&url).await?;
            let mut response = self.client.get(url.clone()).send().await?;
            let status = response.status();

            if status.is_redirection() {
                let next = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|location| url.join(location).ok())
                    .filter(|next| matches!(next.scheme(), "http" | "https"))
                    .ok_or_else(|| MetadataError::Redirect(url.to_string()))?;
                url = next;
                continue;
            }
            if !status.is_success() {
                return Err(MetadataError::Status(status.as_u16()));
            }

            if response
                .content_length()
                .is_some_and(|len| len > MAX_METADATA_BYTES as u64)
            {
                return Err(MetadataError::TooLarge);
            }
            let mut body = Vec::new();
            while let Some(chunk) = response.chunk().await? {
                if body.len() + chunk.len() > MAX_METADATA_BYTES {
                    return Err(MetadataError::TooLarge);
                }
                body.extend_from_slice(&chunk);
            }
            return Ok(body);
        }
        Err(MetadataError::Redirect(url.to_string()))
    }

    /// Fetch and parse the metadata document a token URI points at.
    pub async fn fetch(&self, token_uri: &str) -> Result<NftMetadata, MetadataError> {
        let body = match self.locate(token_uri)? {
            Location::Inline(bytes) if bytes.len() > MAX_METADATA_BYTES => {
                return Err(MetadataError::TooLarge);
            }
            Location::Inline(bytes) => bytes,
            Location::Http(url) => self.get(url).await?,
        };

        let doc: MetadataDocument = serde_json::from_slice(&body)?;
        Ok(NftMetadata {
            name: doc.name.filter(|n| !n.trim().is_empty()),
            image: doc
                .image
                .or(doc.image_url)
                .filter(|i| !i.trim().is_empty())
                .map(|i| self.http_url(&i)),
        })
    }
}

/// Decode the part of a `data:` URI after the scheme.
fn decode_data_uri(rest: &str) -> Result<Vec<u8>, MetadataError> {
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| MetadataError::InvalidInline("missing ','".to_string()))?;

    let mut params = header.split(';');
    let media_type = params.next().unwrap_or_default();
    if !media_type.eq_ignore_ascii_case("application/json") {
        return Err(MetadataError::UnsupportedUri(format!("data:{header}")));
    }

    if params.any(|p| p.eq_ignore_ascii_case("base64")) {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| MetadataError::InvalidInline(e.to_string()))
    } else {
        Ok(urlencoding::decode_binary(payload.as_bytes()).into_owned())
    }
}

fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_public_v4(v4),
            None => is_public_v6(v6),
        },
    }
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    let shared = a == 100 && (b & 0xc0) == 64;
    !(a == 0
        || shared
        || ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast())
}

fn is_public_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    let unique_local = (first & 0xfe00) == 0xfc00;
    let link_local = (first & 0xffc0) == 0xfe80;
    !(ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() || unique_local || link_local)
}
