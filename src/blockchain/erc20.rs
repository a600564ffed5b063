// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ERC-20 and ERC-721 contract reads.
//!
//! Calls go through [`ChainRpc::call`] with hand-built call data so that the
//! raw return bytes can be decoded tolerantly (see [`super::abi`]).

use alloy::{
    primitives::{Address, Bytes, U256},
    sol,
    sol_types::SolCall,
};

use super::abi::{self, AbiError};
use super::client::{ChainRpc, RpcError};

// ERC-20 and ERC-721 interfaces using alloy's sol! macro
sol! {
    interface IERC20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);

        event Transfer(address indexed from, address indexed to, uint256 value);
    }

    interface IERC721 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function tokenURI(uint256 tokenId) external view returns (string);

        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
    }
}

/// Symbol used when a token does not answer `symbol()`.
pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

/// Name used when an NFT contract does not answer `name()`.
pub const UNKNOWN_COLLECTION: &str = "Unknown Collection";

/// Decimals assumed when a token does not answer `decimals()`.
pub const DEFAULT_DECIMALS: u8 = 18;

/// Failure of a single contract read.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContractCallError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("undecodable result: {0}")]
    Decode(#[from] AbiError),
}

/// On-chain metadata of a fungible token, with fallbacks applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

/// On-chain metadata of an NFT collection, with fallbacks applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionMetadata {
    pub name: String,
    pub symbol: String,
}

async fn call_raw(rpc: &dyn ChainRpc, to: Address, data: Vec<u8>) -> Result<Bytes, RpcError> {
    rpc.call(to, Bytes::from(data)).await
}

/// `balanceOf(owner)` on an ERC-20 contract.
pub async fn balance_of(
    rpc: &dyn ChainRpc,
    token: Address,
    owner: Address,
) -> Result<U256, ContractCallError> {
    let data = IERC20::balanceOfCall { account: owner }.abi_encode();
    let result = call_raw(rpc, token, data).await?;
    Ok(abi::decode_uint(&result)?)
}

/// `symbol()`; works for both ERC-20 and ERC-721.
pub async fn symbol(rpc: &dyn ChainRpc, contract: Address) -> Result<String, ContractCallError> {
    let result = call_raw(rpc, contract, IERC20::symbolCall {}.abi_encode()).await?;
    Ok(abi::decode_string(&result)?)
}

/// `name()`; works for both ERC-20 and ERC-721.
pub async fn name(rpc: &dyn ChainRpc, contract: Address) -> Result<String, ContractCallError> {
    let result = call_raw(rpc, contract, IERC20::nameCall {}.abi_encode()).await?;
    Ok(abi::decode_string(&result)?)
}

/// `decimals()` on an ERC-20 contract.
pub async fn decimals(rpc: &dyn ChainRpc, token: Address) -> Result<u8, ContractCallError> {
    let result = call_raw(rpc, token, IERC20::decimalsCall {}.abi_encode()).await?;
    Ok(abi::decode_u8(&result)?)
}

/// `tokenURI(tokenId)` on an ERC-721 contract.
pub async fn token_uri(
    rpc: &dyn ChainRpc,
    contract: Address,
    token_id: U256,
) -> Result<String, ContractCallError> {
    let data = IERC721::tokenURICall { tokenId: token_id }.abi_encode();
    let result = call_raw(rpc, contract, data).await?;
    Ok(abi::decode_string(&result)?)
}

/// Read symbol, name and decimals, substituting fallbacks for failed reads.
///
/// A missing symbol becomes `UNKNOWN`, a missing name becomes the symbol and
/// missing decimals become 18.
pub async fn token_metadata(rpc: &dyn ChainRpc, token: Address) -> TokenMetadata {
    let (symbol_res, name_res, decimals_res) =
        tokio::join!(symbol(rpc, token), name(rpc, token), decimals(rpc, token));

    let symbol = symbol_res.unwrap_or_else(|e| {
        tracing::debug!(token = %token, error = %e, "symbol() failed");
        UNKNOWN_SYMBOL.to_string()
    });
    let name = name_res.unwrap_or_else(|e| {
        tracing::debug!(token = %token, error = %e, "name() failed");
        symbol.clone()
    });
    let decimals = decimals_res.unwrap_or_else(|e| {
        tracing::debug!(token = %token, error = %e, "decimals() failed");
        DEFAULT_DECIMALS
    });

    TokenMetadata {
        symbol,
        name,
        decimals,
    }
}

/// Read an NFT collection's name and symbol, substituting fallbacks.
pub async fn collection_metadata(rpc: &dyn ChainRpc, contract: Address) -> CollectionMetadata {
    let (name_res, symbol_res) = tokio::join!(name(rpc, contract), symbol(rpc, contract));

    CollectionMetadata {
        name: name_res.unwrap_or_else(|_| UNKNOWN_COLLECTION.to_string()),
        symbol: symbol_res.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::types::TRANSFER_TOPIC;
    use crate::test_support::FakeChain;
    use alloy::sol_types::{SolEvent, SolValue};

    fn token() -> Address {
        Address::repeat_byte(0x11)
    }

    #[test]
    fn transfer_topic_matches_event_signatures() {
        assert_eq!(TRANSFER_TOPIC, IERC20::Transfer::SIGNATURE_HASH);
        assert_eq!(TRANSFER_TOPIC, IERC721::Transfer::SIGNATURE_HASH);
    }

    #[test]
    fn selectors_are_standard() {
        assert_eq!(IERC20::balanceOfCall::SELECTOR, [0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(IERC721::tokenURICall::SELECTOR, [0xc8, 0x7b, 0x56, 0xdd]);
    }

    #[tokio::test]
    async fn metadata_reads_all_fields() {
        let chain = FakeChain::default();
        chain.set_call(token(), IERC20::symbolCall {}.abi_encode(), "PENGU".to_string().abi_encode());
        chain.set_call(token(), IERC20::nameCall {}.abi_encode(), "Pudgy Penguins".to_string().abi_encode());
        chain.set_call(token(), IERC20::decimalsCall {}.abi_encode(), U256::from(18u8).abi_encode());

        let meta = token_metadata(&chain, token()).await;
        assert_eq!(
            meta,
            TokenMetadata {
                symbol: "PENGU".to_string(),
                name: "Pudgy Penguins".to_string(),
                decimals: 18,
            }
        );
    }

    #[tokio::test]
    async fn metadata_fallbacks() {
        let chain = FakeChain::default();
        let meta = token_metadata(&chain, token()).await;
        assert_eq!(meta.symbol, UNKNOWN_SYMBOL);
        assert_eq!(meta.name, UNKNOWN_SYMBOL);
        assert_eq!(meta.decimals, DEFAULT_DECIMALS);

        // Name falls back to the symbol when only symbol() answers
        chain.set_call(token(), IERC20::symbolCall {}.abi_encode(), "ABC".to_string().abi_encode());
        let meta = token_metadata(&chain, token()).await;
        assert_eq!(meta.name, "ABC");

        let collection = collection_metadata(&chain, Address::repeat_byte(0x22)).await;
        assert_eq!(collection.name, UNKNOWN_COLLECTION);
        assert_eq!(collection.symbol, "");
    }

    #[tokio::test]
    async fn balance_of_decodes_uint() {
        let chain = FakeChain::default();
        let owner = Address::repeat_byte(0xaa);
        chain.set_call(
            token(),
            IERC20::balanceOfCall { account: owner }.abi_encode(),
            U256::from(5_000u64).abi_encode(),
        );
        assert_eq!(balance_of(&chain, token(), owner).await.unwrap(), U256::from(5_000u64));

        // Unknown calls return empty data
        let err = balance_of(&chain, token(), Address::ZERO).await.unwrap_err();
        assert!(matches!(err, ContractCallError::Decode(AbiError::Empty)));
    }
}
