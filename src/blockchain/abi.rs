// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tolerant decoding of raw `eth_call` return data.
//!
//! Token contracts in the wild do not all follow the ERC-20 ABI for their
//! metadata getters. Older tokens return `bytes32` for `symbol()`/`name()`,
//! some return nothing at all. The helpers here accept both encodings and
//! turn everything else into an [`AbiError`] at this boundary.

use alloy::primitives::U256;

/// Size of one ABI word.
const WORD: usize = 32;

/// Errors raised while decoding a call result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbiError {
    #[error("empty return data")]
    Empty,

    #[error("value out of range: {0}")]
    OutOfRange(String),

    #[error("no printable characters in string result")]
    Unprintable,
}

/// Decode a `uint256` return value.
///
/// Only the first word is read. Results shorter than a word are read
/// big-endian as-is.
pub fn decode_uint(data: &[u8]) -> Result<U256, AbiError> {
    if data.is_empty() {
        return Err(AbiError::Empty);
    }
    let word = &data[..data.len().min(WORD)];
    Ok(U256::from_be_slice(word))
}

/// Decode a `uint8` return value (e.g. `decimals()`).
pub fn decode_u8(data: &[u8]) -> Result<u8, AbiError> {
    let value = decode_uint(data)?;
    u8::try_from(value).map_err(|_| AbiError::OutOfRange(value.to_string()))
}

/// Decode a `string` or `bytes32` return value.
///
/// Results of at most one word are treated as a right-padded `bytes32`.
/// Longer results are read as ABI `(offset, length, data)`; if that layout
/// does not hold, the first word is read as `bytes32` instead.
pub fn decode_string(data: &[u8]) -> Result<String, AbiError> {
    if data.is_empty() {
        return Err(AbiError::Empty);
    }

    let raw = if data.len() <= WORD {
        fixed_bytes_string(data)
    } else {
        dynamic_string(data).unwrap_or_else(|| fixed_bytes_string(&data[..WORD]))
    };

    let cleaned = printable(raw);
    if cleaned.is_empty() {
        Err(AbiError::Unprintable)
    } else {
        Ok(cleaned)
    }
}

/// Read a dynamic `string` laid out as `(offset, length, data)`.
fn dynamic_string(data: &[u8]) -> Option<&[u8]> {
    let offset = word_as_usize(data, 0)?;
    let length = word_as_usize(data, offset)?;
    let start = offset.checked_add(WORD)?;
    let end = start.checked_add(length)?;
    data.get(start..end)
}

/// Read the word at `position` as a usize, if it is in bounds and small.
fn word_as_usize(data: &[u8], position: usize) -> Option<usize> {
    let end = position.checked_add(WORD)?;
    let word = data.get(position..end)?;
    let value = U256::from_be_slice(word);
    usize::try_from(value).ok()
}

/// Bytes of a right-padded `bytes32`, cut at the first NUL.
fn fixed_bytes_string(data: &[u8]) -> &[u8] {
    let end = data.iter().position(|b| *b == 0).unwrap_or(data.len());
    &data[..end]
}

/// Strip control characters and invalid UTF-8, then trim.
fn printable(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .chars()
        .filter(|c| !c.is_control() && *c != char::REPLACEMENT_CHARACTER)
        .collect::<String>()
        .trim()
        .to_string()
}
