//! Leaf encoding for entitlement records.
//!
//! An entry is a 20-byte address plus a 256-bit amount. Its leaf is
//! `Keccak256(address || amount_be)` where the amount is a fixed-width
//! 32-byte big-endian integer, so the 52-byte pre-image is injective over
//! valid entries. Address parsing is case-insensitive; two differently
//! cased spellings of one address produce the same leaf.

use primitive_types::U256;
use sha3::{Digest, Keccak256};

/// Byte length of an encoded entry: 20-byte address + 32-byte amount.
pub const ENTRY_LEN: usize = 52;

/// Errors from parsing or encoding entitlement records.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid address length: expected 40 hex chars, got {0}")]
    AddressLength(usize),

    #[error("Invalid address hex encoding: {0}")]
    AddressHex(#[from] hex::FromHexError),

    #[error("Zero address not allowed")]
    ZeroAddress,

    #[error("Invalid amount: {0}")]
    Amount(String),
}

/// Parses an Ethereum-style address from a hex string.
///
/// Accepts the address with or without a "0x" prefix, in any letter case.
///
/// # Errors
/// Fails if the address is not 40 hex characters, contains invalid hex,
/// or is the zero address.
pub fn parse_address(addr_str: &str) -> Result<[u8; 20], CodecError> {
    let trimmed = addr_str.trim();
    let cleaned = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if cleaned.len() != 40 {
        return Err(CodecError::AddressLength(cleaned.len()));
    }
    let mut address = [0u8; 20];
    hex::decode_to_slice(cleaned, &mut address)?;
    if address == [0u8; 20] {
        return Err(CodecError::ZeroAddress);
    }
    Ok(address)
}

/// Parses an entitled amount from decimal text, or hex with a "0x" prefix.
///
/// # Errors
/// Fails on empty or malformed input, or when the value does not fit in
/// 256 bits.
pub fn parse_amount(amount_str: &str) -> Result<U256, CodecError> {
    let trimmed = amount_str.trim();
    if trimmed.is_empty() {
        return Err(CodecError::Amount("empty amount".to_string()));
    }
    if let Some(hex_part) = trimmed.strip_prefix("0x") {
        U256::from_str_radix(hex_part, 16).map_err(|e| CodecError::Amount(e.to_string()))
    } else {
        U256::from_dec_str(trimmed).map_err(|e| CodecError::Amount(e.to_string()))
    }
}

/// Encodes an entry as `address || amount_be`.
pub fn encode_entry(address: &[u8; 20], amount: U256) -> [u8; ENTRY_LEN] {
    let mut encoded = [0u8; ENTRY_LEN];
    encoded[..20].copy_from_slice(address);
    encoded[20..].copy_from_slice(&amount.to_big_endian());
    encoded
}

/// Computes the Merkle leaf for an entry: `Keccak256(encode_entry(..))`.
pub fn leaf_hash(address: &[u8; 20], amount: U256) -> [u8; 32] {
    keccak256(&encode_entry(address, amount))
}

/// Computes a Keccak-256 digest.
///
/// The downstream verifier recomputes the same digest, so the choice of
/// Keccak-256 (not SHA3-256) is part of the wire contract.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let hash = Keccak256::new().chain_update(data).finalize();
    hash.into()
}
