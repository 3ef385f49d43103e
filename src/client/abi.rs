//! Solidity ABI encoding for the proxy's `verify` call

use crate::models::VerifyParams;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

pub const VERIFY_SIGNATURE: &str =
    "verify(address,bytes32,(bytes,bytes32,(bytes32,bytes32,uint8)[],(string,string,string)))";

/// A 20-byte EVM address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn from_public_key(uncompressed_no_prefix: &[u8]) -> Self {
        let hash = keccak256(uncompressed_no_prefix);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash[12..]);
        Address(bytes)
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = decode_hex(s).map_err(|e| format!("invalid address {:?}: {}", s, e))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| format!("invalid address {:?}: expected 20 bytes", s))?;
        Ok(Address(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(data));
    out
}

/// Decode hex with or without a `0x` prefix
pub fn decode_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(digits)
}

/// Parse exactly 32 bytes of hex
pub fn parse_fixed_bytes32(s: &str, field: &str) -> Result<[u8; 32], String> {
    let bytes = decode_hex(s).map_err(|e| format!("{} is not valid hex: {}", field, e))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| format!("{} must be 32 bytes, got {}", field, bytes.len()))
}

/// Parse a scalar of up to 32 bytes into a left-padded word
pub fn parse_bytes32(s: &str, field: &str) -> Result<[u8; 32], String> {
    let bytes = decode_hex(s).map_err(|e| format!("{} is not valid hex: {}", field, e))?;
    if bytes.len() > 32 {
        return Err(format!("{} is longer than 32 bytes", field));
    }

    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(word)
}

/// Payload bytes: `0x`-hex is decoded, anything else is UTF-8
pub fn data_bytes(data: &str) -> Vec<u8> {
    if data.starts_with("0x") {
        if let Ok(bytes) = decode_hex(data) {
            return bytes;
        }
    }
    data.as_bytes().to_vec()
}

//
// ================= Tokens =================
//

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Address(Address),
    FixedBytes32([u8; 32]),
    Uint(u128),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<Token>),
    Tuple(Vec<Token>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        match self {
            Token::Bytes(_) | Token::String(_) | Token::Array(_) => true,
            Token::Tuple(tokens) => tokens.iter().any(Token::is_dynamic),
            _ => false,
        }
    }

    fn encode(&self) -> Vec<u8> {
        match self {
            Token::Address(address) => {
                let mut word = [0u8; 32];
                word[12..].copy_from_slice(&address.0);
                word.to_vec()
            }
            Token::FixedBytes32(word) => word.to_vec(),
            Token::Uint(value) => uint_word(*value).to_vec(),
            Token::Bytes(bytes) => encode_packed_bytes(bytes),
            Token::String(s) => encode_packed_bytes(s.as_bytes()),
            Token::Array(tokens) => {
                let mut out = uint_word(tokens.len() as u128).to_vec();
                out.extend(encode(tokens));
                out
            }
            Token::Tuple(tokens) => encode(tokens),
        }
    }
}

fn uint_word(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn encode_packed_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = uint_word(bytes.len() as u128).to_vec();
    out.extend_from_slice(bytes);
    let padding = (32 - bytes.len() % 32) % 32;
    out.extend(std::iter::repeat(0u8).take(padding));
    out
}

/// Head/tail encoding of a token sequence
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let encoded: Vec<(bool, Vec<u8>)> = tokens
        .iter()
        .map(|token| (token.is_dynamic(), token.encode()))
        .collect();

    let head_len: usize = encoded
        .iter()
        .map(|(dynamic, bytes)| if *dynamic { 32 } else { bytes.len() })
        .sum();

    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for (dynamic, bytes) in encoded {
        if dynamic {
            head.extend_from_slice(&uint_word((head_len + tail.len()) as u128));
            tail.extend(bytes);
        } else {
            head.extend(bytes);
        }
    }

    head.extend(tail);
    head
}

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Calldata for `verify(agent, digest, payload)`.
///
/// With `auto_hash_data` a missing `dataHash` becomes keccak256 of the data.
pub fn encode_verify_call(params: &VerifyParams, auto_hash_data: bool) -> Result<Vec<u8>, String> {
    let agent: Address = params.agent.parse()?;
    let digest = parse_fixed_bytes32(&params.digest, "digest")?;

    let payload = &params.payload;
    let data = data_bytes(&payload.data);

    let data_hash = match &payload.data_hash {
        Some(hash) => parse_fixed_bytes32(hash, "dataHash")?,
        None if auto_hash_data => keccak256(&data),
        None => [0u8; 32],
    };

    let signatures = payload
        .signatures
        .iter()
        .enumerate()
        .map(|(i, sig)| {
            Ok(Token::Tuple(vec![
                Token::FixedBytes32(parse_bytes32(&sig.r, &format!("signatures[{}].r", i))?),
                Token::FixedBytes32(parse_bytes32(&sig.s, &format!("signatures[{}].s", i))?),
                Token::Uint(sig.v as u128),
            ]))
        })
        .collect::<Result<Vec<_>, String>>()?;

    let metadata = payload.metadata.clone().unwrap_or_default();

    let mut calldata = selector(VERIFY_SIGNATURE).to_vec();
    calldata.extend(encode(&[
        Token::Address(agent),
        Token::FixedBytes32(digest),
        Token::Tuple(vec![
            Token::Bytes(data),
            Token::FixedBytes32(data_hash),
            Token::Array(signatures),
            Token::Tuple(vec![
                Token::String(metadata.content_type.unwrap_or_default()),
                Token::String(metadata.encoding.unwrap_or_default()),
                Token::String(metadata.compression.unwrap_or_default()),
            ]),
        ]),
    ]));

    Ok(calldata)
}
