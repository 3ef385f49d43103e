//! Legacy (EIP-155) transaction building and signing

use super::abi::{keccak256, Address};
use k256::ecdsa::SigningKey;
use sha3::{Digest, Keccak256};

//
// ================= RLP =================
//

#[derive(Debug, Clone, PartialEq)]
pub enum Rlp {
    Bytes(Vec<u8>),
    List(Vec<Rlp>),
}

impl Rlp {
    /// Big-endian integer with leading zeros stripped (zero is empty)
    pub fn uint(value: u128) -> Self {
        Rlp::Bytes(trim_leading_zeros(&value.to_be_bytes()).to_vec())
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Rlp::Bytes(bytes) if bytes.len() == 1 && bytes[0] < 0x80 => bytes.clone(),
            Rlp::Bytes(bytes) => {
                let mut out = length_prefix(0x80, bytes.len());
                out.extend_from_slice(bytes);
                out
            }
            Rlp::List(items) => {
                let payload: Vec<u8> = items.iter().flat_map(Rlp::encode).collect();
                let mut out = length_prefix(0xc0, payload.len());
                out.extend(payload);
                out
            }
        }
    }
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

fn length_prefix(offset: u8, len: usize) -> Vec<u8> {
    if len < 56 {
        vec![offset + len as u8]
    } else {
        let len_bytes = (len as u64).to_be_bytes();
        let len_bytes = trim_leading_zeros(&len_bytes);
        let mut out = vec![offset + 55 + len_bytes.len() as u8];
        out.extend_from_slice(len_bytes);
        out
    }
}

//
// ================= Transaction =================
//

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyTransaction {
    pub nonce: u128,
    pub gas_price: u128,
    pub gas_limit: u128,
    pub to: Address,
    pub value: u128,
    pub data: Vec<u8>,
}

impl LegacyTransaction {
    fn fields(&self) -> Vec<Rlp> {
        vec![
            Rlp::uint(self.nonce),
            Rlp::uint(self.gas_price),
            Rlp::uint(self.gas_limit),
            Rlp::Bytes(self.to.0.to_vec()),
            Rlp::uint(self.value),
            Rlp::Bytes(self.data.clone()),
        ]
    }

    /// Payload hashed for signing under EIP-155
    pub fn signing_payload(&self, chain_id: u64) -> Vec<u8> {
        let mut fields = self.fields();
        fields.push(Rlp::uint(chain_id as u128));
        fields.push(Rlp::uint(0));
        fields.push(Rlp::uint(0));
        Rlp::List(fields).encode()
    }
}

/// Raw signed transaction bytes and their hash
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    pub hash: [u8; 32],
}

impl SignedTransaction {
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }

    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash))
    }
}

//
// ================= Signer =================
//

/// secp256k1 key held in process memory
pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}

impl LocalSigner {
    pub fn from_hex(private_key: &str) -> Result<Self, String> {
        let bytes = super::abi::decode_hex(private_key)
            .map_err(|e| format!("private key is not valid hex: {}", e))?;
        if bytes.len() != 32 {
            return Err(format!("private key must be 32 bytes, got {}", bytes.len()));
        }

        let key = SigningKey::from_slice(&bytes)
            .map_err(|_| "private key is not a valid secp256k1 scalar".to_string())?;

        let encoded = key.verifying_key().to_encoded_point(false);
        // bytes[0] == 0x04 (uncompressed prefix)
        let address = Address::from_public_key(&encoded.as_bytes()[1..]);

        Ok(Self { key, address })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn sign(&self, tx: &LegacyTransaction, chain_id: u64) -> Result<SignedTransaction, String> {
        let digest = Keccak256::new_with_prefix(tx.signing_payload(chain_id));
        let (signature, recovery_id) = self
            .key
            .sign_digest_recoverable(digest)
            .map_err(|e| format!("signing failed: {}", e))?;

        let v = chain_id as u128 * 2 + 35 + recovery_id.to_byte() as u128;
        let signature_bytes = signature.to_bytes();
        let (r, s) = signature_bytes.split_at(32);

        let mut fields = tx.fields();
        fields.push(Rlp::uint(v));
        fields.push(Rlp::Bytes(trim_leading_zeros(r).to_vec()));
        fields.push(Rlp::Bytes(trim_leading_zeros(s).to_vec()));

        let raw = Rlp::List(fields).encode();
        let hash = keccak256(&raw);

        Ok(SignedTransaction { raw, hash })
    }
}
