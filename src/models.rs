//! Core data models for the ATTPs verify agent
//!
//! Wire names are camelCase to match the shapes accepted by `crate::schema`.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

//
// ================= Agent Settings =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentSettings {
    pub signers: Vec<String>,
    pub threshold: u64,
    pub converter_address: String,
    pub agent_header: AgentHeader,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_agent_id: Option<String>,
    pub source_agent_name: String,
    pub target_agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    pub message_type: u64,
    pub priority: u64,
    pub ttl: u64,
}

impl AgentSettings {
    /// Whether enough signers exist to ever reach `threshold`.
    ///
    /// The verification service enforces this; it is not part of
    /// `is_agent_settings`.
    pub fn threshold_satisfiable(&self) -> bool {
        self.threshold as usize <= self.signers.len()
    }
}

//
// ================= Verify Params =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub r: String,
    pub s: String,
    #[serde(deserialize_with = "recovery_byte")]
    pub v: u8,
}

/// Any JSON number equal to an integer in `0..=255`, so `27.0` reads as 27
fn recovery_byte<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let n = f64::deserialize(deserializer)?;
    if n.fract() == 0.0 && (0.0..=255.0).contains(&n) {
        Ok(n as u8)
    } else {
        Err(serde::de::Error::custom(format!(
            "v must be an integer from 0 to 255, got {}",
            n
        )))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_hash: Option<String>,
    pub signatures: Vec<Signature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// The command submitted to the verification service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyParams {
    pub agent: String,
    pub digest: String,
    pub payload: MessagePayload,
}

//
// ================= Price Feed =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceQueryParams {
    pub pair: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttpsPriceQuery {
    pub source_agent_id: String,
    pub feed_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttpsPriceQueryResponse {
    pub feed_id: String,
    pub valid_time_stamp: f64,
    pub observe_time_stamp: f64,
    pub native_fee: f64,
    pub token_fee: f64,
    pub expire_time_stamp: f64,
    pub mid_price: String,
    pub ask_price: String,
    pub bid_price: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceData {
    pub feed_id: String,
    pub pair: String,
    pub networks: Vec<String>,
    pub bid_price: String,
    pub ask_price: String,
    pub mid_price: String,
    pub bid_price_change: f64,
    pub ask_price_change: f64,
    pub mid_price_change: f64,
    pub timestamp: f64,
}

//
// ================= Transaction =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Finalized submission as reported by the verification service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub hash: String,
    pub block_number: Option<u64>,
    pub status: ReceiptStatus,
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReceiptStatus::Success => "success",
            ReceiptStatus::Reverted => "reverted",
        };
        write!(f, "{}", s)
    }
}
