//! JSON-RPC backed verification client
//!
//! Signs `verify` calls locally and submits them as raw transactions to the
//! node at `ATTPS_RPC_URL`. Confirmation polls for the receipt.

use super::abi::{encode_verify_call, Address};
use super::tx::{LegacyTransaction, LocalSigner};
use super::{ClientFactory, TransactionHandle, VerificationClient};
use crate::config::{AttpsConfig, RpcOptions};
use crate::error::AttpsError;
use crate::models::{Receipt, ReceiptStatus, VerifyParams};
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Gas estimate headroom, in percent
const GAS_MARGIN_PERCENT: u128 = 20;

//
// ================= Transport =================
//

#[derive(Clone)]
pub struct JsonRpcTransport {
    client: Client,
    url: Url,
    next_id: Arc<AtomicU64>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

impl JsonRpcTransport {
    pub fn new(url: Url, options: &RpcOptions) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(4)
            .timeout(options.request_timeout)
            .build()?;

        Ok(Self {
            client,
            url,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method, id, "JSON-RPC request");

        let response = self.client.post(self.url.clone()).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AttpsError::Rpc {
                code: status.as_u16() as i64,
                message: text,
            });
        }

        let envelope: RpcResponse = response.json().await?;
        if let Some(err) = envelope.error {
            return Err(AttpsError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        Ok(serde_json::from_value(envelope.result.unwrap_or(Value::Null))?)
    }

    async fn quantity(&self, method: &str, params: Value) -> Result<u128> {
        let raw: String = self.call(method, params).await?;
        parse_quantity(&raw)
    }
}

/// Parse a `0x`-prefixed hex quantity
pub fn parse_quantity(raw: &str) -> Result<u128> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| AttpsError::Rpc {
            code: -32000,
            message: format!("invalid quantity {:?}: {}", raw, e),
        })
}

//
// ================= Client =================
//

pub struct RpcVerificationClient {
    transport: JsonRpcTransport,
    signer: LocalSigner,
    proxy_address: Address,
    auto_hash_data: bool,
    options: RpcOptions,
}

impl RpcVerificationClient {
    /// Validate configuration and build a client. No network traffic.
    pub fn connect(config: &AttpsConfig, options: RpcOptions) -> Result<Self> {
        let rpc_url = required(&config.rpc_url, "ATTPS_RPC_URL")?;
        let url = Url::parse(rpc_url).map_err(|e| {
            AttpsError::ClientConstruction(format!("invalid ATTPS_RPC_URL: {}", e))
        })?;

        let signer = LocalSigner::from_hex(required(&config.private_key, "ATTPS_PRIVATE_KEY")?)
            .map_err(|e| AttpsError::ClientConstruction(format!("invalid ATTPS_PRIVATE_KEY: {}", e)))?;

        let proxy_address = required(&config.proxy_address, "ATTPS_PROXY_ADDRESS")?
            .parse::<Address>()
            .map_err(AttpsError::ClientConstruction)?;

        // Checked for shape only; the proxy contract resolves its own converter.
        let converter_address = config
            .converter_address
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<Address>)
            .transpose()
            .map_err(AttpsError::ClientConstruction)?;

        let transport = JsonRpcTransport::new(url, &options)
            .map_err(|e| AttpsError::ClientConstruction(e.to_string()))?;

        info!(
            signer = %signer.address(),
            proxy = %proxy_address,
            converter = ?converter_address.map(|a| a.to_string()),
            auto_hash_data = config.auto_hash_data,
            "ATTPs client ready"
        );

        Ok(Self {
            transport,
            signer,
            proxy_address,
            auto_hash_data: config.auto_hash_data,
            options,
        })
    }

    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    async fn submit(&self, params: &VerifyParams) -> Result<String> {
        let calldata =
            encode_verify_call(params, self.auto_hash_data).map_err(AttpsError::Submission)?;

        let from = self.signer.address().to_string();
        let to = self.proxy_address.to_string();
        let data = format!("0x{}", hex::encode(&calldata));

        let chain_id = self.transport.quantity("eth_chainId", json!([])).await?;
        let nonce = self
            .transport
            .quantity("eth_getTransactionCount", json!([from, "pending"]))
            .await?;
        let gas_price = self.transport.quantity("eth_gasPrice", json!([])).await?;
        let gas_estimate = self
            .transport
            .quantity("eth_estimateGas", json!([{ "from": from, "to": to, "data": data }]))
            .await?;

        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit: gas_estimate + gas_estimate * GAS_MARGIN_PERCENT / 100,
            to: self.proxy_address,
            value: 0,
            data: calldata,
        };

        let chain_id = u64::try_from(chain_id)
            .map_err(|_| AttpsError::Submission(format!("chain id {} out of range", chain_id)))?;
        let signed = self.signer.sign(&tx, chain_id).map_err(AttpsError::Submission)?;

        debug!(
            nonce = nonce as u64,
            gas_limit = tx.gas_limit as u64,
            chain_id,
            "Sending raw transaction"
        );

        let hash: String = self
            .transport
            .call("eth_sendRawTransaction", json!([signed.raw_hex()]))
            .await?;

        if !hash.eq_ignore_ascii_case(&signed.hash_hex()) {
            warn!(node = %hash, local = %signed.hash_hex(), "Node reported a different transaction hash");
        }

        Ok(hash)
    }
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AttpsError::ClientConstruction(format!("{} is not configured", key)))
}

/// Keep submission errors distinguishable from everything else
fn as_submission(err: AttpsError) -> AttpsError {
    match err {
        AttpsError::Submission(_) => err,
        other => AttpsError::Submission(other.to_string()),
    }
}

#[async_trait]
impl VerificationClient for RpcVerificationClient {
    async fn verify(&self, params: &VerifyParams) -> Result<Box<dyn TransactionHandle>> {
        let hash = self.submit(params).await.map_err(as_submission)?;

        Ok(Box::new(RpcTransactionHandle {
            hash,
            transport: self.transport.clone(),
            options: self.options.clone(),
        }))
    }
}

//
// ================= Handle =================
//

pub struct RpcTransactionHandle {
    hash: String,
    transport: JsonRpcTransport,
    options: RpcOptions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: String,
    block_number: Option<String>,
    status: Option<String>,
}

#[async_trait]
impl TransactionHandle for RpcTransactionHandle {
    fn hash(&self) -> &str {
        &self.hash
    }

    async fn wait(&self) -> Result<Receipt> {
        let deadline = Instant::now() + self.options.confirmation_timeout;

        loop {
            let receipt: Option<RpcReceipt> = self
                .transport
                .call("eth_getTransactionReceipt", json!([self.hash]))
                .await
                .map_err(|e| AttpsError::Confirmation(e.to_string()))?;

            if let Some(receipt) = receipt {
                let block_number = receipt
                    .block_number
                    .as_deref()
                    .map(parse_quantity)
                    .transpose()
                    .map_err(|e| AttpsError::Confirmation(e.to_string()))?
                    .map(|n| n as u64);

                // Receipts without a status field predate EIP-658.
                let status = receipt
                    .status
                    .as_deref()
                    .map(parse_quantity)
                    .transpose()
                    .map_err(|e| AttpsError::Confirmation(e.to_string()))?;

                if status == Some(0) {
                    return Err(AttpsError::Confirmation("transaction reverted".to_string()));
                }

                return Ok(Receipt {
                    hash: receipt.transaction_hash,
                    block_number,
                    status: ReceiptStatus::Success,
                });
            }

            if Instant::now() >= deadline {
                return Err(AttpsError::Confirmation(format!(
                    "timed out after {}s waiting for confirmation",
                    self.options.confirmation_timeout.as_secs()
                )));
            }

            tokio::time::sleep(self.options.poll_interval).await;
        }
    }
}

//
// ================= Factory =================
//

#[derive(Debug, Clone, Default)]
pub struct RpcClientFactory {
    options: RpcOptions,
}

impl RpcClientFactory {
    pub fn new(options: RpcOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl ClientFactory for RpcClientFactory {
    async fn create(&self, config: &AttpsConfig) -> Result<Arc<dyn VerificationClient>> {
        let client = RpcVerificationClient::connect(config, self.options.clone())?;
        Ok(Arc::new(client))
    }
}
