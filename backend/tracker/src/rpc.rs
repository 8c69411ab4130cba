//! JSON-RPC client for the charity tracker contract service.
//!
//! ## Methods
//!
//! | Method                           | Params                                   | Result                    |
//! |----------------------------------|------------------------------------------|---------------------------|
//! | `tracker_call`                   | `{to, function, args}`                   | raw tuple / scalar / null |
//! | `tracker_multicall`              | `{calls: [{to, function, args}]}`        | `[{status, result}]`      |
//! | `tracker_sendTransaction`        | `{from, to, function, args, value}`      | transaction hash          |
//! | `tracker_getTransactionReceipt`  | `{hash}`                                 | `{status}` or null        |
//! | `tracker_getBalance`             | `{address}`                              | integer                   |
//!
//! ## Resilience
//!
//! * Reads are retried with exponential back-off (up to [`MAX_BACKOFF_SECS`])
//!   on network errors, rate-limit responses and soft RPC errors, at most
//!   `read_retries` times.
//! * Writes are never retried: a resubmitted write could be broadcast twice.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::errors::{Result, TrackerError, TxFailure};
use crate::gateway::{BatchEntry, ChainGateway, ReadCall, ReceiptStatus, WriteCall};
use crate::transform;
use crate::types::{Address, TxHash};

const MAX_BACKOFF_SECS: u64 = 60;
const INITIAL_BACKOFF_SECS: u64 = 2;

/// EIP-1193 "user rejected request".
const USER_REJECTED: i64 = 4001;

// ─────────────────────────────────────────────────────────
// JSON-RPC response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Value,
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ReceiptResult {
    status: ReceiptStatus,
}

// ─────────────────────────────────────────────────────────
// Gateway
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RpcGateway {
    client: Client,
    rpc_url: String,
    wallet: Option<Address>,
    read_retries: u32,
}

impl RpcGateway {
    pub fn new(client: Client, rpc_url: String, wallet: Option<Address>, read_retries: u32) -> Self {
        Self {
            client,
            rpc_url,
            wallet,
            read_retries,
        }
    }

    /// Issue one JSON-RPC request, retrying transient failures up to `retries` times.
    async fn request(&self, method: &str, params: Value, retries: u32) -> Result<Value> {
        let mut backoff = INITIAL_BACKOFF_SECS;
        let mut attempt = 0;

        loop {
            let outcome = self.send(method, &params).await;
            let err = match outcome {
                Ok(result) => return Ok(result),
                Err(e) if !is_transient(&e) => return Err(e),
                Err(e) => e,
            };

            if attempt >= retries {
                return Err(err);
            }
            attempt += 1;
            warn!("{method} failed (retry {attempt}/{retries} in {backoff}s): {err}");
            tokio::time::sleep(Duration::from_secs(backoff)).await;
            backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
        }
    }

    async fn send(&self, method: &str, params: &Value) -> Result<Value> {
        let resp = self
            .client
            .post(&self.rpc_url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": method,
                "params": params,
            }))
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TrackerError::Rpc {
                code: 429,
                message: "rate limited".to_string(),
            });
        }

        let body: RpcResponse = resp.error_for_status()?.json().await?;
        if let Some(err) = body.error {
            return Err(TrackerError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        debug!("{method} ok");
        Ok(body.result)
    }
}

/// Code -32600 / -32601 and user rejections are hard failures; everything else may be retried.
fn is_transient(err: &TrackerError) -> bool {
    match err {
        TrackerError::Http(_) => true,
        TrackerError::Rpc { code, .. } => !matches!(*code, -32600 | -32601 | USER_REJECTED),
        _ => false,
    }
}

fn call_params(call: &ReadCall) -> Value {
    json!({
        "to": call.contract,
        "function": call.function,
        "args": call.args,
    })
}

impl ChainGateway for RpcGateway {
    async fn read_one(&self, call: &ReadCall) -> Result<Option<Value>> {
        let result = self
            .request("tracker_call", call_params(call), self.read_retries)
            .await?;
        Ok(Some(result).filter(|v| !v.is_null()))
    }

    async fn read_batch(&self, calls: &[ReadCall]) -> Result<Vec<BatchEntry>> {
        let params = json!({ "calls": calls.iter().map(call_params).collect::<Vec<_>>() });
        let result = self
            .request("tracker_multicall", params, self.read_retries)
            .await?;
        let entries: Vec<BatchEntry> = serde_json::from_value(result)?;
        if entries.len() != calls.len() {
            return Err(TrackerError::UnexpectedShape(format!(
                "multicall returned {} entries for {} calls",
                entries.len(),
                calls.len()
            )));
        }
        Ok(entries)
    }

    async fn write(&self, call: &WriteCall) -> Result<TxHash> {
        let from = self
            .wallet
            .ok_or_else(|| TxFailure::Provider("no wallet connected".to_string()))?;
        let params = json!({
            "from": from,
            "to": call.contract,
            "function": call.function,
            "args": call.args,
            "value": call.value.to_string(),
        });

        match self.request("tracker_sendTransaction", params, 0).await {
            Ok(Value::String(hash)) => Ok(TxHash(hash)),
            Ok(other) => Err(TxFailure::Provider(format!("unexpected transaction handle {other}")).into()),
            Err(TrackerError::Rpc { code: USER_REJECTED, .. }) => Err(TxFailure::Rejected.into()),
            Err(e) => Err(TxFailure::Provider(e.to_string()).into()),
        }
    }

    async fn wait_for_receipt(&self, hash: &TxHash) -> Result<ReceiptStatus> {
        let result = self
            .request(
                "tracker_getTransactionReceipt",
                json!({ "hash": hash }),
                self.read_retries,
            )
            .await?;
        if result.is_null() {
            return Ok(ReceiptStatus::Pending);
        }
        let receipt: ReceiptResult = serde_json::from_value(result)?;
        Ok(receipt.status)
    }

    async fn native_balance(&self, owner: &Address) -> Result<u128> {
        let result = self
            .request(
                "tracker_getBalance",
                json!({ "address": owner }),
                self.read_retries,
            )
            .await?;
        transform::uint(&result)
            .ok_or_else(|| TrackerError::UnexpectedShape(format!("balance {result}")))
    }

    fn current_wallet(&self) -> Option<Address> {
        self.wallet
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
