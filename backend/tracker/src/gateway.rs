//! The contract/provider boundary.
//!
//! [`ChainGateway`] is everything the core needs from the outside world:
//! single reads, coalesced batch reads, write submission, receipt lookup and
//! the connected wallet. [`crate::rpc::RpcGateway`] is the production
//! implementation; tests script an in-memory one.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::{Result, TrackerError};
use crate::transform;
use crate::types::{Address, TxHash};

/// A view call against one contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadCall {
    pub contract: Address,
    pub function: &'static str,
    pub args: Vec<Value>,
}

impl ReadCall {
    pub fn new(contract: Address, function: &'static str, args: Vec<Value>) -> Self {
        Self {
            contract,
            function,
            args,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Success,
    Failure,
}

/// One slot of a batch read, in the same position as its request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub status: BatchStatus,
    #[serde(default)]
    pub result: Option<Value>,
}

impl BatchEntry {
    pub fn success(result: Value) -> Self {
        Self {
            status: BatchStatus::Success,
            result: Some(result),
        }
    }

    pub fn failure() -> Self {
        Self {
            status: BatchStatus::Failure,
            result: None,
        }
    }

    /// The payload, unless the slot failed or came back empty.
    pub fn payload(&self) -> Option<&Value> {
        if self.status == BatchStatus::Failure {
            return None;
        }
        self.result.as_ref().filter(|v| !is_empty(v))
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// A state-changing call, signed by the connected wallet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteCall {
    pub contract: Address,
    pub function: &'static str,
    pub args: Vec<Value>,
    /// Native currency attached to the call, in the smallest unit.
    #[serde(with = "crate::types::amount")]
    pub value: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    /// Not yet included.
    Pending,
    Success,
    Reverted,
}

pub trait ChainGateway: Send + Sync {
    /// Execute one view call. `Ok(None)` means the call succeeded but returned nothing.
    fn read_one(&self, call: &ReadCall) -> impl Future<Output = Result<Option<Value>>> + Send;

    /// Execute many view calls as one request. The response has one entry per
    /// call, in request order.
    fn read_batch(&self, calls: &[ReadCall]) -> impl Future<Output = Result<Vec<BatchEntry>>> + Send;

    /// Hand a write to the wallet. Fails with [`TrackerError::Transaction`] on
    /// user rejection or provider refusal.
    fn write(&self, call: &WriteCall) -> impl Future<Output = Result<TxHash>> + Send;

    /// Look up the receipt of a submitted transaction once.
    fn wait_for_receipt(&self, hash: &TxHash) -> impl Future<Output = Result<ReceiptStatus>> + Send;

    /// Native currency balance of `owner`.
    fn native_balance(&self, owner: &Address) -> impl Future<Output = Result<u128>> + Send;

    fn current_wallet(&self) -> Option<Address>;
}

/// Read a call that must return an unsigned integer.
pub async fn read_uint<G: ChainGateway>(gateway: &G, call: &ReadCall) -> Result<u128> {
    let value = gateway.read_one(call).await?;
    value
        .as_ref()
        .and_then(transform::uint)
        .ok_or_else(|| {
            TrackerError::UnexpectedShape(format!("{} returned {:?}", call.function, value))
        })
}

/// Encode an integer argument the way the RPC expects it.
pub fn uint_arg(n: impl Into<u128>) -> Value {
    json!(n.into().to_string())
}

pub fn address_arg(address: &Address) -> Value {
    json!(address.to_string())
}
