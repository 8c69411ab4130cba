//! Scripted in-memory gateway for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde_json::{json, Value};
use tokio::sync::watch;

use crate::errors::{Result, TrackerError, TxFailure};
use crate::gateway::{BatchEntry, ChainGateway, ReadCall, ReceiptStatus, WriteCall};
use crate::orchestrator::TxState;
use crate::types::{Address, TxHash};

pub const CONTRACT: Address = Address::from_bytes([0xc0; 20]);
pub const TOKEN: Address = Address::from_bytes([0x70; 20]);
pub const WALLET: Address = Address::from_bytes([0x12; 20]);
pub const NGO: Address = Address::from_bytes([0x11; 20]);

pub fn project_tuple(id: u64) -> Value {
    json!([
        id.to_string(),
        NGO.to_string(),
        Address::ZERO.to_string(),
        "1000000000000000000",
        "500000000000000000",
        "500000000000000000",
        "0",
        true,
        false
    ])
}

pub fn milestone_tuple(description: &str) -> Value {
    json!([description, "250000000000000000", false, false, "0"])
}

#[derive(Default)]
pub struct MockGateway {
    wallet: Option<Address>,
    reads: Mutex<HashMap<String, std::result::Result<Value, String>>>,
    batches_fail: Mutex<bool>,
    native_balance: Mutex<u128>,
    write_failures: Mutex<VecDeque<TxFailure>>,
    receipts: Mutex<VecDeque<ReceiptStatus>>,
    writes: Mutex<Vec<WriteCall>>,
    observer: Mutex<Option<watch::Receiver<TxState>>>,
    observed: Mutex<Vec<TxState>>,
    read_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    receipt_polls: AtomicUsize,
}

fn key(contract: &Address, function: &str, args: &[Value]) -> String {
    format!("{contract}:{function}:{}", Value::Array(args.to_vec()))
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wallet(wallet: Address) -> Self {
        Self {
            wallet: Some(wallet),
            ..Self::default()
        }
    }

    pub fn set_read(&self, function: &str, args: Vec<Value>, value: Value) {
        self.set_read_on(CONTRACT, function, args, value);
    }

    pub fn set_read_on(&self, contract: Address, function: &str, args: Vec<Value>, value: Value) {
        self.reads
            .lock()
            .unwrap()
            .insert(key(&contract, function, &args), Ok(value));
    }

    pub fn fail_read(&self, function: &str, args: Vec<Value>) {
        self.reads.lock().unwrap().insert(
            key(&CONTRACT, function, &args),
            Err(format!("{function} execution reverted")),
        );
    }

    pub fn fail_batches(&self) {
        *self.batches_fail.lock().unwrap() = true;
    }

    pub fn set_native_balance(&self, balance: u128) {
        *self.native_balance.lock().unwrap() = balance;
    }

    pub fn fail_next_write(&self, failure: TxFailure) {
        self.write_failures.lock().unwrap().push_back(failure);
    }

    /// Receipt answers handed out in order; once exhausted every receipt is `Success`.
    pub fn queue_receipts(&self, statuses: Vec<ReceiptStatus>) {
        self.receipts.lock().unwrap().extend(statuses);
    }

    /// Record the orchestrator state every time a write or receipt poll reaches the gateway.
    pub fn observe(&self, rx: watch::Receiver<TxState>) {
        *self.observer.lock().unwrap() = Some(rx);
    }

    pub fn observed(&self) -> Vec<TxState> {
        self.observed.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<WriteCall> {
        self.writes.lock().unwrap().clone()
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn receipt_polls(&self) -> usize {
        self.receipt_polls.load(Ordering::SeqCst)
    }

    fn record_state(&self) {
        if let Some(rx) = self.observer.lock().unwrap().as_ref() {
            self.observed.lock().unwrap().push(rx.borrow().clone());
        }
    }

    fn lookup(&self, call: &ReadCall) -> Option<std::result::Result<Value, String>> {
        self.reads
            .lock()
            .unwrap()
            .get(&key(&call.contract, call.function, &call.args))
            .cloned()
    }
}

impl ChainGateway for MockGateway {
    async fn read_one(&self, call: &ReadCall) -> Result<Option<Value>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        match self.lookup(call) {
            Some(Ok(value)) => Ok(Some(value)),
            Some(Err(message)) => Err(TrackerError::Rpc {
                code: -32000,
                message,
            }),
            None => Ok(None),
        }
    }

    async fn read_batch(&self, calls: &[ReadCall]) -> Result<Vec<BatchEntry>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if *self.batches_fail.lock().unwrap() {
            return Err(TrackerError::Rpc {
                code: -32000,
                message: "multicall failed".to_string(),
            });
        }
        Ok(calls
            .iter()
            .map(|call| match self.lookup(call) {
                Some(Ok(value)) => BatchEntry::success(value),
                _ => BatchEntry::failure(),
            })
            .collect())
    }

    async fn write(&self, call: &WriteCall) -> Result<TxHash> {
        self.record_state();
        if let Some(failure) = self.write_failures.lock().unwrap().pop_front() {
            return Err(failure.into());
        }
        let mut writes = self.writes.lock().unwrap();
        writes.push(call.clone());
        Ok(TxHash(format!("0x{:064x}", writes.len())))
    }

    async fn wait_for_receipt(&self, _hash: &TxHash) -> Result<ReceiptStatus> {
        self.receipt_polls.fetch_add(1, Ordering::SeqCst);
        self.record_state();
        Ok(self
            .receipts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ReceiptStatus::Success))
    }

    async fn native_balance(&self, _owner: &Address) -> Result<u128> {
        Ok(*self.native_balance.lock().unwrap())
    }

    fn current_wallet(&self) -> Option<Address> {
        self.wallet
    }
}
