//! # Transaction orchestrator
//!
//! Drives one kind of write (donate, vote) through its lifecycle:
//!
//! ```text
//! Idle ──► Pending ──► Confirming ──► Success
//!              │            └───────► Error
//!              └────────────────────► Error
//! ```
//!
//! * `Pending` is entered when the first write of the plan is handed to the
//!   wallet. It also covers an ERC-20 approval and its confirmation.
//! * `Confirming` is entered once the final write returns its handle.
//! * A terminal state fires exactly one notification, on the edge into it.
//!
//! Each invocation is tagged with an attempt id. [`TxOrchestrator::reset`]
//! bumps the id so a late result from a superseded attempt is discarded
//! instead of overwriting the fresh state. While an attempt is in flight a
//! second [`TxOrchestrator::execute`] is refused with [`TrackerError::Busy`].

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::ReadCache;
use crate::config::Config;
use crate::errors::{Result, TrackerError, TxFailure};
use crate::gateway::{ChainGateway, ReceiptStatus, WriteCall};
use crate::notify::{Notification, NotificationKind, Notifier};
use crate::types::{Address, TxHash};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum TxState {
    #[default]
    Idle,
    Pending,
    Confirming,
    Success,
    Error(String),
}

impl TxState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error(_))
    }
}

/// The writes one invocation will submit, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct TxPlan {
    pub steps: Vec<WriteCall>,
    /// Shown in the success notification.
    pub summary: String,
}

/// The "build call" capability a write hook is parameterised over.
pub trait TxAction: Send + Sync {
    type Params: Send;

    fn name(&self) -> &'static str;

    /// Validate `params` and produce the writes to submit. Returning an error
    /// means nothing is sent to the wallet.
    fn plan<G: ChainGateway>(
        &self,
        gateway: &G,
        wallet: Address,
        params: Self::Params,
    ) -> impl Future<Output = Result<TxPlan>> + Send;
}

#[derive(Debug, Clone, Copy)]
pub struct TxSettings {
    pub poll_interval: Duration,
    /// `None` waits for a receipt indefinitely.
    pub receipt_timeout: Option<Duration>,
}

impl From<&Config> for TxSettings {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.receipt_poll_interval(),
            receipt_timeout: config.receipt_timeout(),
        }
    }
}

impl Default for TxSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            receipt_timeout: None,
        }
    }
}

pub struct TxOrchestrator<G, A, N> {
    gateway: Arc<G>,
    cache: Arc<ReadCache>,
    action: A,
    notifier: N,
    settings: TxSettings,
    state: watch::Sender<TxState>,
    attempt: AtomicU64,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag however the attempt ends, including when its
/// future is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<G, A, N> TxOrchestrator<G, A, N>
where
    G: ChainGateway,
    A: TxAction,
    N: Notifier,
{
    pub fn new(gateway: Arc<G>, cache: Arc<ReadCache>, action: A, notifier: N, settings: TxSettings) -> Self {
        let (state, _) = watch::channel(TxState::Idle);
        Self {
            gateway,
            cache,
            action,
            notifier,
            settings,
            state,
            attempt: AtomicU64::new(0),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> TxState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TxState> {
        self.state.subscribe()
    }

    pub fn is_pending(&self) -> bool {
        *self.state.borrow() == TxState::Pending
    }

    pub fn is_confirming(&self) -> bool {
        *self.state.borrow() == TxState::Confirming
    }

    pub fn is_success(&self) -> bool {
        *self.state.borrow() == TxState::Success
    }

    pub fn error(&self) -> Option<String> {
        match &*self.state.borrow() {
            TxState::Error(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// Return to `Idle` and orphan any attempt still running.
    pub fn reset(&self) {
        self.attempt.fetch_add(1, Ordering::AcqRel);
        self.state.send_replace(TxState::Idle);
    }

    /// Run one invocation to its terminal state.
    ///
    /// * No wallet: nothing happens, `Ok(None)`, state stays `Idle`.
    /// * Plan rejected (bad amount, insufficient balance, read failure): the
    ///   error is returned, state stays `Idle`, no notification.
    /// * Otherwise the plan is submitted; `Ok(Some(hash))` is the final
    ///   write's hash, and a failed write or receipt returns the
    ///   [`TrackerError::Transaction`] that also drove the `Error` state.
    pub async fn execute(&self, params: A::Params) -> Result<Option<TxHash>> {
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            warn!("{}: ignoring execute while a transaction is in flight", self.action.name());
            return Err(TrackerError::Busy);
        };

        let attempt = self.attempt.fetch_add(1, Ordering::AcqRel) + 1;
        self.state.send_replace(TxState::Idle);

        let Some(wallet) = self.gateway.current_wallet() else {
            debug!("{}: no wallet connected, nothing to do", self.action.name());
            return Ok(None);
        };

        let plan = self.action.plan(&*self.gateway, wallet, params).await?;

        match self.submit(attempt, &plan).await {
            Ok(hash) => {
                // Chain state changed; every cached read is now suspect.
                self.cache.invalidate_all();
                if self.finish(attempt, TxState::Success) {
                    info!("{}: {} ({hash})", self.action.name(), plan.summary);
                    self.notifier.success(Notification::new(
                        NotificationKind::Success,
                        self.action.name(),
                        plan.summary.clone(),
                        Some(hash.clone()),
                    ));
                }
                Ok(Some(hash))
            }
            Err((failure, hash)) => {
                let reason = failure.to_string();
                if self.finish(attempt, TxState::Error(reason.clone())) {
                    warn!("{}: {reason}", self.action.name());
                    self.notifier.error(Notification::new(
                        NotificationKind::Error,
                        self.action.name(),
                        reason,
                        hash,
                    ));
                }
                Err(failure.into())
            }
        }
    }

    /// Submit every step in order, stopping at the first failure.
    async fn submit(&self, attempt: u64, plan: &TxPlan) -> std::result::Result<TxHash, (TxFailure, Option<TxHash>)> {
        let last = plan.steps.len().saturating_sub(1);
        let mut final_hash = None;

        for (i, step) in plan.steps.iter().enumerate() {
            if i == 0 {
                self.advance(attempt, TxState::Pending);
            }
            debug!("{}: submitting {}", self.action.name(), step.function);

            let hash = self.gateway.write(step).await.map_err(|e| (as_failure(e), None))?;
            if i == last {
                self.advance(attempt, TxState::Confirming);
            }

            self.confirm(&hash)
                .await
                .map_err(|failure| (failure, Some(hash.clone())))?;
            debug!("{}: {} confirmed ({hash})", self.action.name(), step.function);
            final_hash = Some(hash);
        }

        final_hash.ok_or_else(|| (TxFailure::Provider("empty transaction plan".to_string()), None))
    }

    async fn confirm(&self, hash: &TxHash) -> std::result::Result<(), TxFailure> {
        let wait = async {
            loop {
                let status = match self.gateway.wait_for_receipt(hash).await {
                    Ok(status) => status,
                    Err(e) => return Err(as_failure(e)),
                };
                match status {
                    ReceiptStatus::Success => return Ok(()),
                    ReceiptStatus::Reverted => return Err(TxFailure::Reverted),
                    ReceiptStatus::Pending => tokio::time::sleep(self.settings.poll_interval).await,
                }
            }
        };

        match self.settings.receipt_timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .unwrap_or(Err(TxFailure::Timeout)),
            None => wait.await,
        }
    }

    /// Move forward to a non-terminal state if `attempt` is still current.
    fn advance(&self, attempt: u64, next: TxState) {
        self.state.send_if_modified(|state| {
            if self.attempt.load(Ordering::Acquire) != attempt || state.is_terminal() {
                return false;
            }
            debug!("{}: {:?} -> {:?}", self.action.name(), state, next);
            *state = next.clone();
            true
        });
    }

    /// Enter a terminal state. Returns `true` only on the edge into it, which
    /// is the one place a notification may be fired.
    fn finish(&self, attempt: u64, terminal: TxState) -> bool {
        self.state.send_if_modified(|state| {
            if self.attempt.load(Ordering::Acquire) != attempt || state.is_terminal() {
                debug!("{}: discarding stale result of attempt {attempt}", self.action.name());
                return false;
            }
            *state = terminal.clone();
            true
        })
    }
}

fn as_failure(err: TrackerError) -> TxFailure {
    match err {
        TrackerError::Transaction(failure) => failure,
        other => TxFailure::Provider(other.to_string()),
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Vote;
    use crate::notify::ChannelNotifier;
    use crate::testing::{MockGateway, CONTRACT, WALLET};

    fn orchestrator(
        gateway: MockGateway,
        settings: TxSettings,
    ) -> (
        Arc<MockGateway>,
        TxOrchestrator<MockGateway, Vote, ChannelNotifier>,
        tokio::sync::mpsc::UnboundedReceiver<Notification>,
    ) {
        let gateway = Arc::new(gateway);
        let cache = Arc::new(ReadCache::new(Duration::from_secs(300)));
        let (notifier, rx) = ChannelNotifier::new();
        let orch = TxOrchestrator::new(gateway.clone(), cache, Vote::new(CONTRACT, 1), notifier, settings);
        (gateway, orch, rx)
    }

    fn fast() -> TxSettings {
        TxSettings {
            poll_interval: Duration::from_millis(1),
            receipt_timeout: None,
        }
    }

    #[test]
    fn settings_follow_config() {
        let config = Config {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            contract_address: CONTRACT,
            wallet_address: None,
            api_port: 3001,
            cache_ttl_secs: 300,
            read_retries: 1,
            receipt_poll_ms: 250,
            receipt_timeout_secs: Some(90),
            native_decimals: 18,
            max_batch_items: 1_000,
        };
        let settings = TxSettings::from(&config);
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
        assert_eq!(settings.receipt_timeout, Some(Duration::from_secs(90)));
    }

    #[tokio::test]
    async fn pending_receipts_are_polled_until_included() {
        let gateway = MockGateway::with_wallet(WALLET);
        gateway.queue_receipts(vec![ReceiptStatus::Pending, ReceiptStatus::Pending, ReceiptStatus::Success]);
        let (gateway, orch, mut rx) = orchestrator(gateway, fast());

        orch.execute(0).await.unwrap();
        assert!(orch.is_success());
        assert_eq!(gateway.receipt_polls(), 3);
        assert_eq!(rx.try_recv().unwrap().kind, NotificationKind::Success);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_wait_times_out() {
        let gateway = MockGateway::with_wallet(WALLET);
        gateway.queue_receipts(vec![ReceiptStatus::Pending; 1_000]);
        let settings = TxSettings {
            poll_interval: Duration::from_secs(1),
            receipt_timeout: Some(Duration::from_secs(5)),
        };
        let (_, orch, mut rx) = orchestrator(gateway, settings);

        let err = orch.execute(0).await.unwrap_err();
        assert!(matches!(err, TrackerError::Transaction(TxFailure::Timeout)));
        assert_eq!(orch.error().as_deref(), Some("Timed out waiting for confirmation"));
        let n = rx.try_recv().unwrap();
        assert_eq!(n.kind, NotificationKind::Error);
        assert!(n.tx_hash.is_some());
    }

    #[tokio::test]
    async fn concurrent_execute_is_refused() {
        let gateway = MockGateway::with_wallet(WALLET);
        gateway.queue_receipts(vec![ReceiptStatus::Pending; 5]);
        let (gateway, orch, mut rx) = orchestrator(gateway, TxSettings {
            poll_interval: Duration::from_millis(5),
            receipt_timeout: None,
        });

        let (first, second) = tokio::join!(orch.execute(0), async {
            tokio::task::yield_now().await;
            orch.execute(1).await
        });
        assert!(first.is_ok());
        assert!(matches!(second, Err(TrackerError::Busy)));
        assert_eq!(gateway.writes().len(), 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reset_discards_late_result() {
        let gateway = MockGateway::with_wallet(WALLET);
        gateway.queue_receipts(vec![ReceiptStatus::Pending; 3]);
        let (_, orch, mut rx) = orchestrator(gateway, TxSettings {
            poll_interval: Duration::from_millis(5),
            receipt_timeout: None,
        });

        let (result, _) = tokio::join!(orch.execute(0), async {
            let mut states = orch.subscribe();
            states.wait_for(|s| *s == TxState::Confirming).await.unwrap();
            orch.reset();
        });

        // The write itself went through, but its outcome no longer belongs to anyone.
        assert!(result.is_ok());
        assert_eq!(orch.state(), TxState::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn provider_error_is_reported_once() {
        let gateway = MockGateway::with_wallet(WALLET);
        gateway.fail_next_write(TxFailure::Provider("nonce too low".to_string()));
        let (_, orch, mut rx) = orchestrator(gateway, fast());

        assert!(orch.execute(0).await.is_err());
        assert_eq!(orch.error().as_deref(), Some("Provider error: nonce too low"));
        let n = rx.try_recv().unwrap();
        assert_eq!(n.kind, NotificationKind::Error);
        assert!(n.tx_hash.is_none());
        assert!(rx.try_recv().is_err());
    }
}
