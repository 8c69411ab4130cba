//! Typed, consistent views over the contract's indexed collections.
//!
//! Projects and milestones are stored on-chain as a counter plus an indexed
//! getter. Collections are loaded in two round trips no matter their size:
//!
//! 1. read the counter;
//! 2. read every index in **one** batch request.
//!
//! Projects are addressed `1..=counter`, milestones `0..count`.
//!
//! Error surface:
//!
//! * counter read or batch request fails → `is_error`, empty collection;
//! * a counter above the batch limit → `is_error`, nothing is batched;
//! * an individual batch slot fails or does not decode → that item is
//!   dropped and the collection is still reported as loaded.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::cache::ReadCache;
use crate::errors::{Result, TrackerError};
use crate::gateway::{address_arg, uint_arg, BatchEntry, ChainGateway, ReadCall};
use crate::query::QueryState;
use crate::quorum::{quorum, Quorum};
use crate::transform::{self, transform_milestone, transform_project, transform_vote_status};
use crate::types::{Address, Milestone, Project, VoteStatus};

/// Vote status together with the client-side quorum estimate.
///
/// `can_release` (inside `status`) is the contract's decision; `quorum` is
/// advisory and never replaces it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReport {
    pub status: VoteStatus,
    pub quorum: Quorum,
}

/// Largest collection loaded in one batch unless configured otherwise.
pub const DEFAULT_MAX_BATCH_ITEMS: u64 = 1_000;

pub struct ContractDataAggregator<G> {
    gateway: Arc<G>,
    cache: Arc<ReadCache>,
    contract: Address,
    max_batch_items: u64,
}

impl<G: ChainGateway> ContractDataAggregator<G> {
    pub fn new(gateway: Arc<G>, cache: Arc<ReadCache>, contract: Address) -> Self {
        Self {
            gateway,
            cache,
            contract,
            max_batch_items: DEFAULT_MAX_BATCH_ITEMS,
        }
    }

    pub fn with_max_batch_items(mut self, max_batch_items: u64) -> Self {
        self.max_batch_items = max_batch_items;
        self
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    pub fn cache(&self) -> &Arc<ReadCache> {
        &self.cache
    }

    // ─────────────────────────────────────────────────────
    // Collections
    // ─────────────────────────────────────────────────────

    /// Every project, in id order.
    pub async fn all_projects(&self) -> QueryState<Vec<Project>> {
        let counter = match self.read_counter(self.call("projectCounter", vec![])).await {
            Ok(counter) => counter,
            Err(e) => return QueryState::failed(e),
        };
        if let Err(e) = self.check_batch_size("projectCounter", counter) {
            return QueryState::failed(e);
        }

        let ids: Vec<u64> = (1..=counter).collect();
        let calls: Vec<ReadCall> = ids
            .iter()
            .map(|id| self.call("getProject", vec![uint_arg(*id)]))
            .collect();

        match self.batch(&calls).await {
            Ok(entries) => QueryState::loaded(collect_projects(&ids, &entries)),
            Err(e) => QueryState::failed(e),
        }
    }

    /// Every milestone of `project_id`, in index order.
    pub async fn project_milestones(&self, project_id: u64) -> QueryState<Vec<Milestone>> {
        if project_id == 0 {
            return QueryState::default();
        }
        let count_call = self.call("getProjectMilestoneCount", vec![uint_arg(project_id)]);
        let count = match self.read_counter(count_call).await {
            Ok(count) => count,
            Err(e) => return QueryState::failed(e),
        };
        if let Err(e) = self.check_batch_size("getProjectMilestoneCount", count) {
            return QueryState::failed(e);
        }

        let calls: Vec<ReadCall> = (0..count)
            .map(|index| self.call("getMilestone", vec![uint_arg(project_id), uint_arg(index)]))
            .collect();

        match self.batch(&calls).await {
            Ok(entries) => QueryState::loaded(collect_milestones(project_id, &entries)),
            Err(e) => QueryState::failed(e),
        }
    }

    // ─────────────────────────────────────────────────────
    // Single entities
    // ─────────────────────────────────────────────────────

    pub async fn project(&self, id: u64) -> QueryState<Option<Project>> {
        if id == 0 {
            return QueryState::default();
        }
        self.read_entity(self.call("getProject", vec![uint_arg(id)]), |raw| {
            transform_project(raw, None)
        })
        .await
    }

    pub async fn current_milestone(&self, project_id: u64) -> QueryState<Option<Milestone>> {
        if project_id == 0 {
            return QueryState::default();
        }
        self.read_entity(
            self.call("getCurrentMilestone", vec![uint_arg(project_id)]),
            transform_milestone,
        )
        .await
    }

    /// Vote status of one milestone plus the quorum estimate. Milestone 0 is valid.
    pub async fn vote_status(&self, project_id: u64, milestone_id: u64) -> QueryState<Option<VoteReport>> {
        if project_id == 0 {
            return QueryState::default();
        }
        let call = self.call(
            "getMilestoneVoteStatus",
            vec![uint_arg(project_id), uint_arg(milestone_id)],
        );
        self.read_entity(call, transform_vote_status)
            .await
            .map(|status| {
                status.map(|status| VoteReport {
                    quorum: quorum(Some(&status)),
                    status,
                })
            })
    }

    pub async fn has_voted(&self, project_id: u64, milestone_id: u64, voter: &Address) -> QueryState<Option<bool>> {
        let call = self.call(
            "hasVoted",
            vec![uint_arg(project_id), uint_arg(milestone_id), address_arg(voter)],
        );
        self.read_entity(call, Value::as_bool).await
    }

    /// Total contributed by `donor` to `project_id`; this is the donor's voting weight.
    pub async fn donor_contribution(&self, project_id: u64, donor: &Address) -> QueryState<Option<u128>> {
        let call = self.call(
            "donorContributions",
            vec![uint_arg(project_id), address_arg(donor)],
        );
        self.read_entity(call, transform::uint).await
    }

    pub async fn is_verified_ngo(&self, ngo: &Address) -> QueryState<Option<bool>> {
        self.read_entity(self.call("verifiedNGOs", vec![address_arg(ngo)]), Value::as_bool)
            .await
    }

    // ─────────────────────────────────────────────────────
    // Read plumbing
    // ─────────────────────────────────────────────────────

    fn call(&self, function: &'static str, args: Vec<Value>) -> ReadCall {
        ReadCall::new(self.contract, function, args)
    }

    async fn read_entity<T>(&self, call: ReadCall, decode: impl Fn(&Value) -> Option<T>) -> QueryState<Option<T>> {
        match self.read(&call).await {
            Ok(raw) => QueryState::loaded(raw.as_ref().and_then(|raw| {
                let decoded = decode(raw);
                if decoded.is_none() {
                    debug!("{} returned an unexpected shape: {raw}", call.function);
                }
                decoded
            })),
            Err(e) => QueryState::failed(e),
        }
    }

    /// Read a collection counter. Absent or non-numeric counters mean "empty".
    async fn read_counter(&self, call: ReadCall) -> Result<u64> {
        let raw = self.read(&call).await?;
        let counter = raw
            .as_ref()
            .and_then(transform::uint)
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0);
        debug!("{} = {counter}", call.function);
        Ok(counter)
    }

    fn check_batch_size(&self, function: &str, count: u64) -> Result<()> {
        if count > self.max_batch_items {
            return Err(TrackerError::UnexpectedShape(format!(
                "{function} reported {count} items, more than the batch limit of {}",
                self.max_batch_items
            )));
        }
        Ok(())
    }

    async fn read(&self, call: &ReadCall) -> Result<Option<Value>> {
        if let Some(hit) = self.cache.get_one(call) {
            return Ok(hit);
        }
        let value = self.gateway.read_one(call).await?;
        self.cache.put_one(call, value.clone());
        Ok(value)
    }

    async fn batch(&self, calls: &[ReadCall]) -> Result<Vec<BatchEntry>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(hit) = self.cache.get_batch(calls) {
            return Ok(hit);
        }
        let entries = self.gateway.read_batch(calls).await?;
        self.cache.put_batch(calls, entries.clone());
        Ok(entries)
    }
}

fn collect_projects(ids: &[u64], entries: &[BatchEntry]) -> Vec<Project> {
    ids.iter()
        .zip(entries)
        .filter_map(|(id, entry)| {
            let Some(raw) = entry.payload() else {
                debug!("getProject({id}) unavailable, skipping");
                return None;
            };
            let project = transform_project(raw, Some(*id));
            if project.is_none() {
                debug!("getProject({id}) returned an unexpected shape: {raw}");
            }
            project
        })
        .filter(|p| p.id > 0)
        .collect()
}

fn collect_milestones(project_id: u64, entries: &[BatchEntry]) -> Vec<Milestone> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let Some(raw) = entry.payload() else {
                debug!("getMilestone({project_id}, {index}) unavailable, skipping");
                return None;
            };
            let milestone = transform_milestone(raw);
            if milestone.is_none() {
                debug!("getMilestone({project_id}, {index}) returned an unexpected shape: {raw}");
            }
            milestone
        })
        .collect()
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
