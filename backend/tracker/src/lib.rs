//! Charity tracker client core.
//!
//! Typed reads over the charity tracker contract, the advisory milestone
//! quorum estimate, and the lifecycle of donation and vote transactions.
//!
//! | Layer          | Module                         |
//! |----------------|--------------------------------|
//! | Provider seam  | [`gateway`], [`rpc`]           |
//! | Decoding       | [`transform`]                  |
//! | Reads          | [`aggregator`], [`cache`], [`query`] |
//! | Governance     | [`quorum`]                     |
//! | Writes         | [`orchestrator`], [`actions`], [`notify`] |

pub mod actions;
pub mod aggregator;
pub mod api;
pub mod cache;
pub mod config;
pub mod errors;
pub mod format;
pub mod gateway;
pub mod notify;
pub mod orchestrator;
pub mod query;
pub mod quorum;
pub mod rpc;
pub mod transform;
pub mod types;

#[cfg(test)]
mod testing;
