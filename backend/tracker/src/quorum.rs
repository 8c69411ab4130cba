//! Client-side quorum estimate and voter eligibility.
//!
//! Both are advisory. The contract's `canRelease` flag is the authority on
//! fund release, and no transaction is ever gated on these values.

use serde::Serialize;

use crate::format::format_percentage;
use crate::types::{Address, Milestone, VoteStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quorum {
    /// Share of the snapshot that has voted, one decimal place.
    pub percentage: String,
    /// Strictly more than half of the snapshot (halved with truncation) has voted.
    pub met: bool,
}

pub fn quorum(status: Option<&VoteStatus>) -> Quorum {
    match status {
        Some(s) if s.snapshot > 0 => Quorum {
            percentage: format_percentage(s.vote_weight as f64, s.snapshot as f64),
            met: s.vote_weight > s.snapshot / 2,
        },
        _ => Quorum {
            percentage: "0.0".to_string(),
            met: false,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteEligibility {
    Eligible,
    NoWallet,
    /// Only donors to the project carry voting weight.
    NoContribution,
    AlreadyVoted,
    /// The milestone is already approved.
    MilestoneClosed,
}

impl VoteEligibility {
    pub fn can_vote(self) -> bool {
        self == Self::Eligible
    }
}

/// Decide whether `wallet` may vote on `milestone`. Unknown inputs (reads
/// still loading) are treated as not eligible.
pub fn vote_eligibility(
    wallet: Option<&Address>,
    contribution: Option<u128>,
    has_voted: Option<bool>,
    milestone: Option<&Milestone>,
) -> VoteEligibility {
    if wallet.is_none() {
        return VoteEligibility::NoWallet;
    }
    if contribution.unwrap_or(0) == 0 {
        return VoteEligibility::NoContribution;
    }
    if has_voted.unwrap_or(true) {
        return VoteEligibility::AlreadyVoted;
    }
    match milestone {
        Some(m) if !m.approved => VoteEligibility::Eligible,
        _ => VoteEligibility::MilestoneClosed,
    }
}
