//! Raw tuple → typed entity transformers.
//!
//! Contract getters come back as positional JSON arrays. Each transformer
//! checks the shape and returns `None` when it does not match; it never
//! panics and never errors, because a malformed or not-yet-indexed payload is
//! an expected condition rather than corruption.
//!
//! Field order is fixed by the contract ABI:
//!
//! | Entity     | Fields                                                                                   |
//! |------------|------------------------------------------------------------------------------------------|
//! | Project    | id, ngo, donationToken, goal, totalDonated, balance, currentMilestone, isActive, isCompleted |
//! | Milestone  | description, amountRequested, approved, fundsReleased, voteWeight                        |
//! | VoteStatus | voteWeight, snapshot, canRelease                                                         |

use serde_json::Value;

use crate::types::{Address, Milestone, Project, VoteStatus};

const PROJECT_FIELDS: usize = 9;
const MILESTONE_FIELDS: usize = 5;
const VOTE_STATUS_FIELDS: usize = 3;

/// Build a [`Project`] from its raw tuple.
///
/// `fallback_id`, when given, replaces field 0. Batch reads pass the index the
/// project was requested under, which is more trustworthy than a payload that
/// may carry a zeroed id slot.
pub fn transform_project(raw: &Value, fallback_id: Option<u64>) -> Option<Project> {
    let f = tuple(raw, PROJECT_FIELDS)?;
    let id = match fallback_id {
        Some(id) => id,
        None => u64::try_from(uint(&f[0])?).ok()?,
    };

    Some(Project {
        id,
        ngo: address(&f[1])?,
        donation_token: address(&f[2])?,
        goal: uint(&f[3])?,
        total_donated: uint(&f[4])?,
        balance: uint(&f[5])?,
        current_milestone: u64::try_from(uint(&f[6])?).ok()?,
        is_active: f[7].as_bool()?,
        is_completed: f[8].as_bool()?,
    })
}

pub fn transform_milestone(raw: &Value) -> Option<Milestone> {
    let f = tuple(raw, MILESTONE_FIELDS)?;
    Some(Milestone {
        description: f[0].as_str()?.to_string(),
        amount_requested: uint(&f[1])?,
        approved: f[2].as_bool()?,
        funds_released: f[3].as_bool()?,
        vote_weight: uint(&f[4])?,
    })
}

pub fn transform_vote_status(raw: &Value) -> Option<VoteStatus> {
    let f = tuple(raw, VOTE_STATUS_FIELDS)?;
    Some(VoteStatus {
        vote_weight: uint(&f[0])?,
        snapshot: uint(&f[1])?,
        can_release: f[2].as_bool()?,
    })
}

fn tuple(raw: &Value, min_len: usize) -> Option<&[Value]> {
    match raw {
        Value::Array(items) if items.len() >= min_len => Some(items.as_slice()),
        _ => None,
    }
}

/// Decode an unsigned integer slot.
///
/// Accepts a JSON number, a decimal string, or a `0x` hex string (the forms
/// RPC providers use for `uint256`). Values wider than 128 bits are rejected.
/// Float-form numbers (`1e6`) are accepted only while integral and exact,
/// i.e. up to 2^53; larger amounts must arrive as strings.
pub(crate) fn uint(value: &Value) -> Option<u128> {
    match value {
        Value::Number(n) => n.as_u64().map(u128::from).or_else(|| {
            let f = n.as_f64()?;
            (f >= 0.0 && f.fract() == 0.0 && f <= MAX_EXACT_FLOAT).then_some(f as u128)
        }),
        Value::String(s) => {
            if let Some(hex) = s.strip_prefix("0x") {
                if hex.is_empty() {
                    return None;
                }
                u128::from_str_radix(hex, 16).ok()
            } else {
                s.parse().ok()
            }
        }
        _ => None,
    }
}

const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

pub(crate) fn address(value: &Value) -> Option<Address> {
    value.as_str().and_then(Address::parse)
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NGO_A: &str = "0x1111111111111111111111111111111111111111";
    const ZERO_ADDR: &str = "0x0000000000000000000000000000000000000000";

    fn project_tuple() -> Value {
        json!([
            "1",
            NGO_A,
            ZERO_ADDR,
            "1000000000000000000",
            "500000000000000000",
            "500000000000000000",
            "0",
            true,
            false
        ])
    }

    #[test]
    fn project_fields_are_positional() {
        let project = transform_project(&project_tuple(), None).unwrap();
        assert_eq!(
            project,
            Project {
                id: 1,
                ngo: Address::parse(NGO_A).unwrap(),
                donation_token: Address::ZERO,
                goal: 1_000_000_000_000_000_000,
                total_donated: 500_000_000_000_000_000,
                balance: 500_000_000_000_000_000,
                current_milestone: 0,
                is_active: true,
                is_completed: false,
            }
        );
        assert!(project.accepts_native());
    }

    #[test]
    fn fallback_id_overrides_payload() {
        let mut raw = project_tuple();
        raw[0] = json!("0");
        let project = transform_project(&raw, Some(7)).unwrap();
        assert_eq!(project.id, 7);
    }

    #[test]
    fn short_tuples_are_absent() {
        for len in 0..PROJECT_FIELDS {
            let raw = Value::Array(project_tuple().as_array().unwrap()[..len].to_vec());
            assert!(transform_project(&raw, None).is_none(), "len {len}");
        }
        assert!(transform_milestone(&json!(["desc", "1", true, false])).is_none());
        assert!(transform_vote_status(&json!(["1", "2"])).is_none());
    }

    #[test]
    fn non_sequences_are_absent() {
        for raw in [json!(null), json!("oops"), json!(42), json!({ "id": 1 })] {
            assert!(transform_project(&raw, Some(1)).is_none());
            assert!(transform_milestone(&raw).is_none());
            assert!(transform_vote_status(&raw).is_none());
        }
    }

    #[test]
    fn mistyped_slots_are_absent() {
        let mut raw = project_tuple();
        raw[7] = json!("yes");
        assert!(transform_project(&raw, None).is_none());

        let mut raw = project_tuple();
        raw[1] = json!("not-an-address");
        assert!(transform_project(&raw, None).is_none());
    }

    #[test]
    fn extra_trailing_fields_are_ignored() {
        let mut raw = project_tuple();
        raw.as_array_mut().unwrap().push(json!("extra"));
        assert!(transform_project(&raw, None).is_some());
    }

    #[test]
    fn milestone_and_vote_status() {
        let milestone =
            transform_milestone(&json!(["Build well", "0x0de0b6b3a7640000", true, false, 12]))
                .unwrap();
        assert_eq!(milestone.description, "Build well");
        assert_eq!(milestone.amount_requested, 1_000_000_000_000_000_000);
        assert!(milestone.approved);
        assert!(!milestone.funds_released);
        assert_eq!(milestone.vote_weight, 12);

        let status = transform_vote_status(&json!(["3", "5", false])).unwrap();
        assert_eq!(status.vote_weight, 3);
        assert_eq!(status.snapshot, 5);
        assert!(!status.can_release);
    }

    #[test]
    fn uint_forms() {
        assert_eq!(uint(&json!(5)), Some(5));
        assert_eq!(uint(&json!("5")), Some(5));
        assert_eq!(uint(&json!("0xff")), Some(255));
        assert_eq!(uint(&json!("0x")), None);
        assert_eq!(uint(&json!(-1)), None);
        assert_eq!(uint(&json!(true)), None);
        assert_eq!(uint(&json!(1e6)), Some(1_000_000));
        assert_eq!(uint(&json!(2.5)), None);
        assert_eq!(uint(&json!(1e18)), None);
        assert_eq!(uint(&json!(1e30)), None);
    }
}
