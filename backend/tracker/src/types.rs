//! Typed snapshots of on-chain charity tracker state.
//!
//! Every entity here is an immutable copy of what the contract returned at
//! read time. Nothing is mutated locally; a change is observed by re-reading
//! after a transaction confirms.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::TrackerError;

/// A 20-byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address. As a project's donation token it means "native currency".
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parse a `0x`-prefixed, 40 hex digit address. Case is ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        let digits = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))?;
        if digits.len() != 40 {
            return None;
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes).ok()?;
        Some(Self(bytes))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl FromStr for Address {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s.trim()).ok_or_else(|| TrackerError::Config(format!("Invalid address: {s}")))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid address {raw}")))
    }
}

/// Handle of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fundraising campaign owned by one NGO.
///
/// `balance <= total_donated <= goal` is expected but never enforced here;
/// the contract is the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: u64,
    pub ngo: Address,
    /// [`Address::ZERO`] for native-currency projects.
    pub donation_token: Address,
    #[serde(with = "amount")]
    pub goal: u128,
    #[serde(with = "amount")]
    pub total_donated: u128,
    #[serde(with = "amount")]
    pub balance: u128,
    pub current_milestone: u64,
    pub is_active: bool,
    pub is_completed: bool,
}

impl Project {
    pub fn accepts_native(&self) -> bool {
        self.donation_token.is_zero()
    }
}

/// A funding tranche of a project, addressed by its zero-based index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub description: String,
    #[serde(with = "amount")]
    pub amount_requested: u128,
    pub approved: bool,
    pub funds_released: bool,
    #[serde(with = "amount")]
    pub vote_weight: u128,
}

/// Voting snapshot of one milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatus {
    #[serde(with = "amount")]
    pub vote_weight: u128,
    /// Total eligible contribution weight, fixed when voting opened.
    #[serde(with = "amount")]
    pub snapshot: u128,
    /// The contract's own release decision.
    pub can_release: bool,
}

/// Token amounts are carried as decimal strings on the wire so that
/// JavaScript consumers do not lose precision.
pub(crate) mod amount {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parse_and_display() {
        let addr = Address::parse("0x1234567890ABCDEF1234567890abcdef12345678").unwrap();
        assert_eq!(addr.to_string(), "0x1234567890abcdef1234567890abcdef12345678");
        assert!(!addr.is_zero());
    }

    #[test]
    fn address_rejects_bad_input() {
        assert!(Address::parse("1234567890abcdef1234567890abcdef12345678").is_none());
        assert!(Address::parse("0x1234").is_none());
        assert!(Address::parse("0xzz34567890abcdef1234567890abcdef12345678").is_none());
    }

    #[test]
    fn zero_address_is_native() {
        let zero = Address::parse("0x0000000000000000000000000000000000000000").unwrap();
        assert_eq!(zero, Address::ZERO);
        assert!(zero.is_zero());
    }

    #[test]
    fn amounts_serialize_as_strings() {
        let status = VoteStatus {
            vote_weight: 100_000_000_000_000_000,
            snapshot: 200_000_000_000_000_000,
            can_release: false,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["voteWeight"], "100000000000000000");
        assert_eq!(json["snapshot"], "200000000000000000");
        assert_eq!(json["canRelease"], false);
    }
}
