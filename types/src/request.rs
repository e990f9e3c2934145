//! Classification and lifecycle enums for recovery requests.

use crate::TypeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a recovery request asks the guardians to authorize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    /// Reconstruct the account's private signing key from guardian shards.
    KeyRecovery,
    /// Release emergency funds; executed by an external banking component.
    EmergencyLiquidity,
    /// Restore account access without reconstructing key material.
    AccountRestoration,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyRecovery => "key_recovery",
            Self::EmergencyLiquidity => "emergency_liquidity",
            Self::AccountRestoration => "account_restoration",
        }
    }

    /// Whether a successful approval releases shards for reconstruction.
    pub fn requires_shards(&self) -> bool {
        matches!(self, Self::KeyRecovery)
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a recovery request.
///
/// ```text
/// pending ──► approved ──► completed
///    │            │
///    ├──► rejected└──► expired
///    └──► expired
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Expired,
}

impl RequestStatus {
    /// Terminal statuses never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Completed | Self::Expired)
    }

    /// Whether the request still counts as active in status listings.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }

    /// The allowed transition table.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Pending, Self::Expired)
                | (Self::Approved, Self::Completed)
                | (Self::Approved, Self::Expired)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How urgently guardians should respond.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Normal,
    High,
    Critical,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Method the account owner uses to regain control.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryMethod {
    /// Quorum of federation guardians approves the request.
    GuardianConsensus,
    /// Password-based recovery, handled outside the guardian core.
    Password,
    /// Raw secret key import, handled outside the guardian core.
    Nsec,
}

impl RecoveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GuardianConsensus => "guardian_consensus",
            Self::Password => "password",
            Self::Nsec => "nsec",
        }
    }

    pub fn uses_guardians(&self) -> bool {
        matches!(self, Self::GuardianConsensus)
    }
}

impl FromStr for RecoveryMethod {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guardian_consensus" => Ok(Self::GuardianConsensus),
            "password" => Ok(Self::Password),
            "nsec" => Ok(Self::Nsec),
            other => Err(TypeError::UnknownVariant {
                kind: "recovery method",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for RecoveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A guardian's decision on a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    /// Byte tag bound into the signed fingerprint.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Approve => 0x01,
            Self::Reject => 0x02,
        }
    }
}
