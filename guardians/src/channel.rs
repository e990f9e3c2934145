//! Outbound interface to guardians.
//!
//! The transport (an encrypted messaging channel) is external; this crate only
//! defines what is sent. Notices carry identifiers and a human summary, never
//! shard content or key material.

use async_trait::async_trait;
use keyward_types::{ProtectionId, RequestId, Urgency};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// A new request awaits the guardian's decision.
    RecoveryRequested,
    /// The request gathered enough approvals.
    QuorumReached,
    /// The request was terminated by a rejection.
    RequestRejected,
    /// The guardian received a shard of a new protection generation.
    ProtectionSetup,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianNotice {
    pub kind: NoticeKind,
    pub request_id: Option<RequestId>,
    pub protection_id: Option<ProtectionId>,
    pub urgency: Urgency,
    pub summary: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// The messaging channel guardians are reached through.
#[async_trait]
pub trait GuardianChannel: Send + Sync {
    async fn notify(&self, contact: &str, notice: &GuardianNotice) -> DeliveryOutcome;
}
