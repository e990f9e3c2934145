//! Guardian-threshold key protection and recovery.
//!
//! - [`protection`]: split an account key across guardians and seal each shard
//! - [`orchestrator`]: initiate, approve, inspect and execute recovery requests
//! - [`state_machine`]: the request lifecycle with daily limits and safe concurrent updates
//! - [`verifier`]: signed guardian decisions with replay and freshness checks
//! - [`notify`]: best-effort guardian notifications
//! - [`sweeper`]: background expiry of overdue requests

pub mod config;
pub mod error;
pub mod notify;
pub mod orchestrator;
pub mod policy;
pub mod protection;
pub mod state_machine;
pub mod sweeper;
pub mod verifier;

pub use config::{RecoveryConfig, RejectionPolicy};
pub use error::RecoveryError;
pub use notify::{DeliveryReport, NotificationDispatcher};
pub use orchestrator::{
    Backend, ExecutionResult, InitiateParams, InitiatedRequest, RecoveredSecret,
    RecoveryOrchestrator, RecoveryStatus, RequestSummary,
};
pub use policy::{check_authority, minimum_role};
pub use protection::{open_sealed_shard, ProtectionManager};
pub use state_machine::{ApprovalOutcome, RecoveryStateMachine, MAX_UPDATE_RETRIES};
pub use sweeper::ExpirySweeper;
pub use verifier::{ApprovalFingerprint, RequestDigest, SignatureVerifier, SignedApproval};
