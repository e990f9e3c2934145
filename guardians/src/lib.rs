//! Guardian federation layer.
//!
//! Answers "who may approve recovery of account X, and how many of them must":
//! - [`registry`]: active guardians per account, ordered by authority
//! - [`quorum`]: injectable quorum strategies (fractional, fixed, role-weighted)
//! - [`channel`]: the outbound messaging interface guardians are reached through

pub mod channel;
pub mod error;
pub mod quorum;
pub mod registry;

pub use channel::{DeliveryOutcome, GuardianChannel, GuardianNotice, NoticeKind};
pub use error::GuardianError;
pub use quorum::{FixedQuorum, FractionalQuorum, QuorumPolicy, WeightedRoleQuorum};
pub use registry::{GuardianRegistry, Quorum};
