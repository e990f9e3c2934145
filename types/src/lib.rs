//! Fundamental types for keyward.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! account/guardian/request identifiers, the account role hierarchy, request
//! classification enums, key and signature newtypes, and timestamps.

pub mod error;
pub mod ids;
pub mod keys;
pub mod request;
pub mod role;
pub mod time;

pub use error::TypeError;
pub use ids::{AccountId, GuardianId, ProtectionId, RequestId};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use request::{Decision, RecoveryMethod, RequestStatus, RequestType, Urgency};
pub use role::AccountRole;
pub use time::{Clock, SystemClock, Timestamp, SECS_PER_DAY};
