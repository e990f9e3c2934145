//! Abstract storage traits for keyward.
//!
//! Every storage backend (a relational database in production, in-memory for
//! testing) implements these traits. The rest of the workspace depends only on
//! the traits, never on a concrete backend.

pub mod error;
pub mod guardian;
pub mod protection;
pub mod recovery;
pub mod shard;

pub use error::StoreError;
pub use guardian::{GuardianRecord, GuardianStore};
pub use protection::{ProtectionMetadata, ProtectionStore};
pub use recovery::{ApprovalRecord, RecoveryRequest, RecoveryStore};
pub use shard::{SealedShardRecord, ShardStore};
