//! Nullable infrastructure for deterministic testing.
//!
//! Every external collaborator of the recovery core (clock, storage, the
//! guardian messaging channel) sits behind a trait. This crate provides
//! test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod channel;
pub mod clock;
pub mod store;

pub use channel::NullChannel;
pub use clock::NullClock;
pub use store::NullStore;
