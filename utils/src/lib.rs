//! Shared utilities for keyward.

pub mod logging;

pub use logging::{init_logging, init_test_logging, LogFormat, LoggingError};
