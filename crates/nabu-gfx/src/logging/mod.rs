//! Logging utilities.
//!
//! The pipeline logs through the `log` facade only. This module offers a
//! one-call `env_logger` setup for binaries and tests that want output.

mod init;

pub use init::{LoggingConfig, init_logging};
