//! Tracing initialization
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` (overridable via
//! `RUST_LOG`) and either human-readable or JSON formatted output.

mod init_basic;

pub use init_basic::{init_telemetry, shutdown_telemetry, LogFormat};
