//! spoolq - durable, crash-resilient work spool.
//!
//! This library exposes the spool storage and executor for the binary,
//! benchmarks and tests.

pub mod executor;
pub mod spool;
pub mod telemetry;
