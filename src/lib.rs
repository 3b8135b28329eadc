// src/lib.rs
// ────────────────────────────────────────────────────────────────────────────
// Public library entry point.  Re-export everything for both `main.rs` and
// integration tests.

pub mod comms;
pub mod config;
pub mod device;
pub mod exporter;
pub mod logging;
mod macros;
