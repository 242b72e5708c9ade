//! Usage accounting for Nimbus.
//!
//! The [`UsageLedger`] counts messages, provider calls, tool executions, and
//! token usage — per session and over the agent's lifetime. Lifetime stats
//! persist to a JSON file; saving is best-effort and never blocks or fails
//! the reply path (callers run it in a detached task and log errors).

pub mod ledger;

pub use ledger::{LifetimeStats, SessionStats, UsageLedger};

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("failed to persist usage stats: {0}")]
    Persist(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
