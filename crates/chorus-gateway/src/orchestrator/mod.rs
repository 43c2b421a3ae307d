//! Supervises one gateway session per registered credential.
//!
//! Joins run strictly one after another with a randomized pause between
//! them; settings broadcasts and leave-all fan out to every live session
//! at once. Progress and per-credential outcomes are reported on an event
//! channel returned by [`SessionOrchestrator::new`].

mod manager;
mod registry;
mod types;

#[cfg(test)]
mod tests;

pub use manager::SessionOrchestrator;
pub use types::{BroadcastOutcome, JoinPacing, JoinReport, OrchestratorConfig, OrchestratorEvent};
