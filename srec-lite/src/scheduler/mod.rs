//! Scheduling of poll cycles.

mod orchestrator;

pub use orchestrator::{CycleReport, OrchestratorState, PollConfig, PollOrchestrator};
