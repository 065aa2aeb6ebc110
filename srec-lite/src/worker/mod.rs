//! Capture workers.
//!
//! The registry tracks one worker per source; the manager decides when a new
//! worker is started and records when it ends.

mod manager;
mod registry;

pub use manager::{DispatchOutcome, WorkerEvent, WorkerManager};
pub use registry::{WorkerHandle, WorkerInfo, WorkerRegistry};
