pub mod coordinator;
pub mod queue;
pub mod worker;

pub use coordinator::{Phase, PhaseFlags, PipelineContext, WorkerCounts, WorkerSlot, WorkerState};
pub use queue::WorkQueue;
pub use worker::run_worker;
