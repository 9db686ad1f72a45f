//! Process lifecycle: startup, the consumer thread, signals and shutdown.

mod consumer;
mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod types;


pub use orchestrator::CctvOrchestrator;
pub use types::{ComponentState, ShutdownReason};
