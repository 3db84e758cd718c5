//! Pipeline execution.
//!
//! - [`Orchestrator`] wires one run: queues, worker pools and the
//!   stage-by-stage completion protocol.
//! - [`Flow`] is the façade users hold: registry, lifecycle and run control.

mod flow;
mod orchestrator;
mod worker_group;

pub use flow::Flow;
pub use orchestrator::Orchestrator;
