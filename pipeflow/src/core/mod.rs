//! Core domain model types for pipeflow.
//!
//! This module contains the fundamental types used throughout the engine:
//! - The record type carried between stages
//! - Lifecycle states and the status snapshot
//! - Engine configuration and the per-run topology

mod config;
mod record;
mod status;

pub use config::{FlowConfig, Topology, DEFAULT_CANCEL_TIMEOUT, DEFAULT_QUEUE_CAPACITY};
pub use record::{record, Record};
pub use status::{FlowState, FlowStatus, ParseFlowStateError};
