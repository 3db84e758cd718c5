//! # Pipeflow
//!
//! A concurrent, multi-stage record pipeline engine.
//!
//! Pipeflow wires a producer, a chain of transform stages and a consumer
//! together with bounded queues and runs every transform stage as a pool of
//! parallel workers:
//!
//! - **Registry**: components are registered under names and picked per run
//! - **Backpressure**: a full queue pauses everything upstream of it
//! - **Ordered shutdown**: a stage sees end-of-input only once its upstream
//!   is fully drained
//! - **Lifecycle**: a guarded state machine with start, stop and restart
//! - **Cancellation**: cooperative and bounded by a timeout
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipeflow::prelude::*;
//! use std::sync::Arc;
//!
//! let flow = Arc::new(Flow::new());
//! flow.add_source("in", Arc::new(MySource::new()));
//! flow.add_stage("enrich", Arc::new(MyStage::new()));
//! flow.add_sink("out", Arc::new(MySink::new()));
//!
//! flow.serve(4, "in", "out", &["enrich"]).await?;
//! println!("{}", flow.get_status().status);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod components;
pub mod core;
pub mod errors;
pub mod pipeline;
pub mod queue;
pub mod registry;
pub mod status;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{CancellationToken, DrainNotifier, DrainSignal};
    pub use crate::components::{FnStage, ReadProgress, Sink, Source, Stage};
    pub use crate::core::{record, FlowConfig, FlowState, FlowStatus, Record, Topology};
    pub use crate::errors::{ComponentKind, ConfigurationError, FlowError, InvalidStateError};
    pub use crate::pipeline::Flow;
    pub use crate::queue::{QueueReceiver, QueueSender};
    pub use crate::registry::Registry;
    pub use crate::utils::{generate_run_id, Timestamp};
}
