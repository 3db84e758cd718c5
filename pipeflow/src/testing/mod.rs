//! Reusable collaborators for tests and benchmarks.
//!
//! - [`SequenceSource`] emits numbered records and honours cancellation.
//! - [`CopyFieldStage`] and [`FailingStage`] transform or reject records.
//! - [`CollectingSink`] keeps everything it receives and raises its drain
//!   signal when its input is exhausted.

mod mocks;

pub use mocks::{CollectingSink, CopyFieldStage, FailingStage, SequenceSource};

use tracing_subscriber::EnvFilter;

/// Installs a test-friendly `tracing` subscriber once per process.
///
/// Honours `RUST_LOG`, defaulting to `pipeflow=warn`. Later calls are no-ops.
pub fn init_test_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pipeflow=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}
