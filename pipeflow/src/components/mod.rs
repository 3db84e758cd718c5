//! Capability traits implemented by pipeline collaborators.
//!
//! The engine only ever talks to these traits. Concrete adapters for files,
//! databases or network endpoints live outside the crate.

use crate::cancellation::DrainSignal;
use crate::errors::FlowError;
use crate::queue::{QueueReceiver, QueueSender};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Read-side progress reported by a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadProgress {
    /// Records produced so far.
    pub count_read: u64,
    /// Total records expected, 0 if unknown.
    pub count_max: u64,
}

impl ReadProgress {
    /// Creates a progress value.
    #[must_use]
    pub fn new(count_read: u64, count_max: u64) -> Self {
        Self {
            count_read,
            count_max,
        }
    }
}

/// Produces a finite, non-restartable sequence of records.
#[async_trait]
pub trait Source: Send + Sync + Debug {
    /// Pushes records into `output` until exhausted or cancelled.
    ///
    /// Runs on the engine's production task. The engine closes `output`
    /// after this returns; the source must not hold on to clones of it.
    async fn read(&self, output: QueueSender) -> Result<(), FlowError>;

    /// Asks the source to stop producing.
    ///
    /// Must be idempotent and must not block, including when the source is
    /// not currently producing.
    fn cancel(&self);

    /// Reports how many records were read and how many are expected.
    fn read_status(&self) -> ReadProgress;
}

/// Consumes records at the end of the pipeline.
#[async_trait]
pub trait Sink: Send + Sync + Debug {
    /// Called when a run starts, before any of its tasks are spawned.
    ///
    /// A sink that reuses its drain signal across runs clears it here, so
    /// a Stop of the new run never sees the previous run's drain.
    fn prepare(&self) {}

    /// Consumes records from `input` until it is closed and empty.
    async fn write(&self, input: QueueReceiver) -> Result<(), FlowError>;

    /// Returns the one-shot signal raised once everything up to the closure
    /// of the input has been consumed.
    fn drained(&self) -> DrainSignal;

    /// Reports how many records were written.
    fn write_status(&self) -> u64;
}

/// A transform step, run as a pool of parallel workers.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Moves records from `input` to `output`, transforming them on the way.
    ///
    /// `worker` is in `0..worker_count` and distinct per concurrent call.
    /// Must return only after `input` is closed and empty; returning is the
    /// worker's join signal.
    async fn process(
        &self,
        input: QueueReceiver,
        output: QueueSender,
        worker: usize,
    ) -> Result<(), FlowError>;
}

/// A stage built from a per-record function.
///
/// The function may mutate the record and returns whether it should be
/// forwarded downstream.
pub struct FnStage<F>
where
    F: Fn(&mut crate::core::Record, usize) -> bool + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&mut crate::core::Record, usize) -> bool + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&mut crate::core::Record, usize) -> bool + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&mut crate::core::Record, usize) -> bool + Send + Sync,
{
    async fn process(
        &self,
        input: QueueReceiver,
        output: QueueSender,
        worker: usize,
    ) -> Result<(), FlowError> {
        while let Some(mut record) = input.pop().await {
            if (self.func)(&mut record, worker) {
                output.push(record).await?;
            }
        }
        Ok(())
    }
}
