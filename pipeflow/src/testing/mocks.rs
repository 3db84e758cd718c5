//! Mock sources, stages and sinks.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::cancellation::{CancellationToken, DrainNotifier, DrainSignal};
use crate::components::{ReadProgress, Sink, Source, Stage};
use crate::core::{record, Record};
use crate::errors::FlowError;
use crate::queue::{QueueReceiver, QueueSender};

/// A source emitting `{field: i}` for `i` in `0..total`.
///
/// Cancellation is checked before every record and interrupts the pacing
/// delay. A cancel that arrives while the source is not producing is
/// ignored, and every call to `read` starts uncancelled.
#[derive(Debug)]
pub struct SequenceSource {
    total: u64,
    field: String,
    delay: Duration,
    token: CancellationToken,
    producing: AtomicBool,
    count_read: AtomicU64,
}

impl SequenceSource {
    /// Creates a source of `total` records keyed `number1`.
    #[must_use]
    pub fn new(total: u64) -> Self {
        Self {
            total,
            field: "number1".to_string(),
            delay: Duration::ZERO,
            token: CancellationToken::new(),
            producing: AtomicBool::new(false),
            count_read: AtomicU64::new(0),
        }
    }

    /// Waits `delay` before each record.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Emits the sequence under `field` instead of `number1`.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    /// Returns true if the current or last `read` was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns true while `read` is running.
    pub fn is_producing(&self) -> bool {
        self.producing.load(Ordering::SeqCst)
    }

    /// Clears cancellation and progress.
    pub fn reset(&self) {
        self.token.reset();
        self.count_read.store(0, Ordering::SeqCst);
    }

    async fn produce(&self, output: &QueueSender) -> Result<(), FlowError> {
        for i in 0..self.total {
            if self.token.is_cancelled() {
                debug!(emitted = i, "Sequence cancelled");
                break;
            }
            if !self.delay.is_zero() {
                tokio::select! {
                    () = tokio::time::sleep(self.delay) => {}
                    () = self.token.cancelled() => {
                        debug!(emitted = i, "Sequence cancelled while pacing");
                        break;
                    }
                }
            }
            output.push(record([(self.field.as_str(), i.to_string())])).await?;
            self.count_read.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[async_trait]
impl Source for SequenceSource {
    async fn read(&self, output: QueueSender) -> Result<(), FlowError> {
        self.reset();
        self.producing.store(true, Ordering::SeqCst);
        let result = self.produce(&output).await;
        self.producing.store(false, Ordering::SeqCst);
        result
    }

    fn cancel(&self) {
        if self.is_producing() {
            self.token.cancel("source cancelled");
        } else {
            debug!("Cancel ignored, sequence is not producing");
        }
    }

    fn read_status(&self) -> ReadProgress {
        ReadProgress::new(self.count_read.load(Ordering::SeqCst), self.total)
    }
}

/// A stage copying the value of one field into another.
///
/// Records without the source field get an empty value.
#[derive(Debug)]
pub struct CopyFieldStage {
    from: String,
    to: String,
    delay: Duration,
    processed: AtomicU64,
    workers: Mutex<BTreeSet<usize>>,
}

impl CopyFieldStage {
    /// Creates a stage copying `from` into `to`.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            delay: Duration::ZERO,
            processed: AtomicU64::new(0),
            workers: Mutex::new(BTreeSet::new()),
        }
    }

    /// Waits `delay` per record.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Records processed across all workers.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    /// Worker indices that have started, ascending.
    pub fn workers_started(&self) -> Vec<usize> {
        self.workers.lock().iter().copied().collect()
    }
}

#[async_trait]
impl Stage for CopyFieldStage {
    async fn process(
        &self,
        input: QueueReceiver,
        output: QueueSender,
        worker: usize,
    ) -> Result<(), FlowError> {
        self.workers.lock().insert(worker);

        while let Some(mut rec) = input.pop().await {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let value = rec.get(&self.from).cloned().unwrap_or_default();
            rec.insert(self.to.clone(), value);
            output.push(rec).await?;
            self.processed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// A stage that forwards `limit` records and fails on the next one.
#[derive(Debug)]
pub struct FailingStage {
    limit: u64,
    message: String,
    seen: AtomicU64,
}

impl FailingStage {
    /// Fails once more than `limit` records have arrived, across all workers.
    #[must_use]
    pub fn after(limit: u64, message: impl Into<String>) -> Self {
        Self {
            limit,
            message: message.into(),
            seen: AtomicU64::new(0),
        }
    }

    /// Fails on the first record.
    #[must_use]
    pub fn immediately(message: impl Into<String>) -> Self {
        Self::after(0, message)
    }
}

#[async_trait]
impl Stage for FailingStage {
    async fn process(
        &self,
        input: QueueReceiver,
        output: QueueSender,
        _worker: usize,
    ) -> Result<(), FlowError> {
        while let Some(rec) = input.pop().await {
            if self.seen.fetch_add(1, Ordering::SeqCst) >= self.limit {
                return Err(FlowError::runtime(self.message.clone()));
            }
            output.push(rec).await?;
        }
        Ok(())
    }
}

/// A sink keeping every record it receives.
#[derive(Debug)]
pub struct CollectingSink {
    records: Mutex<Vec<Record>>,
    count: AtomicU64,
    delay: Duration,
    signals_drain: bool,
    notifier: DrainNotifier,
}

impl Default for CollectingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            count: AtomicU64::new(0),
            delay: Duration::ZERO,
            signals_drain: true,
            notifier: DrainNotifier::new(),
        }
    }

    /// A sink that never raises its drain signal.
    #[must_use]
    pub fn never_drains() -> Self {
        Self {
            signals_drain: false,
            ..Self::new()
        }
    }

    /// Waits `delay` per record.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Copies of the records received so far.
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    /// Number of records received so far.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for CollectingSink {
    fn prepare(&self) {
        self.notifier.reset();
    }

    async fn write(&self, input: QueueReceiver) -> Result<(), FlowError> {
        while let Some(rec) = input.pop().await {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.records.lock().push(rec);
            self.count.fetch_add(1, Ordering::SeqCst);
        }

        if self.signals_drain {
            self.notifier.notify();
        }
        debug!(written = self.count(), "Sink input exhausted");
        Ok(())
    }

    fn drained(&self) -> DrainSignal {
        self.notifier.signal()
    }

    fn write_status(&self) -> u64 {
        self.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::bounded;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sequence_source_emits_all() {
        let source = SequenceSource::new(3);
        let (tx, rx) = bounded(8);
        source.read(tx).await.unwrap();

        assert_eq!(rx.len(), 3);
        assert_eq!(rx.pop().await.unwrap()["number1"], "0");
        assert_eq!(source.read_status(), ReadProgress::new(3, 3));
    }

    #[tokio::test]
    async fn test_sequence_source_stops_when_cancelled() {
        let source = Arc::new(SequenceSource::new(100).with_delay(Duration::from_millis(5)));
        let (tx, rx) = bounded(200);

        let reader = tokio::spawn({
            let source = source.clone();
            async move { source.read(tx).await }
        });
        while source.read_status().count_read < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        source.cancel();
        source.cancel();
        reader.await.unwrap().unwrap();

        assert!(source.is_cancelled());
        assert!(!source.is_producing());
        assert!(rx.len() < 100);
        assert_eq!(rx.len() as u64, source.read_status().count_read);
    }

    #[tokio::test]
    async fn test_sequence_source_ignores_cancel_while_idle() {
        let source = SequenceSource::new(10);
        source.cancel();
        assert!(!source.is_cancelled());

        let (tx, rx) = bounded(16);
        source.read(tx).await.unwrap();
        assert_eq!(rx.len(), 10);

        source.cancel();
        let (tx, rx) = bounded(16);
        source.read(tx).await.unwrap();
        assert_eq!(rx.len(), 10);
        assert!(!source.is_cancelled());
        assert_eq!(source.read_status(), ReadProgress::new(10, 10));
    }

    #[tokio::test]
    async fn test_failing_stage_fails_after_limit() {
        let stage = FailingStage::after(2, "boom");
        let (in_tx, in_rx) = bounded(8);
        let (out_tx, out_rx) = bounded(8);
        for i in 0..4 {
            in_tx.push(record([("n", i.to_string())])).await.unwrap();
        }
        in_tx.close();

        let err = stage.process(in_rx, out_tx, 0).await.unwrap_err();
        assert_eq!(err.to_string(), FlowError::runtime("boom").to_string());
        assert_eq!(out_rx.len(), 2);
    }

    #[tokio::test]
    async fn test_collecting_sink_signals_drain() {
        let sink = CollectingSink::new();
        let signal = sink.drained();
        let (tx, rx) = bounded(4);
        tx.push(record([("a", "1")])).await.unwrap();
        tx.close();

        sink.write(rx).await.unwrap();
        assert!(signal.is_drained());
        assert_eq!(sink.write_status(), 1);
        assert_eq!(sink.records()[0]["a"], "1");
    }

    #[tokio::test]
    async fn test_collecting_sink_prepare_clears_last_drain() {
        let sink = CollectingSink::new();
        let (tx, rx) = bounded(4);
        tx.close();
        sink.write(rx).await.unwrap();
        assert!(sink.drained().is_drained());

        sink.prepare();
        assert!(!sink.drained().is_drained());

        let (tx, rx) = bounded(4);
        tx.close();
        sink.write(rx).await.unwrap();
        assert!(sink.drained().is_drained());
    }

    #[tokio::test]
    async fn test_never_drains() {
        let sink = CollectingSink::never_drains();
        let (tx, rx) = bounded(4);
        tx.close();

        sink.write(rx).await.unwrap();
        assert!(!sink.drained().is_drained());
    }
}
