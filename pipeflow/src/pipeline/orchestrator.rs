//! Builds the queue chain for one run and drives it to completion.

use super::worker_group::{keep_root_cause, WorkerGroup};
use crate::core::Topology;
use crate::errors::FlowError;
use crate::queue::{self, QueueReceiver, QueueSender};
use crate::registry::ResolvedTopology;
use tracing::{debug, debug_span, warn, Instrument};

/// Wires resolved components into a running pipeline.
///
/// For `n` transform stages the orchestrator allocates `n + 1` bounded
/// queues. Boundary `i` is written by producer group `i` (group 0 is the
/// source, group `i > 0` is the worker pool of stage `i - 1`) and read by the
/// next group, or by the sink for the last boundary.
#[derive(Debug)]
pub struct Orchestrator<'a> {
    topology: &'a Topology,
    resolved: ResolvedTopology,
}

impl<'a> Orchestrator<'a> {
    /// Creates an orchestrator for an already validated topology.
    #[must_use]
    pub fn new(topology: &'a Topology, resolved: ResolvedTopology) -> Self {
        Self { topology, resolved }
    }

    /// Spawns every task, then joins them stage by stage.
    ///
    /// Boundary `i` is closed only after producer group `i` has fully
    /// joined, so the next group sees end-of-input exactly when its upstream
    /// is drained. The sink is joined last.
    ///
    /// # Errors
    ///
    /// Returns the first collaborator failure. All tasks are still joined and
    /// every boundary is still closed before returning.
    pub async fn run(self) -> Result<(), FlowError> {
        let Self { topology, resolved } = self;
        let ResolvedTopology {
            source,
            sink,
            stages,
        } = resolved;

        let (closers, receivers): (Vec<QueueSender>, Vec<QueueReceiver>) = (0..topology
            .queue_count())
            .map(|_| queue::bounded(topology.queue_capacity))
            .unzip();

        let mut producers = Vec::with_capacity(closers.len());

        let mut source_group = WorkerGroup::new("source");
        {
            let output = closers[0].clone();
            source_group.spawn(
                async move { source.read(output).await }
                    .instrument(debug_span!("source", key = %topology.source)),
            );
        }
        producers.push(source_group);

        for (index, (key, stage)) in stages.into_iter().enumerate() {
            let mut group = WorkerGroup::new(key.clone());
            for worker in 0..topology.worker_count {
                let stage = stage.clone();
                let input = receivers[index].clone();
                let output = closers[index + 1].clone();
                group.spawn(
                    async move { stage.process(input, output, worker).await }
                        .instrument(debug_span!("stage_worker", stage = %key, worker)),
                );
            }
            producers.push(group);
        }

        let mut sink_group = WorkerGroup::new("sink");
        {
            let input = receivers[receivers.len() - 1].clone();
            sink_group.spawn(
                async move { sink.write(input).await }
                    .instrument(debug_span!("sink", key = %topology.sink)),
            );
        }

        // Only collaborators may hold consumer handles, so a boundary whose
        // consumers have all exited rejects pushes instead of filling up.
        drop(receivers);

        let mut first_error = None;
        for (boundary, group) in producers.into_iter().enumerate() {
            let producer = group.name().to_string();
            if let Err(error) = group.join().await {
                keep_root_cause(&mut first_error, error);
            }
            closers[boundary].close();
            debug!(boundary, producer = %producer, "Boundary queue closed");
        }

        if let Err(error) = sink_group.join().await {
            keep_root_cause(&mut first_error, error);
        }

        match first_error {
            Some(error) => {
                warn!(error = %error, "Pipeline run failed");
                Err(error)
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Sink, Source, Stage};
    use crate::registry::Registry;
    use crate::testing::{CollectingSink, CopyFieldStage, FailingStage, SequenceSource};
    use std::sync::Arc;

    fn resolve(registry: &Registry, topology: &Topology) -> ResolvedTopology {
        registry.resolve(topology).unwrap()
    }

    #[tokio::test]
    async fn test_source_straight_to_sink() {
        let registry = Registry::new();
        let sink = Arc::new(CollectingSink::new());
        registry.add_source("in", Arc::new(SequenceSource::new(10)));
        registry.add_sink("out", sink.clone());

        let topology = Topology::new(1, "in", "out");
        Orchestrator::new(&topology, resolve(&registry, &topology))
            .run()
            .await
            .unwrap();

        assert_eq!(sink.count(), 10);
        assert!(sink.drained().is_drained());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_every_stage_augments_every_record() {
        let registry = Registry::new();
        let sink = Arc::new(CollectingSink::new());
        registry.add_source("in", Arc::new(SequenceSource::new(50)));
        registry.add_sink("out", sink.clone());
        registry.add_stage("a", Arc::new(CopyFieldStage::new("number1", "a")));
        registry.add_stage("b", Arc::new(CopyFieldStage::new("a", "b")));
        registry.add_stage("c", Arc::new(CopyFieldStage::new("b", "c")));

        let topology = Topology::new(3, "in", "out")
            .with_stages(["a", "b", "c"])
            .with_queue_capacity(2);
        Orchestrator::new(&topology, resolve(&registry, &topology))
            .run()
            .await
            .unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 50);
        for r in records {
            assert_eq!(r["number1"], r["c"]);
        }
    }

    #[tokio::test]
    async fn test_worker_indices_are_distinct() {
        let registry = Registry::new();
        let stage = Arc::new(CopyFieldStage::new("number1", "copy"));
        registry.add_source("in", Arc::new(SequenceSource::new(5)));
        registry.add_sink("out", Arc::new(CollectingSink::new()));
        registry.add_stage("copy", stage.clone());

        let topology = Topology::new(4, "in", "out").with_stage("copy");
        Orchestrator::new(&topology, resolve(&registry, &topology))
            .run()
            .await
            .unwrap();

        assert_eq!(stage.workers_started(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_stage_failure_is_returned_and_run_terminates() {
        let registry = Registry::new();
        registry.add_source("in", Arc::new(SequenceSource::new(1_000)));
        registry.add_sink("out", Arc::new(CollectingSink::new()));
        registry.add_stage("bad", Arc::new(FailingStage::after(3, "bad record")));

        let topology = Topology::new(2, "in", "out")
            .with_stage("bad")
            .with_queue_capacity(1);
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            Orchestrator::new(&topology, resolve(&registry, &topology)).run(),
        )
        .await
        .expect("a failing stage must not deadlock the run");

        let err = result.unwrap_err();
        assert!(err.to_string().contains("bad record"), "{err}");
    }

    #[tokio::test]
    async fn test_components_are_trait_objects() {
        let source: Arc<dyn Source> = Arc::new(SequenceSource::new(1));
        let sink: Arc<dyn Sink> = Arc::new(CollectingSink::new());
        let stage: Arc<dyn Stage> = Arc::new(CopyFieldStage::new("x", "y"));
        let resolved = ResolvedTopology {
            source,
            sink: sink.clone(),
            stages: vec![("s".to_string(), stage)],
        };

        let topology = Topology::new(1, "in", "out").with_stage("s");
        Orchestrator::new(&topology, resolved).run().await.unwrap();
        assert_eq!(sink.write_status(), 1);
    }
}
