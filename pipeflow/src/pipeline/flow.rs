//! The public façade: registry, lifecycle and run control in one object.

use super::orchestrator::Orchestrator;
use crate::components::{Sink, Source, Stage};
use crate::core::{FlowConfig, FlowState, FlowStatus, Topology};
use crate::errors::FlowError;
use crate::registry::{Registry, SinkMap, SourceMap, StageMap};
use crate::status::StatusMachine;
use crate::utils::generate_run_id;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

/// Components of the run that is (or most recently was) active.
#[derive(Debug, Clone)]
struct ActiveRun {
    run_id: String,
    source: Arc<dyn Source>,
    sink: Arc<dyn Sink>,
}

/// A concurrent pipeline engine.
///
/// A `Flow` owns a [`Registry`] of named components and runs one topology at
/// a time. Share it behind an `Arc` to call [`stop`](Self::stop) or
/// [`get_status`](Self::get_status) while [`serve`](Self::serve) is running
/// on another task.
///
/// ```rust,ignore
/// let flow = Arc::new(Flow::new());
/// flow.add_source("in", Arc::new(my_source));
/// flow.add_stage("enrich", Arc::new(my_stage));
/// flow.add_sink("out", Arc::new(my_sink));
///
/// flow.serve(4, "in", "out", &["enrich"]).await?;
/// assert_eq!(flow.get_status().status, FlowState::Finished);
/// ```
#[derive(Debug, Default)]
pub struct Flow {
    config: FlowConfig,
    registry: Registry,
    status: StatusMachine,
    current: Mutex<Option<ActiveRun>>,
}

impl Flow {
    /// Creates a flow with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a flow with `config`.
    #[must_use]
    pub fn with_config(config: FlowConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Sets the capacity of every boundary queue.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Sets how long [`stop`](Self::stop) waits for the sink to drain.
    #[must_use]
    pub fn with_cancel_timeout(mut self, timeout: Duration) -> Self {
        self.config.cancel_timeout = timeout;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Returns the component registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Replaces every registered source.
    pub fn set_sources(&self, sources: SourceMap) {
        self.registry.set_sources(sources);
    }

    /// Registers a source under `key`.
    pub fn add_source(&self, key: impl Into<String>, source: Arc<dyn Source>) {
        self.registry.add_source(key, source);
    }

    /// Replaces every registered sink.
    pub fn set_sinks(&self, sinks: SinkMap) {
        self.registry.set_sinks(sinks);
    }

    /// Registers a sink under `key`.
    pub fn add_sink(&self, key: impl Into<String>, sink: Arc<dyn Sink>) {
        self.registry.add_sink(key, sink);
    }

    /// Replaces every registered stage.
    pub fn set_stages(&self, stages: StageMap) {
        self.registry.set_stages(stages);
    }

    /// Registers a stage under `key`.
    pub fn add_stage(&self, key: impl Into<String>, stage: Arc<dyn Stage>) {
        self.registry.add_stage(key, stage);
    }

    /// Lists registered source keys.
    pub fn source_keys(&self) -> Vec<String> {
        self.registry.source_keys()
    }

    /// Lists registered sink keys.
    pub fn sink_keys(&self) -> Vec<String> {
        self.registry.sink_keys()
    }

    /// Lists registered stage keys.
    pub fn stage_keys(&self) -> Vec<String> {
        self.registry.stage_keys()
    }

    /// Runs `source -> stages... -> sink` with `worker_count` workers per stage
    /// and waits for the run to end.
    ///
    /// See [`serve_topology`](Self::serve_topology).
    pub async fn serve<S: AsRef<str>>(
        &self,
        worker_count: usize,
        source: &str,
        sink: &str,
        stages: &[S],
    ) -> Result<(), FlowError> {
        let topology = Topology::new(worker_count, source, sink)
            .with_stages(stages.iter().map(|s| s.as_ref().to_string()))
            .with_queue_capacity(self.config.queue_capacity);
        self.serve_topology(topology).await
    }

    /// Runs `topology` and waits for the run to end.
    ///
    /// Configuration and key errors are reported before the flow starts and
    /// leave the status untouched. Once started, a run ends as `FINISHED`,
    /// as `ERROR` with the failure recorded in the description, or as
    /// `CANCELLED` if [`stop`](Self::stop) got there first.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Configuration`] for an invalid topology or an
    /// unknown key, [`FlowError::InvalidState`] if a run is already active or
    /// cancelling, and the first collaborator failure of the run otherwise.
    pub async fn serve_topology(&self, topology: Topology) -> Result<(), FlowError> {
        topology.validate()?;
        let resolved = self.registry.resolve(&topology)?;
        let run_id = generate_run_id();

        {
            let mut current = self.current.lock();
            self.status.start(&run_id)?;
            resolved.sink.prepare();
            *current = Some(ActiveRun {
                run_id: run_id.clone(),
                source: resolved.source.clone(),
                sink: resolved.sink.clone(),
            });
        }

        info!(
            run_id = %run_id,
            source = %topology.source,
            sink = %topology.sink,
            stages = ?topology.stages,
            workers = topology.worker_count,
            "Flow started"
        );

        let result = Orchestrator::new(&topology, resolved)
            .run()
            .instrument(info_span!("flow_run", run_id = %run_id))
            .await;

        self.refresh_counts();
        match &result {
            Ok(()) => {
                if self.status.finish(&run_id) {
                    info!(run_id = %run_id, "Flow finished");
                }
            }
            Err(error) => {
                if self.status.fail(&run_id, error.to_string()) {
                    warn!(run_id = %run_id, error = %error, "Flow failed");
                }
            }
        }
        result
    }

    /// Cancels the flow.
    ///
    /// Asks the active source to stop, then waits for the sink to drain or
    /// for the configured timeout, whichever comes first. The flow is
    /// `CANCELLED` afterwards either way; tasks of a timed-out run may still
    /// be winding down in the background.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidState`] unless the flow is `WAIT_TO_START`
    /// or `PROCESSING`.
    pub async fn stop(&self) -> Result<(), FlowError> {
        let previous = self.status.cancelling()?;

        let run = match previous {
            FlowState::Processing => self.current.lock().clone(),
            _ => None,
        };

        if let Some(run) = run {
            run.source.cancel();
            debug!(run_id = %run.run_id, "Source cancel requested");

            let drained = run.sink.drained();
            if tokio::time::timeout(self.config.cancel_timeout, drained.wait())
                .await
                .is_err()
            {
                warn!(
                    run_id = %run.run_id,
                    timeout_secs = self.config.cancel_timeout.as_secs_f64(),
                    "Sink did not drain before the cancel timeout"
                );
            }
            self.refresh_counts();
        }

        self.status.cancelled();
        info!(from = %previous, "Flow cancelled");
        Ok(())
    }

    /// Returns the flow to `WAIT_TO_START` with counters cleared.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidState`] while a run is active or
    /// cancelling.
    pub fn restart(&self) -> Result<(), FlowError> {
        let mut current = self.current.lock();
        self.status.restart()?;
        *current = None;
        info!("Flow restarted");
        Ok(())
    }

    /// Returns a snapshot of the status with fresh progress counters.
    pub fn get_status(&self) -> FlowStatus {
        self.refresh_counts();
        self.status.snapshot()
    }

    /// Returns true while a run is `PROCESSING`.
    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    fn refresh_counts(&self) {
        let Some(run) = self.current.lock().clone() else {
            return;
        };
        // Collaborators are queried outside the lock.
        let read = run.source.read_status();
        let written = run.sink.write_status();
        self.status.update_counts(read, written);
    }
}
