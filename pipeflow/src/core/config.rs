//! Engine configuration and per-run topology.

use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default capacity of every boundary queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default time Stop waits for the sink to drain.
pub const DEFAULT_CANCEL_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings fixed when a flow is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Capacity of each queue between two stages.
    pub queue_capacity: usize,
    /// How long Stop waits for the sink's drain signal.
    #[serde(rename = "cancel_timeout_secs", with = "duration_secs")]
    pub cancel_timeout: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            cancel_timeout: DEFAULT_CANCEL_TIMEOUT,
        }
    }
}

impl FlowConfig {
    /// Creates a config with the default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the cancellation timeout.
    #[must_use]
    pub fn with_cancel_timeout(mut self, timeout: Duration) -> Self {
        self.cancel_timeout = timeout;
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// The shape of one run: which components to wire and how wide to fan out.
///
/// A topology is fixed for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// Parallel workers spawned for every transform stage.
    pub worker_count: usize,
    /// Registry key of the source.
    pub source: String,
    /// Registry key of the sink.
    pub sink: String,
    /// Registry keys of the transform stages, in pipeline order.
    pub stages: Vec<String>,
    /// Capacity of each boundary queue.
    pub queue_capacity: usize,
}

impl Topology {
    /// Creates a topology with the default queue capacity.
    #[must_use]
    pub fn new(worker_count: usize, source: impl Into<String>, sink: impl Into<String>) -> Self {
        Self {
            worker_count,
            source: source.into(),
            sink: sink.into(),
            stages: Vec::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Appends a transform stage.
    #[must_use]
    pub fn with_stage(mut self, key: impl Into<String>) -> Self {
        self.stages.push(key.into());
        self
    }

    /// Replaces the transform stages.
    #[must_use]
    pub fn with_stages<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stages = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Number of boundary queues this topology needs.
    #[must_use]
    pub fn queue_count(&self) -> usize {
        self.stages.len() + 1
    }

    /// Checks the numeric parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no workers or the queues have no room.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.worker_count == 0 {
            return Err(ConfigurationError::invalid(
                "worker count must be at least 1",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigurationError::invalid(
                "queue capacity must be at least 1",
            ));
        }
        Ok(())
    }
}
