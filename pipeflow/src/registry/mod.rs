//! Name-keyed registry of sources, sinks and stages.

use crate::components::{Sink, Source, Stage};
use crate::core::Topology;
use crate::errors::{ComponentKind, ConfigurationError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Sources keyed by name.
pub type SourceMap = HashMap<String, Arc<dyn Source>>;
/// Sinks keyed by name.
pub type SinkMap = HashMap<String, Arc<dyn Sink>>;
/// Stages keyed by name.
pub type StageMap = HashMap<String, Arc<dyn Stage>>;

/// Components resolved for one run.
#[derive(Debug, Clone)]
pub struct ResolvedTopology {
    /// The source feeding the first queue.
    pub source: Arc<dyn Source>,
    /// The sink draining the last queue.
    pub sink: Arc<dyn Sink>,
    /// Transform stages with their registry keys, in pipeline order.
    pub stages: Vec<(String, Arc<dyn Stage>)>,
}

/// Three independent name-to-component maps.
///
/// Keys are unique per map and the last write wins. The maps are read under
/// the lock only while a topology is resolved; mutating them while a run is
/// active does not affect that run.
#[derive(Default)]
pub struct Registry {
    sources: RwLock<SourceMap>,
    sinks: RwLock<SinkMap>,
    stages: RwLock<StageMap>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every registered source.
    pub fn set_sources(&self, sources: SourceMap) {
        *self.sources.write() = sources;
    }

    /// Registers a source under `key`.
    pub fn add_source(&self, key: impl Into<String>, source: Arc<dyn Source>) {
        self.sources.write().insert(key.into(), source);
    }

    /// Replaces every registered sink.
    pub fn set_sinks(&self, sinks: SinkMap) {
        *self.sinks.write() = sinks;
    }

    /// Registers a sink under `key`.
    pub fn add_sink(&self, key: impl Into<String>, sink: Arc<dyn Sink>) {
        self.sinks.write().insert(key.into(), sink);
    }

    /// Replaces every registered stage.
    pub fn set_stages(&self, stages: StageMap) {
        *self.stages.write() = stages;
    }

    /// Registers a stage under `key`.
    pub fn add_stage(&self, key: impl Into<String>, stage: Arc<dyn Stage>) {
        self.stages.write().insert(key.into(), stage);
    }

    /// Lists registered source keys.
    pub fn source_keys(&self) -> Vec<String> {
        sorted_keys(&self.sources.read())
    }

    /// Lists registered sink keys.
    pub fn sink_keys(&self) -> Vec<String> {
        sorted_keys(&self.sinks.read())
    }

    /// Lists registered stage keys.
    pub fn stage_keys(&self) -> Vec<String> {
        sorted_keys(&self.stages.read())
    }

    /// Looks up every component named by `topology`.
    ///
    /// Keys are checked in order: source, sink, then each stage.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] naming the first missing key.
    pub fn resolve(&self, topology: &Topology) -> Result<ResolvedTopology, ConfigurationError> {
        let source = self
            .sources
            .read()
            .get(&topology.source)
            .cloned()
            .ok_or_else(|| ConfigurationError::unknown_key(ComponentKind::Source, &topology.source))?;

        let sink = self
            .sinks
            .read()
            .get(&topology.sink)
            .cloned()
            .ok_or_else(|| ConfigurationError::unknown_key(ComponentKind::Sink, &topology.sink))?;

        let registered = self.stages.read();
        let stages = topology
            .stages
            .iter()
            .map(|key| {
                registered
                    .get(key)
                    .cloned()
                    .map(|stage| (key.clone(), stage))
                    .ok_or_else(|| ConfigurationError::unknown_key(ComponentKind::Stage, key))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ResolvedTopology {
            source,
            sink,
            stages,
        })
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("sources", &self.source_keys())
            .field("sinks", &self.sink_keys())
            .field("stages", &self.stage_keys())
            .finish()
    }
}
