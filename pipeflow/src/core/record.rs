//! The record type flowing through a pipeline.

use std::collections::HashMap;

/// A single unit of data: string keys mapped to string values.
///
/// Records are moved through the pipeline, so every stage owns the record
/// while it holds it and may add or overwrite fields. Which fields a stage
/// expects is a convention between collaborators; the engine never inspects
/// record contents.
pub type Record = HashMap<String, String>;

/// Builds a record from key/value pairs.
///
/// Later pairs overwrite earlier ones with the same key.
pub fn record<K, V, I>(pairs: I) -> Record
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
