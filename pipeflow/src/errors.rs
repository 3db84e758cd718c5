//! Error types for the pipeflow engine.
//!
//! Engine-level failures are always returned synchronously from the façade:
//! configuration problems before a run starts, guard violations of the
//! lifecycle state machine, and failures reported by collaborators while a
//! run is in flight.

use crate::core::FlowState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// The main error type for pipeflow operations.
#[derive(Debug, Clone, Error)]
pub enum FlowError {
    /// The requested topology cannot be resolved or is malformed.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// The operation is not allowed in the current lifecycle state.
    #[error("{0}")]
    InvalidState(#[from] InvalidStateError),

    /// A collaborator (source, stage or sink) reported a failure.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// A record was pushed into a boundary whose consumers have all exited.
    #[error("Queue closed: no consumer left on this boundary")]
    QueueClosed,

    /// A spawned task panicked or was aborted.
    #[error("Task join error: {0}")]
    TaskJoin(String),
}

impl FlowError {
    /// Creates a runtime error from any displayable message.
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }

    /// Returns true for errors raised before a run starts.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns true for state machine guard violations.
    #[must_use]
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState(_))
    }
}

/// The kind of component a registry key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// A record producer.
    Source,
    /// A record consumer at the end of the pipeline.
    Sink,
    /// A transform stage between source and sink.
    Stage,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Sink => write!(f, "sink"),
            Self::Stage => write!(f, "stage"),
        }
    }
}

/// Error raised when a topology cannot be built.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConfigurationError {
    /// The component kind involved, if the error is about a registry key.
    pub kind: Option<ComponentKind>,
    /// The offending key, if any.
    pub key: Option<String>,
    /// The error message.
    pub message: String,
}

impl ConfigurationError {
    /// Creates an error for a key missing from the registry.
    #[must_use]
    pub fn unknown_key(kind: ComponentKind, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            kind: Some(kind),
            message: format!("There is no {kind} registered with key: {key}"),
            key: Some(key),
        }
    }

    /// Creates an error for an invalid topology parameter.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: None,
            key: None,
            message: message.into(),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!("ConfigurationError"));
        map.insert("message".to_string(), serde_json::json!(self.message));
        if let Some(kind) = self.kind {
            map.insert("kind".to_string(), serde_json::json!(kind));
        }
        if let Some(ref key) = self.key {
            map.insert("key".to_string(), serde_json::json!(key));
        }
        map
    }
}

/// Error raised when a lifecycle operation is attempted from a state that
/// does not allow it.
#[derive(Debug, Clone, Error)]
#[error("cannot {operation} because the flow is in status: {state}")]
pub struct InvalidStateError {
    /// The rejected operation (e.g. "start", "stop").
    pub operation: String,
    /// The state observed when the guard was evaluated.
    pub state: FlowState,
}

impl InvalidStateError {
    /// Creates a new invalid state error.
    #[must_use]
    pub fn new(operation: impl Into<String>, state: FlowState) -> Self {
        Self {
            operation: operation.into(),
            state,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!("InvalidStateError"));
        map.insert("operation".to_string(), serde_json::json!(self.operation));
        map.insert("state".to_string(), serde_json::json!(self.state));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_key_message_names_key() {
        let err = ConfigurationError::unknown_key(ComponentKind::Source, "in_not_exist");

        assert_eq!(err.to_string(), "There is no source registered with key: in_not_exist");
        assert_eq!(err.key.as_deref(), Some("in_not_exist"));
        assert_eq!(err.kind, Some(ComponentKind::Source));
    }

    #[test]
    fn test_flow_error_from_configuration() {
        let err: FlowError = ConfigurationError::unknown_key(ComponentKind::Stage, "2").into();
        assert!(err.is_configuration());
        assert!(!err.is_invalid_state());
        assert!(err.to_string().contains("stage"));
    }

    #[test]
    fn test_invalid_state_message() {
        let err = InvalidStateError::new("stop", FlowState::Cancelled);
        assert_eq!(err.to_string(), "cannot stop because the flow is in status: CANCELLED");

        let flow_err: FlowError = err.into();
        assert!(flow_err.is_invalid_state());
    }

    #[test]
    fn test_configuration_error_to_dict() {
        let dict = ConfigurationError::unknown_key(ComponentKind::Sink, "out").to_dict();

        assert_eq!(dict.get("type").unwrap(), "ConfigurationError");
        assert_eq!(dict.get("kind").unwrap(), "sink");
        assert_eq!(dict.get("key").unwrap(), "out");
    }

    #[test]
    fn test_invalid_state_to_dict() {
        let dict = InvalidStateError::new("restart", FlowState::Processing).to_dict();
        assert_eq!(dict.get("state").unwrap(), "PROCESSING");
        assert_eq!(dict.get("operation").unwrap(), "restart");
    }
}
