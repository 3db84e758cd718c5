//! Flow lifecycle states and the status snapshot.

use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// The lifecycle state of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowState {
    /// Created or restarted, no run has begun.
    #[default]
    WaitToStart,
    /// A run is active.
    Processing,
    /// The last run failed after it had started.
    Error,
    /// Stop was requested and the flow is waiting for the sink to drain.
    Cancelling,
    /// The last run was stopped.
    Cancelled,
    /// The last run completed normally.
    Finished,
}

impl FlowState {
    /// Returns true if no further transition happens without a restart.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled | Self::Error)
    }

    /// Returns true if a run may start from this state.
    #[must_use]
    pub fn is_startable(&self) -> bool {
        matches!(self, Self::WaitToStart) || self.is_terminal()
    }

    /// Returns true if Stop is accepted in this state.
    #[must_use]
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::WaitToStart | Self::Processing)
    }

    /// Returns true if Restart is accepted in this state.
    #[must_use]
    pub fn is_restartable(&self) -> bool {
        self.is_startable()
    }

    /// Returns the canonical upper-case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WaitToStart => "WAIT_TO_START",
            Self::Processing => "PROCESSING",
            Self::Error => "ERROR",
            Self::Cancelling => "CANCELLING",
            Self::Cancelled => "CANCELLED",
            Self::Finished => "FINISHED",
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown state name.
#[derive(Debug, Clone, Error)]
#[error("Unknown flow state: {0}")]
pub struct ParseFlowStateError(pub String);

impl FromStr for FlowState {
    type Err = ParseFlowStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WAIT_TO_START" => Ok(Self::WaitToStart),
            "PROCESSING" => Ok(Self::Processing),
            "ERROR" => Ok(Self::Error),
            "CANCELLING" => Ok(Self::Cancelling),
            "CANCELLED" => Ok(Self::Cancelled),
            "FINISHED" => Ok(Self::Finished),
            _ => Err(ParseFlowStateError(s.to_string())),
        }
    }
}

/// An immutable copy of the flow status.
///
/// Obtained from [`crate::pipeline::Flow::get_status`]; mutating it has no
/// effect on the flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStatus {
    /// Machine-readable outcome.
    pub status: FlowState,
    /// When the current or last run started.
    pub started: Option<Timestamp>,
    /// When the last run reached a terminal state.
    pub ended: Option<Timestamp>,
    /// Text of the last failure, empty if none.
    pub description: String,
    /// Records read by the source.
    pub count_read: u64,
    /// Records written by the sink.
    pub count_write: u64,
    /// Total records the source expects to read, 0 if unknown.
    pub count_max: u64,
    /// Identifier of the current or last run.
    pub run_id: Option<String>,
}

impl FlowStatus {
    /// Returns the elapsed run time, up to `ended` if the run is over.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        let started = self.started?;
        let until = self.ended.unwrap_or_else(chrono::Utc::now);
        (until - started).to_std().ok()
    }

    /// Returns the read progress in `[0, 1]`, if the source knows its total.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> Option<f64> {
        if self.count_max == 0 {
            return None;
        }
        Some((self.count_read as f64 / self.count_max as f64).min(1.0))
    }

    /// Converts to a JSON dictionary.
    #[must_use]
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.status.as_str(),
            "started": self.started.map(|t| t.to_rfc3339()),
            "ended": self.ended.map(|t| t.to_rfc3339()),
            "description": self.description,
            "count_read": self.count_read,
            "count_write": self.count_write,
            "count_max": self.count_max,
            "run_id": self.run_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_state_display() {
        assert_eq!(FlowState::WaitToStart.to_string(), "WAIT_TO_START");
        assert_eq!(FlowState::Processing.to_string(), "PROCESSING");
        assert_eq!(FlowState::Cancelled.to_string(), "CANCELLED");
    }

    #[test]
    fn test_flow_state_parse() {
        assert_eq!("finished".parse::<FlowState>().unwrap(), FlowState::Finished);
        assert_eq!("CANCELLING".parse::<FlowState>().unwrap(), FlowState::Cancelling);
        assert!("NOT_EXIST".parse::<FlowState>().is_err());
    }

    #[test]
    fn test_flow_state_guards() {
        assert!(FlowState::WaitToStart.is_startable());
        assert!(FlowState::Finished.is_startable());
        assert!(FlowState::Error.is_startable());
        assert!(!FlowState::Processing.is_startable());
        assert!(!FlowState::Cancelling.is_startable());

        assert!(FlowState::Processing.is_cancellable());
        assert!(!FlowState::Cancelled.is_cancellable());
        assert!(!FlowState::Cancelling.is_cancellable());
    }

    #[test]
    fn test_flow_state_serialize() {
        let json = serde_json::to_string(&FlowState::WaitToStart).unwrap();
        assert_eq!(json, r#""WAIT_TO_START""#);

        let state: FlowState = serde_json::from_str(r#""ERROR""#).unwrap();
        assert_eq!(state, FlowState::Error);
    }

    #[test]
    fn test_status_progress() {
        let mut status = FlowStatus::default();
        assert!(status.progress().is_none());

        status.count_read = 25;
        status.count_max = 100;
        assert!((status.progress().unwrap() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_status_to_dict() {
        let status = FlowStatus {
            status: FlowState::Error,
            description: "boom".to_string(),
            ..FlowStatus::default()
        };

        let dict = status.to_dict();
        assert_eq!(dict["status"], "ERROR");
        assert_eq!(dict["description"], "boom");
        assert!(dict["started"].is_null());
    }
}
