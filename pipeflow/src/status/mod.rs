//! The guarded lifecycle state machine.
//!
//! ```text
//! WAIT_TO_START ──start──▶ PROCESSING ──finish──▶ FINISHED
//!      │                       │ └────fail─────▶ ERROR
//!      └──────cancelling───────┴──▶ CANCELLING ──cancelled──▶ CANCELLED
//!
//! FINISHED | CANCELLED | ERROR ──restart / start──▶ WAIT_TO_START / PROCESSING
//! ```
//!
//! Every guard is evaluated and applied under the same lock as the mutation
//! it protects. When Stop and the end of a run race, whichever mutation
//! observes `PROCESSING` first applies and the other is skipped.

use crate::components::ReadProgress;
use crate::core::{FlowState, FlowStatus};
use crate::errors::InvalidStateError;
use crate::utils::now_utc;
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Lifecycle state, timestamps, last error and progress counters of a flow.
///
/// Fields are only reachable through guarded transitions and
/// [`snapshot`](Self::snapshot), which returns a copy.
#[derive(Debug, Default)]
pub struct StatusMachine {
    inner: Mutex<FlowStatus>,
}

impl StatusMachine {
    /// Creates a machine in `WAIT_TO_START`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> FlowState {
        self.inner.lock().status
    }

    /// Returns true while a run is `PROCESSING`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == FlowState::Processing
    }

    /// Enters `PROCESSING` for a new run.
    ///
    /// Allowed from `WAIT_TO_START` and from any terminal state, which starts
    /// the run from a clean slate.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStateError`] while a run is active or cancelling.
    pub fn start(&self, run_id: &str) -> Result<(), InvalidStateError> {
        let mut status = self.inner.lock();
        if !status.status.is_startable() {
            return Err(InvalidStateError::new("start", status.status));
        }
        let from = status.status;
        *status = FlowStatus {
            status: FlowState::Processing,
            started: Some(now_utc()),
            run_id: Some(run_id.to_string()),
            ..FlowStatus::default()
        };
        debug!(from = %from, to = %FlowState::Processing, run_id, "Flow status transition");
        Ok(())
    }

    /// Enters `CANCELLING`.
    ///
    /// Returns the state the flow was in before.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStateError`] unless the flow is `WAIT_TO_START` or
    /// `PROCESSING`.
    pub fn cancelling(&self) -> Result<FlowState, InvalidStateError> {
        let mut status = self.inner.lock();
        if !status.status.is_cancellable() {
            return Err(InvalidStateError::new("stop", status.status));
        }
        let from = status.status;
        status.status = FlowState::Cancelling;
        debug!(from = %from, to = %FlowState::Cancelling, "Flow status transition");
        Ok(from)
    }

    /// Moves `CANCELLING` to `CANCELLED`. Returns false if the flow was not
    /// cancelling.
    pub fn cancelled(&self) -> bool {
        self.transition(None, FlowState::Cancelling, FlowState::Cancelled, None)
    }

    /// Moves `PROCESSING` to `FINISHED` for run `run_id`.
    ///
    /// Returns false, leaving the state untouched, if the run was already
    /// cancelled or a newer run has started since.
    pub fn finish(&self, run_id: &str) -> bool {
        self.transition(Some(run_id), FlowState::Processing, FlowState::Finished, None)
    }

    /// Moves `PROCESSING` to `ERROR` for run `run_id` and records
    /// `description`. Skipped like [`finish`](Self::finish).
    pub fn fail(&self, run_id: &str, description: impl Into<String>) -> bool {
        self.transition(
            Some(run_id),
            FlowState::Processing,
            FlowState::Error,
            Some(description.into()),
        )
    }

    /// Returns to `WAIT_TO_START` with counters and timestamps cleared.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStateError`] while a run is active or cancelling.
    pub fn restart(&self) -> Result<(), InvalidStateError> {
        let mut status = self.inner.lock();
        if !status.status.is_restartable() {
            return Err(InvalidStateError::new("restart", status.status));
        }
        let from = status.status;
        *status = FlowStatus::default();
        debug!(from = %from, to = %FlowState::WaitToStart, "Flow status transition");
        Ok(())
    }

    /// Stores the latest progress counters.
    pub fn update_counts(&self, read: ReadProgress, count_write: u64) {
        let mut status = self.inner.lock();
        status.count_read = read.count_read;
        status.count_max = read.count_max;
        status.count_write = count_write;
    }

    /// Returns a copy of the current status.
    #[must_use]
    pub fn snapshot(&self) -> FlowStatus {
        self.inner.lock().clone()
    }

    fn transition(
        &self,
        run_id: Option<&str>,
        from: FlowState,
        to: FlowState,
        description: Option<String>,
    ) -> bool {
        let mut status = self.inner.lock();
        if let Some(run_id) = run_id {
            if status.run_id.as_deref() != Some(run_id) {
                warn!(run_id, current = ?status.run_id, skipped = %to, "Stale run ignored");
                return false;
            }
        }
        if status.status != from {
            warn!(
                expected = %from,
                actual = %status.status,
                skipped = %to,
                "Flow status transition skipped"
            );
            return false;
        }
        status.status = to;
        status.ended = Some(now_utc());
        if let Some(description) = description {
            status.description = description;
        }
        debug!(from = %from, to = %to, "Flow status transition");
        true
    }

    #[cfg(test)]
    fn force(&self, state: FlowState) {
        self.inner.lock().status = state;
    }
}
