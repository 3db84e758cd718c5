//! A named group of worker tasks joined as one barrier.

use crate::errors::FlowError;
use futures::future::join_all;
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Tasks that produce into the same boundary queue.
///
/// The group is joined as a whole; only after every task in it has returned
/// may the boundary it writes to be closed.
pub(crate) struct WorkerGroup {
    name: String,
    handles: Vec<JoinHandle<Result<(), FlowError>>>,
}

impl WorkerGroup {
    /// Creates an empty group.
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handles: Vec::new(),
        }
    }

    /// Returns the group name.
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Spawns a task in the group.
    pub(crate) fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result<(), FlowError>> + Send + 'static,
    {
        self.handles.push(tokio::spawn(task));
    }

    /// Returns the number of spawned tasks.
    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }

    /// Waits for every task in the group.
    ///
    /// All tasks are awaited even if some fail. Returns the most relevant
    /// error (see [`keep_root_cause`]).
    pub(crate) async fn join(self) -> Result<(), FlowError> {
        let Self { name, handles } = self;
        let workers = handles.len();
        let mut first_error = None;

        for (worker, result) in join_all(handles).await.into_iter().enumerate() {
            let outcome = result.unwrap_or_else(|join_error| {
                Err(FlowError::TaskJoin(format!("{name}[{worker}]: {join_error}")))
            });
            if let Err(error) = outcome {
                warn!(group = %name, worker, error = %error, "Worker exited with error");
                keep_root_cause(&mut first_error, error);
            }
        }

        debug!(group = %name, workers, "Worker group joined");
        first_error.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for WorkerGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerGroup")
            .field("name", &self.name)
            .field("task_count", &self.len())
            .finish()
    }
}

/// Stores `error` unless a more informative one is already held.
///
/// `QueueClosed` is what upstream producers see after a downstream consumer
/// failed, so any other error replaces it.
pub(crate) fn keep_root_cause(slot: &mut Option<FlowError>, error: FlowError) {
    match slot {
        None => *slot = Some(error),
        Some(FlowError::QueueClosed) if !matches!(error, FlowError::QueueClosed) => {
            *slot = Some(error);
        }
        Some(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_group_success() {
        let mut group = WorkerGroup::new("ok");
        group.spawn(async { Ok::<_, FlowError>(()) });
        group.spawn(async { Ok::<_, FlowError>(()) });

        assert_eq!(group.len(), 2);
        assert!(group.join().await.is_ok());
    }

    #[tokio::test]
    async fn test_group_waits_for_all_tasks_after_error() {
        let finished = Arc::new(AtomicUsize::new(0));
        let mut group = WorkerGroup::new("mixed");

        group.spawn(async { Err::<(), _>(FlowError::runtime("Task failed")) });
        for _ in 0..3 {
            let finished = finished.clone();
            group.spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok::<_, FlowError>(())
            });
        }

        let err = group.join().await.unwrap_err();
        assert!(err.to_string().contains("Task failed"));
        assert_eq!(finished.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_group_reports_panics() {
        let mut group = WorkerGroup::new("panicky");
        group.spawn(async {
            if true {
                panic!("Intentional");
            }
            Ok::<_, FlowError>(())
        });

        let err = group.join().await.unwrap_err();
        assert!(matches!(err, FlowError::TaskJoin(_)));
        assert!(err.to_string().contains("panicky[0]"));
    }

    #[test]
    fn test_keep_root_cause_prefers_real_failure() {
        let mut slot = None;
        keep_root_cause(&mut slot, FlowError::QueueClosed);
        keep_root_cause(&mut slot, FlowError::runtime("disk full"));
        keep_root_cause(&mut slot, FlowError::runtime("second"));

        assert!(slot.unwrap().to_string().contains("disk full"));
    }
}
