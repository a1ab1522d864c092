//! Correlation of remote fitness requests with their responses.
//!
//! A [`FitnessBroker`] maps a task id to a one-shot slot. The evaluator
//! registers a slot before waiting, the driver resolves it when the
//! client's scores arrive, and the [`PendingScores`] guard deletes the slot
//! when it goes out of scope, whether the wait succeeded, timed out, or the
//! surrounding future was dropped.

use crate::error::EvolutionError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

type Slots = HashMap<Uuid, oneshot::Sender<Vec<f64>>>;

/// Registry of outstanding remote evaluations, at most one per task.
#[derive(Debug, Default)]
pub struct FitnessBroker {
    pending: Mutex<Slots>,
}

impl FitnessBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the correlation slot for `task_id`.
    ///
    /// # Errors
    /// [`EvolutionError::EvaluationInFlight`] if the task already has an
    /// unresolved slot.
    pub fn register(self: &Arc<Self>, task_id: Uuid) -> Result<PendingScores, EvolutionError> {
        let mut pending = self.slots();
        if pending.contains_key(&task_id) {
            return Err(EvolutionError::EvaluationInFlight { task_id });
        }
        let (sender, receiver) = oneshot::channel();
        pending.insert(task_id, sender);
        debug!(%task_id, "fitness correlation opened");

        Ok(PendingScores {
            task_id,
            broker: Arc::clone(self),
            receiver,
        })
    }

    /// Delivers `scores` to the waiting evaluator and closes the slot.
    ///
    /// Returns `false` if no evaluation was waiting for this task.
    pub fn resolve(&self, task_id: Uuid, scores: Vec<f64>) -> bool {
        match self.slots().remove(&task_id) {
            Some(sender) => sender.send(scores).is_ok(),
            None => false,
        }
    }

    pub fn is_pending(&self, task_id: Uuid) -> bool {
        self.slots().contains_key(&task_id)
    }

    /// Number of open slots.
    pub fn pending_count(&self) -> usize {
        self.slots().len()
    }

    fn release(&self, task_id: Uuid) {
        if self.slots().remove(&task_id).is_some() {
            debug!(%task_id, "fitness correlation released unresolved");
        }
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An open correlation slot.
///
/// Dropping the guard removes the slot from its broker.
#[derive(Debug)]
pub struct PendingScores {
    task_id: Uuid,
    broker: Arc<FitnessBroker>,
    receiver: oneshot::Receiver<Vec<f64>>,
}

impl PendingScores {
    /// Waits for the scores, or until `timeout` elapses.
    ///
    /// The slot is gone by the time this returns.
    ///
    /// # Errors
    /// - [`EvolutionError::FitnessTimeout`] when no scores arrive in time
    /// - [`EvolutionError::EvaluationAbandoned`] if the slot was closed
    ///   without scores
    pub async fn wait(self, timeout: Duration) -> Result<Vec<f64>, EvolutionError> {
        self.wait_until(Instant::now() + timeout, timeout).await
    }

    /// Like [`PendingScores::wait`], but gives up at `deadline`.
    ///
    /// `timeout` is only reported in the [`EvolutionError::FitnessTimeout`].
    pub async fn wait_until(
        mut self,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<Vec<f64>, EvolutionError> {
        let task_id = self.task_id;
        match tokio::time::timeout_at(deadline, &mut self.receiver).await {
            Ok(Ok(scores)) => Ok(scores),
            Ok(Err(_)) => Err(EvolutionError::EvaluationAbandoned { task_id }),
            Err(_) => Err(EvolutionError::FitnessTimeout { task_id, timeout }),
        }
    }
}

impl Drop for PendingScores {
    fn drop(&mut self) {
        self.broker.release(self.task_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_delivers_scores() {
        let broker = Arc::new(FitnessBroker::new());
        let task = Uuid::new_v4();

        let pending = broker.register(task).unwrap();
        assert!(broker.is_pending(task));
        assert!(broker.resolve(task, vec![1.0, 2.0]));
        assert!(!broker.is_pending(task));

        let scores = pending.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(scores, vec![1.0, 2.0]);
        assert_eq!(broker.pending_count(), 0);
    }

    #[test]
    fn test_single_slot_per_task() {
        let broker = Arc::new(FitnessBroker::new());
        let task = Uuid::new_v4();

        let _first = broker.register(task).unwrap();
        let err = broker.register(task).unwrap_err();
        assert!(matches!(err, EvolutionError::EvaluationInFlight { .. }));

        // Other tasks are independent.
        let _other = broker.register(Uuid::new_v4()).unwrap();
        assert_eq!(broker.pending_count(), 2);
    }

    #[test]
    fn test_resolve_without_waiter() {
        let broker = FitnessBroker::new();
        assert!(!broker.resolve(Uuid::new_v4(), vec![0.0]));
    }

    #[test]
    fn test_drop_releases_slot() {
        let broker = Arc::new(FitnessBroker::new());
        let task = Uuid::new_v4();
        {
            let _pending = broker.register(task).unwrap();
            assert!(broker.is_pending(task));
        }
        assert!(!broker.is_pending(task));
        assert!(broker.register(task).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_releases_slot() {
        let broker = Arc::new(FitnessBroker::new());
        let task = Uuid::new_v4();
        let pending = broker.register(task).unwrap();

        let started = Instant::now();
        let err = pending.wait(Duration::from_secs(120)).await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, EvolutionError::FitnessTimeout { .. }));
        assert!(elapsed >= Duration::from_secs(120));
        assert!(elapsed < Duration::from_secs(121));
        assert!(!broker.is_pending(task));

        // A late answer finds nothing to resolve.
        assert!(!broker.resolve(task, vec![1.0]));
    }
}
