//! Directory of live tasks.
//!
//! Admission runs under one lock: sweep expired tasks, check capacity, then
//! build and register the engine. A registered entry holds its engine until a
//! driver checks it out with [`Orchestrator::start`]; the entry itself stays
//! until [`Orchestrator::remove`] or the TTL sweep deletes it.

use super::config::{OrchestratorConfig, TaskRequest};
use super::engine::Engine;
use crate::error::TaskError;
use crate::ga::EngineState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Admission receipt returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskTicket {
    pub task_id: Uuid,
    pub status: EngineState,
    pub created_at: DateTime<Utc>,
}

/// Point-in-time view of a registered task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSnapshot {
    pub task_id: Uuid,
    pub status: EngineState,
    pub created_at: DateTime<Utc>,
    /// Seconds since admission.
    pub age_secs: f64,
    pub config: TaskRequest,
}

struct TaskMetadata {
    created_at: DateTime<Utc>,
    admitted: Instant,
    status: EngineState,
    config: TaskRequest,
}

struct TaskEntry {
    /// `None` while a driver runs the engine.
    engine: Option<Engine>,
    metadata: TaskMetadata,
}

/// Owner of every task of one server process.
pub struct Orchestrator {
    config: OrchestratorConfig,
    tasks: Mutex<HashMap<Uuid, TaskEntry>>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(OrchestratorConfig::default())
    }
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Validates `request` and registers a new task for it.
    ///
    /// # Errors
    /// - [`TaskError::Configuration`] if the request is invalid
    /// - [`TaskError::CapacityExceeded`] if `max_tasks` tasks remain after the sweep
    pub async fn create_task(&self, request: TaskRequest) -> Result<TaskTicket, TaskError> {
        request.validate()?;

        let mut tasks = self.tasks.lock().await;
        self.sweep(&mut tasks);

        if tasks.len() >= self.config.max_tasks {
            warn!(
                max_tasks = self.config.max_tasks,
                "task rejected: capacity exceeded"
            );
            return Err(TaskError::CapacityExceeded {
                max_tasks: self.config.max_tasks,
            });
        }

        let task_id = Uuid::new_v4();
        let engine = Engine::build(task_id, &request, &self.config)?;
        let created_at = Utc::now();
        info!(
            %task_id,
            kind = %request.problem_kind,
            active = tasks.len() + 1,
            "task created"
        );

        tasks.insert(
            task_id,
            TaskEntry {
                engine: Some(engine),
                metadata: TaskMetadata {
                    created_at,
                    admitted: Instant::now(),
                    status: EngineState::Pending,
                    config: request,
                },
            },
        );

        Ok(TaskTicket {
            task_id,
            status: EngineState::Pending,
            created_at,
        })
    }

    /// Drops every task older than the TTL, whatever its status.
    fn sweep(&self, tasks: &mut HashMap<Uuid, TaskEntry>) {
        let now = Instant::now();
        let ttl = self.config.task_ttl;
        tasks.retain(|task_id, entry| {
            let age = now.duration_since(entry.metadata.admitted);
            let keep = age <= ttl;
            if !keep {
                info!(%task_id, age_secs = age.as_secs_f64(), "expired task removed");
            }
            keep
        });
    }

    /// Checks out the engine of `task_id` for running and marks the task running.
    ///
    /// # Errors
    /// - [`TaskError::NotFound`] if no such task is registered
    /// - [`TaskError::AlreadyRunning`] if another driver holds the engine
    pub async fn start(&self, task_id: Uuid) -> Result<Engine, TaskError> {
        let mut tasks = self.tasks.lock().await;
        let entry = tasks.get_mut(&task_id).ok_or(TaskError::NotFound(task_id))?;
        let engine = entry
            .engine
            .take()
            .ok_or(TaskError::AlreadyRunning(task_id))?;
        entry.metadata.status = EngineState::Running;
        debug!(%task_id, "task started");
        Ok(engine)
    }

    /// Deletes every trace of `task_id`. Returns `false` if it was already gone.
    pub async fn remove(&self, task_id: Uuid) -> bool {
        let removed = self.tasks.lock().await.remove(&task_id).is_some();
        if removed {
            info!(%task_id, "task removed");
        }
        removed
    }

    pub async fn snapshot(&self, task_id: Uuid) -> Option<TaskSnapshot> {
        let tasks = self.tasks.lock().await;
        let entry = tasks.get(&task_id)?;
        let meta = &entry.metadata;
        Some(TaskSnapshot {
            task_id,
            status: meta.status,
            created_at: meta.created_at,
            age_secs: meta.admitted.elapsed().as_secs_f64(),
            config: meta.config.clone(),
        })
    }

    pub async fn contains(&self, task_id: Uuid) -> bool {
        self.tasks.lock().await.contains_key(&task_id)
    }

    /// Number of registered tasks, running or not.
    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::ga::ProblemKind;
    use std::time::Duration;

    fn request() -> TaskRequest {
        TaskRequest::new(ProblemKind::Function)
    }

    #[tokio::test]
    async fn test_capacity_contract() {
        let orch = Orchestrator::new(OrchestratorConfig::default().with_max_tasks(3));
        for _ in 0..3 {
            orch.create_task(request()).await.unwrap();
        }

        let err = orch.create_task(request()).await.unwrap_err();
        assert!(matches!(err, TaskError::CapacityExceeded { max_tasks: 3 }));
        assert_eq!(orch.len().await, 3);
    }

    #[tokio::test]
    async fn test_removal_frees_capacity() {
        let orch = Orchestrator::new(OrchestratorConfig::default().with_max_tasks(1));
        let ticket = orch.create_task(request()).await.unwrap();
        assert!(orch.create_task(request()).await.is_err());

        assert!(orch.remove(ticket.task_id).await);
        assert!(!orch.remove(ticket.task_id).await);
        assert!(orch.create_task(request()).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_request_not_registered() {
        let orch = Orchestrator::default();
        let err = orch
            .create_task(TaskRequest::new(ProblemKind::Tsp))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TaskError::Configuration(ConfigError::MissingCities)
        ));
        assert!(orch.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_sweep() {
        let orch = Orchestrator::new(OrchestratorConfig::default().with_max_tasks(10));
        let old = orch.create_task(request()).await.unwrap().task_id;

        tokio::time::advance(Duration::from_secs(3599)).await;
        let young = orch.create_task(request()).await.unwrap().task_id;
        assert!(orch.contains(old).await, "3599 s old task must survive");

        tokio::time::advance(Duration::from_millis(1500)).await;
        orch.create_task(request()).await.unwrap();
        assert!(!orch.contains(old).await, "task older than 3600 s must be swept");
        assert!(orch.contains(young).await);
        assert_eq!(orch.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_ignores_status() {
        let orch = Orchestrator::default();
        let running = orch.create_task(request()).await.unwrap().task_id;
        let _engine = orch.start(running).await.unwrap();

        tokio::time::advance(Duration::from_secs(3601)).await;
        orch.create_task(request()).await.unwrap();
        assert!(!orch.contains(running).await);
    }

    #[tokio::test]
    async fn test_start_checks_out_engine_once() {
        let orch = Orchestrator::default();
        let ticket = orch.create_task(request()).await.unwrap();
        assert_eq!(ticket.status, EngineState::Pending);

        let engine = orch.start(ticket.task_id).await.unwrap();
        assert_eq!(engine.task_id(), ticket.task_id);
        assert!(matches!(
            orch.start(ticket.task_id).await,
            Err(TaskError::AlreadyRunning(_))
        ));
        assert!(matches!(
            orch.start(Uuid::new_v4()).await,
            Err(TaskError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot() {
        let orch = Orchestrator::default();
        let ticket = orch.create_task(request().with_seed(3)).await.unwrap();

        let snap = orch.snapshot(ticket.task_id).await.unwrap();
        assert_eq!(snap.status, EngineState::Pending);
        assert_eq!(snap.created_at, ticket.created_at);
        assert_eq!(snap.config.seed, Some(3));

        orch.start(ticket.task_id).await.unwrap();
        let snap = orch.snapshot(ticket.task_id).await.unwrap();
        assert_eq!(snap.status, EngineState::Running);

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["status"], "running");
        assert!(orch.snapshot(Uuid::new_v4()).await.is_none());
    }
}
