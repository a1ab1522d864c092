//! Error types for configuration, evolution, and task orchestration.

use std::time::Duration;
use uuid::Uuid;

/// Invalid task or engine configuration.
///
/// Raised before an engine is constructed; no task is registered.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be in [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("problem kind `tsp` requires a `cities` parameter")]
    MissingCities,

    #[error("invalid `cities` parameter: {0}")]
    InvalidCities(String),

    #[error("{cities} cities cannot cover a tour of dimension {dimension}")]
    TooFewCities { cities: usize, dimension: usize },

    #[error("tournament size must be at least 1")]
    InvalidTournamentSize,
}

/// Failure of a single generation.
///
/// Every variant is terminal for the engine that produced it: the engine
/// moves to [`EngineState::Failed`](crate::ga::EngineState::Failed) and the
/// error is returned to the driver.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("task {task_id}: no channel available for remote fitness evaluation")]
    RemoteChannelUnavailable { task_id: Uuid },

    #[error("task {task_id}: remote fitness evaluation timed out after {timeout:?}")]
    FitnessTimeout { task_id: Uuid, timeout: Duration },

    #[error("received {actual} fitness values for a population of {expected}")]
    FitnessShapeMismatch { expected: usize, actual: usize },

    #[error("operator invariant violated: {0}")]
    OperatorInvariantViolation(String),

    #[error("task {task_id}: a remote evaluation is already pending")]
    EvaluationInFlight { task_id: Uuid },

    #[error("task {task_id}: remote evaluation abandoned before scores arrived")]
    EvaluationAbandoned { task_id: Uuid },

    #[error("progress channel closed")]
    ChannelClosed,

    #[error("failed to encode message: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Task lifecycle errors surfaced at the orchestrator boundary.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("maximum concurrent tasks reached ({max_tasks})")]
    CapacityExceeded { max_tasks: usize },

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("task {0} not found")]
    NotFound(Uuid),

    #[error("task {0} is already running")]
    AlreadyRunning(Uuid),
}
