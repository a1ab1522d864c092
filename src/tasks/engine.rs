//! The closed set of engines a task can own.

use super::config::{OrchestratorConfig, TaskRequest};
use crate::error::{ConfigError, EvolutionError};
use crate::ga::{
    ActionEncoding, EngineState, Evolution, FitnessBroker, LocalEvaluator, MessageSink,
    ProblemKind, RemoteEvaluator, RunSummary, Sphere, TourEncoding, TourLength, VectorEncoding,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

pub type TourEvolution = Evolution<TourEncoding, LocalEvaluator<TourLength>>;
pub type ActionEvolution = Evolution<ActionEncoding, RemoteEvaluator>;
pub type VectorEvolution = Evolution<VectorEncoding, LocalEvaluator<Sphere>>;

/// One task's engine, dispatched on [`ProblemKind`].
pub enum Engine {
    Tour(TourEvolution),
    Actions(ActionEvolution),
    Vector(VectorEvolution),
}

/// Final result of a completed run, with fitness in display units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineReport {
    pub generations: usize,
    pub best_fitness: f64,
    pub best_solution: serde_json::Value,
}

impl Engine {
    /// Builds the engine a validated request asks for.
    pub fn build(
        task_id: Uuid,
        request: &TaskRequest,
        limits: &OrchestratorConfig,
    ) -> Result<Self, ConfigError> {
        let config = request.evolution_config(limits);
        let dimension = request.dimension;
        let kind = request.problem_kind;

        let engine = match kind {
            ProblemKind::Tsp => {
                let scorer = TourLength::from_cities(request.cities()?, dimension)?;
                let evaluator = LocalEvaluator::new(scorer).with_parallel(config.parallel);
                Engine::Tour(Evolution::new(
                    task_id,
                    kind,
                    TourEncoding::new(dimension),
                    evaluator,
                    config,
                )?)
            }
            ProblemKind::Gpa => {
                let evaluator = RemoteEvaluator::new(task_id).with_timeout(limits.fitness_timeout);
                Engine::Actions(Evolution::new(
                    task_id,
                    kind,
                    ActionEncoding::new(dimension),
                    evaluator,
                    config,
                )?)
            }
            ProblemKind::Function => {
                let evaluator = LocalEvaluator::new(Sphere).with_parallel(config.parallel);
                Engine::Vector(Evolution::new(
                    task_id,
                    kind,
                    VectorEncoding::new(dimension),
                    evaluator,
                    config,
                )?)
            }
        };
        Ok(engine)
    }

    pub fn task_id(&self) -> Uuid {
        match self {
            Engine::Tour(e) => e.task_id(),
            Engine::Actions(e) => e.task_id(),
            Engine::Vector(e) => e.task_id(),
        }
    }

    pub fn kind(&self) -> ProblemKind {
        match self {
            Engine::Tour(e) => e.kind(),
            Engine::Actions(e) => e.kind(),
            Engine::Vector(e) => e.kind(),
        }
    }

    pub fn state(&self) -> EngineState {
        match self {
            Engine::Tour(e) => e.state(),
            Engine::Actions(e) => e.state(),
            Engine::Vector(e) => e.state(),
        }
    }

    pub fn generation(&self) -> usize {
        match self {
            Engine::Tour(e) => e.generation(),
            Engine::Actions(e) => e.generation(),
            Engine::Vector(e) => e.generation(),
        }
    }

    pub fn population_size(&self) -> usize {
        match self {
            Engine::Tour(e) => e.population().len(),
            Engine::Actions(e) => e.population().len(),
            Engine::Vector(e) => e.population().len(),
        }
    }

    /// Where client scores for this task are delivered, for remote kinds.
    pub fn fitness_broker(&self) -> Option<Arc<FitnessBroker>> {
        match self {
            Engine::Actions(e) => Some(e.evaluator().broker()),
            Engine::Tour(_) | Engine::Vector(_) => None,
        }
    }

    /// Runs the engine to completion. See [`Evolution::evolve`].
    pub async fn evolve(&mut self, sink: &MessageSink) -> Result<EngineReport, EvolutionError> {
        let sign = self.kind().display_sign();
        match self {
            Engine::Tour(e) => report(e.evolve(sink).await?, sign),
            Engine::Actions(e) => report(e.evolve(sink).await?, sign),
            Engine::Vector(e) => report(e.evolve(sink).await?, sign),
        }
    }
}

fn report<G: Serialize>(summary: RunSummary<G>, sign: f64) -> Result<EngineReport, EvolutionError> {
    let (best_fitness, best_solution) = match summary.best {
        Some(best) => (sign * best.fitness, serde_json::to_value(&best.genome)?),
        None => (f64::NAN, serde_json::Value::Null),
    };
    Ok(EngineReport {
        generations: summary.generations,
        best_fitness,
        best_solution,
    })
}
