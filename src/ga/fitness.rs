//! Fitness evaluation strategies.
//!
//! - [`LocalEvaluator`]: deterministic scoring through a [`LocalScorer`]
//!   ([`TourLength`], [`Sphere`]).
//! - [`RemoteEvaluator`]: ships the population to the client and waits for
//!   its scores through a [`FitnessBroker`] slot.
//!
//! Fitness is always maximized; costs are returned negated.

use super::correlation::FitnessBroker;
use super::messages::{EvaluationRequest, MessageSink, ServerMessage};
use super::types::{ActionSequence, City, Population, RealVector, Step, Tour};
use crate::error::{ConfigError, EvolutionError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Default wait for remote scores.
pub const DEFAULT_FITNESS_TIMEOUT: Duration = Duration::from_secs(120);

/// Produces one fitness value per individual, index-aligned with the population.
pub trait FitnessEvaluator<G>: Send {
    /// Scores every individual of `population`.
    ///
    /// `sink` is the task's outbound channel; only remote strategies use it.
    fn evaluate(
        &mut self,
        population: &Population<G>,
        sink: &MessageSink,
    ) -> impl Future<Output = Result<Vec<f64>, EvolutionError>> + Send;
}

/// Pure per-genome scoring function.
pub trait LocalScorer<G>: Send + Sync {
    fn score(&self, genome: &G) -> f64;
}

// ============================================================================
// Scorers
// ============================================================================

/// Negative closed-tour Euclidean length over a city table.
#[derive(Debug, Clone, PartialEq)]
pub struct TourLength {
    cities: Vec<City>,
}

impl TourLength {
    /// # Errors
    /// [`ConfigError::TooFewCities`] if the table cannot index every gene of a
    /// `dimension`-long tour.
    pub fn new(cities: Vec<City>, dimension: usize) -> Result<Self, ConfigError> {
        if cities.len() < dimension {
            return Err(ConfigError::TooFewCities {
                cities: cities.len(),
                dimension,
            });
        }
        Ok(Self { cities })
    }

    /// Degenerate instance with city `i` at `(i, i)`.
    pub fn diagonal(dimension: usize) -> Self {
        let cities = (0..dimension).map(|i| [i as f64, i as f64]).collect();
        Self { cities }
    }

    /// Uses `cities` when given, otherwise [`TourLength::diagonal`].
    pub fn from_cities(cities: Option<Vec<City>>, dimension: usize) -> Result<Self, ConfigError> {
        match cities {
            Some(cities) => Self::new(cities, dimension),
            None => Ok(Self::diagonal(dimension)),
        }
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    /// Length of the closed tour, returning to the first city.
    pub fn length(&self, tour: &[usize]) -> f64 {
        let n = tour.len();
        (0..n)
            .map(|i| {
                let a = self.cities[tour[i]];
                let b = self.cities[tour[(i + 1) % n]];
                ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
            })
            .sum()
    }
}

impl LocalScorer<Tour> for TourLength {
    fn score(&self, genome: &Tour) -> f64 {
        -self.length(genome)
    }
}

/// Negative sphere function, maximal at the origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sphere;

impl LocalScorer<RealVector> for Sphere {
    fn score(&self, genome: &RealVector) -> f64 {
        -genome.iter().map(|x| x * x).sum::<f64>()
    }
}

// ============================================================================
// Local evaluation
// ============================================================================

/// Scores populations in-process with a [`LocalScorer`].
#[derive(Debug, Clone)]
pub struct LocalEvaluator<S> {
    scorer: S,
    #[cfg_attr(not(feature = "parallel"), allow(dead_code))]
    parallel: bool,
}

impl<S> LocalEvaluator<S> {
    pub fn new(scorer: S) -> Self {
        Self {
            scorer,
            parallel: false,
        }
    }

    /// Enables rayon evaluation. Has no effect without the `parallel` feature.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    /// Scores every individual synchronously.
    pub fn score_all<G>(&self, population: &Population<G>) -> Vec<f64>
    where
        G: Sync,
        S: LocalScorer<G>,
    {
        #[cfg(feature = "parallel")]
        if self.parallel {
            use rayon::prelude::*;
            return population
                .individuals()
                .par_iter()
                .map(|g| self.scorer.score(g))
                .collect();
        }

        population.iter().map(|g| self.scorer.score(g)).collect()
    }
}

impl<G, S> FitnessEvaluator<G> for LocalEvaluator<S>
where
    G: Send + Sync,
    S: LocalScorer<G>,
{
    async fn evaluate(
        &mut self,
        population: &Population<G>,
        _sink: &MessageSink,
    ) -> Result<Vec<f64>, EvolutionError> {
        Ok(self.score_all(population))
    }
}

// ============================================================================
// Remote evaluation
// ============================================================================

/// Delegates scoring of action sequences to the connected client.
///
/// Each call sends one [`EvaluationRequest`] and blocks on the task's
/// correlation slot until the scores arrive or the timeout elapses.
#[derive(Debug, Clone)]
pub struct RemoteEvaluator {
    task_id: Uuid,
    broker: Arc<FitnessBroker>,
    timeout: Duration,
}

impl RemoteEvaluator {
    pub fn new(task_id: Uuid) -> Self {
        Self {
            task_id,
            broker: Arc::new(FitnessBroker::new()),
            timeout: DEFAULT_FITNESS_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Broker the client's scores must be delivered to.
    pub fn broker(&self) -> Arc<FitnessBroker> {
        Arc::clone(&self.broker)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn request(&self, population: &Population<ActionSequence>) -> EvaluationRequest {
        let generation = population.generation();
        let population = population
            .iter()
            .map(|seq| {
                seq.iter()
                    .map(|step| Step {
                        action: step.action,
                        duration: round_millis(step.duration),
                    })
                    .collect()
            })
            .collect();

        EvaluationRequest {
            population,
            generation,
            task_id: self.task_id,
        }
    }
}

impl FitnessEvaluator<ActionSequence> for RemoteEvaluator {
    async fn evaluate(
        &mut self,
        population: &Population<ActionSequence>,
        sink: &MessageSink,
    ) -> Result<Vec<f64>, EvolutionError> {
        let task_id = self.task_id;
        if sink.is_closed() {
            error!(%task_id, "no client channel for remote fitness evaluation");
            return Err(EvolutionError::RemoteChannelUnavailable { task_id });
        }

        let request = self.request(population);
        // One deadline covers both the handoff and the wait for scores.
        let deadline = Instant::now() + self.timeout;

        // Open the slot before sending so an immediate reply has somewhere to land.
        let pending = self.broker.register(task_id)?;
        match timeout_at(deadline, sink.send(ServerMessage::Evaluate(request))).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                error!(%task_id, "client channel closed while sending population");
                return Err(EvolutionError::RemoteChannelUnavailable { task_id });
            }
            Err(_) => {
                error!(%task_id, "client stopped draining the population handoff");
                return Err(EvolutionError::FitnessTimeout {
                    task_id,
                    timeout: self.timeout,
                });
            }
        }
        info!(
            %task_id,
            generation = population.generation(),
            size = population.len(),
            "waiting for fitness results"
        );

        let scores = pending
            .wait_until(deadline, self.timeout)
            .await
            .inspect_err(|e| {
            error!(%task_id, error = %e, "remote fitness evaluation failed");
        })?;

        if scores.len() != population.len() {
            error!(
                %task_id,
                expected = population.len(),
                actual = scores.len(),
                "fitness result length mismatch"
            );
            return Err(EvolutionError::FitnessShapeMismatch {
                expected: population.len(),
                actual: scores.len(),
            });
        }

        debug!(%task_id, "fitness results received");
        Ok(scores)
    }
}

fn round_millis(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}
