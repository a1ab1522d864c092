//! Generation loop execution.
//!
//! [`Evolution`] drives one task's population through
//! evaluate → track best → select → crossover → mutate → report → throttle,
//! strictly one generation at a time.

use super::config::EvolutionConfig;
use super::fitness::FitnessEvaluator;
use super::messages::{MessageSink, ProgressUpdate, ServerMessage};
use super::selection::select_parents;
use super::types::{BestSolution, BestTracker, Encoding, Population, ProblemKind};
use crate::error::{ConfigError, EvolutionError};
use crate::random::rng_from_seed;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Lifecycle of an engine: `Pending → Running → {Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[serde(rename = "initialized")]
    Pending,
    Running,
    Completed,
    Failed,
}

impl EngineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, EngineState::Completed | EngineState::Failed)
    }
}

/// Fitness statistics of one evaluated generation, in internal (maximized) units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationStats {
    pub generation: usize,
    /// Best fitness observed so far, across all generations.
    pub best_fitness: f64,
    pub mean_fitness: f64,
    /// Population standard deviation of this generation's fitness.
    pub std_dev: f64,
}

impl GenerationStats {
    pub fn new(generation: usize, fitness: &[f64], best_fitness: f64) -> Self {
        let n = fitness.len().max(1) as f64;
        let mean_fitness = fitness.iter().sum::<f64>() / n;
        let variance = fitness
            .iter()
            .map(|f| (f - mean_fitness).powi(2))
            .sum::<f64>()
            / n;

        Self {
            generation,
            best_fitness,
            mean_fitness,
            std_dev: variance.sqrt(),
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary<G> {
    /// Total number of generations executed.
    pub generations: usize,

    /// The best individual found during the entire run.
    pub best: Option<BestSolution<G>>,

    /// Best fitness at the end of each generation.
    pub fitness_history: Vec<f64>,
}

/// The evolutionary engine of one task.
///
/// # Usage
///
/// ```ignore
/// let encoding = TourEncoding::new(4);
/// let evaluator = LocalEvaluator::new(TourLength::new(cities, 4)?);
/// let config = EvolutionConfig::default().with_seed(42);
/// let mut evolution = Evolution::new(task_id, ProblemKind::Tsp, encoding, evaluator, config)?;
/// let summary = evolution.evolve(&sink).await?;
/// ```
pub struct Evolution<E: Encoding, F> {
    task_id: Uuid,
    kind: ProblemKind,
    encoding: E,
    evaluator: F,
    config: EvolutionConfig,
    population: Population<E::Genome>,
    best: BestTracker<E::Genome>,
    fitness_history: Vec<f64>,
    state: EngineState,
    rng: StdRng,
}

impl<E, F> Evolution<E, F>
where
    E: Encoding,
    F: FitnessEvaluator<E::Genome>,
{
    /// Validates `config` and draws the generation-0 population.
    pub fn new(
        task_id: Uuid,
        kind: ProblemKind,
        encoding: E,
        evaluator: F,
        config: EvolutionConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut rng = rng_from_seed(config.seed);
        let population = encoding.initialize(config.population_size, &mut rng);

        Ok(Self {
            task_id,
            kind,
            encoding,
            evaluator,
            fitness_history: Vec::with_capacity(config.max_generations),
            config,
            population,
            best: BestTracker::new(),
            state: EngineState::Pending,
            rng,
        })
    }

    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    pub fn kind(&self) -> ProblemKind {
        self.kind
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Index of the generation about to be evaluated.
    pub fn generation(&self) -> usize {
        self.population.generation()
    }

    pub fn population(&self) -> &Population<E::Genome> {
        &self.population
    }

    pub fn best(&self) -> Option<&BestSolution<E::Genome>> {
        self.best.best()
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &F {
        &self.evaluator
    }

    /// Runs generations until `max_generations` is reached.
    ///
    /// A progress update is sent on `sink` after every generation. The first
    /// error stops the loop, leaves the engine [`EngineState::Failed`], and is
    /// returned.
    pub async fn evolve(
        &mut self,
        sink: &MessageSink,
    ) -> Result<RunSummary<E::Genome>, EvolutionError> {
        self.state = EngineState::Running;
        info!(
            task_id = %self.task_id,
            kind = %self.kind,
            population = self.config.population_size,
            generations = self.config.max_generations,
            "evolution started"
        );

        match self.run_generations(sink).await {
            Ok(()) => {
                self.state = EngineState::Completed;
                info!(
                    task_id = %self.task_id,
                    best_fitness = self.kind.display_sign() * self.best.fitness(),
                    "evolution completed"
                );
                Ok(RunSummary {
                    generations: self.generation(),
                    best: self.best.best().cloned(),
                    fitness_history: self.fitness_history.clone(),
                })
            }
            Err(e) => {
                self.state = EngineState::Failed;
                error!(
                    task_id = %self.task_id,
                    generation = self.generation(),
                    error = %e,
                    "evolution failed"
                );
                Err(e)
            }
        }
    }

    async fn run_generations(&mut self, sink: &MessageSink) -> Result<(), EvolutionError> {
        while self.generation() < self.config.max_generations {
            let update = self.step(sink).await?;
            sink.send(ServerMessage::Progress(update))
                .await
                .map_err(|_| EvolutionError::ChannelClosed)?;

            if !self.config.throttle.is_zero() {
                tokio::time::sleep(self.config.throttle).await;
            }
        }
        Ok(())
    }

    /// Runs one generation and returns its progress report.
    ///
    /// On return the population has been replaced by the next generation.
    pub async fn step(&mut self, sink: &MessageSink) -> Result<ProgressUpdate, EvolutionError> {
        let fitness = self.evaluator.evaluate(&self.population, sink).await?;
        if fitness.len() != self.population.len() {
            return Err(EvolutionError::FitnessShapeMismatch {
                expected: self.population.len(),
                actual: fitness.len(),
            });
        }

        if self.best.observe(&self.population, &fitness) {
            debug!(
                task_id = %self.task_id,
                generation = self.generation(),
                best_fitness = self.best.fitness(),
                "new best solution"
            );
        }
        self.fitness_history.push(self.best.fitness());

        let stats = GenerationStats::new(self.generation(), &fitness, self.best.fitness());
        let next = self.reproduce(&fitness)?;
        let update = self.progress(&stats)?;
        self.population = next;

        Ok(update)
    }

    /// Builds the next generation from the current one.
    fn reproduce(&mut self, fitness: &[f64]) -> Result<Population<E::Genome>, EvolutionError> {
        let (parents1, parents2) = select_parents(&self.config.selection, fitness, &mut self.rng);
        let parents = self.population.individuals();

        let mut offspring = Vec::with_capacity(parents.len());
        for (&a, &b) in parents1.iter().zip(&parents2) {
            let mut child = if self.rng.random_range(0.0..1.0) < self.config.crossover_rate {
                self.encoding
                    .crossover(&parents[a], &parents[b], &mut self.rng)?
            } else {
                parents[a].clone()
            };

            if self.rng.random_range(0.0..1.0) < self.config.mutation_rate {
                self.encoding.mutate(&mut child, &mut self.rng);
            }
            offspring.push(child);
        }

        Ok(Population::new(offspring, self.population.generation() + 1))
    }

    fn progress(&self, stats: &GenerationStats) -> Result<ProgressUpdate, EvolutionError> {
        let sign = self.kind.display_sign();
        let best_solution = match self.best.best() {
            Some(best) => serde_json::to_value(&best.genome)?,
            None => serde_json::Value::Null,
        };

        Ok(ProgressUpdate {
            task_id: self.task_id,
            generation: stats.generation,
            best_fitness: sign * stats.best_fitness,
            best_solution,
            average_fitness: sign * stats.mean_fitness,
            population_diversity: stats.std_dev,
            status: EngineState::Running,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::encoding::{ActionEncoding, TourEncoding, VectorEncoding};
    use crate::ga::fitness::{LocalEvaluator, RemoteEvaluator, Sphere, TourLength};
    use crate::ga::messages::ClientMessage;
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn unit_square() -> Vec<[f64; 2]> {
        vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]
    }

    fn quick(pop: usize, gens: usize) -> EvolutionConfig {
        EvolutionConfig::default()
            .with_population_size(pop)
            .with_max_generations(gens)
            .with_throttle(Duration::ZERO)
            .with_seed(42)
    }

    fn tsp(
        cities: Vec<[f64; 2]>,
        config: EvolutionConfig,
    ) -> Evolution<TourEncoding, LocalEvaluator<TourLength>> {
        let dim = cities.len();
        let scorer = TourLength::new(cities, dim).unwrap();
        Evolution::new(
            Uuid::new_v4(),
            ProblemKind::Tsp,
            TourEncoding::new(dim),
            LocalEvaluator::new(scorer),
            config,
        )
        .unwrap()
    }

    fn sphere(dim: usize, config: EvolutionConfig) -> Evolution<VectorEncoding, LocalEvaluator<Sphere>> {
        Evolution::new(
            Uuid::new_v4(),
            ProblemKind::Function,
            VectorEncoding::new(dim),
            LocalEvaluator::new(Sphere),
            config,
        )
        .unwrap()
    }

    fn is_permutation(tour: &[usize], n: usize) -> bool {
        let set: HashSet<usize> = tour.iter().copied().collect();
        tour.len() == n && set.len() == n && tour.iter().all(|&c| c < n)
    }

    #[test]
    fn test_generation_stats() {
        let stats = GenerationStats::new(2, &[1.0, 3.0], 3.0);
        assert_eq!(stats.generation, 2);
        assert!((stats.mean_fitness - 2.0).abs() < 1e-12);
        assert!((stats.std_dev - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = Evolution::new(
            Uuid::new_v4(),
            ProblemKind::Function,
            VectorEncoding::new(3),
            LocalEvaluator::new(Sphere),
            quick(10, 0),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_shape_and_permutation_invariant() {
        let cities: Vec<[f64; 2]> = (0..9).map(|i| [i as f64, (i * i % 7) as f64]).collect();
        let mut evo = tsp(cities, quick(25, 40).with_mutation_rate(0.5));
        let (sink, _rx) = mpsc::channel(64);

        assert_eq!(evo.state(), EngineState::Pending);
        for gen in 0..40 {
            assert_eq!(evo.generation(), gen);
            assert_eq!(evo.population().len(), 25);
            assert!(evo.population().iter().all(|t| is_permutation(t, 9)));
            evo.step(&sink).await.unwrap();
        }
        assert_eq!(evo.generation(), 40);
    }

    #[tokio::test]
    async fn test_monotonic_best() {
        let mut evo = sphere(6, quick(20, 50).with_mutation_rate(0.3));
        let (sink, mut rx) = mpsc::channel(64);

        let summary = evo.evolve(&sink).await.unwrap();
        assert_eq!(summary.generations, 50);
        assert_eq!(summary.fitness_history.len(), 50);
        for w in summary.fitness_history.windows(2) {
            assert!(w[1] >= w[0], "best regressed: {} < {}", w[1], w[0]);
        }

        // Displayed best is the sphere value, never increasing.
        let mut last = f64::INFINITY;
        while let Ok(ServerMessage::Progress(update)) = rx.try_recv() {
            assert!(update.best_fitness <= last);
            last = update.best_fitness;
        }
    }

    #[tokio::test]
    async fn test_crossover_rate_zero_copies_parent() {
        let mut evo = sphere(4, quick(15, 1).with_crossover_rate(0.0).with_mutation_rate(0.0));
        let (sink, _rx) = mpsc::channel(4);
        let before = evo.population().clone();

        // Sphere scoring draws nothing, so a cloned rng replays the selection.
        let fitness = evo.evaluator().score_all(&before);
        let mut replay = evo.rng.clone();
        let (parents1, _) = select_parents(&evo.config().selection, &fitness, &mut replay);

        evo.step(&sink).await.unwrap();
        let children = evo.population().individuals();
        assert_eq!(children.len(), parents1.len());
        for (child, &p1) in children.iter().zip(&parents1) {
            assert_eq!(child, &before.individuals()[p1]);
        }
    }

    /// Vector encoding whose crossover always breaks.
    struct BrokenCrossover;

    impl Encoding for BrokenCrossover {
        type Genome = Vec<f64>;

        fn dimension(&self) -> usize {
            3
        }

        fn create_genome<R: Rng>(&self, rng: &mut R) -> Vec<f64> {
            (0..3).map(|_| rng.random_range(0.0..1.0)).collect()
        }

        fn crossover<R: Rng>(
            &self,
            _parent1: &Vec<f64>,
            _parent2: &Vec<f64>,
            _rng: &mut R,
        ) -> Result<Vec<f64>, EvolutionError> {
            Err(EvolutionError::OperatorInvariantViolation(
                "offspring left incomplete".into(),
            ))
        }

        fn mutate<R: Rng>(&self, _genome: &mut Vec<f64>, _rng: &mut R) {}
    }

    #[tokio::test]
    async fn test_crossover_violation_fails_engine() {
        let mut evo = Evolution::new(
            Uuid::new_v4(),
            ProblemKind::Function,
            BrokenCrossover,
            LocalEvaluator::new(Sphere),
            quick(10, 3).with_crossover_rate(1.0),
        )
        .unwrap();
        let (sink, mut rx) = mpsc::channel(8);

        let err = evo.evolve(&sink).await.unwrap_err();
        assert!(matches!(err, EvolutionError::OperatorInvariantViolation(_)));
        assert_eq!(evo.state(), EngineState::Failed);
        assert_eq!(evo.generation(), 0);
        // The failed generation never reports progress.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_mutation_saturation_stays_in_unit_box() {
        let mut evo = sphere(5, quick(20, 1).with_mutation_rate(1.0));
        let (sink, _rx) = mpsc::channel(16);

        for _ in 0..10 {
            evo.step(&sink).await.unwrap();
            for v in evo.population().iter() {
                assert_eq!(v.len(), 5);
                assert!(v.iter().all(|x| (0.0..=1.0).contains(x)));
            }
        }
    }

    #[tokio::test]
    async fn test_tsp_unit_square_converges() {
        let mut evo = tsp(unit_square(), quick(20, 30));
        let (sink, mut rx) = mpsc::channel(64);

        let summary = evo.evolve(&sink).await.unwrap();
        let best = summary.best.unwrap();
        assert!((best.fitness + 4.0).abs() < 1e-9);
        assert!(is_permutation(&best.genome, 4));
        assert_eq!(evo.state(), EngineState::Completed);

        let mut generations = Vec::new();
        while let Ok(ServerMessage::Progress(update)) = rx.try_recv() {
            assert_eq!(update.status, EngineState::Running);
            generations.push(update.generation);
            if update.generation == 29 {
                assert!((update.best_fitness - 4.0).abs() < 1e-9);
            }
        }
        assert_eq!(generations, (0..30).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_between_generations() {
        let mut evo = sphere(2, quick(10, 3).with_throttle(Duration::from_millis(100)));
        let (sink, _rx) = mpsc::channel(8);

        let started = tokio::time::Instant::now();
        evo.evolve(&sink).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_closed_progress_channel_fails_run() {
        let mut evo = sphere(2, quick(10, 3));
        let (sink, rx) = mpsc::channel(8);
        drop(rx);

        let err = evo.evolve(&sink).await.unwrap_err();
        assert!(matches!(err, EvolutionError::ChannelClosed));
        assert_eq!(evo.state(), EngineState::Failed);
    }

    fn remote(task_id: Uuid, pop: usize, dim: usize) -> Evolution<ActionEncoding, RemoteEvaluator> {
        Evolution::new(
            task_id,
            ProblemKind::Gpa,
            ActionEncoding::new(dim),
            RemoteEvaluator::new(task_id),
            quick(pop, 5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_remote_generation_advances() {
        let task_id = Uuid::new_v4();
        let mut evo = remote(task_id, 10, 3);
        let broker = evo.evaluator().broker();
        let (sink, mut rx) = mpsc::channel(8);

        let client = tokio::spawn(async move {
            let Some(ServerMessage::Evaluate(req)) = rx.recv().await else {
                panic!("expected an evaluation request");
            };
            assert_eq!(req.population.len(), 10);
            assert!(req.population.iter().all(|seq| seq.len() == 3));

            let reply = format!(
                r#"{{"type":"FITNESS_RESULTS","taskId":"{task_id}","scores":[1,2,3,4,5,6,7,8,9,10]}}"#
            );
            let ClientMessage::FitnessResults {
                scores: Some(scores),
                ..
            } = ClientMessage::parse(&reply).unwrap()
            else {
                panic!("scores missing");
            };
            assert!(broker.resolve(task_id, scores));
        });

        let update = evo.step(&sink).await.unwrap();
        client.await.unwrap();

        assert_eq!(update.generation, 0);
        assert_eq!(update.best_fitness, 10.0);
        assert_eq!(evo.generation(), 1);
        assert_eq!(evo.evaluator().broker().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_remote_mismatch_fails_engine() {
        let task_id = Uuid::new_v4();
        let mut evo = remote(task_id, 10, 3);
        let broker = evo.evaluator().broker();
        let (sink, mut rx) = mpsc::channel(8);

        tokio::spawn(async move {
            rx.recv().await;
            broker.resolve(task_id, vec![1.0; 9]);
        });

        let err = evo.evolve(&sink).await.unwrap_err();
        assert!(matches!(
            err,
            EvolutionError::FitnessShapeMismatch {
                expected: 10,
                actual: 9
            }
        ));
        assert_eq!(evo.state(), EngineState::Failed);
        assert_eq!(evo.generation(), 0);
        assert_eq!(evo.evaluator().broker().pending_count(), 0);
    }
}
