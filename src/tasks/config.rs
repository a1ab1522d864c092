//! Task request and orchestrator configuration.

use crate::error::ConfigError;
use crate::ga::{City, EvolutionConfig, ProblemKind, Selection, DEFAULT_FITNESS_TIMEOUT};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Parameters of a new optimization task, as submitted by a client.
///
/// # Example
///
/// ```
/// use u_evostream::tasks::TaskRequest;
///
/// let request: TaskRequest = serde_json::from_str(
///     r#"{"problem_type": "tsp", "dimension": 3, "parameters": {"cities": [[0,0],[1,0],[1,1]]}}"#,
/// ).unwrap();
/// assert_eq!(request.population_size, 50);
/// assert!(request.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    #[serde(alias = "problem_type")]
    pub problem_kind: ProblemKind,

    /// Requested population, in `[10, 1000]`. The engine caps it further.
    #[serde(default = "default_population_size")]
    pub population_size: usize,

    /// Genes per individual, in `[2, 100]`.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,

    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,

    /// In `[1, 1000]`.
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,

    /// Problem-specific parameters. `tsp` requires `cities`, a list of `[x, y]`.
    #[serde(default)]
    pub parameters: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tournament_size: Option<usize>,
}

fn default_population_size() -> usize {
    50
}

fn default_dimension() -> usize {
    10
}

fn default_mutation_rate() -> f64 {
    0.1
}

fn default_crossover_rate() -> f64 {
    0.8
}

fn default_max_generations() -> usize {
    100
}

impl TaskRequest {
    /// A request with default parameters.
    pub fn new(problem_kind: ProblemKind) -> Self {
        Self {
            problem_kind,
            population_size: default_population_size(),
            dimension: default_dimension(),
            mutation_rate: default_mutation_rate(),
            crossover_rate: default_crossover_rate(),
            max_generations: default_max_generations(),
            parameters: Map::new(),
            seed: None,
            tournament_size: None,
        }
    }

    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    pub fn with_dimension(mut self, n: usize) -> Self {
        self.dimension = n;
        self
    }

    pub fn with_max_generations(mut self, n: usize) -> Self {
        self.max_generations = n;
        self
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate;
        self
    }

    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate;
        self
    }

    /// Sets `parameters.cities`.
    pub fn with_cities(mut self, cities: &[City]) -> Self {
        let cities = cities.iter().map(|&[x, y]| serde_json::json!([x, y])).collect();
        self.parameters.insert("cities".into(), Value::Array(cities));
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Checks field ranges and the parameters required by the problem kind.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("population_size", self.population_size as f64, 10.0, 1000.0)?;
        check_range("dimension", self.dimension as f64, 2.0, 100.0)?;
        check_range("mutation_rate", self.mutation_rate, 0.0, 1.0)?;
        check_range("crossover_rate", self.crossover_rate, 0.0, 1.0)?;
        check_range("max_generations", self.max_generations as f64, 1.0, 1000.0)?;
        if self.tournament_size == Some(0) {
            return Err(ConfigError::InvalidTournamentSize);
        }

        if self.problem_kind == ProblemKind::Tsp {
            let cities = self.cities()?.ok_or(ConfigError::MissingCities)?;
            if cities.len() < self.dimension {
                return Err(ConfigError::TooFewCities {
                    cities: cities.len(),
                    dimension: self.dimension,
                });
            }
        }
        Ok(())
    }

    /// Parses `parameters.cities`, if present.
    pub fn cities(&self) -> Result<Option<Vec<City>>, ConfigError> {
        match self.parameters.get("cities") {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| ConfigError::InvalidCities(e.to_string())),
        }
    }

    /// Engine parameters for this request under `limits`.
    pub fn evolution_config(&self, limits: &OrchestratorConfig) -> EvolutionConfig {
        let mut config = EvolutionConfig::default()
            .with_population_size(self.population_size.min(limits.population_cap))
            .with_max_generations(self.max_generations)
            .with_crossover_rate(self.crossover_rate)
            .with_mutation_rate(self.mutation_rate)
            .with_throttle(limits.generation_delay)
            .with_parallel(limits.parallel_evaluation);
        if let Some(k) = self.tournament_size {
            config = config.with_selection(Selection::Tournament(k));
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        config
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            min,
            max,
            value,
        })
    }
}

/// Limits and timings shared by every task of an [`Orchestrator`](super::Orchestrator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum number of registered tasks.
    pub max_tasks: usize,

    /// Age after which a task is swept at the next admission.
    pub task_ttl: Duration,

    /// How long a remote evaluation waits for the client's scores.
    pub fitness_timeout: Duration,

    /// Pause between generations.
    pub generation_delay: Duration,

    /// Upper bound applied to every requested population size.
    pub population_cap: usize,

    /// Buffer size of each direction of a [`connection`](super::connection).
    pub outbound_capacity: usize,

    /// Score local populations with rayon (requires the `parallel` feature).
    pub parallel_evaluation: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_tasks: 10,
            task_ttl: Duration::from_secs(3600),
            fitness_timeout: DEFAULT_FITNESS_TIMEOUT,
            generation_delay: Duration::from_millis(100),
            population_cap: 100,
            outbound_capacity: 64,
            parallel_evaluation: false,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_max_tasks(mut self, n: usize) -> Self {
        self.max_tasks = n;
        self
    }

    pub fn with_task_ttl(mut self, ttl: Duration) -> Self {
        self.task_ttl = ttl;
        self
    }

    pub fn with_fitness_timeout(mut self, timeout: Duration) -> Self {
        self.fitness_timeout = timeout;
        self
    }

    pub fn with_generation_delay(mut self, delay: Duration) -> Self {
        self.generation_delay = delay;
        self
    }

    pub fn with_population_cap(mut self, cap: usize) -> Self {
        self.population_cap = cap.max(1);
        self
    }

    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    pub fn with_parallel_evaluation(mut self, parallel: bool) -> Self {
        self.parallel_evaluation = parallel;
        self
    }
}
