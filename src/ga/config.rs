//! Engine configuration.
//!
//! [`EvolutionConfig`] holds all parameters that control the generation loop.

use super::selection::Selection;
use crate::error::ConfigError;
use std::time::Duration;

/// Default pause between generations.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(100);

/// Configuration for one [`Evolution`](super::Evolution).
///
/// # Defaults
///
/// ```
/// use u_evostream::ga::EvolutionConfig;
///
/// let config = EvolutionConfig::default();
/// assert_eq!(config.population_size, 50);
/// assert_eq!(config.max_generations, 100);
/// ```
///
/// # Builder Pattern
///
/// ```
/// use u_evostream::ga::{EvolutionConfig, Selection};
///
/// let config = EvolutionConfig::default()
///     .with_population_size(20)
///     .with_selection(Selection::Tournament(2))
///     .with_mutation_rate(0.2);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EvolutionConfig {
    /// Number of individuals per generation.
    pub population_size: usize,

    /// Number of generations to run.
    pub max_generations: usize,

    /// Selection strategy for choosing parents.
    pub selection: Selection,

    /// Probability of recombining an offspring slot (0.0–1.0).
    ///
    /// When crossover is not applied, the offspring is a clone of parent 1.
    pub crossover_rate: f64,

    /// Probability of mutating an offspring (0.0–1.0).
    pub mutation_rate: f64,

    /// Cooperative delay after each generation.
    pub throttle: Duration,

    /// Whether local scorers may use rayon.
    pub parallel: bool,

    /// Random seed for reproducibility.
    ///
    /// `None` uses a random seed.
    pub seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            max_generations: 100,
            selection: Selection::default(),
            crossover_rate: 0.8,
            mutation_rate: 0.1,
            throttle: DEFAULT_THROTTLE,
            parallel: false,
            seed: None,
        }
    }
}

impl EvolutionConfig {
    /// Sets the population size.
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    /// Sets the number of generations.
    pub fn with_max_generations(mut self, n: usize) -> Self {
        self.max_generations = n;
        self
    }

    /// Sets the selection strategy.
    pub fn with_selection(mut self, sel: Selection) -> Self {
        self.selection = sel;
        self
    }

    /// Sets the crossover rate.
    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the mutation rate.
    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the inter-generation delay. `Duration::ZERO` disables it.
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// Enables or disables parallel local evaluation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Convenience builder for setting tournament size.
    ///
    /// Equivalent to `.with_selection(Selection::Tournament(k))`.
    pub fn with_tournament_size(self, k: usize) -> Self {
        self.with_selection(Selection::Tournament(k))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::OutOfRange {
                field: "population_size",
                min: 1.0,
                max: f64::INFINITY,
                value: 0.0,
            });
        }
        if self.max_generations == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_generations",
                min: 1.0,
                max: f64::INFINITY,
                value: 0.0,
            });
        }
        check_rate("crossover_rate", self.crossover_rate)?;
        check_rate("mutation_rate", self.mutation_rate)?;
        if self.selection == Selection::Tournament(0) {
            return Err(ConfigError::InvalidTournamentSize);
        }
        Ok(())
    }
}

fn check_rate(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            min: 0.0,
            max: 1.0,
            value,
        })
    }
}
