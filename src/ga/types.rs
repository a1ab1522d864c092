//! Core types for the evolutionary engine.
//!
//! [`Encoding`] is the contract between the generic engine and the three
//! problem variants: it creates genomes and applies the variant-specific
//! crossover and mutation. Fitness is supplied separately by a
//! [`FitnessEvaluator`](super::FitnessEvaluator), so a variant can be scored
//! locally or by a remote client without changing its operators.

use crate::error::EvolutionError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of supported problem encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProblemKind {
    /// Travelling salesman: permutation genomes, negative closed-tour length.
    #[serde(rename = "tsp")]
    Tsp,

    /// Game playing agent: action/duration sequences scored by a client.
    #[serde(rename = "GPA")]
    Gpa,

    /// Continuous search on `[0, 1]^n`: negative sphere function.
    #[serde(rename = "function_optimization")]
    Function,
}

impl ProblemKind {
    /// Returns `true` if fitness comes from an external evaluator.
    pub fn is_remote(self) -> bool {
        matches!(self, ProblemKind::Gpa)
    }

    /// Multiplier that converts internal fitness into a display value.
    ///
    /// Cost-based kinds are maximized as negated costs, so they are flipped
    /// back for display. Client scores are reported as received.
    pub fn display_sign(self) -> f64 {
        match self {
            ProblemKind::Gpa => 1.0,
            ProblemKind::Tsp | ProblemKind::Function => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProblemKind::Tsp => "tsp",
            ProblemKind::Gpa => "GPA",
            ProblemKind::Function => "function_optimization",
        }
    }
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A movement primitive of the game playing agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Left,
    Right,
    Jump,
    Pause,
}

impl Action {
    /// Actions drawn when a population is created.
    pub const INITIAL: [Action; 3] = [Action::Left, Action::Right, Action::Jump];

    /// Actions available to mutation (adds [`Action::Pause`]).
    pub const ALL: [Action; 4] = [Action::Left, Action::Right, Action::Jump, Action::Pause];
}

/// Shortest allowed step duration, in seconds.
pub const MIN_DURATION: f64 = 0.25;

/// Longest allowed step duration, in seconds.
pub const MAX_DURATION: f64 = 2.0;

/// One timed action of an [`ActionSequence`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub action: Action,
    /// Seconds, within `[MIN_DURATION, MAX_DURATION]`.
    pub duration: f64,
}

/// A city as `[x, y]`.
pub type City = [f64; 2];

/// Visiting order over city indices `0..dimension`.
pub type Tour = Vec<usize>;

/// Ordered action plan of the game playing agent.
pub type ActionSequence = Vec<Step>;

/// Point in `[0, 1]^dimension`.
pub type RealVector = Vec<f64>;

/// The individuals evaluated together in one generation.
///
/// A population is never edited in place by the engine; each generation
/// boundary replaces it with a newly built one.
#[derive(Debug, Clone, PartialEq)]
pub struct Population<G> {
    individuals: Vec<G>,
    generation: usize,
}

impl<G> Population<G> {
    pub fn new(individuals: Vec<G>, generation: usize) -> Self {
        Self {
            individuals,
            generation,
        }
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Generation index this population belongs to.
    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn individuals(&self) -> &[G] {
        &self.individuals
    }

    pub fn iter(&self) -> std::slice::Iter<'_, G> {
        self.individuals.iter()
    }
}

/// Best individual observed so far and its fitness.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestSolution<G> {
    pub genome: G,
    pub fitness: f64,
}

/// Running record of the best solution across generations.
///
/// The recorded fitness never decreases: it is replaced only on strict
/// improvement, and `NaN` scores are ignored.
#[derive(Debug, Clone)]
pub struct BestTracker<G> {
    best: Option<BestSolution<G>>,
}

impl<G> Default for BestTracker<G> {
    fn default() -> Self {
        Self { best: None }
    }
}

impl<G: Clone> BestTracker<G> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares the generation's best score with the record.
    ///
    /// Returns `true` if the record was replaced.
    pub fn observe(&mut self, population: &Population<G>, fitness: &[f64]) -> bool {
        let Some((idx, &score)) = fitness
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.is_nan())
            .max_by(|a, b| a.1.total_cmp(b.1))
        else {
            return false;
        };

        match population.individuals.get(idx) {
            Some(genome) if score > self.fitness() => {
                self.best = Some(BestSolution {
                    genome: genome.clone(),
                    fitness: score,
                });
                true
            }
            _ => false,
        }
    }

    pub fn best(&self) -> Option<&BestSolution<G>> {
        self.best.as_ref()
    }

    /// Best fitness so far, or negative infinity before the first observation.
    pub fn fitness(&self) -> f64 {
        self.best
            .as_ref()
            .map_or(f64::NEG_INFINITY, |best| best.fitness)
    }
}

/// Representation and genetic operators of one problem variant.
///
/// # Implementing
///
/// ```ignore
/// struct Bits { n: usize }
///
/// impl Encoding for Bits {
///     type Genome = Vec<bool>;
///     fn dimension(&self) -> usize { self.n }
///     fn create_genome<R: Rng>(&self, rng: &mut R) -> Vec<bool> {
///         (0..self.n).map(|_| rng.random_bool(0.5)).collect()
///     }
///     fn crossover<R: Rng>(&self, p1: &Vec<bool>, _p2: &Vec<bool>, _rng: &mut R)
///         -> Result<Vec<bool>, EvolutionError> { Ok(p1.clone()) }
///     fn mutate<R: Rng>(&self, g: &mut Vec<bool>, rng: &mut R) {
///         let i = rng.random_range(0..self.n);
///         g[i] = !g[i];
///     }
/// }
/// ```
pub trait Encoding: Send + Sync {
    /// The genome type. Must serialize for progress and evaluation messages.
    type Genome: Clone + PartialEq + fmt::Debug + Serialize + Send + Sync + 'static;

    /// Number of genes in every genome.
    fn dimension(&self) -> usize;

    /// Creates one random, valid genome.
    fn create_genome<R: Rng>(&self, rng: &mut R) -> Self::Genome;

    /// Recombines two parents into one offspring.
    ///
    /// An `Err` means the operator broke its own invariant; it is never
    /// caused by bad input and is not retried.
    fn crossover<R: Rng>(
        &self,
        parent1: &Self::Genome,
        parent2: &Self::Genome,
        rng: &mut R,
    ) -> Result<Self::Genome, EvolutionError>;

    /// Perturbs a genome in place.
    fn mutate<R: Rng>(&self, genome: &mut Self::Genome, rng: &mut R);

    /// Creates the generation-0 population of independent random genomes.
    fn initialize<R: Rng>(&self, size: usize, rng: &mut R) -> Population<Self::Genome> {
        let individuals = (0..size).map(|_| self.create_genome(rng)).collect();
        Population::new(individuals, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_kind_wire_names() {
        assert_eq!(serde_json::to_string(&ProblemKind::Tsp).unwrap(), "\"tsp\"");
        assert_eq!(serde_json::to_string(&ProblemKind::Gpa).unwrap(), "\"GPA\"");
        let kind: ProblemKind = serde_json::from_str("\"function_optimization\"").unwrap();
        assert_eq!(kind, ProblemKind::Function);
        assert!(serde_json::from_str::<ProblemKind>("\"knapsack\"").is_err());
    }

    #[test]
    fn test_display_sign() {
        assert_eq!(ProblemKind::Tsp.display_sign(), -1.0);
        assert_eq!(ProblemKind::Function.display_sign(), -1.0);
        assert_eq!(ProblemKind::Gpa.display_sign(), 1.0);
        assert!(ProblemKind::Gpa.is_remote());
        assert!(!ProblemKind::Tsp.is_remote());
    }

    #[test]
    fn test_step_wire_format() {
        let step = Step {
            action: Action::Jump,
            duration: 0.5,
        };
        let json = serde_json::to_value(step).unwrap();
        assert_eq!(json, serde_json::json!({"action": "jump", "duration": 0.5}));
    }

    #[test]
    fn test_best_tracker_only_strict_improvement() {
        let pop = Population::new(vec!["a", "b", "c"], 0);
        let mut tracker = BestTracker::new();
        assert_eq!(tracker.fitness(), f64::NEG_INFINITY);

        assert!(tracker.observe(&pop, &[-3.0, -1.0, -2.0]));
        assert_eq!(tracker.best().unwrap().genome, "b");

        // Equal score does not replace the record.
        let pop2 = Population::new(vec!["x", "y", "z"], 1);
        assert!(!tracker.observe(&pop2, &[-1.0, -5.0, -9.0]));
        assert_eq!(tracker.best().unwrap().genome, "b");

        // Worse generation never regresses it.
        assert!(!tracker.observe(&pop2, &[-4.0, -5.0, -9.0]));
        assert_eq!(tracker.fitness(), -1.0);

        assert!(tracker.observe(&pop2, &[-4.0, -0.5, -9.0]));
        assert_eq!(tracker.best().unwrap().genome, "y");
    }

    #[test]
    fn test_best_tracker_ignores_nan() {
        let pop = Population::new(vec![1, 2], 0);
        let mut tracker = BestTracker::new();
        assert!(tracker.observe(&pop, &[f64::NAN, 3.0]));
        assert_eq!(tracker.best().unwrap().genome, 2);

        let mut empty = BestTracker::<i32>::new();
        assert!(!empty.observe(&Population::new(vec![], 0), &[]));
    }
}
