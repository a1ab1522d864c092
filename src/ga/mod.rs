//! Genetic algorithm engine.
//!
//! A generic generation loop ([`Evolution`]) parameterized by a problem
//! [`Encoding`] and a [`FitnessEvaluator`]. Three encodings are provided,
//! one per [`ProblemKind`], and two evaluation strategies: in-process
//! scoring and remote scoring by the task's client.
//!
//! # Core Traits
//!
//! - [`Encoding`]: genome creation, crossover, and mutation for one variant
//! - [`FitnessEvaluator`]: one fitness value per individual, possibly awaited
//!
//! # Key Types
//!
//! - [`EvolutionConfig`]: Algorithm parameters (population size, rates, throttle)
//! - [`Evolution`]: Executes the generation loop
//! - [`FitnessBroker`]: Correlates remote score messages with waiting evaluations
//!
//! # Submodules
//!
//! - [`operators`]: Cut-point crossovers and mutation primitives
//! - [`messages`]: Wire format of the client channel
//!
//! # References
//!
//! - Holland (1975), *Adaptation in Natural and Artificial Systems*
//! - Goldberg (1989), *Genetic Algorithms in Search, Optimization, and Machine Learning*
//! - Davis (1985), "Applying Adaptive Algorithms to Epistatic Domains" (order crossover)

mod config;
mod correlation;
mod encoding;
mod fitness;
pub mod messages;
pub mod operators;
mod runner;
mod selection;
mod types;

pub use config::{EvolutionConfig, DEFAULT_THROTTLE};
pub use correlation::{FitnessBroker, PendingScores};
pub use encoding::{ActionEncoding, TourEncoding, VectorEncoding, VECTOR_MUTATION_SIGMA};
pub use fitness::{
    FitnessEvaluator, LocalEvaluator, LocalScorer, RemoteEvaluator, Sphere, TourLength,
    DEFAULT_FITNESS_TIMEOUT,
};
pub use messages::{ClientMessage, EvaluationRequest, MessageSink, ProgressUpdate, ServerMessage};
pub use runner::{EngineState, Evolution, GenerationStats, RunSummary};
pub use selection::{select_parents, Selection};
pub use types::{
    Action, ActionSequence, BestSolution, BestTracker, City, Encoding, Population, ProblemKind,
    RealVector, Step, Tour, MAX_DURATION, MIN_DURATION,
};
