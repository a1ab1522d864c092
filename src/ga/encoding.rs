//! The three problem encodings.
//!
//! Each struct implements [`Encoding`] for one [`ProblemKind`]: how a random
//! genome is drawn, how two parents recombine, and how one genome mutates.
//!
//! | Kind | Genome | Crossover | Mutation |
//! |------|--------|-----------|----------|
//! | `tsp` | [`Tour`] | order (OX) | swap |
//! | `GPA` | [`ActionSequence`] | two-point segment | redraw one step |
//! | `function_optimization` | [`RealVector`] | blend | Gaussian, clamped |
//!
//! [`ProblemKind`]: super::ProblemKind

use super::operators::{
    blend_crossover, gaussian_mutation, order_crossover, random_cut_points, redraw_step,
    segment_crossover, swap_mutation,
};
use super::types::{Action, ActionSequence, Encoding, RealVector, Tour};
use crate::error::EvolutionError;
use rand::seq::SliceRandom;
use rand::Rng;

/// Standard deviation of the Gaussian mutation on real vectors.
pub const VECTOR_MUTATION_SIGMA: f64 = 0.1;

/// Permutations of `0..dimension`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TourEncoding {
    dimension: usize,
}

impl TourEncoding {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Encoding for TourEncoding {
    type Genome = Tour;

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn create_genome<R: Rng>(&self, rng: &mut R) -> Tour {
        let mut tour: Tour = (0..self.dimension).collect();
        tour.shuffle(rng);
        tour
    }

    fn crossover<R: Rng>(
        &self,
        parent1: &Tour,
        parent2: &Tour,
        rng: &mut R,
    ) -> Result<Tour, EvolutionError> {
        if parent1.len() < 2 {
            return Ok(parent1.clone());
        }
        let cuts = random_cut_points(parent1.len(), rng);
        order_crossover(parent1, parent2, cuts)
    }

    fn mutate<R: Rng>(&self, genome: &mut Tour, rng: &mut R) {
        swap_mutation(genome, rng);
    }
}

/// Sequences of timed actions for the game playing agent.
///
/// Initial genomes use only [`Action::INITIAL`]; [`Action::Pause`] enters the
/// population through mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionEncoding {
    dimension: usize,
}

impl ActionEncoding {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Encoding for ActionEncoding {
    type Genome = ActionSequence;

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn create_genome<R: Rng>(&self, rng: &mut R) -> ActionSequence {
        (0..self.dimension)
            .map(|_| redraw_step(&Action::INITIAL, rng))
            .collect()
    }

    fn crossover<R: Rng>(
        &self,
        parent1: &ActionSequence,
        parent2: &ActionSequence,
        rng: &mut R,
    ) -> Result<ActionSequence, EvolutionError> {
        if parent1.len() < 2 {
            return Ok(parent1.clone());
        }
        let cuts = random_cut_points(parent1.len(), rng);
        segment_crossover(parent1, parent2, cuts)
    }

    fn mutate<R: Rng>(&self, genome: &mut ActionSequence, rng: &mut R) {
        if genome.is_empty() {
            return;
        }
        let pos = rng.random_range(0..genome.len());
        genome[pos] = redraw_step(&Action::ALL, rng);
    }
}

/// Points in the unit hypercube.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorEncoding {
    dimension: usize,
    sigma: f64,
}

impl VectorEncoding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            sigma: VECTOR_MUTATION_SIGMA,
        }
    }
}

impl Encoding for VectorEncoding {
    type Genome = RealVector;

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn create_genome<R: Rng>(&self, rng: &mut R) -> RealVector {
        (0..self.dimension)
            .map(|_| rng.random_range(0.0..=1.0))
            .collect()
    }

    fn crossover<R: Rng>(
        &self,
        parent1: &RealVector,
        parent2: &RealVector,
        rng: &mut R,
    ) -> Result<RealVector, EvolutionError> {
        let alpha = rng.random_range(0.0..=1.0);
        Ok(blend_crossover(parent1, parent2, alpha))
    }

    fn mutate<R: Rng>(&self, genome: &mut RealVector, rng: &mut R) {
        gaussian_mutation(genome, self.sigma, rng);
    }
}
