//! Genetic operators shared by the problem encodings.
//!
//! The crossover builders take their cut points explicitly so that the
//! recombination itself is deterministic; [`random_cut_points`] supplies
//! them during evolution.
//!
//! # Crossover Operators
//!
//! - [`order_crossover`] (OX): Davis (1985), keeps every gene exactly once
//! - [`segment_crossover`]: two-point recombination without deduplication
//! - [`blend_crossover`]: convex combination of two real vectors
//!
//! # Mutation Operators
//!
//! - [`swap_mutation`]: exchange two distinct positions
//! - [`gaussian_mutation`]: per-coordinate normal noise, clamped to `[0, 1]`
//! - [`redraw_step`]: fresh random action and duration
//!
//! # References
//!
//! - Davis (1985), "Applying Adaptive Algorithms to Epistatic Domains"
//! - Eshelman & Schaffer (1993), "Real-Coded Genetic Algorithms and
//!   Interval-Schemata"

use super::types::{Action, Step, MAX_DURATION, MIN_DURATION};
use crate::error::EvolutionError;
use rand::seq::index;
use rand::Rng;
use rand_distr::StandardNormal;

// ============================================================================
// Crossover operators
// ============================================================================

/// Draws two distinct cut points `p1 < p2` in `0..n`.
///
/// # Panics
/// Panics if `n < 2`.
pub fn random_cut_points<R: Rng>(n: usize, rng: &mut R) -> (usize, usize) {
    assert!(n >= 2, "cut points need at least two genes");
    let picks = index::sample(rng, n, 2);
    let (a, b) = (picks.index(0), picks.index(1));
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Order Crossover (OX) for permutations.
///
/// # Algorithm
///
/// 1. Copy `parent1[p1..p2]` into the child at the same positions
/// 2. Take `parent2`'s genes that are not in that segment, in `parent2` order
/// 3. Fill the child's positions before `p1`, then those from `p2` on
///
/// The child is a permutation whenever both parents are.
///
/// # Errors
/// [`EvolutionError::OperatorInvariantViolation`] if the donor genes do not
/// exactly cover the free positions, which happens only for parents that
/// are not permutations of the same set.
///
/// # Complexity
/// O(n) time, O(n) space
pub fn order_crossover(
    parent1: &[usize],
    parent2: &[usize],
    (p1, p2): (usize, usize),
) -> Result<Vec<usize>, EvolutionError> {
    let n = parent1.len();
    let mut in_segment = vec![false; n];
    for &gene in &parent1[p1..p2] {
        if gene < n {
            in_segment[gene] = true;
        }
    }

    let donor = parent2
        .iter()
        .copied()
        .filter(|&gene| gene >= n || !in_segment[gene]);
    fill_around_segment(parent1, (p1, p2), donor)
}

/// Two-point segment crossover without deduplication.
///
/// Copies `parent1[p1..p2]` and fills every other position from `parent2`'s
/// genes outside `[p1, p2)`, in order. Repeated genes are legal.
///
/// # Errors
/// [`EvolutionError::OperatorInvariantViolation`] if any position is left
/// unfilled (parents of different lengths).
pub fn segment_crossover<T: Clone>(
    parent1: &[T],
    parent2: &[T],
    (p1, p2): (usize, usize),
) -> Result<Vec<T>, EvolutionError> {
    let before = parent2.iter().take(p1);
    let after = parent2.iter().skip(p2);
    fill_around_segment(parent1, (p1, p2), before.chain(after).cloned())
}

/// Blend crossover: `alpha * parent1 + (1 - alpha) * parent2`.
pub fn blend_crossover(parent1: &[f64], parent2: &[f64], alpha: f64) -> Vec<f64> {
    parent1
        .iter()
        .zip(parent2)
        .map(|(a, b)| alpha * a + (1.0 - alpha) * b)
        .collect()
}

/// Builds a child from `template[p1..p2]` plus `donor` genes for the
/// remaining positions, filling `0..p1` before `p2..n`.
fn fill_around_segment<T: Clone>(
    template: &[T],
    (p1, p2): (usize, usize),
    donor: impl IntoIterator<Item = T>,
) -> Result<Vec<T>, EvolutionError> {
    let n = template.len();
    let mut child: Vec<Option<T>> = vec![None; n];

    for i in p1..p2 {
        child[i] = Some(template[i].clone());
    }

    let mut donor = donor.into_iter();
    for i in (0..p1).chain(p2..n) {
        child[i] = donor.next();
    }

    let leftover = donor.count();
    if leftover > 0 {
        return Err(EvolutionError::OperatorInvariantViolation(format!(
            "{leftover} donor genes left over after crossover"
        )));
    }

    child
        .into_iter()
        .enumerate()
        .map(|(pos, gene)| {
            gene.ok_or_else(|| {
                EvolutionError::OperatorInvariantViolation(format!(
                    "offspring position {pos} left unfilled"
                ))
            })
        })
        .collect()
}

// ============================================================================
// Mutation operators
// ============================================================================

/// Swap mutation: exchange two distinct random positions.
///
/// # Complexity
/// O(1)
pub fn swap_mutation<T, R: Rng>(genes: &mut [T], rng: &mut R) {
    if genes.len() < 2 {
        return;
    }
    let (i, j) = random_cut_points(genes.len(), rng);
    genes.swap(i, j);
}

/// Adds `N(0, sigma²)` noise to every coordinate, then clamps to `[0, 1]`.
pub fn gaussian_mutation<R: Rng>(genes: &mut [f64], sigma: f64, rng: &mut R) {
    for gene in genes.iter_mut() {
        let z: f64 = rng.sample(StandardNormal);
        *gene = (*gene + sigma * z).clamp(0.0, 1.0);
    }
}

/// Draws a random step with an action from `actions`.
///
/// # Panics
/// Panics if `actions` is empty.
pub fn redraw_step<R: Rng>(actions: &[Action], rng: &mut R) -> Step {
    Step {
        action: actions[rng.random_range(0..actions.len())],
        duration: rng.random_range(MIN_DURATION..=MAX_DURATION),
    }
}

// ============================================================================
// Tests
// ============================================================================
