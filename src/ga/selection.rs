//! Selection strategies for the GA.
//!
//! Selection determines which individuals are chosen as parents for
//! crossover. Fitness is a maximization quantity throughout: the higher
//! score wins.
//!
//! # References
//!
//! - Blickle & Thiele (1996), "A Comparison of Selection Schemes used in
//!   Evolutionary Algorithms"
//! - Baker (1985), "Adaptive Selection Methods for Genetic Algorithms"

use rand::Rng;

/// Selection strategy for choosing parents.
///
/// # Examples
///
/// ```
/// use u_evostream::ga::Selection;
///
/// // Tournament with size 3 (moderate selection pressure)
/// let sel = Selection::Tournament(3);
/// assert_eq!(sel, Selection::default());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Tournament selection: draw `k` individuals with replacement, keep the best.
    ///
    /// Candidates are redrawn for every parent slot. `k` must stay well
    /// below the population size; a tournament over everyone always
    /// returns the same individual and the population collapses to clones.
    /// - k=2: light pressure (good for diversity)
    /// - k=3-5: moderate pressure (typical default)
    ///
    /// # Complexity
    /// O(k) per selection
    Tournament(usize),

    /// Linear rank-based selection.
    ///
    /// Selection probability is proportional to rank position, not raw
    /// score, which keeps pressure stable when human-assigned scores vary
    /// wildly in scale.
    ///
    /// # Complexity
    /// O(n log n) per selection
    Rank,
}

impl Default for Selection {
    fn default() -> Self {
        Selection::Tournament(3)
    }
}

impl Selection {
    /// Selects a parent index given the population's fitness vector.
    ///
    /// # Panics
    /// Panics if `fitness` is empty.
    pub fn select<R: Rng>(&self, fitness: &[f64], rng: &mut R) -> usize {
        assert!(!fitness.is_empty(), "cannot select from empty population");

        match self {
            Selection::Tournament(k) => tournament(fitness, *k, rng),
            Selection::Rank => rank(fitness, rng),
        }
    }
}

/// Selects `parent1` and `parent2` indices for every offspring slot.
///
/// Both vectors have the same length as `fitness`; each entry is an
/// independent selection.
pub fn select_parents<R: Rng>(
    selection: &Selection,
    fitness: &[f64],
    rng: &mut R,
) -> (Vec<usize>, Vec<usize>) {
    let n = fitness.len();
    let mut parents1 = Vec::with_capacity(n);
    let mut parents2 = Vec::with_capacity(n);
    for _ in 0..n {
        parents1.push(selection.select(fitness, rng));
        parents2.push(selection.select(fitness, rng));
    }
    (parents1, parents2)
}

/// Tournament selection: pick k random individuals, return best.
fn tournament<R: Rng>(fitness: &[f64], k: usize, rng: &mut R) -> usize {
    let k = k.max(1);
    let n = fitness.len();

    let mut best_idx = rng.random_range(0..n);
    for _ in 1..k {
        let idx = rng.random_range(0..n);
        if fitness[idx] > fitness[best_idx] {
            best_idx = idx;
        }
    }
    best_idx
}

/// Rank-based selection: weight `n - rank`, best first.
fn rank<R: Rng>(fitness: &[f64], rng: &mut R) -> usize {
    let n = fitness.len();
    if n == 1 {
        return 0;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| fitness[b].total_cmp(&fitness[a]));

    let total = (n * (n + 1)) as f64 / 2.0;
    let threshold = rng.random_range(0.0..total);
    let mut cumulative = 0.0;

    for (rank, &idx) in order.iter().enumerate() {
        cumulative += (n - rank) as f64;
        if cumulative > threshold {
            return idx;
        }
    }

    order[n - 1] // floating-point fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::create_rng;

    #[test]
    fn test_tournament_favors_best() {
        let fitness = [-10.0, -5.0, -1.0, -8.0];
        let mut rng = create_rng(42);

        let mut counts = [0u32; 4];
        let n = 10000;
        for _ in 0..n {
            let idx = Selection::Tournament(4).select(&fitness, &mut rng);
            counts[idx] += 1;
        }
        // Index 2 (fitness=-1.0) should dominate
        let best_count = counts[2];
        assert!(
            best_count > 6000,
            "expected best to be selected >60% of the time, got {best_count}/{n}"
        );
    }

    #[test]
    fn test_tournament_size_1_is_random() {
        let fitness = [10.0, 5.0, 1.0, 8.0];
        let mut rng = create_rng(42);

        let mut counts = [0u32; 4];
        for _ in 0..10000 {
            let idx = Selection::Tournament(1).select(&fitness, &mut rng);
            counts[idx] += 1;
        }
        for &c in &counts {
            assert!(c > 1500, "expected uniform, got counts: {counts:?}");
        }
    }

    #[test]
    fn test_parents_keep_diversity() {
        // Small tournaments over a spread of scores must not clone the best.
        let fitness: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let mut rng = create_rng(7);

        let (p1, p2) = select_parents(&Selection::Tournament(3), &fitness, &mut rng);
        assert_eq!(p1.len(), 20);
        assert_eq!(p2.len(), 20);

        let distinct: std::collections::HashSet<usize> = p1.iter().chain(&p2).copied().collect();
        assert!(distinct.len() > 5, "parents collapsed: {distinct:?}");
    }

    #[test]
    fn test_rank_favors_best() {
        let fitness = [-100.0, -50.0, -1.0, -80.0];
        let mut rng = create_rng(42);

        let mut counts = [0u32; 4];
        for _ in 0..10000 {
            let idx = Selection::Rank.select(&fitness, &mut rng);
            counts[idx] += 1;
        }
        let best_count = counts[2];
        let worst_count = counts[0];
        assert!(
            best_count > worst_count,
            "best should be selected more: best={best_count}, worst={worst_count}"
        );
    }

    #[test]
    fn test_single_individual() {
        let fitness = [5.0];
        let mut rng = create_rng(42);

        assert_eq!(Selection::Tournament(3).select(&fitness, &mut rng), 0);
        assert_eq!(Selection::Rank.select(&fitness, &mut rng), 0);
    }

    #[test]
    #[should_panic(expected = "cannot select from empty population")]
    fn test_empty_population_panics() {
        let mut rng = create_rng(42);
        Selection::Tournament(3).select(&[], &mut rng);
    }
}
