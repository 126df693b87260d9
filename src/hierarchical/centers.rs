//! Cluster-center initialization strategies.
//!
//! Each split in the tree asks a chooser for up to `branching` initial
//! centers out of the node's candidate points. All three variants share one
//! contract: they return **distinct points** (no two chosen centers at
//! distance zero) and may return FEWER than requested when the candidate set
//! is degenerate (duplicates, fewer unique points than `branching`, or all
//! candidates coincident). The builder reacts to a shortfall by freezing the
//! node as a leaf.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::distance::DistanceMetric;
use crate::error::{IndexError, Result};

/// Two points closer than this are treated as the same center candidate.
const CENTER_DEDUP_EPS: f32 = 1e-12;

/// Algorithm used for picking the initial cluster centers of a split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CentersInit {
    /// Distinct candidates drawn uniformly at random.
    #[default]
    Random,
    /// Farthest-point heuristic: each center maximizes the minimum distance
    /// to the centers already chosen.
    Gonzales,
    /// k-means++ D² weighting: candidates are sampled with probability
    /// proportional to their distance to the nearest chosen center.
    KMeansPp,
}

impl CentersInit {
    /// Parse a configuration name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "random" => Ok(CentersInit::Random),
            "gonzales" => Ok(CentersInit::Gonzales),
            "kmeanspp" => Ok(CentersInit::KMeansPp),
            _ => Err(IndexError::UnknownCentersInit),
        }
    }

    /// Configuration name, the inverse of [`CentersInit::from_name`].
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            CentersInit::Random => "random",
            CentersInit::Gonzales => "gonzales",
            CentersInit::KMeansPp => "kmeanspp",
        }
    }

    /// Stable numeric tag used in the persisted layout.
    pub(crate) fn tag(self) -> u8 {
        match self {
            CentersInit::Random => 0,
            CentersInit::Gonzales => 1,
            CentersInit::KMeansPp => 2,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(CentersInit::Random),
            1 => Ok(CentersInit::Gonzales),
            2 => Ok(CentersInit::KMeansPp),
            _ => Err(IndexError::UnknownCentersInit),
        }
    }
}

#[inline]
fn row(vectors: &[f32], dimension: usize, index: u32) -> &[f32] {
    let start = index as usize * dimension;
    &vectors[start..start + dimension]
}

/// Pick up to `k` centers out of `candidates` into `centers`.
///
/// Returns the number of centers actually chosen, which may be less than `k`
/// for degenerate candidate sets.
#[allow(clippy::too_many_arguments)]
pub(crate) fn choose_centers(
    init: CentersInit,
    k: usize,
    candidates: &[u32],
    vectors: &[f32],
    dimension: usize,
    metric: DistanceMetric,
    rng: &mut StdRng,
    centers: &mut Vec<u32>,
) -> usize {
    centers.clear();
    if candidates.is_empty() || k == 0 {
        return 0;
    }
    match init {
        CentersInit::Random => choose_random(k, candidates, vectors, dimension, metric, rng, centers),
        CentersInit::Gonzales => choose_gonzales(k, candidates, vectors, dimension, metric, rng, centers),
        CentersInit::KMeansPp => choose_kmeanspp(k, candidates, vectors, dimension, metric, rng, centers),
    }
    centers.len()
}

/// Uniform draws without replacement, skipping candidates that coincide with
/// an already-chosen center.
fn choose_random(
    k: usize,
    candidates: &[u32],
    vectors: &[f32],
    dimension: usize,
    metric: DistanceMetric,
    rng: &mut StdRng,
    centers: &mut Vec<u32>,
) {
    let n = candidates.len();
    // Lazy Fisher-Yates: `order[..drawn]` is a uniform sample without
    // replacement of the candidate positions.
    let mut order: Vec<usize> = (0..n).collect();
    let mut drawn = 0;
    while centers.len() < k && drawn < n {
        let j = drawn + rng.random_range(0..n - drawn);
        order.swap(drawn, j);
        let cand = candidates[order[drawn]];
        drawn += 1;

        let cand_vec = row(vectors, dimension, cand);
        let duplicate = centers
            .iter()
            .any(|&c| metric.distance(row(vectors, dimension, c), cand_vec) < CENTER_DEDUP_EPS);
        if !duplicate {
            centers.push(cand);
        }
    }
}

/// Farthest-point (Gonzales) selection: first center uniform, each subsequent
/// center is the candidate maximizing its distance to the nearest chosen
/// center. Ties keep the lowest candidate position; a zero maximum means only
/// duplicates remain and selection stops short.
fn choose_gonzales(
    k: usize,
    candidates: &[u32],
    vectors: &[f32],
    dimension: usize,
    metric: DistanceMetric,
    rng: &mut StdRng,
    centers: &mut Vec<u32>,
) {
    let n = candidates.len();
    centers.push(candidates[rng.random_range(0..n)]);

    while centers.len() < k {
        let mut best: Option<usize> = None;
        let mut best_val = 0.0f32;
        for (j, &cand) in candidates.iter().enumerate() {
            let cand_vec = row(vectors, dimension, cand);
            let mut dist = f32::INFINITY;
            for &c in centers.iter() {
                let d = metric.distance(row(vectors, dimension, c), cand_vec);
                if d < dist {
                    dist = d;
                }
            }
            if dist > best_val {
                best_val = dist;
                best = Some(j);
            }
        }
        match best {
            Some(j) => centers.push(candidates[j]),
            None => break,
        }
    }
}

/// k-means++ D² weighting: candidates are drawn with probability proportional
/// to their distance to the nearest chosen center (under the default squared
/// L2 metric that is the classical D² scheme). A zero potential means every
/// remaining candidate coincides with a chosen center.
fn choose_kmeanspp(
    k: usize,
    candidates: &[u32],
    vectors: &[f32],
    dimension: usize,
    metric: DistanceMetric,
    rng: &mut StdRng,
    centers: &mut Vec<u32>,
) {
    let n = candidates.len();
    let first = candidates[rng.random_range(0..n)];
    centers.push(first);

    let first_vec = row(vectors, dimension, first);
    let mut closest: Vec<f32> = candidates
        .iter()
        .map(|&c| metric.distance(first_vec, row(vectors, dimension, c)))
        .collect();
    let mut potential: f64 = closest.iter().map(|&d| f64::from(d)).sum();

    while centers.len() < k {
        if potential <= 0.0 {
            break;
        }
        let threshold = rng.random::<f64>() * potential;
        let mut cumulative = 0.0f64;
        let mut chosen = None;
        for (j, &d) in closest.iter().enumerate() {
            cumulative += f64::from(d);
            if cumulative > threshold && d > 0.0 {
                chosen = Some(j);
                break;
            }
        }
        // Rounding at the tail of the cumulative walk: fall back to the last
        // candidate carrying any weight.
        let Some(j) = chosen.or_else(|| closest.iter().rposition(|&d| d > 0.0)) else {
            break;
        };

        let center = candidates[j];
        centers.push(center);

        let center_vec = row(vectors, dimension, center);
        potential = 0.0;
        for (jj, &cand) in candidates.iter().enumerate() {
            let d = metric.distance(center_vec, row(vectors, dimension, cand));
            if d < closest[jj] {
                closest[jj] = d;
            }
            potential += f64::from(closest[jj]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    const ALL_INITS: [CentersInit; 3] = [
        CentersInit::Random,
        CentersInit::Gonzales,
        CentersInit::KMeansPp,
    ];

    fn flat(points: &[[f32; 2]]) -> Vec<f32> {
        points.iter().flat_map(|p| p.iter().copied()).collect()
    }

    #[test]
    fn name_round_trip() {
        for init in ALL_INITS {
            assert_eq!(CentersInit::from_name(init.name()).unwrap(), init);
            assert_eq!(CentersInit::from_tag(init.tag()).unwrap(), init);
        }
        assert_eq!(
            CentersInit::from_name("voronoi"),
            Err(IndexError::UnknownCentersInit)
        );
        assert_eq!(CentersInit::from_tag(9), Err(IndexError::UnknownCentersInit));
    }

    #[test]
    fn distinct_candidates_yield_full_count() {
        let vectors = flat(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [5.0, 5.0], [9.0, 1.0]]);
        let candidates: Vec<u32> = (0..5).collect();
        for init in ALL_INITS {
            let mut rng = StdRng::seed_from_u64(7);
            let mut centers = Vec::new();
            let got = choose_centers(
                init,
                3,
                &candidates,
                &vectors,
                2,
                DistanceMetric::SquaredL2,
                &mut rng,
                &mut centers,
            );
            assert_eq!(got, 3, "{:?} should find 3 distinct centers", init);
            let mut unique = centers.clone();
            unique.sort_unstable();
            unique.dedup();
            assert_eq!(unique.len(), 3, "{:?} returned duplicate centers", init);
        }
    }

    #[test]
    fn identical_candidates_yield_single_center() {
        // 20 copies of the same point: only one usable center exists.
        let vectors: Vec<f32> = std::iter::repeat([3.0f32, -1.0]).take(20).flatten().collect();
        let candidates: Vec<u32> = (0..20).collect();
        for init in ALL_INITS {
            let mut rng = StdRng::seed_from_u64(42);
            let mut centers = Vec::new();
            let got = choose_centers(
                init,
                8,
                &candidates,
                &vectors,
                2,
                DistanceMetric::SquaredL2,
                &mut rng,
                &mut centers,
            );
            assert_eq!(got, 1, "{:?} must collapse duplicates to one center", init);
        }
    }

    #[test]
    fn two_unique_points_cap_the_count() {
        let vectors = flat(&[[0.0, 0.0], [1.0, 1.0], [0.0, 0.0], [1.0, 1.0]]);
        let candidates: Vec<u32> = (0..4).collect();
        for init in ALL_INITS {
            let mut rng = StdRng::seed_from_u64(3);
            let mut centers = Vec::new();
            let got = choose_centers(
                init,
                4,
                &candidates,
                &vectors,
                2,
                DistanceMetric::SquaredL2,
                &mut rng,
                &mut centers,
            );
            assert_eq!(got, 2, "{:?} found {} centers", init, got);
        }
    }

    #[test]
    fn gonzales_picks_the_farthest_point_next() {
        // Whatever the first (random) pick, the farthest remaining point from
        // it in this layout is one of the two extremes.
        let vectors = flat(&[[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [100.0, 0.0]]);
        let candidates: Vec<u32> = (0..4).collect();
        let mut rng = StdRng::seed_from_u64(11);
        let mut centers = Vec::new();
        choose_centers(
            CentersInit::Gonzales,
            2,
            &candidates,
            &vectors,
            2,
            DistanceMetric::SquaredL2,
            &mut rng,
            &mut centers,
        );
        assert!(
            centers.contains(&3) || centers.contains(&0),
            "expected an extreme point among {:?}",
            centers
        );
    }

    #[test]
    fn empty_candidates_choose_nothing() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut centers = Vec::new();
        let got = choose_centers(
            CentersInit::Random,
            4,
            &[],
            &[],
            2,
            DistanceMetric::SquaredL2,
            &mut rng,
            &mut centers,
        );
        assert_eq!(got, 0);
    }
}
