//! Hierarchical clustering trees for approximate nearest-neighbor search.
//!
//! Builds a forest of cluster trees by recursive k-means-style partitioning,
//! then answers queries with a best-bin-first (BBF) search that interleaves
//! descents across all trees through one shared priority queue.
//!
//! # Algorithm
//!
//! **Build**: each tree recursively splits its points into `branching`
//! clusters. A split picks initial centers with one of three strategies
//! (random, Gonzales farthest-point, k-means++), assigns every point to its
//! nearest center, and recurses per cluster. Splitting stops below
//! `leaf_size`, or when the candidate set is too degenerate to produce
//! `branching` distinct centers.
//!
//! ```text
//!                 root (tree 0)        root (tree 1)   ...
//!               /   |   \
//!         pivot₀ pivot₁  pivot₂        (inner: branching children,
//!          /|\    /|\     /|\           pivot = cluster center vector)
//!         ...    ...    [leaf]         (leaf: < leaf_size point indices)
//! ```
//!
//! **Search**: one descent per tree follows the nearest pivot at every level
//! and parks the sibling branches in a shared min-heap keyed by their pivot
//! distance. The main loop then repeatedly resumes the globally
//! cheapest-looking deferred branch, across all trees at once, until the
//! check budget runs out and the result accumulator is full.
//!
//! The index is approximate: quality is controlled by the per-query `checks`
//! budget (the number of leaf points scored), not by an error bound. With
//! `checks >= len()` the search degenerates to exact brute force.
//!
//! # Parameter trade-offs
//!
//! | Parameter | ↑ Effect |
//! |-----------|----------|
//! | `branching` | Finer splits, more pivot distances per level |
//! | `trees` | Better recall per check budget, more memory and build time |
//! | `leaf_size` | Fewer levels, more points scored per leaf entered |
//! | `checks` (query-time) | Better recall, slower search |
//!
//! # Usage
//!
//! ```
//! use canopy::{HierarchicalClusterIndex, HierarchicalParams, CHECKS_UNLIMITED};
//!
//! # fn main() -> Result<(), canopy::IndexError> {
//! let mut index = HierarchicalClusterIndex::new(2, HierarchicalParams::default())?;
//! for v in [[0.0f32, 0.0], [1.0, 0.0], [0.0, 1.0], [10.0, 10.0]] {
//!     index.add_slice(&v)?;
//! }
//! index.build()?;
//!
//! let neighbors = index.search(&[0.1, 0.1], 1, CHECKS_UNLIMITED)?;
//! assert_eq!(neighbors[0].0, 0);
//! # Ok(())
//! # }
//! ```
//!
//! # References
//!
//! - Muja & Lowe (2014): "Scalable Nearest Neighbor Algorithms for High
//!   Dimensional Data"
//! - Beis & Lowe (1997): "Shape indexing using approximate nearest-neighbour
//!   search in high-dimensional spaces" (best-bin-first)
//! - Arthur & Vassilvitskii (2007): "k-means++: The Advantages of Careful
//!   Seeding"

pub(crate) mod arena;
mod build;
pub mod centers;
pub mod persist;
mod search;
pub mod tombstones;

pub use centers::CentersInit;
pub use persist::{PersistenceError, PersistenceResult};
pub use tombstones::RemovedSet;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::distance::DistanceMetric;
use crate::error::{IndexError, Result};
use crate::result::{KnnResultSet, RadiusResultSet};
use arena::{NodeArena, NodeId};

/// Check budget meaning "score every reachable point" (exact search).
pub const CHECKS_UNLIMITED: usize = usize::MAX;

/// Default dataset-growth factor that triggers a full rebuild on insert.
pub const DEFAULT_REBUILD_THRESHOLD: f32 = 2.0;

/// Seed used when the caller does not supply one.
const DEFAULT_SEED: u64 = 42;

/// Construction parameters for [`HierarchicalClusterIndex`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchicalParams {
    /// Cluster fan-out per split (children per inner node). Minimum 2.
    pub branching: usize,
    /// Number of independently clustered trees in the forest.
    pub trees: usize,
    /// Node size below which no further splitting is attempted.
    pub leaf_size: usize,
    /// Algorithm used for picking the initial cluster centers.
    pub centers_init: CentersInit,
}

impl Default for HierarchicalParams {
    fn default() -> Self {
        Self {
            branching: 32,
            trees: 4,
            leaf_size: 100,
            centers_init: CentersInit::Random,
        }
    }
}

/// Summary statistics about a built index.
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub num_vectors: usize,
    pub dimension: usize,
    pub trees: usize,
    /// Total nodes across the forest.
    pub nodes: usize,
    /// Leaf nodes across the forest.
    pub leaves: usize,
    /// Largest leaf (can exceed `leaf_size` for frozen degenerate clusters).
    pub max_leaf: usize,
    /// Logically removed points.
    pub removed: usize,
    /// Approximate heap footprint in bytes.
    pub size_bytes: usize,
    /// Summed nearest-center distance over all splits of the last build
    /// (clustering quality diagnostic; lower is tighter).
    pub last_build_cost: f64,
}

/// Forest of hierarchical cluster trees over a set of fixed-dimension
/// `f32` vectors.
///
/// The index owns its vectors in a flat row-major buffer; dataset row `i`
/// is the slice `i * dimension .. (i + 1) * dimension`. Leaf nodes and
/// pivots refer to rows by index, so the whole forest is invalidated and
/// rebuilt together (see [`HierarchicalClusterIndex::build`]).
#[derive(Debug)]
pub struct HierarchicalClusterIndex {
    pub(crate) vectors: Vec<f32>,
    pub(crate) dimension: usize,
    pub(crate) num_vectors: usize,
    pub(crate) params: HierarchicalParams,
    pub(crate) metric: DistanceMetric,
    pub(crate) arena: NodeArena,
    pub(crate) roots: Vec<NodeId>,
    pub(crate) size_at_build: usize,
    pub(crate) removed: RemovedSet,
    pub(crate) seed: u64,
    pub(crate) rng: StdRng,
    pub(crate) built: bool,
    pub(crate) last_build_cost: f64,
}

impl HierarchicalClusterIndex {
    /// Create an empty index for vectors of the given dimension.
    pub fn new(dimension: usize, params: HierarchicalParams) -> Result<Self> {
        if dimension == 0 {
            return Err(IndexError::InvalidParameter(
                "dimension must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            vectors: Vec::new(),
            dimension,
            num_vectors: 0,
            params,
            metric: DistanceMetric::SquaredL2,
            arena: NodeArena::new(),
            roots: Vec::new(),
            size_at_build: 0,
            removed: RemovedSet::new(),
            seed: DEFAULT_SEED,
            rng: StdRng::seed_from_u64(DEFAULT_SEED),
            built: false,
            last_build_cost: 0.0,
        })
    }

    /// Configure a deterministic seed for center selection.
    ///
    /// Two indexes built with the same seed, parameters and insertion order
    /// produce identical forests.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Configure the distance metric (default: squared L2).
    #[must_use]
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Append one vector to the dataset.
    ///
    /// Before `build()` this is how the dataset is loaded. After `build()`
    /// the vector is stored but not indexed; use
    /// [`HierarchicalClusterIndex::add_points`] to insert into the forest.
    pub fn add_slice(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                vector_dim: vector.len(),
                index_dim: self.dimension,
            });
        }
        self.vectors.extend_from_slice(vector);
        self.num_vectors += 1;
        Ok(())
    }

    /// Build the forest from scratch over the current dataset.
    ///
    /// Resets the arena (reclaiming any previous forest in bulk) and
    /// clusters `trees` independent trees. Center selection draws from the
    /// index's seeded RNG, one stream shared across trees.
    pub fn build(&mut self) -> Result<()> {
        if self.params.branching < 2 {
            return Err(IndexError::BranchingTooSmall);
        }
        if self.num_vectors == 0 {
            return Err(IndexError::EmptyIndex);
        }

        self.arena.reset();
        self.roots.clear();
        self.last_build_cost = 0.0;

        let mut indices: Vec<u32> = Vec::with_capacity(self.num_vectors);
        for _ in 0..self.params.trees {
            indices.clear();
            indices.extend(0..self.num_vectors as u32);
            let root = self.arena.alloc(arena::Node::default());
            self.roots.push(root);
            self.compute_clustering(root, &mut indices);
        }

        self.size_at_build = self.num_vectors;
        self.built = true;
        Ok(())
    }

    /// Insert a flat row-major matrix of new vectors into a built index.
    ///
    /// When `rebuild_threshold > 1` and the dataset has grown past
    /// `size_at_build * rebuild_threshold`, the whole forest is rebuilt from
    /// scratch (amortized re-clustering). Otherwise each new point is routed
    /// down every tree to its closest leaf; a leaf reaching `branching`
    /// points is re-clustered in place. A threshold of `0.0` disables
    /// rebuilds entirely.
    pub fn add_points(&mut self, points: &[f32], rebuild_threshold: f32) -> Result<()> {
        if !self.built {
            return Err(IndexError::NotBuilt);
        }
        if points.len() % self.dimension != 0 {
            return Err(IndexError::InvalidParameter(format!(
                "points length {} is not a multiple of dimension {}",
                points.len(),
                self.dimension
            )));
        }
        let added = points.len() / self.dimension;
        if added == 0 {
            return Ok(());
        }

        let old_size = self.num_vectors;
        self.vectors.extend_from_slice(points);
        self.num_vectors += added;

        if rebuild_threshold > 1.0
            && (self.size_at_build as f64) * f64::from(rebuild_threshold)
                < self.num_vectors as f64
        {
            return self.build();
        }

        for i in 0..added {
            let index = (old_size + i) as u32;
            for t in 0..self.params.trees {
                let root = self.roots[t];
                self.add_point_to_tree(root, index);
            }
        }
        Ok(())
    }

    /// Logically remove a point. It stays in the dataset (pivots referencing
    /// it keep routing) but never appears in search results again.
    ///
    /// Returns true if the point was newly removed.
    pub fn remove(&mut self, index: u32) -> Result<bool> {
        if index as usize >= self.num_vectors {
            return Err(IndexError::InvalidParameter(format!(
                "index {} out of range for {} vectors",
                index, self.num_vectors
            )));
        }
        Ok(self.removed.remove(index))
    }

    /// Search for the `k` nearest neighbors of `query` under the check
    /// budget, returning `(index, distance)` pairs in ascending distance.
    pub fn search(&self, query: &[f32], k: usize, checks: usize) -> Result<Vec<(u32, f32)>> {
        let mut result = KnnResultSet::new(k);
        self.find_neighbors(&mut result, query, checks)?;
        Ok(result.into_sorted_vec())
    }

    /// Collect every point within `radius` of `query` that the check budget
    /// reaches, in ascending distance.
    pub fn search_radius(
        &self,
        query: &[f32],
        radius: f32,
        checks: usize,
    ) -> Result<Vec<(u32, f32)>> {
        let mut result = RadiusResultSet::new(radius);
        self.find_neighbors(&mut result, query, checks)?;
        Ok(result.into_sorted_vec())
    }

    /// Number of vectors in the dataset (including logically removed ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.num_vectors
    }

    /// Whether the dataset is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_vectors == 0
    }

    /// Vector dimension.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of trees in the forest.
    #[must_use]
    pub fn num_trees(&self) -> usize {
        self.params.trees
    }

    /// Construction parameters.
    #[must_use]
    pub fn params(&self) -> &HierarchicalParams {
        &self.params
    }

    /// Distance metric in use.
    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Seed driving center selection.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Dataset size at the time of the last full (re)build.
    #[must_use]
    pub fn size_at_build(&self) -> usize {
        self.size_at_build
    }

    /// Whether `build()` has run.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// The logical-deletion set.
    #[must_use]
    pub fn removed(&self) -> &RemovedSet {
        &self.removed
    }

    /// Approximate heap footprint of the index in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.vectors.capacity() * std::mem::size_of::<f32>() + self.arena.size_bytes()
    }

    /// Summary statistics over the current forest.
    #[must_use]
    pub fn stats(&self) -> IndexStats {
        let mut leaves = 0;
        let mut max_leaf = 0;
        for node in self.arena.iter() {
            if node.is_leaf() {
                leaves += 1;
                max_leaf = max_leaf.max(node.points.len());
            }
        }
        IndexStats {
            num_vectors: self.num_vectors,
            dimension: self.dimension,
            trees: self.roots.len(),
            nodes: self.arena.len(),
            leaves,
            max_leaf,
            removed: self.removed.len(),
            size_bytes: self.size_bytes(),
            last_build_cost: self.last_build_cost,
        }
    }

    /// Dataset row `index` as a slice.
    #[inline]
    pub(crate) fn point(&self, index: usize) -> &[f32] {
        let start = index * self.dimension;
        &self.vectors[start..start + self.dimension]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_params() -> HierarchicalParams {
        HierarchicalParams {
            branching: 2,
            trees: 1,
            leaf_size: 1,
            centers_init: CentersInit::Random,
        }
    }

    #[test]
    fn zero_dimension_is_rejected() {
        let err = HierarchicalClusterIndex::new(0, HierarchicalParams::default()).unwrap_err();
        assert!(matches!(err, IndexError::InvalidParameter(_)));
    }

    #[test]
    fn build_requires_vectors() {
        let mut index = HierarchicalClusterIndex::new(2, small_params()).unwrap();
        assert_eq!(index.build(), Err(IndexError::EmptyIndex));
    }

    #[test]
    fn build_rejects_branching_below_two() {
        let mut params = small_params();
        params.branching = 1;
        let mut index = HierarchicalClusterIndex::new(2, params).unwrap();
        index.add_slice(&[0.0, 0.0]).unwrap();
        let err = index.build().unwrap_err();
        assert_eq!(err, IndexError::BranchingTooSmall);
        assert_eq!(err.to_string(), "Branching factor must be at least 2");
    }

    #[test]
    fn search_requires_build() {
        let mut index = HierarchicalClusterIndex::new(2, small_params()).unwrap();
        index.add_slice(&[0.0, 0.0]).unwrap();
        assert_eq!(
            index.search(&[0.0, 0.0], 1, CHECKS_UNLIMITED),
            Err(IndexError::NotBuilt)
        );
    }

    #[test]
    fn add_slice_validates_dimension() {
        let mut index = HierarchicalClusterIndex::new(3, small_params()).unwrap();
        let err = index.add_slice(&[1.0, 2.0]).unwrap_err();
        assert_eq!(
            err,
            IndexError::DimensionMismatch {
                vector_dim: 2,
                index_dim: 3
            }
        );
    }

    #[test]
    fn add_points_validates_matrix_shape() {
        let mut index = HierarchicalClusterIndex::new(2, small_params()).unwrap();
        index.add_slice(&[0.0, 0.0]).unwrap();
        index.add_slice(&[1.0, 1.0]).unwrap();
        index.build().unwrap();
        assert!(matches!(
            index.add_points(&[1.0, 2.0, 3.0], 2.0),
            Err(IndexError::InvalidParameter(_))
        ));
    }

    #[test]
    fn remove_checks_range() {
        let mut index = HierarchicalClusterIndex::new(2, small_params()).unwrap();
        index.add_slice(&[0.0, 0.0]).unwrap();
        assert!(index.remove(0).unwrap());
        assert!(!index.remove(0).unwrap());
        assert!(index.remove(1).is_err());
    }

    #[test]
    fn stats_reflect_the_forest() {
        let mut index = HierarchicalClusterIndex::new(2, small_params()).unwrap();
        for i in 0..8 {
            index.add_slice(&[i as f32, (i * 3 % 5) as f32]).unwrap();
        }
        index.build().unwrap();

        let stats = index.stats();
        assert_eq!(stats.num_vectors, 8);
        assert_eq!(stats.trees, 1);
        assert!(stats.leaves > 0);
        assert!(stats.nodes >= stats.leaves);
        assert!(stats.size_bytes > 0);
    }
}
