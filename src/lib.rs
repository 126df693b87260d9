//! canopy: hierarchical clustering trees for approximate nearest-neighbor
//! search.
//!
//! A forest of cluster trees is built by recursive k-means-style
//! partitioning and searched best-bin-first: every tree's unexplored
//! branches share one priority queue keyed by pivot distance, so the search
//! always resumes the most promising branch anywhere in the forest. Search
//! cost (and recall) is controlled by a per-query `checks` budget.
//!
//! # When to reach for this index
//!
//! - **Any totally ordered dissimilarity works.** The search never relies on
//!   the triangle inequality, only on "smaller means closer", so squared L2
//!   (the default, no square roots) and inner-product scores are fine. Tree
//!   methods that prune with metric bounds can't do that.
//! - **Cheap incremental inserts.** New points route to their closest leaf;
//!   the forest only rebuilds after the dataset outgrows a configurable
//!   threshold, and the rebuild reclaims every node in one arena reset.
//! - **Reproducibility.** Builds are deterministic given a seed, and a
//!   budget-truncated query always scores the same prefix of points; the
//!   traversal order is part of the contract, not an accident.
//!
//! For datasets under ~10K vectors brute force is usually faster; at very
//! high recall targets, raise `checks` (at `checks >= len()` results equal
//! brute force exactly).
//!
//! # Quick start
//!
//! ```
//! use canopy::{CentersInit, HierarchicalClusterIndex, HierarchicalParams};
//!
//! # fn main() -> Result<(), canopy::IndexError> {
//! let params = HierarchicalParams {
//!     branching: 16,
//!     trees: 4,
//!     leaf_size: 50,
//!     centers_init: CentersInit::KMeansPp,
//! };
//! let mut index = HierarchicalClusterIndex::new(4, params)?.with_seed(7);
//! for i in 0..1000u32 {
//!     let x = i as f32;
//!     index.add_slice(&[x.sin(), x.cos(), (x * 0.1).sin(), (x * 0.1).cos()])?;
//! }
//! index.build()?;
//!
//! // 10 nearest neighbors, scoring at most ~128 points.
//! let neighbors = index.search(&[0.0, 1.0, 0.0, 1.0], 10, 128)?;
//! assert_eq!(neighbors.len(), 10);
//! # Ok(())
//! # }
//! ```

pub mod distance;
pub mod error;
pub mod hierarchical;
pub mod result;

pub use distance::DistanceMetric;
pub use error::{IndexError, Result};
pub use hierarchical::{
    CentersInit, HierarchicalClusterIndex, HierarchicalParams, IndexStats, PersistenceError,
    PersistenceResult, RemovedSet, CHECKS_UNLIMITED, DEFAULT_REBUILD_THRESHOLD,
};
pub use result::{KnnResultSet, RadiusResultSet, ResultSet};
