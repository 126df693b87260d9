//! Best-bin-first search across the forest.
//!
//! Each tree contributes one initial root-to-leaf descent; every sibling
//! branch passed over on the way down is parked in a single shared min-heap
//! keyed by its pivot distance (a cheap lower-bound proxy, not a true bound,
//! since the metric need not satisfy the triangle inequality). The main loop
//! resumes branches in ascending key order, so exploration hops between
//! trees freely instead of draining one tree at a time.
//!
//! Traversal order is fully deterministic: best-child selection breaks pivot
//! ties toward the lowest child index, and heap entries carry an insertion
//! sequence number so equal keys pop in insertion order. Determinism matters
//! because the check budget truncates the traversal; the same query with the
//! same budget must see the same prefix.

use std::collections::BinaryHeap;

use smallvec::SmallVec;

use super::arena::NodeId;
use super::HierarchicalClusterIndex;
use crate::error::{IndexError, Result};
use crate::result::ResultSet;

/// A deferred branch: a node whose subtree is still unexplored, keyed by the
/// distance from the query to the node's pivot.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Branch {
    node: NodeId,
    lower_bound: f32,
    /// Insertion sequence, the tie-break for equal lower bounds.
    seq: u64,
}

impl Eq for Branch {}

impl PartialOrd for Branch {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Branch {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed so the std max-heap pops the smallest lower bound first;
        // total_cmp for IEEE 754 total ordering (NaN-safe).
        other
            .lower_bound
            .total_cmp(&self.lower_bound)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl HierarchicalClusterIndex {
    /// Feed the nearest neighbors of `query` into `result`, scoring at most
    /// `max_checks` leaf points (plus the remainder of the last leaf
    /// entered; see below).
    ///
    /// The budget counts leaf distance evaluations, not pivot distances. A
    /// descent that has already entered a leaf finishes scoring it unless
    /// the budget is exhausted AND `result` is full on entry. The budget
    /// therefore bounds the number of leaves entered, which keeps truncated
    /// traversals reproducible.
    pub fn find_neighbors<R: ResultSet>(
        &self,
        result: &mut R,
        query: &[f32],
        max_checks: usize,
    ) -> Result<()> {
        if !self.built {
            return Err(IndexError::NotBuilt);
        }
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                vector_dim: query.len(),
                index_dim: self.dimension,
            });
        }

        let mut heap: BinaryHeap<Branch> = BinaryHeap::new();
        let mut checked = vec![false; self.num_vectors];
        let mut checks = 0usize;
        let mut seq = 0u64;

        for &root in &self.roots {
            self.find_nn(
                root,
                result,
                query,
                &mut checks,
                max_checks,
                &mut heap,
                &mut checked,
                &mut seq,
            );
        }

        while let Some(branch) = heap.pop() {
            if checks >= max_checks && result.full() {
                break;
            }
            self.find_nn(
                branch.node,
                result,
                query,
                &mut checks,
                max_checks,
                &mut heap,
                &mut checked,
                &mut seq,
            );
        }
        Ok(())
    }

    /// One descent: follow the nearest pivot down to a leaf, deferring every
    /// sibling branch into the heap, then score the leaf's points.
    #[allow(clippy::too_many_arguments)]
    fn find_nn<R: ResultSet>(
        &self,
        node_id: NodeId,
        result: &mut R,
        query: &[f32],
        checks: &mut usize,
        max_checks: usize,
        heap: &mut BinaryHeap<Branch>,
        checked: &mut [bool],
        seq: &mut u64,
    ) {
        let node = &self.arena[node_id];
        if node.is_leaf() {
            if *checks >= max_checks && result.full() {
                return;
            }
            for &index in &node.points {
                let i = index as usize;
                if checked[i] || self.removed.is_removed(index) {
                    continue;
                }
                let dist = self.metric.distance(self.point(i), query);
                result.add_point(dist, index);
                checked[i] = true;
                *checks += 1;
            }
            return;
        }

        let mut domain_distances: SmallVec<[f32; 32]> = SmallVec::new();
        let mut best = 0usize;
        for (i, &child) in node.children.iter().enumerate() {
            let pivot = self.arena[child].pivot as usize;
            let dist = self.metric.distance(query, self.point(pivot));
            domain_distances.push(dist);
            if dist < domain_distances[best] {
                best = i;
            }
        }
        for (i, &child) in node.children.iter().enumerate() {
            if i != best {
                heap.push(Branch {
                    node: child,
                    lower_bound: domain_distances[i],
                    seq: *seq,
                });
                *seq += 1;
            }
        }
        self.find_nn(
            node.children[best],
            result,
            query,
            checks,
            max_checks,
            heap,
            checked,
            seq,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchical::{CentersInit, HierarchicalParams, CHECKS_UNLIMITED};
    use crate::result::KnnResultSet;

    fn four_corner_index() -> HierarchicalClusterIndex {
        let params = HierarchicalParams {
            branching: 2,
            trees: 1,
            leaf_size: 1,
            centers_init: CentersInit::Random,
        };
        let mut index = HierarchicalClusterIndex::new(2, params).unwrap().with_seed(1);
        for v in [[0.0f32, 0.0], [1.0, 0.0], [0.0, 1.0], [10.0, 10.0]] {
            index.add_slice(&v).unwrap();
        }
        index.build().unwrap();
        index
    }

    #[test]
    fn branch_ordering_pops_smallest_bound_then_insertion_order() {
        let mut heap = BinaryHeap::new();
        heap.push(Branch {
            node: NodeId(0),
            lower_bound: 2.0,
            seq: 0,
        });
        heap.push(Branch {
            node: NodeId(1),
            lower_bound: 1.0,
            seq: 1,
        });
        heap.push(Branch {
            node: NodeId(2),
            lower_bound: 1.0,
            seq: 2,
        });

        let order: Vec<u32> = std::iter::from_fn(|| heap.pop().map(|b| b.node.0)).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn unlimited_checks_find_the_exact_neighbor() {
        let index = four_corner_index();
        let got = index.search(&[0.1, 0.1], 1, CHECKS_UNLIMITED).unwrap();
        assert_eq!(got[0].0, 0);
    }

    #[test]
    fn budget_of_dataset_size_is_exact_here() {
        let index = four_corner_index();
        let got = index.search(&[0.1, 0.1], 1, 4).unwrap();
        assert_eq!(got[0].0, 0);
    }

    #[test]
    fn tiny_budget_still_returns_something() {
        let index = four_corner_index();
        let got = index.search(&[0.1, 0.1], 1, 1).unwrap();
        assert_eq!(got.len(), 1);
    }

    #[test]
    fn no_point_is_scored_twice_per_query() {
        // A k = n search with unlimited checks returns each index exactly
        // once even across multiple trees sharing the checked set.
        let params = HierarchicalParams {
            branching: 3,
            trees: 4,
            leaf_size: 4,
            centers_init: CentersInit::Random,
        };
        let mut index = HierarchicalClusterIndex::new(2, params).unwrap().with_seed(3);
        for i in 0..50 {
            index.add_slice(&[(i % 9) as f32, (i / 9) as f32]).unwrap();
        }
        index.build().unwrap();

        let got = index.search(&[4.0, 2.0], 50, CHECKS_UNLIMITED).unwrap();
        let mut ids: Vec<u32> = got.iter().map(|&(i, _)| i).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn removed_points_never_surface() {
        let mut index = four_corner_index();
        index.remove(0).unwrap();
        let got = index.search(&[0.1, 0.1], 4, CHECKS_UNLIMITED).unwrap();
        assert_eq!(got.len(), 3);
        assert!(got.iter().all(|&(i, _)| i != 0));
    }

    #[test]
    fn query_dimension_is_validated() {
        let index = four_corner_index();
        let mut result = KnnResultSet::new(1);
        let err = index
            .find_neighbors(&mut result, &[0.1, 0.1, 0.1], CHECKS_UNLIMITED)
            .unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { .. }));
    }
}
