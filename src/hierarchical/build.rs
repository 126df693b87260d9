//! Recursive clustering and leaf-routing insertion.
//!
//! `compute_clustering` turns a node plus a slice of dataset indices into a
//! subtree: pick centers, label every point with its nearest center, compact
//! the index slice in place so each cluster is contiguous, then recurse per
//! cluster. The in-place compaction means the whole build shares one index
//! buffer per tree instead of allocating per-child lists.

use super::arena::{Node, NodeId};
use super::centers;
use super::HierarchicalClusterIndex;

impl HierarchicalClusterIndex {
    /// Recursively cluster `indices` under `node_id`.
    ///
    /// The node becomes a leaf when the slice is below `leaf_size`, or when
    /// the center chooser cannot produce `branching` distinct centers (a
    /// degenerate candidate set: duplicates or too few unique points). The
    /// latter can freeze a leaf larger than `leaf_size`; search handles
    /// oversized leaves fine, they just cost more checks.
    pub(crate) fn compute_clustering(&mut self, node_id: NodeId, indices: &mut [u32]) {
        let n = indices.len();
        if n < self.params.leaf_size {
            self.freeze_leaf(node_id, indices);
            return;
        }

        let mut chosen = Vec::with_capacity(self.params.branching);
        let found = centers::choose_centers(
            self.params.centers_init,
            self.params.branching,
            indices,
            &self.vectors,
            self.dimension,
            self.metric,
            &mut self.rng,
            &mut chosen,
        );
        if found < self.params.branching {
            self.freeze_leaf(node_id, indices);
            return;
        }

        let (mut labels, cost) = self.compute_labels(indices, &chosen);
        self.last_build_cost += cost;

        // Convert to an inner node. When re-clustering an overflowing leaf
        // the old point list is stale from here on.
        self.arena[node_id].points.clear();
        self.arena[node_id].children.clear();

        // Compact one label at a time: after round `l`, indices[..start]
        // holds clusters 0..=l back to back, and each child recurses on its
        // contiguous sub-slice.
        let mut start = 0usize;
        for (label, &center) in chosen.iter().enumerate() {
            let mut end = start;
            for j in start..n {
                if labels[j] == label {
                    indices.swap(j, end);
                    labels.swap(j, end);
                    end += 1;
                }
            }

            let child = self.arena.alloc(Node::with_pivot(center));
            self.arena[node_id].children.push(child);
            self.compute_clustering(child, &mut indices[start..end]);
            start = end;
        }
    }

    /// Label every index with its nearest center (ties to the lowest label)
    /// and accumulate the summed nearest-center distance.
    fn compute_labels(&self, indices: &[u32], chosen: &[u32]) -> (Vec<usize>, f64) {
        let mut labels = Vec::with_capacity(indices.len());
        let mut cost = 0.0f64;
        for &index in indices {
            let point = self.point(index as usize);
            let mut best = 0usize;
            let mut best_dist = self.metric.distance(point, self.point(chosen[0] as usize));
            for (j, &center) in chosen.iter().enumerate().skip(1) {
                let dist = self.metric.distance(point, self.point(center as usize));
                if dist < best_dist {
                    best_dist = dist;
                    best = j;
                }
            }
            labels.push(best);
            cost += f64::from(best_dist);
        }
        (labels, cost)
    }

    fn freeze_leaf(&mut self, node_id: NodeId, indices: &[u32]) {
        let node = &mut self.arena[node_id];
        node.points.clear();
        node.points.extend_from_slice(indices);
        node.children.clear();
    }

    /// Route one new point down a tree to its closest leaf.
    ///
    /// At every inner node the child with the nearest pivot wins (ties to the
    /// lowest child index). A leaf that reaches `branching` points is
    /// re-clustered in place; if its points are too degenerate to split it
    /// simply stays an oversized leaf.
    pub(crate) fn add_point_to_tree(&mut self, node_id: NodeId, index: u32) {
        if self.arena[node_id].is_leaf() {
            self.arena[node_id].points.push(index);
            if self.arena[node_id].points.len() >= self.params.branching {
                let mut indices = self.arena[node_id].points.clone();
                self.compute_clustering(node_id, &mut indices);
            }
            return;
        }

        let closest = {
            let node = &self.arena[node_id];
            let point = self.point(index as usize);
            let mut closest = node.children[0];
            let mut best = self
                .metric
                .distance(self.point(self.arena[closest].pivot as usize), point);
            for &child in &node.children[1..] {
                let dist = self
                    .metric
                    .distance(self.point(self.arena[child].pivot as usize), point);
                if dist < best {
                    best = dist;
                    closest = child;
                }
            }
            closest
        };
        self.add_point_to_tree(closest, index);
    }
}
