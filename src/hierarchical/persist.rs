//! Disk persistence for the cluster forest.
//!
//! Directory layout:
//!
//! ```text
//! index-dir/
//! ├── manifest.json   # format version, params, counts, seed, removed set
//! ├── vectors.bin     # row-major little-endian f32 vectors
//! └── trees.bin       # magic + params header, then the forest
//! ```
//!
//! `trees.bin` stores each node as `{pivot: u32, child_count: u32}`; an
//! inner node is followed by its `branching` children recursively, a leaf by
//! `point_count: u32` and its dataset row indices. Leaf lists are persisted
//! (not reconstructed from the dataset), so a loaded index is searchable
//! without a rebuild; the manifest still records the seed for callers who
//! prefer to re-cluster deterministically from the vectors alone.
//!
//! Integers are host-independent little-endian, but the format is intended
//! for machine-local caching rather than cross-host interchange.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::arena::{Node, NodeArena, NodeId};
use super::{CentersInit, HierarchicalClusterIndex, HierarchicalParams};
use crate::distance::DistanceMetric;
use crate::error::IndexError;

/// Magic bytes opening `trees.bin`.
const TREES_MAGIC: &[u8; 4] = b"CNPT";

/// Current persisted-format version.
const FORMAT_VERSION: u32 = 1;

/// Errors that can occur while saving or loading an index.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// I/O error (file operations, disk I/O).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest (de)serialization error.
    #[error("manifest error: {0}")]
    Json(#[from] serde_json::Error),

    /// Format error (bad magic bytes, version mismatch, corruption).
    #[error("format error: {0}")]
    Format(String),

    /// Invalid state (e.g. saving an index that was never built).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Index-level error while reconstructing (bad params, unknown tag).
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Result type for persistence operations.
pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;

/// `manifest.json` contents.
#[derive(Debug, Serialize, Deserialize)]
struct IndexManifest {
    version: u32,
    algorithm: String,
    dimension: usize,
    num_vectors: usize,
    size_at_build: usize,
    seed: u64,
    params: HierarchicalParams,
    metric: DistanceMetric,
    /// Approximate in-memory footprint at save time (informational).
    memory_bytes: usize,
    /// Logically removed dataset indices, sorted.
    removed: Vec<u32>,
}

impl HierarchicalClusterIndex {
    /// Save the index into a directory (created if missing).
    pub fn save(&self, dir: &Path) -> PersistenceResult<()> {
        if !self.built {
            return Err(PersistenceError::InvalidState(
                "cannot save an index that has not been built".to_string(),
            ));
        }
        std::fs::create_dir_all(dir)?;

        let mut removed: Vec<u32> = self.removed.iter().collect();
        removed.sort_unstable();
        let manifest = IndexManifest {
            version: FORMAT_VERSION,
            algorithm: "hierarchical-clustering".to_string(),
            dimension: self.dimension,
            num_vectors: self.num_vectors,
            size_at_build: self.size_at_build,
            seed: self.seed,
            params: self.params.clone(),
            metric: self.metric,
            memory_bytes: self.size_bytes(),
            removed,
        };
        let manifest_file = File::create(dir.join("manifest.json"))?;
        serde_json::to_writer_pretty(manifest_file, &manifest)?;

        let mut vectors = BufWriter::new(File::create(dir.join("vectors.bin"))?);
        for value in &self.vectors {
            vectors.write_all(&value.to_le_bytes())?;
        }
        vectors.flush()?;

        let mut trees = BufWriter::new(File::create(dir.join("trees.bin"))?);
        trees.write_all(TREES_MAGIC)?;
        trees.write_all(&FORMAT_VERSION.to_le_bytes())?;
        trees.write_all(&(self.params.branching as u32).to_le_bytes())?;
        trees.write_all(&(self.params.trees as u32).to_le_bytes())?;
        trees.write_all(&[self.params.centers_init.tag()])?;
        trees.write_all(&(self.params.leaf_size as u32).to_le_bytes())?;
        for &root in &self.roots {
            self.save_tree(&mut trees, root)?;
        }
        trees.flush()?;
        Ok(())
    }

    fn save_tree(&self, w: &mut impl Write, node_id: NodeId) -> PersistenceResult<()> {
        let node = &self.arena[node_id];
        w.write_all(&node.pivot.to_le_bytes())?;
        w.write_all(&(node.children.len() as u32).to_le_bytes())?;
        if node.is_leaf() {
            w.write_all(&(node.points.len() as u32).to_le_bytes())?;
            for &point in &node.points {
                w.write_all(&point.to_le_bytes())?;
            }
        } else {
            for &child in &node.children {
                self.save_tree(w, child)?;
            }
        }
        Ok(())
    }

    /// Load an index previously written by [`HierarchicalClusterIndex::save`].
    pub fn load(dir: &Path) -> PersistenceResult<Self> {
        let manifest_file = File::open(dir.join("manifest.json"))?;
        let manifest: IndexManifest = serde_json::from_reader(BufReader::new(manifest_file))?;
        if manifest.version != FORMAT_VERSION {
            return Err(PersistenceError::Format(format!(
                "unsupported format version {} (expected {})",
                manifest.version, FORMAT_VERSION
            )));
        }

        let mut index = HierarchicalClusterIndex::new(manifest.dimension, manifest.params.clone())?
            .with_seed(manifest.seed)
            .with_metric(manifest.metric);

        let mut vectors = BufReader::new(File::open(dir.join("vectors.bin"))?);
        let total = manifest.num_vectors * manifest.dimension;
        index.vectors = Vec::with_capacity(total);
        let mut buf = [0u8; 4];
        for _ in 0..total {
            vectors.read_exact(&mut buf)?;
            index.vectors.push(f32::from_le_bytes(buf));
        }
        index.num_vectors = manifest.num_vectors;

        let mut trees = BufReader::new(File::open(dir.join("trees.bin"))?);
        let mut magic = [0u8; 4];
        trees.read_exact(&mut magic)?;
        if &magic != TREES_MAGIC {
            return Err(PersistenceError::Format(format!(
                "bad magic bytes {:?} in trees.bin",
                magic
            )));
        }
        let version = read_u32(&mut trees)?;
        if version != FORMAT_VERSION {
            return Err(PersistenceError::Format(format!(
                "unsupported trees.bin version {}",
                version
            )));
        }
        let branching = read_u32(&mut trees)? as usize;
        let num_trees = read_u32(&mut trees)? as usize;
        let centers_init = CentersInit::from_tag(read_u8(&mut trees)?)?;
        let leaf_size = read_u32(&mut trees)? as usize;
        let header = HierarchicalParams {
            branching,
            trees: num_trees,
            leaf_size,
            centers_init,
        };
        if header != manifest.params {
            return Err(PersistenceError::Format(
                "trees.bin parameters disagree with manifest.json".to_string(),
            ));
        }

        for _ in 0..num_trees {
            let root = load_tree(
                &mut index.arena,
                &mut trees,
                branching,
                manifest.num_vectors,
            )?;
            index.roots.push(root);
        }

        index.size_at_build = manifest.size_at_build;
        index.removed = manifest.removed.into_iter().collect();
        index.built = true;
        Ok(index)
    }
}

fn load_tree(
    arena: &mut NodeArena,
    r: &mut impl Read,
    branching: usize,
    num_vectors: usize,
) -> PersistenceResult<NodeId> {
    let pivot = read_u32(r)?;
    let child_count = read_u32(r)? as usize;
    let node_id = arena.alloc(Node::with_pivot(pivot));

    if child_count == 0 {
        let point_count = read_u32(r)? as usize;
        let mut points = Vec::with_capacity(point_count);
        for _ in 0..point_count {
            let point = read_u32(r)?;
            if point as usize >= num_vectors {
                return Err(PersistenceError::Format(format!(
                    "leaf references point {} beyond dataset size {}",
                    point, num_vectors
                )));
            }
            points.push(point);
        }
        arena[node_id].points = points;
    } else {
        if child_count != branching {
            return Err(PersistenceError::Format(format!(
                "inner node with {} children (branching is {})",
                child_count, branching
            )));
        }
        for _ in 0..child_count {
            let child = load_tree(arena, r, branching, num_vectors)?;
            arena[node_id].children.push(child);
        }
    }
    Ok(node_id)
}

fn read_u32(r: &mut impl Read) -> PersistenceResult<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u8(r: &mut impl Read) -> PersistenceResult<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchical::CHECKS_UNLIMITED;

    fn sample_index() -> HierarchicalClusterIndex {
        let params = HierarchicalParams {
            branching: 3,
            trees: 2,
            leaf_size: 4,
            centers_init: CentersInit::Gonzales,
        };
        let mut index = HierarchicalClusterIndex::new(2, params).unwrap().with_seed(99);
        for i in 0..60 {
            index
                .add_slice(&[(i % 8) as f32, (i / 8) as f32 * 1.5])
                .unwrap();
        }
        index.build().unwrap();
        index.remove(7).unwrap();
        index
    }

    #[test]
    fn save_requires_a_built_index() {
        let dir = tempfile::tempdir().unwrap();
        let index =
            HierarchicalClusterIndex::new(2, HierarchicalParams::default()).unwrap();
        assert!(matches!(
            index.save(dir.path()),
            Err(PersistenceError::InvalidState(_))
        ));
    }

    #[test]
    fn round_trip_preserves_search_results() {
        let dir = tempfile::tempdir().unwrap();
        let index = sample_index();
        index.save(dir.path()).unwrap();

        let loaded = HierarchicalClusterIndex::load(dir.path()).unwrap();
        assert_eq!(loaded.len(), index.len());
        assert_eq!(loaded.dimension(), index.dimension());
        assert_eq!(loaded.size_at_build(), index.size_at_build());
        assert_eq!(loaded.params(), index.params());
        assert!(loaded.removed().is_removed(7));

        for query in [[0.0f32, 0.0], [3.2, 4.1], [7.0, 9.0]] {
            let a = index.search(&query, 5, CHECKS_UNLIMITED).unwrap();
            let b = loaded.search(&query, 5, CHECKS_UNLIMITED).unwrap();
            assert_eq!(a, b, "results diverged for {:?}", query);
        }
        // Budget-truncated traversal order must survive the round trip too.
        let a = index.search(&[2.0, 2.0], 3, 10).unwrap();
        let b = loaded.search(&[2.0, 2.0], 3, 10).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn corrupt_magic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        sample_index().save(dir.path()).unwrap();

        let trees_path = dir.path().join("trees.bin");
        let mut bytes = std::fs::read(&trees_path).unwrap();
        bytes[0] ^= 0xFF;
        std::fs::write(&trees_path, bytes).unwrap();

        assert!(matches!(
            HierarchicalClusterIndex::load(dir.path()),
            Err(PersistenceError::Format(_))
        ));
    }

    #[test]
    fn truncated_trees_are_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        sample_index().save(dir.path()).unwrap();

        let trees_path = dir.path().join("trees.bin");
        let bytes = std::fs::read(&trees_path).unwrap();
        std::fs::write(&trees_path, &bytes[..bytes.len() / 2]).unwrap();

        assert!(matches!(
            HierarchicalClusterIndex::load(dir.path()),
            Err(PersistenceError::Io(_))
        ));
    }
}
