//! Structure Graph Cache
//!
//! Caches compiled structure graphs on disk, keyed by a hash of the source
//! text. Compilation is deterministic, so identical source always maps to
//! an identical graph; only success results are stored.

use std::hash::{Hash, Hasher};
use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::graph::StructureGraph;

/// Version prefix baked into every key (for future format changes).
const KEY_VERSION: &str = "g1";

pub struct GraphCache {
    tree: sled::Tree,
    // Kept alive for the lifetime of the tree handle.
    _db: sled::Db,
}

impl GraphCache {
    /// Open (or create) a cache under the given directory.
    pub fn open(dir: &Path) -> Result<Self> {
        let db = sled::open(dir)
            .with_context(|| format!("Failed to open graph cache at {}", dir.display()))?;
        let tree = db
            .open_tree("structure_graphs")
            .context("Failed to open structure_graphs tree")?;
        Ok(Self { tree, _db: db })
    }

    /// Look up the graph compiled from this exact source text.
    pub fn get(&self, source: &str) -> Option<StructureGraph> {
        let key = Self::source_key(source);
        let bytes = self.tree.get(key.as_bytes()).ok().flatten()?;
        match serde_json::from_slice(&bytes) {
            Ok(graph) => Some(graph),
            Err(e) => {
                eprintln!("[Cache] Discarding unreadable entry: {}", e);
                None
            }
        }
    }

    /// Store a compilation result. Error results are not cached.
    pub fn put(&self, source: &str, graph: &StructureGraph) -> Result<()> {
        if graph.is_error() {
            return Ok(());
        }
        let key = Self::source_key(source);
        let bytes = serde_json::to_vec(graph).context("Failed to serialize graph for cache")?;
        self.tree
            .insert(key.as_bytes(), bytes)
            .context("Failed to write graph cache entry")?;
        Ok(())
    }

    /// Drop every cached entry.
    pub fn invalidate(&self) -> Result<()> {
        self.tree.clear().context("Failed to clear graph cache")?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    fn source_key(source: &str) -> String {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        source.hash(&mut hasher);
        format!("{}:{:08x}:{:016x}", KEY_VERSION, source.len(), hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::{GraphNode, NodeType};
    use tempfile::tempdir;

    fn sample_graph() -> StructureGraph {
        StructureGraph {
            error: None,
            nodes: vec![GraphNode {
                id: 0,
                label: "Assign: x".to_string(),
                node_type: NodeType::Statement,
                group: 2,
                lineno: Some(1),
            }],
            links: vec![],
        }
    }

    #[test]
    fn test_miss_then_hit() {
        let dir = tempdir().unwrap();
        let cache = GraphCache::open(dir.path()).unwrap();

        assert!(cache.get("x = 1").is_none());

        cache.put("x = 1", &sample_graph()).unwrap();
        let cached = cache.get("x = 1").unwrap();
        assert_eq!(cached.nodes.len(), 1);
        assert_eq!(cached.nodes[0].label, "Assign: x");
    }

    #[test]
    fn test_different_source_misses() {
        let dir = tempdir().unwrap();
        let cache = GraphCache::open(dir.path()).unwrap();
        cache.put("x = 1", &sample_graph()).unwrap();
        assert!(cache.get("x = 2").is_none());
    }

    #[test]
    fn test_error_results_not_cached() {
        let dir = tempdir().unwrap();
        let cache = GraphCache::open(dir.path()).unwrap();
        cache
            .put("", &StructureGraph::failure("Code input is empty."))
            .unwrap();
        assert!(cache.get("").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_clears_entries() {
        let dir = tempdir().unwrap();
        let cache = GraphCache::open(dir.path()).unwrap();
        cache.put("x = 1", &sample_graph()).unwrap();
        assert_eq!(cache.len(), 1);
        cache.invalidate().unwrap();
        assert!(cache.is_empty());
    }
}
