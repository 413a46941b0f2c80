//! Process-wide dataset registry.
//!
//! One exclusive lock guards the name map; datasets themselves are
//! immutable after publish, so queries clone the `Arc` handle and run
//! lock-free. An unload cannot invalidate a query in progress: the handle
//! keeps the dataset alive until the last reader drops it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::Result;
use crate::graph::RouteGraph;
use crate::mem;
use crate::spatial::IndexKind;

/// A published dataset: immutable graph plus optional key/value info
/// (e.g. `boundary_geojson`).
pub struct Dataset {
    pub name: String,
    pub graph: RouteGraph,
    pub info: HashMap<String, String>,
}

#[derive(Default)]
pub struct Registry {
    inner: RwLock<HashMap<String, Arc<Dataset>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin a handle to a dataset for the duration of a request.
    pub fn get(&self, name: &str) -> Option<Arc<Dataset>> {
        self.inner.read().unwrap().get(name).cloned()
    }

    /// Sorted names of all published datasets.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Publish a fully built dataset, replacing any previous one of the
    /// same name.
    pub fn publish(&self, dataset: Dataset) {
        let name = dataset.name.clone();
        self.inner
            .write()
            .unwrap()
            .insert(name.clone(), Arc::new(dataset));
        tracing::info!(dataset = %name, "dataset published");
    }

    /// Remove a dataset; returns whether it was present. Freed pages are
    /// handed back to the OS once the map entry is gone.
    pub fn unload(&self, name: &str) -> bool {
        let removed = self.inner.write().unwrap().remove(name).is_some();
        if removed {
            tracing::info!(dataset = name, "dataset unloaded");
            mem::release_to_os();
        }
        removed
    }

    /// Build a dataset from shortcut + edge files and publish it. Nothing
    /// is published if any stage fails.
    pub fn load_from_files(
        &self,
        name: &str,
        shortcuts_path: &std::path::Path,
        edges_path: &std::path::Path,
        index: IndexKind,
    ) -> Result<()> {
        tracing::info!(dataset = name, "loading dataset from files");
        let mut graph = RouteGraph::load(shortcuts_path, edges_path)?;
        graph.build_spatial_index(index);
        tracing::info!(
            dataset = name,
            shortcuts = graph.shortcut_count(),
            edges = graph.edge_count(),
            memory_bytes = graph.memory_usage(),
            "dataset ready"
        );
        self.publish(Dataset {
            name: name.to_string(),
            graph,
            info: HashMap::new(),
        });
        mem::release_to_os();
        Ok(())
    }

    /// Build a dataset from an embedded analytic database file and publish
    /// it.
    #[cfg(feature = "duckdb")]
    pub fn load_from_duckdb(
        &self,
        name: &str,
        db_path: &std::path::Path,
        index: IndexKind,
    ) -> Result<()> {
        tracing::info!(dataset = name, "loading dataset from database");
        let loaded = crate::store::duck::load_dataset(db_path)?;
        let mut graph = RouteGraph::from_parts(loaded.shortcuts, loaded.edges);
        graph.build_spatial_index(index);
        self.publish(Dataset {
            name: name.to_string(),
            graph,
            info: loaded.info,
        });
        mem::release_to_os();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{EdgeMeta, EdgeMetaStore, ShortcutRow, ShortcutStore};

    fn tiny_dataset(name: &str) -> Dataset {
        let shortcuts = ShortcutStore::from_rows(vec![ShortcutRow {
            from: 1,
            to: 2,
            cost: 1.0,
            via_edge: 0,
            cell: 0,
            inside: 1,
        }])
        .unwrap();
        let mut edges = EdgeMetaStore::new();
        edges.insert(1, EdgeMeta::default());
        edges.insert(2, EdgeMeta::default());
        Dataset {
            name: name.to_string(),
            graph: RouteGraph::from_parts(shortcuts, edges),
            info: HashMap::new(),
        }
    }

    #[test]
    fn test_lifecycle() {
        let registry = Registry::new();
        assert!(registry.get("a").is_none());
        assert!(!registry.unload("a"));

        registry.publish(tiny_dataset("a"));
        registry.publish(tiny_dataset("b"));
        assert_eq!(registry.list(), vec!["a".to_string(), "b".to_string()]);

        assert!(registry.unload("a"));
        assert!(!registry.unload("a"));
        assert_eq!(registry.list(), vec!["b".to_string()]);
    }

    #[test]
    fn test_handle_survives_unload() {
        let registry = Registry::new();
        registry.publish(tiny_dataset("a"));
        let handle = registry.get("a").unwrap();
        assert!(registry.unload("a"));
        // the pinned handle still answers queries
        assert_eq!(handle.graph.shortcut_count(), 1);
    }

    #[test]
    fn test_replace_same_name() {
        let registry = Registry::new();
        registry.publish(tiny_dataset("a"));
        let first = registry.get("a").unwrap();
        registry.publish(tiny_dataset("a"));
        let second = registry.get("a").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(registry.list().len(), 1);
    }
}
