//! In-memory `GraphStore` backend.
//!
//! Nodes and edges live in `BTreeMap`s keyed by id and identity triple, so
//! export order falls out of map iteration without a separate sort. Writes
//! are serialized by an `RwLock`; reads may run concurrently.

use crate::edge::{Edge, EdgeFilter, EdgeTag};
use crate::error::{Error, Result};
use crate::node::{Node, NodePatch};
use crate::snapshot::{GraphConfig, GraphDoc};
use crate::store::{Direction, GraphStore, NodeFilter, Traversal, TraverseOptions};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type EdgeKey = (String, String, EdgeTag);

#[derive(Debug, Default)]
struct Inner {
    config: GraphConfig,
    nodes: BTreeMap<String, Node>,
    edges: BTreeMap<EdgeKey, Edge>,
}

impl Inner {
    fn functional_parent_of(&self, id: &str) -> Option<&str> {
        self.edges
            .values()
            .find(|e| e.target == id && e.tag() == EdgeTag::Functional)
            .map(|e| e.source.as_str())
    }

    /// Whether `ancestor` is reachable from `id` walking Functional parent
    /// edges upward. Used for cycle rejection.
    fn is_functional_ancestor(&self, id: &str, ancestor: &str) -> bool {
        let mut current = id.to_string();
        let mut seen: HashSet<String> = HashSet::new();
        while let Some(parent) = self.functional_parent_of(&current) {
            if parent == ancestor {
                return true;
            }
            if !seen.insert(parent.to_string()) {
                return false;
            }
            current = parent.to_string();
        }
        false
    }

    fn neighbor_ids(
        &self,
        id: &str,
        direction: Direction,
        edge_tag: Option<EdgeTag>,
    ) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for edge in self.edges.values() {
            if edge_tag.is_some_and(|tag| tag != edge.tag()) {
                continue;
            }
            match direction {
                Direction::Out => {
                    if edge.source == id {
                        out.insert(edge.target.clone());
                    }
                }
                Direction::In => {
                    if edge.target == id {
                        out.insert(edge.source.clone());
                    }
                }
                Direction::Both => {
                    if edge.source == id {
                        out.insert(edge.target.clone());
                    }
                    if edge.target == id {
                        out.insert(edge.source.clone());
                    }
                }
            }
        }
        out
    }
}

/// The reference backend: a process-local graph behind an `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                config,
                nodes: BTreeMap::new(),
                edges: BTreeMap::new(),
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| Error::Store("graph store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| Error::Store("graph store lock poisoned".to_string()))
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn add_node(&self, node: Node) -> Result<()> {
        let mut inner = self.write()?;
        inner.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    async fn get_node(&self, id: &str) -> Result<Option<Node>> {
        Ok(self.read()?.nodes.get(id).cloned())
    }

    async fn has_node(&self, id: &str) -> Result<bool> {
        Ok(self.read()?.nodes.contains_key(id))
    }

    async fn list_nodes(&self, filter: Option<NodeFilter>) -> Result<Vec<Node>> {
        let inner = self.read()?;
        Ok(inner
            .nodes
            .values()
            .filter(|n| filter.is_none_or(|f| f.matches(n)))
            .cloned()
            .collect())
    }

    async fn update_node(&self, id: &str, patch: NodePatch) -> Result<()> {
        let mut inner = self.write()?;
        let node = inner
            .nodes
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("node {id}")))?;
        patch.apply(node);
        Ok(())
    }

    async fn remove_node(&self, id: &str) -> Result<bool> {
        let mut inner = self.write()?;
        if inner.nodes.remove(id).is_none() {
            return Ok(false);
        }
        inner
            .edges
            .retain(|_, e| e.source != id && e.target != id);
        Ok(true)
    }

    async fn add_edge(&self, edge: Edge) -> Result<()> {
        let mut inner = self.write()?;
        if !inner.nodes.contains_key(&edge.source) {
            return Err(Error::NotFound(format!("edge source {}", edge.source)));
        }
        if !inner.nodes.contains_key(&edge.target) {
            return Err(Error::NotFound(format!("edge target {}", edge.target)));
        }

        if edge.tag() == EdgeTag::Functional {
            if edge.source == edge.target {
                return Err(Error::InvalidInput(format!(
                    "functional self-edge on {}",
                    edge.source
                )));
            }
            // Rejecting a child→ancestor edge keeps the Functional forest
            // acyclic.
            if inner.is_functional_ancestor(&edge.source, &edge.target) {
                return Err(Error::InvalidInput(format!(
                    "functional cycle: {} is an ancestor of {}",
                    edge.target, edge.source
                )));
            }
            // A node has at most one Functional parent; re-parenting
            // replaces the previous edge.
            if let Some(parent) = inner.functional_parent_of(&edge.target).map(String::from)
                && parent != edge.source
            {
                inner
                    .edges
                    .remove(&(parent, edge.target.clone(), EdgeTag::Functional));
            }
        }

        inner.edges.insert(edge.key(), edge);
        Ok(())
    }

    async fn remove_edge(&self, source: &str, target: &str, tag: EdgeTag) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(inner
            .edges
            .remove(&(source.to_string(), target.to_string(), tag))
            .is_some())
    }

    async fn get_edges(&self, filter: &EdgeFilter) -> Result<Vec<Edge>> {
        let inner = self.read()?;
        Ok(inner
            .edges
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    async fn get_neighbors(
        &self,
        id: &str,
        direction: Direction,
        edge_tag: Option<EdgeTag>,
    ) -> Result<Vec<String>> {
        let inner = self.read()?;
        Ok(inner.neighbor_ids(id, direction, edge_tag).into_iter().collect())
    }

    async fn traverse(&self, start_id: &str, opts: TraverseOptions) -> Result<Traversal> {
        let inner = self.read()?;
        if !inner.nodes.contains_key(start_id) {
            return Ok(Traversal::default());
        }

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(start_id.to_string());
        let mut frontier: VecDeque<String> = VecDeque::new();
        frontier.push_back(start_id.to_string());
        let mut depth = 0;

        while !frontier.is_empty() && depth < opts.max_depth {
            let mut next: VecDeque<String> = VecDeque::new();
            while let Some(id) = frontier.pop_front() {
                for neighbor in inner.neighbor_ids(&id, opts.direction, opts.edge_tag) {
                    if visited.insert(neighbor.clone()) {
                        next.push_back(neighbor);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            depth += 1;
            frontier = next;
        }

        let mut nodes: Vec<Node> = visited
            .iter()
            .filter(|id| id.as_str() != start_id)
            .filter_map(|id| inner.nodes.get(id))
            .filter(|n| opts.filter.is_none_or(|f| f.matches(n)))
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let edges: Vec<Edge> = inner
            .edges
            .values()
            .filter(|e| {
                opts.edge_tag.is_none_or(|tag| tag == e.tag())
                    && visited.contains(&e.source)
                    && visited.contains(&e.target)
            })
            .cloned()
            .collect();

        Ok(Traversal {
            nodes,
            edges,
            max_depth_reached: depth,
        })
    }

    async fn subgraph(&self, ids: &[String]) -> Result<GraphDoc> {
        let inner = self.read()?;
        let set: BTreeSet<&String> = ids.iter().collect();
        let mut doc = GraphDoc::new(inner.config.clone());
        doc.nodes = inner
            .nodes
            .values()
            .filter(|n| set.contains(&n.id))
            .cloned()
            .collect();
        doc.edges = inner
            .edges
            .values()
            .filter(|e| set.contains(&e.source) && set.contains(&e.target))
            .cloned()
            .collect();
        Ok(doc)
    }

    async fn export(&self) -> Result<GraphDoc> {
        let inner = self.read()?;
        let mut doc = GraphDoc::new(inner.config.clone());
        doc.nodes = inner.nodes.values().cloned().collect();
        doc.edges = inner.edges.values().cloned().collect();
        Ok(doc)
    }

    async fn import(&self, doc: GraphDoc) -> Result<()> {
        let mut nodes = BTreeMap::new();
        for node in doc.nodes {
            nodes.insert(node.id.clone(), node);
        }
        let mut edges = BTreeMap::new();
        for edge in doc.edges {
            if !nodes.contains_key(&edge.source) || !nodes.contains_key(&edge.target) {
                return Err(Error::InvalidInput(format!(
                    "dangling edge {} -> {}",
                    edge.source, edge.target
                )));
            }
            edges.insert(edge.key(), edge);
        }

        let mut inner = self.write()?;
        inner.config = doc.config;
        inner.nodes = nodes;
        inner.edges = edges;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::{DepType, EdgeKind};

    fn node(id: &str) -> Node {
        Node::high_level(id, id.trim_start_matches("dir:"))
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::default();
        for id in ["dir:a", "dir:b", "dir:c"] {
            store.add_node(node(id)).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_add_node_is_upsert() {
        let store = seeded().await;
        let mut replacement = node("dir:a");
        replacement.feature.description = "replaced".to_string();
        store.add_node(replacement).await.unwrap();

        let got = store.get_node("dir:a").await.unwrap().unwrap();
        assert_eq!(got.feature.description, "replaced");
        assert_eq!(store.list_nodes(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_add_edge_requires_endpoints() {
        let store = seeded().await;
        let err = store
            .add_edge(Edge::functional("dir:a", "dir:missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_functional_cycle_rejected() {
        let store = seeded().await;
        store.add_edge(Edge::functional("dir:a", "dir:b")).await.unwrap();
        store.add_edge(Edge::functional("dir:b", "dir:c")).await.unwrap();

        let err = store
            .add_edge(Edge::functional("dir:c", "dir:a"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_functional_reparent_replaces_previous_edge() {
        let store = seeded().await;
        store.add_edge(Edge::functional("dir:a", "dir:c")).await.unwrap();
        store.add_edge(Edge::functional("dir:b", "dir:c")).await.unwrap();

        let parents = store
            .get_edges(&EdgeFilter::target("dir:c").with_tag(EdgeTag::Functional))
            .await
            .unwrap();
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].source, "dir:b");
    }

    #[tokio::test]
    async fn test_dependency_edges_coexist_per_dep_type() {
        let store = seeded().await;
        store
            .add_edge(Edge::dependency("dir:a", "dir:b", DepType::Import, None))
            .await
            .unwrap();
        store
            .add_edge(Edge::dependency("dir:a", "dir:b", DepType::Call, None))
            .await
            .unwrap();

        let edges = store.get_edges(&EdgeFilter::source("dir:a")).await.unwrap();
        assert_eq!(edges.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_replaces_attrs() {
        let store = seeded().await;
        store
            .add_edge(Edge::dependency(
                "dir:a",
                "dir:b",
                DepType::Import,
                Some("x".to_string()),
            ))
            .await
            .unwrap();
        store
            .add_edge(Edge::dependency(
                "dir:a",
                "dir:b",
                DepType::Import,
                Some("y".to_string()),
            ))
            .await
            .unwrap();

        let edges = store.get_edges(&EdgeFilter::source("dir:a")).await.unwrap();
        assert_eq!(edges.len(), 1);
        match &edges[0].kind {
            EdgeKind::Dependency { symbol, .. } => assert_eq!(symbol.as_deref(), Some("y")),
            EdgeKind::Functional { .. } => panic!("expected dependency edge"),
        }
    }

    #[tokio::test]
    async fn test_remove_node_cascades_edges() {
        let store = seeded().await;
        store.add_edge(Edge::functional("dir:a", "dir:b")).await.unwrap();
        store
            .add_edge(Edge::dependency("dir:c", "dir:a", DepType::Call, None))
            .await
            .unwrap();

        assert!(store.remove_node("dir:a").await.unwrap());
        let remaining = store.get_edges(&EdgeFilter::default()).await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn test_remove_missing_node_is_false() {
        let store = seeded().await;
        assert!(!store.remove_node("dir:missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_filters_on_unknown_ids_return_empty() {
        let store = seeded().await;
        let edges = store
            .get_edges(&EdgeFilter::source("dir:missing"))
            .await
            .unwrap();
        assert!(edges.is_empty());
        let neighbors = store
            .get_neighbors("dir:missing", Direction::Both, None)
            .await
            .unwrap();
        assert!(neighbors.is_empty());
    }

    #[tokio::test]
    async fn test_traverse_terminates_on_cycles() {
        let store = seeded().await;
        // Dependency cycle a → b → c → a.
        store
            .add_edge(Edge::dependency("dir:a", "dir:b", DepType::Call, None))
            .await
            .unwrap();
        store
            .add_edge(Edge::dependency("dir:b", "dir:c", DepType::Call, None))
            .await
            .unwrap();
        store
            .add_edge(Edge::dependency("dir:c", "dir:a", DepType::Call, None))
            .await
            .unwrap();

        let result = store
            .traverse("dir:a", TraverseOptions::default())
            .await
            .unwrap();
        assert_eq!(result.nodes.len(), 2); // b and c, start excluded
        assert_eq!(result.max_depth_reached, 2);
    }

    #[tokio::test]
    async fn test_traverse_respects_max_depth() {
        let store = seeded().await;
        store.add_edge(Edge::functional("dir:a", "dir:b")).await.unwrap();
        store.add_edge(Edge::functional("dir:b", "dir:c")).await.unwrap();

        let result = store
            .traverse("dir:a", TraverseOptions::functional().with_max_depth(1))
            .await
            .unwrap();
        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.nodes[0].id, "dir:b");
        assert_eq!(result.max_depth_reached, 1);
    }

    #[tokio::test]
    async fn test_traverse_unknown_start_is_empty() {
        let store = seeded().await;
        let result = store
            .traverse("dir:missing", TraverseOptions::default())
            .await
            .unwrap();
        assert!(result.nodes.is_empty());
        assert_eq!(result.max_depth_reached, 0);
    }

    #[tokio::test]
    async fn test_subgraph_is_induced() {
        let store = seeded().await;
        store.add_edge(Edge::functional("dir:a", "dir:b")).await.unwrap();
        store.add_edge(Edge::functional("dir:b", "dir:c")).await.unwrap();

        let doc = store
            .subgraph(&["dir:a".to_string(), "dir:b".to_string()])
            .await
            .unwrap();
        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.edges.len(), 1);
        assert_eq!(doc.edges[0].target, "dir:b");
    }

    #[tokio::test]
    async fn test_export_import_roundtrip() {
        let store = seeded().await;
        store.add_edge(Edge::functional("dir:a", "dir:b")).await.unwrap();
        let doc = store.export().await.unwrap();

        let other = MemoryStore::default();
        other.import(doc.clone()).await.unwrap();
        assert_eq!(other.export().await.unwrap(), doc);
    }

    #[tokio::test]
    async fn test_import_rejects_dangling_edges() {
        let store = MemoryStore::default();
        let mut doc = GraphDoc::new(GraphConfig::named("x"));
        doc.edges.push(Edge::functional("missing", "also-missing"));
        let err = store.import(doc).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_export_order_is_stable() {
        let store = MemoryStore::default();
        for id in ["dir:z", "dir:a", "dir:m"] {
            store.add_node(node(id)).await.unwrap();
        }
        store.add_edge(Edge::functional("dir:z", "dir:a")).await.unwrap();
        store.add_edge(Edge::functional("dir:a", "dir:m")).await.unwrap();

        let doc = store.export().await.unwrap();
        let ids: Vec<&str> = doc.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["dir:a", "dir:m", "dir:z"]);
        assert!(doc.edges[0].source <= doc.edges[1].source);
    }
}
