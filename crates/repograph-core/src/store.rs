//! Abstract graph store contract.
//!
//! The core depends only on this capability set; backends implement it
//! independently. All methods are async in contract — a backend may satisfy
//! them synchronously. Concurrent reads are safe; writes are serialized by
//! the backend.

use crate::edge::{Edge, EdgeFilter, EdgeTag};
use crate::error::Result;
use crate::node::{EntityType, Node, NodePatch};
use crate::snapshot::GraphDoc;
use async_trait::async_trait;

/// Edge direction relative to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    Both,
}

/// Predicate over nodes, applied to traversal results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeFilter {
    HighLevelOnly,
    LowLevelOnly,
    Entity(EntityType),
}

impl NodeFilter {
    pub fn matches(self, node: &Node) -> bool {
        match self {
            NodeFilter::HighLevelOnly => node.is_high_level(),
            NodeFilter::LowLevelOnly => node.is_low_level(),
            NodeFilter::Entity(et) => node.meta().is_some_and(|m| m.entity_type == et),
        }
    }
}

/// Options controlling a breadth-first traversal.
#[derive(Debug, Clone)]
pub struct TraverseOptions {
    pub direction: Direction,
    /// Restrict expansion to edges of this tag.
    pub edge_tag: Option<EdgeTag>,
    /// Maximum hops from the start node.
    pub max_depth: usize,
    /// Applied to the returned node set only, never to expansion.
    pub filter: Option<NodeFilter>,
}

impl Default for TraverseOptions {
    fn default() -> Self {
        Self {
            direction: Direction::Out,
            edge_tag: None,
            max_depth: usize::MAX,
            filter: None,
        }
    }
}

impl TraverseOptions {
    pub fn functional() -> Self {
        Self {
            edge_tag: Some(EdgeTag::Functional),
            ..Self::default()
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_filter(mut self, filter: NodeFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Result of a traversal: discovered nodes (start excluded), the edges
/// between visited nodes, and the deepest level actually reached.
#[derive(Debug, Clone, Default)]
pub struct Traversal {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub max_depth_reached: usize,
}

/// Abstract node/edge CRUD, traversal, and serialization over the graph.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Insert-or-update a node keyed by id.
    async fn add_node(&self, node: Node) -> Result<()>;

    /// Fetch a node by id. `Ok(None)` when absent.
    async fn get_node(&self, id: &str) -> Result<Option<Node>>;

    async fn has_node(&self, id: &str) -> Result<bool>;

    /// List nodes, optionally restricted by a filter, in id order.
    async fn list_nodes(&self, filter: Option<NodeFilter>) -> Result<Vec<Node>>;

    /// Merge a patch into an existing node. `Error::NotFound` when absent.
    async fn update_node(&self, id: &str, patch: NodePatch) -> Result<()>;

    /// Remove a node and every edge incident on it.
    /// Returns whether the node existed.
    async fn remove_node(&self, id: &str) -> Result<bool>;

    /// Upsert an edge keyed on `(source, target, tag)`. Both endpoints must
    /// exist. Functional edges keep the forest invariant: a child's previous
    /// Functional parent edge is replaced, and cycles are rejected.
    async fn add_edge(&self, edge: Edge) -> Result<()>;

    /// Remove an edge by identity triple. Returns whether it existed.
    async fn remove_edge(&self, source: &str, target: &str, tag: EdgeTag) -> Result<bool>;

    /// Edges matching the filter, in (source, target, tag) order.
    /// Filters on unknown ids return empty results, never errors.
    async fn get_edges(&self, filter: &EdgeFilter) -> Result<Vec<Edge>>;

    /// Deduplicated neighbor ids of a node.
    async fn get_neighbors(
        &self,
        id: &str,
        direction: Direction,
        edge_tag: Option<EdgeTag>,
    ) -> Result<Vec<String>>;

    /// Breadth-first traversal from a start node. Carries a visited set, so
    /// it terminates on cyclic dependency subgraphs.
    async fn traverse(&self, start_id: &str, opts: TraverseOptions) -> Result<Traversal>;

    /// Induced subgraph: the given nodes plus edges with both endpoints in
    /// the set. Unknown ids are ignored.
    async fn subgraph(&self, ids: &[String]) -> Result<GraphDoc>;

    /// Full serialization: nodes by id ascending, edges by
    /// (source, target, tag) ascending.
    async fn export(&self) -> Result<GraphDoc>;

    /// Replace the store's contents with a previously exported document.
    async fn import(&self, doc: GraphDoc) -> Result<()>;
}

/// The Functional parent of a node, if any. Convenience over `get_edges`.
pub async fn functional_parent(store: &dyn GraphStore, id: &str) -> Result<Option<String>> {
    let edges = store
        .get_edges(&EdgeFilter::target(id).with_tag(EdgeTag::Functional))
        .await?;
    Ok(edges.into_iter().next().map(|e| e.source))
}

/// The Functional children of a node, in sibling order where present.
pub async fn functional_children(store: &dyn GraphStore, id: &str) -> Result<Vec<String>> {
    let mut edges = store
        .get_edges(&EdgeFilter::source(id).with_tag(EdgeTag::Functional))
        .await?;
    edges.sort_by_key(|e| match &e.kind {
        crate::edge::EdgeKind::Functional { sibling_order } => sibling_order.unwrap_or(u32::MAX),
        crate::edge::EdgeKind::Dependency { .. } => u32::MAX,
    });
    Ok(edges.into_iter().map(|e| e.target).collect())
}
