//! Edge types: Functional containment and code-level Dependency relations.

use serde::{Deserialize, Serialize};

/// Code-level relation discovered from AST and data-flow analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepType {
    Import,
    Call,
    Inherit,
}

/// Exactly one variant per edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EdgeKind {
    /// Parent→child containment; the Functional edges form a forest.
    Functional {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sibling_order: Option<u32>,
    },
    /// Source-level relation between two entities.
    Dependency {
        dep_type: DepType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        symbol: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_symbol: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        line: Option<u32>,
    },
}

/// Edge type tag used for identity, filtering, and ordering.
///
/// Upsert identity is `(source, target, tag)`: a functional edge and each
/// dependency kind between the same pair are distinct edges; re-adding an
/// edge with the same triple replaces its attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeTag {
    Functional,
    Import,
    Call,
    Inherit,
}

impl EdgeTag {
    pub fn is_dependency(self) -> bool {
        self != EdgeTag::Functional
    }
}

impl From<DepType> for EdgeTag {
    fn from(dep: DepType) -> Self {
        match dep {
            DepType::Import => EdgeTag::Import,
            DepType::Call => EdgeTag::Call,
            DepType::Inherit => EdgeTag::Inherit,
        }
    }
}

/// A directed edge between two node ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(flatten)]
    pub kind: EdgeKind,
}

impl Edge {
    /// A containment edge with no sibling order.
    pub fn functional(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind: EdgeKind::Functional {
                sibling_order: None,
            },
        }
    }

    /// A containment edge carrying the child's position among its siblings.
    pub fn functional_ordered(
        source: impl Into<String>,
        target: impl Into<String>,
        sibling_order: u32,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind: EdgeKind::Functional {
                sibling_order: Some(sibling_order),
            },
        }
    }

    /// A dependency edge with an optional subject symbol.
    pub fn dependency(
        source: impl Into<String>,
        target: impl Into<String>,
        dep_type: DepType,
        symbol: Option<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind: EdgeKind::Dependency {
                dep_type,
                symbol,
                target_symbol: None,
                line: None,
            },
        }
    }

    pub fn tag(&self) -> EdgeTag {
        match &self.kind {
            EdgeKind::Functional { .. } => EdgeTag::Functional,
            EdgeKind::Dependency { dep_type, .. } => (*dep_type).into(),
        }
    }

    pub fn is_functional(&self) -> bool {
        self.tag() == EdgeTag::Functional
    }

    /// The identity triple the store upserts on.
    pub fn key(&self) -> (String, String, EdgeTag) {
        (self.source.clone(), self.target.clone(), self.tag())
    }
}

/// Filter over the edge set; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct EdgeFilter {
    pub source: Option<String>,
    pub target: Option<String>,
    pub tag: Option<EdgeTag>,
}

impl EdgeFilter {
    pub fn source(id: impl Into<String>) -> Self {
        Self {
            source: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn target(id: impl Into<String>) -> Self {
        Self {
            target: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn with_tag(mut self, tag: EdgeTag) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn matches(&self, edge: &Edge) -> bool {
        self.source.as_ref().is_none_or(|s| *s == edge.source)
            && self.target.as_ref().is_none_or(|t| *t == edge.target)
            && self.tag.is_none_or(|tag| tag == edge.tag())
    }
}
