//! Node types for the Repository Planning Graph.
//!
//! The graph is two-tier: HighLevel nodes are functional groupings
//! (directories or LLM-named areas), LowLevel nodes are concrete code
//! entities (files, classes, functions, methods, variables).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The kind of code entity a LowLevel node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    File,
    Class,
    Function,
    Method,
    Variable,
}

impl EntityType {
    /// Lowercase name as used inside node ids.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Class => "class",
            Self::Function => "function",
            Self::Method => "method",
            Self::Variable => "variable",
        }
    }

    /// Parse the id-segment form back into an entity type.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "file" => Some(Self::File),
            "class" => Some(Self::Class),
            "function" => Some(Self::Function),
            "method" => Some(Self::Method),
            "variable" => Some(Self::Variable),
            _ => None,
        }
    }
}

/// Structural metadata carried by every LowLevel node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub entity_type: EntityType,
    /// Repository-relative path of the defining file.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
}

/// Exactly one variant per node: functional grouping or code entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    HighLevel { directory: String },
    LowLevel { meta: EntityMeta },
}

/// Semantic summary attached to every node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

impl Feature {
    pub fn new(description: impl Into<String>, keywords: Vec<String>) -> Self {
        Self {
            description: description.into(),
            keywords,
        }
    }

    /// Single-line text form used when embedding a node's feature.
    pub fn embedding_text(&self) -> String {
        if self.keywords.is_empty() {
            self.description.clone()
        } else {
            format!("{} | {}", self.description, self.keywords.join(", "))
        }
    }
}

/// Where and when a node was last touched by an encode or evolution step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub commit_sha: String,
    pub updated_at: DateTime<Utc>,
}

/// A graph node: stable string id, tagged kind, feature summary, optional
/// provenance, plus a forward-compatible attribute bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default)]
    pub feature: Feature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Node {
    /// Construct a HighLevel node for a directory path.
    pub fn high_level(id: impl Into<String>, directory: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::HighLevel {
                directory: directory.into(),
            },
            feature: Feature::default(),
            provenance: None,
            extra: BTreeMap::new(),
        }
    }

    /// Construct a LowLevel node from entity metadata.
    pub fn low_level(id: impl Into<String>, meta: EntityMeta) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::LowLevel { meta },
            feature: Feature::default(),
            provenance: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.feature = feature;
        self
    }

    pub fn is_high_level(&self) -> bool {
        matches!(self.kind, NodeKind::HighLevel { .. })
    }

    pub fn is_low_level(&self) -> bool {
        matches!(self.kind, NodeKind::LowLevel { .. })
    }

    /// The entity metadata, when this is a LowLevel node.
    pub fn meta(&self) -> Option<&EntityMeta> {
        match &self.kind {
            NodeKind::LowLevel { meta } => Some(meta),
            NodeKind::HighLevel { .. } => None,
        }
    }

    /// The grouped directory, when this is a HighLevel node.
    pub fn directory(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::HighLevel { directory } => Some(directory),
            NodeKind::LowLevel { .. } => None,
        }
    }
}

/// Partial update applied by `GraphStore::update_node`. Unset fields keep
/// their current value; `extra` entries are merged key-by-key.
#[derive(Debug, Clone, Default)]
pub struct NodePatch {
    pub feature: Option<Feature>,
    pub provenance: Option<Provenance>,
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl NodePatch {
    pub fn feature(feature: Feature) -> Self {
        Self {
            feature: Some(feature),
            ..Self::default()
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Apply the patch to a node in place.
    pub fn apply(self, node: &mut Node) {
        if let Some(feature) = self.feature {
            node.feature = feature;
        }
        if let Some(provenance) = self.provenance {
            node.provenance = Some(provenance);
        }
        for (k, v) in self.extra {
            node.extra.insert(k, v);
        }
    }
}
