//! Graph document serialization and on-disk persistence.
//!
//! The serialized form is stable: nodes sorted by id ascending, edges by
//! (source, target, tag) ascending, so graph files diff cleanly in git.

use crate::edge::Edge;
use crate::error::{Error, Result};
use crate::node::Node;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::io::Read as _;
use std::path::{Path, PathBuf};

const CURRENT_VERSION: &str = "1.0.0";

const REPOGRAPH_DIR: &str = ".repograph";
const GRAPH_FILE: &str = "graph.json";

/// GitHub coordinates of the encoded repository, when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubInfo {
    pub owner: String,
    pub repo: String,
    pub commit: String,
}

/// Top-level configuration block of a graph file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<GithubInfo>,
}

impl GraphConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A full graph document: `{config, nodes, edges}` in stable order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDoc {
    #[serde(default = "default_version")]
    pub version: String,
    pub config: GraphConfig,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

fn default_version() -> String {
    CURRENT_VERSION.to_string()
}

impl GraphDoc {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            config,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Sort nodes and edges into the stable serialization order.
    pub fn normalize(&mut self) {
        self.nodes.sort_by(|a, b| a.id.cmp(&b.id));
        self.edges.sort_by(|a, b| a.key().cmp(&b.key()));
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Store(format!("failed to serialize graph: {e}")))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let doc: GraphDoc = serde_json::from_str(json)
            .map_err(|e| Error::SchemaMismatch(format!("invalid graph document: {e}")))?;
        if doc.version != CURRENT_VERSION {
            return Err(Error::SchemaMismatch(format!(
                "graph version mismatch: expected {CURRENT_VERSION}, found {}",
                doc.version
            )));
        }
        Ok(doc)
    }
}

/// Path to the repograph directory for a given project root.
pub fn repograph_dir(project_root: &Path) -> PathBuf {
    project_root.join(REPOGRAPH_DIR)
}

/// Path to the graph file for a given project root.
pub fn graph_file(project_root: &Path) -> PathBuf {
    repograph_dir(project_root).join(GRAPH_FILE)
}

/// Zstd magic bytes: 0x28 0xB5 0x2F 0xFD.
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Load a graph document from disk. Zstd-compressed files are detected by
/// magic bytes and decompressed transparently.
pub fn load(project_root: &Path) -> anyhow::Result<GraphDoc> {
    let path = graph_file(project_root);
    let raw = std::fs::read(&path)
        .with_context(|| format!("failed to read graph from {}", path.display()))?;

    let json = if raw.len() >= 4 && raw[..4] == ZSTD_MAGIC {
        let mut decoder = zstd::Decoder::new(&raw[..]).context("failed to init zstd decoder")?;
        let mut decompressed = String::new();
        decoder
            .read_to_string(&mut decompressed)
            .context("failed to decompress graph.json")?;
        decompressed
    } else {
        String::from_utf8(raw).context("graph.json is not valid UTF-8")?
    };

    Ok(GraphDoc::from_json(&json)?)
}

/// Save a graph document to disk, normalizing the order first.
pub fn save(project_root: &Path, doc: &mut GraphDoc, compress: bool) -> anyhow::Result<()> {
    let dir = repograph_dir(project_root);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    doc.normalize();
    let json = doc.to_json()?;

    if compress {
        let compressed =
            zstd::encode_all(json.as_bytes(), 3).context("failed to compress graph.json")?;
        std::fs::write(graph_file(project_root), compressed)
            .context("failed to write graph.json")?;
    } else {
        std::fs::write(graph_file(project_root), json).context("failed to write graph.json")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::DepType;

    fn sample_doc() -> GraphDoc {
        let mut doc = GraphDoc::new(GraphConfig::named("sample"));
        doc.nodes.push(Node::high_level("dir:src", "src"));
        doc.nodes.push(Node::high_level("dir:lib", "lib"));
        doc.edges.push(Edge::dependency("b", "a", DepType::Import, None));
        doc.edges.push(Edge::functional("a", "b"));
        doc
    }

    #[test]
    fn test_normalize_sorts_stably() {
        let mut doc = sample_doc();
        doc.normalize();
        assert_eq!(doc.nodes[0].id, "dir:lib");
        assert_eq!(doc.nodes[1].id, "dir:src");
        // Functional sorts before dependency for equal endpoints; here the
        // key ordering is (source, target, tag).
        assert_eq!(doc.edges[0].source, "a");
        assert_eq!(doc.edges[1].source, "b");
    }

    #[test]
    fn test_json_roundtrip() {
        let mut doc = sample_doc();
        doc.normalize();
        let json = doc.to_json().unwrap();
        let back = GraphDoc::from_json(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut doc = sample_doc();
        doc.version = "0.9.0".to_string();
        let json = serde_json::to_string(&doc).unwrap();
        let err = GraphDoc::from_json(&json).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let mut doc = sample_doc();
        save(tmp.path(), &mut doc, false).unwrap();
        let loaded = load(tmp.path()).unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn test_save_load_compressed() {
        let tmp = tempfile::tempdir().unwrap();
        let mut doc = sample_doc();
        save(tmp.path(), &mut doc, true).unwrap();

        let raw = std::fs::read(graph_file(tmp.path())).unwrap();
        assert_eq!(&raw[..4], &ZSTD_MAGIC);

        let loaded = load(tmp.path()).unwrap();
        assert_eq!(loaded, doc);
    }
}
