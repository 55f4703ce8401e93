//! On-disk embeddings document: JSONL with a header line.
//!
//! Line 1 is `{version, config, commit}`; every following line is one
//! `{id, vector}` entry with the vector base64-encoded per [`crate::f16`].
//! Entries are sorted by id ascending so the file diffs cleanly in git.
//! A deprecated pretty-printed single-document JSON form is still readable.

use crate::error::{Error, Result};
use crate::f16;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const CURRENT_VERSION: &str = "1.0.0";

/// Embedding provider/model description recorded in the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingInfo {
    pub provider: String,
    pub model: String,
    pub dimension: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<String>,
    pub text_template: String,
}

/// The header line of an embeddings document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingsHeader {
    pub version: String,
    pub config: EmbeddingInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryLine {
    id: String,
    vector: String,
}

/// Deprecated single-document form: same schema, one JSON object.
#[derive(Debug, Serialize, Deserialize)]
struct LegacyDoc {
    version: String,
    config: EmbeddingInfo,
    #[serde(default)]
    commit: Option<String>,
    entries: Vec<EntryLine>,
}

/// An embeddings document: header plus id→vector entries.
///
/// Entries are keyed in a `BTreeMap`, so serialization order is stable
/// without a separate sort.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingsFile {
    pub header: EmbeddingsHeader,
    pub entries: BTreeMap<String, Vec<f32>>,
}

impl EmbeddingsFile {
    pub fn new(config: EmbeddingInfo, commit: Option<String>) -> Self {
        Self {
            header: EmbeddingsHeader {
                version: CURRENT_VERSION.to_string(),
                config,
                commit,
            },
            entries: BTreeMap::new(),
        }
    }

    /// Insert or replace a vector. The dimension must match the header.
    pub fn insert(&mut self, id: impl Into<String>, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.header.config.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.header.config.dimension,
                actual_bytes: vector.len() * 2,
            });
        }
        self.entries.insert(id.into(), vector);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Vec<f32>> {
        self.entries.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Vec<f32>> {
        self.entries.remove(id)
    }

    /// Serialize to the JSONL form, entries sorted by id ascending.
    pub fn to_jsonl(&self) -> Result<String> {
        let mut out = serde_json::to_string(&self.header)
            .map_err(|e| Error::Store(format!("failed to serialize embeddings header: {e}")))?;
        out.push('\n');
        for (id, vector) in &self.entries {
            let line = EntryLine {
                id: id.clone(),
                vector: f16::encode_vector(vector),
            };
            out.push_str(
                &serde_json::to_string(&line)
                    .map_err(|e| Error::Store(format!("failed to serialize entry {id}: {e}")))?,
            );
            out.push('\n');
        }
        Ok(out)
    }

    /// Parse either the JSONL form or the deprecated pretty-printed form.
    pub fn parse(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Err(Error::InvalidInput("empty embeddings document".to_string()));
        }
        // The deprecated form is one JSON object spanning the whole input;
        // a JSONL document never parses that way (the header line has no
        // `entries` field).
        if let Ok(legacy) = serde_json::from_str::<LegacyDoc>(input) {
            return Self::from_legacy(legacy);
        }
        Self::parse_jsonl(input)
    }

    fn parse_jsonl(input: &str) -> Result<Self> {
        let mut lines = input.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

        let (_, header_line) = lines
            .next()
            .ok_or_else(|| Error::InvalidInput("empty embeddings document".to_string()))?;
        let header: EmbeddingsHeader = serde_json::from_str(header_line)
            .map_err(|e| Error::SchemaMismatch(format!("invalid embeddings header: {e}")))?;
        Self::check_version(&header)?;

        let dimension = header.config.dimension;
        let mut entries = BTreeMap::new();
        for (idx, line) in lines {
            let entry: EntryLine = serde_json::from_str(line).map_err(|e| {
                Error::SchemaMismatch(format!("invalid embeddings entry on line {}: {e}", idx + 1))
            })?;
            let vector = f16::decode_vector(&entry.vector, dimension)?;
            entries.insert(entry.id, vector);
        }

        Ok(Self { header, entries })
    }

    fn from_legacy(doc: LegacyDoc) -> Result<Self> {
        let header = EmbeddingsHeader {
            version: doc.version,
            config: doc.config,
            commit: doc.commit,
        };
        Self::check_version(&header)?;
        let dimension = header.config.dimension;
        let mut entries = BTreeMap::new();
        for entry in doc.entries {
            let vector = f16::decode_vector(&entry.vector, dimension)?;
            entries.insert(entry.id, vector);
        }
        Ok(Self { header, entries })
    }

    fn check_version(header: &EmbeddingsHeader) -> Result<()> {
        if header.version != CURRENT_VERSION {
            return Err(Error::SchemaMismatch(format!(
                "embeddings version mismatch: expected {CURRENT_VERSION}, found {}",
                header.version
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(dim: usize) -> EmbeddingInfo {
        EmbeddingInfo {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            dimension: dim,
            space: Some("cosine".to_string()),
            text_template: "{description} | {keywords}".to_string(),
        }
    }

    #[test]
    fn test_jsonl_roundtrip() {
        let mut file = EmbeddingsFile::new(info(4), Some("abc123".to_string()));
        file.insert("b", vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        file.insert("a", vec![0.0, 1.0, 0.0, 0.0]).unwrap();

        let serialized = file.to_jsonl().unwrap();
        let parsed = EmbeddingsFile::parse(&serialized).unwrap();
        assert_eq!(parsed, file);
    }

    #[test]
    fn test_entries_sorted_by_id() {
        let mut file = EmbeddingsFile::new(info(1), None);
        file.insert("zeta", vec![1.0]).unwrap();
        file.insert("alpha", vec![2.0]).unwrap();

        let serialized = file.to_jsonl().unwrap();
        let lines: Vec<&str> = serialized.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("alpha"));
        assert!(lines[2].contains("zeta"));
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(
            EmbeddingsFile::parse(""),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            EmbeddingsFile::parse("   \n  "),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_invalid_json_line_rejected() {
        let mut file = EmbeddingsFile::new(info(1), None);
        file.insert("a", vec![1.0]).unwrap();
        let mut serialized = file.to_jsonl().unwrap();
        serialized.push_str("{not json\n");
        assert!(matches!(
            EmbeddingsFile::parse(&serialized),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let header = r#"{"version":"2.0.0","config":{"provider":"x","model":"y","dimension":1,"text_template":"t"}}"#;
        assert!(matches!(
            EmbeddingsFile::parse(header),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_wrong_vector_length_rejected() {
        let mut file = EmbeddingsFile::new(info(2), None);
        file.insert("a", vec![1.0, 2.0]).unwrap();
        let serialized = file.to_jsonl().unwrap();
        // Reparse claiming a different dimension via a doctored header.
        let doctored = serialized.replace("\"dimension\":2", "\"dimension\":3");
        assert!(matches!(
            EmbeddingsFile::parse(&doctored),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_insert_checks_dimension() {
        let mut file = EmbeddingsFile::new(info(3), None);
        assert!(matches!(
            file.insert("a", vec![1.0]),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_legacy_pretty_json_accepted() {
        let legacy = serde_json::json!({
            "version": "1.0.0",
            "config": {
                "provider": "openai",
                "model": "text-embedding-3-small",
                "dimension": 2,
                "text_template": "{description}"
            },
            "commit": "deadbeef",
            "entries": [
                {"id": "a", "vector": crate::f16::encode_vector(&[1.0, 0.0])},
                {"id": "b", "vector": crate::f16::encode_vector(&[0.0, 1.0])}
            ]
        });
        let pretty = serde_json::to_string_pretty(&legacy).unwrap();
        let parsed = EmbeddingsFile::parse(&pretty).unwrap();
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.header.commit.as_deref(), Some("deadbeef"));
        assert_eq!(parsed.get("a").unwrap(), &vec![1.0, 0.0]);
    }

    #[test]
    fn test_header_only_document_is_valid_jsonl() {
        let file = EmbeddingsFile::new(info(8), None);
        let serialized = file.to_jsonl().unwrap();
        let parsed = EmbeddingsFile::parse(&serialized).unwrap();
        assert!(parsed.entries.is_empty());
    }

    #[test]
    fn test_vectors_survive_f16_quantization() {
        let mut file = EmbeddingsFile::new(info(4), None);
        file.insert("a", vec![0.125, -0.5, 0.75, 1.0]).unwrap();
        let parsed = EmbeddingsFile::parse(&file.to_jsonl().unwrap()).unwrap();
        // These values are exactly representable in binary16.
        assert_eq!(parsed.get("a").unwrap(), &vec![0.125, -0.5, 0.75, 1.0]);
    }
}
