//! Configuration for encoding, routing, and evolution.
//!
//! Load order: `.repograph/config.toml` → environment variables → defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level repograph configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RepographConfig {
    pub encode: EncodeConfig,
    pub semantic: SemanticConfig,
    pub embedding: EmbeddingConfig,
    pub routing: RoutingConfig,
    pub evolution: EvolutionConfig,
    pub storage: StorageConfig,
}

/// Encoder pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    /// Include globs; empty means every supported source file.
    pub include: Vec<String>,
    /// Exclude globs applied after includes.
    pub exclude: Vec<String>,
    /// Maximum directory depth walked below the root.
    pub max_depth: usize,
    /// Concurrent file parse tasks.
    pub parse_concurrency: usize,
}

/// Semantic feature extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    /// "heuristic" (deterministic, no external calls) or "llm".
    pub mode: String,
}

/// Embedding service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// "openai", "ollama", or "hashing".
    pub provider: String,
    pub model: String,
    pub dimension: usize,
    /// Template recorded in the embeddings file header.
    pub text_template: String,
}

/// Semantic router configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Candidates kept after cosine scoring.
    pub top_k: usize,
    /// Accept the top candidate outright above this similarity.
    pub accept_threshold: f64,
    /// Required gap between the top two candidates for outright acceptance.
    pub margin: f64,
}

/// Evolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Drift at or below this threshold updates a node in place; above it
    /// the entity is deleted and re-inserted (possibly re-routed).
    pub drift_threshold: f64,
    /// Ancestor pruning stops at this node id when set.
    pub root_id: Option<String>,
    /// Concurrent git subprocess invocations.
    pub git_concurrency: usize,
    /// Deadline for a single git invocation, in seconds.
    pub git_timeout_secs: u64,
}

/// Graph persistence configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Compress graph.json with zstd before writing.
    pub compress: bool,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            max_depth: 32,
            parse_concurrency: 8,
        }
    }
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            mode: "heuristic".to_string(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hashing".to_string(),
            model: "token-hash".to_string(),
            dimension: 256,
            text_template: "{description} | {keywords}".to_string(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            accept_threshold: 0.75,
            margin: 0.05,
        }
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            drift_threshold: 0.35,
            root_id: None,
            git_concurrency: 4,
            git_timeout_secs: 30,
        }
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

impl RepographConfig {
    /// Load config from `.repograph/config.toml`, with env var overrides.
    /// Falls back to defaults if no config file exists.
    pub fn load(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(".repograph").join("config.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        env_override(
            "REPOGRAPH_DRIFT_THRESHOLD",
            &mut config.evolution.drift_threshold,
        );
        env_override("REPOGRAPH_TOP_K", &mut config.routing.top_k);
        env_override(
            "REPOGRAPH_ACCEPT_THRESHOLD",
            &mut config.routing.accept_threshold,
        );
        env_override("REPOGRAPH_MARGIN", &mut config.routing.margin);
        env_override(
            "REPOGRAPH_PARSE_CONCURRENCY",
            &mut config.encode.parse_concurrency,
        );
        env_override(
            "REPOGRAPH_GIT_TIMEOUT_SECS",
            &mut config.evolution.git_timeout_secs,
        );
        if let Ok(v) = std::env::var("REPOGRAPH_SEMANTIC_MODE") {
            config.semantic.mode = v;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.routing.top_k == 0 {
            anyhow::bail!("routing.top_k must be at least 1");
        }
        if !(0.0..=2.0).contains(&self.evolution.drift_threshold) {
            anyhow::bail!(
                "evolution.drift_threshold ({}) must be within [0, 2]",
                self.evolution.drift_threshold
            );
        }
        if self.encode.parse_concurrency == 0 {
            anyhow::bail!("encode.parse_concurrency must be at least 1");
        }
        if self.semantic.mode != "heuristic" && self.semantic.mode != "llm" {
            anyhow::bail!("semantic.mode must be \"heuristic\" or \"llm\"");
        }
        Ok(())
    }
}
