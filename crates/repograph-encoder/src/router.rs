//! Semantic router: choose a Functional parent for a new entity.
//!
//! Scores every HighLevel candidate by cosine similarity between feature
//! embeddings, accepts a clear winner outright, and otherwise asks the LLM
//! (when configured) to tie-break among the top K. Never mutates the graph.

use crate::embed::{Embedder, cosine_similarity};
use crate::llm::LlmService;
use repograph_core::config::RoutingConfig;
use repograph_core::node::Feature;
use repograph_core::store::{GraphStore, NodeFilter, TraverseOptions};
use repograph_core::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Routing outcome: an existing parent, or an instruction to create a
/// directory-named parent (the router itself never mutates the graph).
#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    Existing { parent_id: String, confidence: f64 },
    CreateDirectory { directory: String },
}

#[derive(Debug, Clone)]
struct ScoredCandidate {
    id: String,
    score: f64,
}

#[derive(Deserialize)]
struct TieBreak {
    selected_id: Option<String>,
    #[serde(default)]
    confidence: f64,
}

/// Chooses parents for inserted entities.
pub struct SemanticRouter {
    embedder: Arc<dyn Embedder>,
    llm: Option<Arc<dyn LlmService>>,
    config: RoutingConfig,
    /// Feature-text → vector memo; candidate sets repeat across inserts.
    cache: Mutex<HashMap<String, Vec<f32>>>,
}

impl SemanticRouter {
    pub fn new(embedder: Arc<dyn Embedder>, config: RoutingConfig) -> Self {
        Self {
            embedder,
            llm: None,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmService>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Pick a parent for an entity with the given feature.
    ///
    /// `fallback_directory` names the entity's immediate directory, used
    /// when no HighLevel candidates exist. `scope` restricts candidates to
    /// the subtree rooted at that node.
    pub async fn route(
        &self,
        store: &dyn GraphStore,
        feature: &Feature,
        fallback_directory: &str,
        scope: Option<&str>,
    ) -> Result<RouteDecision> {
        let candidates = self.candidate_nodes(store, scope).await?;
        if candidates.is_empty() {
            return Ok(RouteDecision::CreateDirectory {
                directory: fallback_directory.to_string(),
            });
        }

        let entity_vector = self.embed_cached(&feature.embedding_text()).await?;
        let mut scored = Vec::with_capacity(candidates.len());
        for (id, text) in &candidates {
            let vector = self.embed_cached(text).await?;
            scored.push(ScoredCandidate {
                id: id.clone(),
                score: cosine_similarity(&entity_vector, &vector),
            });
        }
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.config.top_k.max(1));

        let top = &scored[0];
        let runner_up = scored.get(1).map_or(f64::NEG_INFINITY, |s| s.score);
        if top.score >= self.config.accept_threshold
            && top.score - runner_up >= self.config.margin
        {
            return Ok(RouteDecision::Existing {
                parent_id: top.id.clone(),
                confidence: top.score,
            });
        }

        if let Some(llm) = &self.llm {
            match self.tie_break(llm.as_ref(), feature, &candidates, &scored).await {
                Ok(Some(decision)) => return Ok(decision),
                Ok(None) => {}
                Err(e) => debug!("LLM tie-break failed, using top candidate: {e}"),
            }
        }

        Ok(RouteDecision::Existing {
            parent_id: top.id.clone(),
            confidence: top.score,
        })
    }

    /// All HighLevel nodes (optionally under `scope`) with their feature
    /// texts.
    async fn candidate_nodes(
        &self,
        store: &dyn GraphStore,
        scope: Option<&str>,
    ) -> Result<Vec<(String, String)>> {
        let nodes = match scope {
            Some(scope_id) => {
                let mut nodes = store
                    .traverse(
                        scope_id,
                        TraverseOptions::functional().with_filter(NodeFilter::HighLevelOnly),
                    )
                    .await?
                    .nodes;
                if let Some(root) = store.get_node(scope_id).await? {
                    nodes.push(root);
                }
                nodes
            }
            None => store.list_nodes(Some(NodeFilter::HighLevelOnly)).await?,
        };
        Ok(nodes
            .into_iter()
            .filter(|n| n.is_high_level())
            .map(|n| {
                let text = n.feature.embedding_text();
                (n.id, text)
            })
            .collect())
    }

    async fn embed_cached(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self
            .cache
            .lock()
            .map_err(|_| Error::Store("router cache lock poisoned".to_string()))?
            .get(text)
        {
            return Ok(hit.clone());
        }
        let vector = self.embedder.embed(text).await?;
        self.cache
            .lock()
            .map_err(|_| Error::Store("router cache lock poisoned".to_string()))?
            .insert(text.to_string(), vector.clone());
        Ok(vector)
    }

    async fn tie_break(
        &self,
        llm: &dyn LlmService,
        feature: &Feature,
        candidates: &[(String, String)],
        scored: &[ScoredCandidate],
    ) -> Result<Option<RouteDecision>> {
        let descriptions: HashMap<&str, &str> = candidates
            .iter()
            .map(|(id, text)| (id.as_str(), text.as_str()))
            .collect();
        let mut prompt = format!(
            "An entity described as {:?} (keywords: {}) needs a parent area.\n\
             Candidates:\n",
            feature.description,
            feature.keywords.join(", ")
        );
        for candidate in scored {
            prompt.push_str(&format!(
                "- {}: {}\n",
                candidate.id,
                descriptions.get(candidate.id.as_str()).unwrap_or(&"")
            ));
        }
        prompt.push_str(
            "Respond with JSON: {\"selected_id\": \"...\"|null, \"confidence\": 0.0-1.0}",
        );

        let value = llm.complete_json(&prompt, None).await?;
        let tie_break: TieBreak = serde_json::from_value(value)
            .map_err(|e| Error::External(format!("tie-break schema mismatch: {e}")))?;

        match tie_break.selected_id {
            Some(id) if scored.iter().any(|s| s.id == id) => Ok(Some(RouteDecision::Existing {
                parent_id: id,
                confidence: tie_break.confidence,
            })),
            _ => Ok(None),
        }
    }
}
