//! Semantic feature extraction: a `{description, keywords}` pair per entity.
//!
//! Two modes: a deterministic heuristic (identifier/path tokenization plus
//! verb-prefix descriptions, no external calls) and an LLM mode that falls
//! back to the heuristic per entity on any failure.

use crate::llm::LlmService;
use repograph_core::node::{EntityType, Feature};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Verb prefixes recognized at the start of an identifier, with the verb
/// used in the generated description.
const VERB_PREFIXES: &[(&str, &str)] = &[
    ("get", "retrieve"),
    ("set", "set"),
    ("is", "check"),
    ("has", "check"),
    ("create", "create"),
    ("make", "create"),
    ("build", "create"),
    ("handle", "handle"),
    ("parse", "parse"),
    ("format", "format"),
    ("load", "load"),
    ("save", "save"),
    ("read", "read"),
    ("write", "write"),
    ("find", "find"),
    ("search", "find"),
    ("validate", "validate"),
    ("check", "check"),
    ("update", "update"),
    ("delete", "remove"),
    ("remove", "remove"),
    ("init", "initialize"),
    ("compute", "compute"),
    ("calc", "compute"),
    ("render", "render"),
    ("fetch", "fetch"),
    ("send", "send"),
    ("encode", "encode"),
    ("decode", "decode"),
    ("convert", "convert"),
    ("apply", "apply"),
    ("run", "run"),
];

/// Split an identifier on camelCase and snake_case boundaries, lowercased,
/// keeping tokens of at least two characters.
pub fn split_identifier(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in name.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.push(c.to_ascii_lowercase());
        prev_lower = c.is_lowercase() || c.is_numeric();
    }
    if !current.is_empty() {
        words.push(current);
    }

    words.retain(|w| w.len() >= 2);
    words
}

/// Tokenize path components, dropping the file extension of the last one.
fn path_tokens(path: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    for (i, component) in components.iter().enumerate() {
        let stem = if i + 1 == components.len() {
            component.rsplit_once('.').map_or(*component, |(s, _)| s)
        } else {
            component
        };
        tokens.extend(split_identifier(stem));
    }
    tokens
}

fn push_unique(keywords: &mut Vec<String>, token: String) {
    if !keywords.contains(&token) {
        keywords.push(token);
    }
}

/// Deterministic feature for one entity: verb-prefix description plus the
/// union of type word, identifier tokens, and path tokens as keywords.
pub fn heuristic_feature(entity_type: EntityType, name: &str, path: &str) -> Feature {
    let words = split_identifier(name);

    let description = match words.split_first() {
        Some((first, rest)) => {
            let verb = VERB_PREFIXES
                .iter()
                .find(|(prefix, _)| first == prefix)
                .map(|(_, verb)| *verb);
            match (verb, rest.is_empty()) {
                (Some(verb), false) => format!("{verb} {}", rest.join(" ")),
                (Some(verb), true) => verb.to_string(),
                (None, _) => format!("{} {}", words.join(" "), entity_type.as_str()),
            }
        }
        None => format!("{} in {path}", entity_type.as_str()),
    };

    let mut keywords = Vec::new();
    push_unique(&mut keywords, entity_type.as_str().to_string());
    for token in words {
        push_unique(&mut keywords, token);
    }
    for token in path_tokens(path) {
        push_unique(&mut keywords, token);
    }

    Feature::new(description, keywords)
}

/// Aggregate a directory's feature from its children's features.
pub fn directory_feature(path: &str, children: &[&Feature]) -> Feature {
    let mut keywords = Vec::new();
    for token in path_tokens(path) {
        push_unique(&mut keywords, token);
    }
    for child in children {
        for keyword in &child.keywords {
            if keywords.len() >= 32 {
                break;
            }
            push_unique(&mut keywords, keyword.clone());
        }
    }
    let name = path.rsplit('/').next().unwrap_or(path);
    Feature::new(
        format!("groups {} components under {name}", children.len()),
        keywords,
    )
}

/// Extraction mode, from `SemanticConfig::mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticMode {
    Heuristic,
    Llm,
}

#[derive(Deserialize)]
struct LlmFeature {
    description: String,
    #[serde(default)]
    keywords: Vec<String>,
}

/// Produces features for entities, in either mode.
pub struct FeatureExtractor {
    mode: SemanticMode,
    llm: Option<Arc<dyn LlmService>>,
}

impl FeatureExtractor {
    pub fn heuristic() -> Self {
        Self {
            mode: SemanticMode::Heuristic,
            llm: None,
        }
    }

    pub fn with_llm(llm: Arc<dyn LlmService>) -> Self {
        Self {
            mode: SemanticMode::Llm,
            llm: Some(llm),
        }
    }

    /// Feature for one entity. LLM mode falls back to the heuristic when
    /// the call or its JSON payload fails.
    pub async fn extract(&self, entity_type: EntityType, name: &str, path: &str) -> Feature {
        if self.mode == SemanticMode::Llm
            && let Some(llm) = &self.llm
        {
            match Self::extract_llm(llm.as_ref(), entity_type, name, path).await {
                Ok(feature) => return feature,
                Err(e) => {
                    debug!("LLM feature extraction failed for {name}, falling back: {e}");
                }
            }
        }
        heuristic_feature(entity_type, name, path)
    }

    /// Features for a batch of entities; the output order mirrors the
    /// input. LLM mode uses one call for the whole batch.
    pub async fn extract_batch(
        &self,
        subjects: &[(EntityType, String, String)],
    ) -> Vec<Feature> {
        if self.mode == SemanticMode::Llm
            && let Some(llm) = &self.llm
            && !subjects.is_empty()
        {
            match Self::extract_llm_batch(llm.as_ref(), subjects).await {
                Ok(features) => return features,
                Err(e) => {
                    debug!("LLM batch feature extraction failed, falling back: {e}");
                }
            }
        }
        subjects
            .iter()
            .map(|(entity_type, name, path)| heuristic_feature(*entity_type, name, path))
            .collect()
    }

    async fn extract_llm(
        llm: &dyn LlmService,
        entity_type: EntityType,
        name: &str,
        path: &str,
    ) -> repograph_core::Result<Feature> {
        let prompt = format!(
            "Summarize the purpose of the {} `{name}` defined in `{path}`.\n\
             Respond with JSON: {{\"description\": \"...\", \"keywords\": [\"...\"]}}",
            entity_type.as_str()
        );
        let value = llm.complete_json(&prompt, Some(SYSTEM_PROMPT)).await?;
        let parsed: LlmFeature = serde_json::from_value(value).map_err(|e| {
            repograph_core::Error::External(format!("LLM feature schema mismatch: {e}"))
        })?;
        Ok(Feature::new(parsed.description, parsed.keywords))
    }

    async fn extract_llm_batch(
        llm: &dyn LlmService,
        subjects: &[(EntityType, String, String)],
    ) -> repograph_core::Result<Vec<Feature>> {
        let mut prompt = String::from(
            "Summarize the purpose of each entity. Respond with a JSON array, one \
             {\"description\", \"keywords\"} object per entity, in the same order.\n",
        );
        for (i, (entity_type, name, path)) in subjects.iter().enumerate() {
            prompt.push_str(&format!(
                "{}. {} `{name}` in `{path}`\n",
                i + 1,
                entity_type.as_str()
            ));
        }
        let value = llm.complete_json(&prompt, Some(SYSTEM_PROMPT)).await?;
        let parsed: Vec<LlmFeature> = serde_json::from_value(value).map_err(|e| {
            repograph_core::Error::External(format!("LLM batch schema mismatch: {e}"))
        })?;
        if parsed.len() != subjects.len() {
            return Err(repograph_core::Error::External(format!(
                "LLM batch length mismatch: expected {}, got {}",
                subjects.len(),
                parsed.len()
            )));
        }
        Ok(parsed
            .into_iter()
            .map(|f| Feature::new(f.description, f.keywords))
            .collect())
    }
}

const SYSTEM_PROMPT: &str =
    "You describe code entities in one short sentence and a handful of lowercase keywords.";
