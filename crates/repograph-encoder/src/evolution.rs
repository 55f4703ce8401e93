//! Evolution operations: apply entity-level diffs to an existing graph.
//!
//! Deletions prune newly childless HighLevel ancestors bottom-up; insertions
//! route to a semantic parent (creating directory-named parents when none
//! fit); modifications update in place below the drift threshold and
//! delete+re-insert above it. Within one application, deletions and
//! modifications run before insertions so pruning can never undo a fresh
//! insert.

use crate::diff::{ChangedEntity, EntityDiff};
use crate::embed::{Embedder, cosine_similarity};
use crate::features::FeatureExtractor;
use crate::router::{RouteDecision, SemanticRouter};
use chrono::Utc;
use repograph_core::config::EvolutionConfig;
use repograph_core::edge::{Edge, EdgeFilter, EdgeTag};
use repograph_core::node::{EntityMeta, Feature, Node, NodePatch, Provenance};
use repograph_core::store::{GraphStore, functional_parent};
use repograph_core::{Error, Result, ids};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyOutcome {
    pub node_id: String,
    /// Whether the entity was deleted and re-inserted (high drift).
    pub rerouted: bool,
}

/// Counters from applying one diff.
#[derive(Debug, Default, Clone)]
pub struct EvolveSummary {
    pub inserted: usize,
    pub deleted: usize,
    pub modified: usize,
    pub rerouted: usize,
    pub ancestors_pruned: usize,
    /// Failed changes, described; each change is applied independently.
    pub failures: Vec<String>,
}

/// Applies insert/delete/modify operations against a graph store.
pub struct EvolutionEngine {
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
    features: FeatureExtractor,
    router: SemanticRouter,
    config: EvolutionConfig,
}

impl EvolutionEngine {
    pub fn new(
        store: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
        features: FeatureExtractor,
        router: SemanticRouter,
        config: EvolutionConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            features,
            router,
            config,
        }
    }

    // -- delete ------------------------------------------------------------

    /// Remove a node and prune newly childless HighLevel ancestors.
    /// Deleting a missing id is a no-op returning 0.
    pub async fn delete(&self, id: &str) -> Result<usize> {
        if !self.store.has_node(id).await? {
            return Ok(0);
        }
        let parent = functional_parent(self.store.as_ref(), id).await?;
        self.store.remove_node(id).await?;

        let mut pruned = 0;
        let mut current = parent;
        while let Some(parent_id) = current {
            if self.config.root_id.as_deref() == Some(parent_id.as_str()) {
                break;
            }
            let children = self
                .store
                .get_edges(&EdgeFilter::source(&parent_id).with_tag(EdgeTag::Functional))
                .await?;
            if !children.is_empty() {
                break;
            }
            let Some(node) = self.store.get_node(&parent_id).await? else {
                break;
            };
            if !node.is_high_level() {
                break;
            }
            let next = functional_parent(self.store.as_ref(), &parent_id).await?;
            self.store.remove_node(&parent_id).await?;
            debug!("pruned orphan area {parent_id}");
            pruned += 1;
            current = next;
        }
        Ok(pruned)
    }

    // -- insert ------------------------------------------------------------

    /// Insert a new entity: compute its feature, route to a parent, create
    /// the node and its single Functional edge.
    pub async fn insert(&self, entity: &ChangedEntity) -> Result<String> {
        let feature = self
            .features
            .extract(entity.entity_type, &entity.entity_name, &entity.file_path)
            .await;
        self.insert_with_feature(entity, feature, None).await
    }

    async fn insert_with_feature(
        &self,
        entity: &ChangedEntity,
        feature: Feature,
        commit: Option<&str>,
    ) -> Result<String> {
        let directory = parent_directory(&entity.file_path);
        let decision = self
            .router
            .route(self.store.as_ref(), &feature, &directory, None)
            .await?;
        let parent_id = match decision {
            RouteDecision::Existing { parent_id, .. } => parent_id,
            RouteDecision::CreateDirectory { directory } => {
                self.ensure_directory_chain(&directory).await?
            }
        };

        let mut node = Node::low_level(
            entity.id.clone(),
            EntityMeta {
                entity_type: entity.entity_type,
                path: entity.file_path.clone(),
                start_line: entity.start_line,
                end_line: entity.end_line,
            },
        )
        .with_feature(feature);
        if let Some(source) = &entity.source_code {
            node.extra.insert(
                "source_hash".to_string(),
                serde_json::json!(source_hash(source)),
            );
        }
        if let Some(commit) = commit {
            node.provenance = Some(Provenance {
                commit_sha: commit.to_string(),
                updated_at: Utc::now(),
            });
        }

        self.store.add_node(node).await?;
        if let Err(e) = self
            .store
            .add_edge(Edge::functional(&parent_id, &entity.id))
            .await
        {
            // Keep the operation atomic: a node without its Functional
            // parent would violate the tree shape.
            let _ = self.store.remove_node(&entity.id).await;
            return Err(e);
        }
        Ok(entity.id.clone())
    }

    /// Create (or reuse) the HighLevel chain mirroring a directory path,
    /// returning the id of the deepest node.
    async fn ensure_directory_chain(&self, directory: &str) -> Result<String> {
        let segments: Vec<&str> = directory.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            let root_id = ids::dir_id(".");
            if !self.store.has_node(&root_id).await? {
                self.store
                    .add_node(Node::high_level(&root_id, ".").with_feature(
                        crate::features::directory_feature(".", &[]),
                    ))
                    .await?;
            }
            return Ok(root_id);
        }

        let mut parent: Option<String> = None;
        let mut path = String::new();
        for segment in segments {
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(segment);
            let id = ids::dir_id(&path);
            if !self.store.has_node(&id).await? {
                self.store
                    .add_node(Node::high_level(&id, &path).with_feature(
                        crate::features::directory_feature(&path, &[]),
                    ))
                    .await?;
                if let Some(parent_id) = &parent {
                    self.store
                        .add_edge(Edge::functional(parent_id, &id))
                        .await?;
                }
            }
            parent = Some(id);
        }
        Ok(parent.unwrap_or_else(|| ids::dir_id(".")))
    }

    // -- modify ------------------------------------------------------------

    /// Apply a modification. Low drift updates the node in place; high
    /// drift deletes and re-inserts (the entity may land in a different
    /// subtree). A modification of an unknown id degrades to an insert.
    pub async fn modify(
        &self,
        old: &ChangedEntity,
        new: &ChangedEntity,
    ) -> Result<ModifyOutcome> {
        let new_feature = self
            .features
            .extract(new.entity_type, &new.entity_name, &new.file_path)
            .await;
        self.modify_with_feature(old, new, new_feature, None).await
    }

    /// Modification with an explicitly computed new feature.
    pub async fn modify_with_feature(
        &self,
        old: &ChangedEntity,
        new: &ChangedEntity,
        new_feature: Feature,
        commit: Option<&str>,
    ) -> Result<ModifyOutcome> {
        let Some(node_id) = self.resolve_node_id(old).await? else {
            let node_id = self.insert_with_feature(new, new_feature, commit).await?;
            return Ok(ModifyOutcome {
                node_id,
                rerouted: false,
            });
        };

        let node = self
            .store
            .get_node(&node_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("node {node_id}")))?;

        let drift = self.drift(&node.feature, &new_feature).await?;
        if drift <= self.config.drift_threshold {
            let mut patch = NodePatch::feature(new_feature);
            // Keep the previous commit stamp when this change carries none.
            let commit_sha = commit
                .map(String::from)
                .or_else(|| node.provenance.as_ref().map(|p| p.commit_sha.clone()));
            if let Some(commit_sha) = commit_sha {
                patch = patch.with_provenance(Provenance {
                    commit_sha,
                    updated_at: Utc::now(),
                });
            }
            if let Some(source) = &new.source_code {
                patch = patch.with_extra("source_hash", serde_json::json!(source_hash(source)));
            }
            self.store.update_node(&node_id, patch).await?;
            return Ok(ModifyOutcome {
                node_id,
                rerouted: false,
            });
        }

        debug!("drift {drift:.3} above threshold, re-routing {node_id}");
        self.delete(&node_id).await?;
        let node_id = self.insert_with_feature(new, new_feature, commit).await?;
        Ok(ModifyOutcome {
            node_id,
            rerouted: true,
        })
    }

    /// Drift between two features: `1 − cos(embed(new), embed(old))`.
    async fn drift(&self, old: &Feature, new: &Feature) -> Result<f64> {
        let old_vec = self.embedder.embed(&old.embedding_text()).await?;
        let new_vec = self.embedder.embed(&new.embedding_text()).await?;
        Ok(1.0 - cosine_similarity(&new_vec, &old_vec))
    }

    // -- id resolution -----------------------------------------------------

    /// Resolve a changed entity to an existing node id: exact match first,
    /// then a line-suffix-tolerant prefix match among nodes with the same
    /// `(file_path, entity_type)`, else `None`. The initial encoder appends
    /// `:{start_line}` to ids; the diff parser emits line-free ids.
    pub async fn resolve_node_id(&self, entity: &ChangedEntity) -> Result<Option<String>> {
        if self.store.has_node(&entity.id).await? {
            return Ok(Some(entity.id.clone()));
        }

        let nodes = self.store.list_nodes(None).await?;
        for node in nodes {
            let Some(meta) = node.meta() else { continue };
            if meta.path != entity.file_path || meta.entity_type != entity.entity_type {
                continue;
            }
            if ids::matches_entity(
                &node.id,
                &entity.file_path,
                entity.entity_type,
                &entity.qualified_name,
            ) || ids::matches_entity(
                &node.id,
                &entity.file_path,
                entity.entity_type,
                &entity.entity_name,
            ) {
                return Ok(Some(node.id));
            }
        }
        Ok(None)
    }

    // -- apply -------------------------------------------------------------

    /// Apply a whole diff: deletions and modifications first, then
    /// insertions. Each change is applied independently; failures are
    /// logged and collected, never abort the batch.
    pub async fn apply(&self, diff: &EntityDiff, commit: Option<&str>) -> Result<EvolveSummary> {
        let mut summary = EvolveSummary::default();

        for deletion in &diff.deletions {
            match self.resolve_node_id(deletion).await {
                Ok(Some(node_id)) => match self.delete(&node_id).await {
                    Ok(pruned) => {
                        summary.deleted += 1;
                        summary.ancestors_pruned += pruned;
                    }
                    Err(e) => record_failure(&mut summary, "delete", &deletion.id, &e),
                },
                Ok(None) => {}
                Err(e) => record_failure(&mut summary, "delete", &deletion.id, &e),
            }
        }

        for modification in &diff.modifications {
            let new_feature = self
                .features
                .extract(
                    modification.new.entity_type,
                    &modification.new.entity_name,
                    &modification.new.file_path,
                )
                .await;
            match self
                .modify_with_feature(&modification.old, &modification.new, new_feature, commit)
                .await
            {
                Ok(outcome) => {
                    summary.modified += 1;
                    if outcome.rerouted {
                        summary.rerouted += 1;
                    }
                }
                Err(e) => record_failure(&mut summary, "modify", &modification.old.id, &e),
            }
        }

        for insertion in &diff.insertions {
            let feature = self
                .features
                .extract(
                    insertion.entity_type,
                    &insertion.entity_name,
                    &insertion.file_path,
                )
                .await;
            match self.insert_with_feature(insertion, feature, commit).await {
                Ok(_) => summary.inserted += 1,
                Err(e) => record_failure(&mut summary, "insert", &insertion.id, &e),
            }
        }

        Ok(summary)
    }
}

fn record_failure(summary: &mut EvolveSummary, op: &str, id: &str, error: &Error) {
    warn!("{op} {id} failed: {error}");
    summary.failures.push(format!("{op} {id}: {error}"));
}

/// The directory holding a file, `"."` for root-level files.
fn parent_directory(file_path: &str) -> String {
    match file_path.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => ".".to_string(),
    }
}

/// Short deterministic hash of entity source, stored for change detection.
fn source_hash(source: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    source.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_directory() {
        assert_eq!(parent_directory("src/auth/login.ts"), "src/auth");
        assert_eq!(parent_directory("main.ts"), ".");
    }

    #[test]
    fn test_source_hash_deterministic() {
        assert_eq!(source_hash("fn x() {}"), source_hash("fn x() {}"));
        assert_ne!(source_hash("fn x() {}"), source_hash("fn y() {}"));
        assert_eq!(source_hash("abc").len(), 16);
    }
}
