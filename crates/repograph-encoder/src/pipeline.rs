//! End-to-end encoding: walk → parse → features → graph assembly →
//! data-flow → provenance stamp.
//!
//! File parsing fans out over a bounded set of tasks; graph mutations are
//! applied by a single coordinator only after every extraction for a file
//! has completed, so cancellation mid-file never leaves the graph
//! partially updated. Per-file failures become warnings, never aborts.

use crate::dataflow::{self, ParsedFile};
use crate::features::{self, FeatureExtractor};
use crate::git::GitRunner;
use anyhow::{Context, Result};
use chrono::Utc;
use futures_util::StreamExt as _;
use globset::{Glob, GlobSet, GlobSetBuilder};
use repograph_core::config::EncodeConfig;
use repograph_core::edge::Edge;
use repograph_core::node::{EntityMeta, EntityType, Feature, Node, NodePatch, Provenance};
use repograph_core::store::GraphStore;
use repograph_core::ids;
use repograph_parser::{CodeEntity, Language};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Options for one encode run.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub max_depth: usize,
    pub parse_concurrency: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self::from_config(&EncodeConfig::default())
    }
}

impl EncodeOptions {
    pub fn from_config(config: &EncodeConfig) -> Self {
        Self {
            include: config.include.clone(),
            exclude: config.exclude.clone(),
            max_depth: config.max_depth,
            parse_concurrency: config.parse_concurrency.max(1),
        }
    }
}

/// What one encode run did.
#[derive(Debug, Clone, Default)]
pub struct EncodeReport {
    pub files_processed: usize,
    pub entities_extracted: usize,
    pub duration_ms: u64,
    pub warnings: Vec<String>,
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("bad glob {pattern:?}"))?);
    }
    Ok(Some(builder.build()?))
}

/// Walk the repository and collect candidate source files (relative paths
/// with `/` separators). Paths that do not sit under the root are rejected.
fn collect_files(root: &Path, opts: &EncodeOptions, warnings: &mut Vec<String>) -> Result<Vec<String>> {
    let include = build_globset(&opts.include)?;
    let exclude = build_globset(&opts.exclude)?;

    let mut files = Vec::new();
    let walker = ignore::WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .max_depth(Some(opts.max_depth))
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warnings.push(format!("walk error: {e}"));
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            warnings.push(format!(
                "skipping {} outside the repository root",
                entry.path().display()
            ));
            continue;
        };
        if Language::detect(rel).is_none() {
            continue;
        }
        let rel_str = rel.to_string_lossy().replace('\\', "/");
        if let Some(include) = &include
            && !include.is_match(&rel_str)
        {
            continue;
        }
        if let Some(exclude) = &exclude
            && exclude.is_match(&rel_str)
        {
            continue;
        }
        files.push(rel_str);
    }
    files.sort();
    Ok(files)
}

/// Parse the collected files with bounded concurrency. Read or parse
/// failures discard that file's partial results and surface as warnings.
async fn parse_files(
    root: &Path,
    files: Vec<String>,
    concurrency: usize,
    warnings: &mut Vec<String>,
) -> Vec<ParsedFile> {
    let results: Vec<std::result::Result<ParsedFile, String>> =
        futures_util::stream::iter(files.into_iter().map(|rel| {
            let abs = root.join(&rel);
            async move {
                let source = tokio::fs::read_to_string(&abs)
                    .await
                    .map_err(|e| format!("read {rel}: {e}"))?;
                let Some(language) = Language::detect(Path::new(&rel)) else {
                    return Err(format!("no language for {rel}"));
                };
                // Tree-sitter parsing is the CPU-bound burst; keep it off
                // the async workers.
                tokio::task::spawn_blocking(move || ParsedFile::parse(rel, &source, language))
                    .await
                    .map_err(|e| format!("parse task: {e}"))
            }
        }))
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut parsed = Vec::new();
    for result in results {
        match result {
            Ok(file) => parsed.push(file),
            Err(warning) => warnings.push(warning),
        }
    }
    parsed.sort_by(|a, b| a.path.cmp(&b.path));
    parsed
}

/// Every ancestor directory of a file path, outermost first. Root-level
/// files belong to `"."`.
fn ancestor_directories(path: &str) -> Vec<String> {
    let mut dirs = Vec::new();
    let mut current = String::new();
    let components: Vec<&str> = path.split('/').collect();
    for component in &components[..components.len().saturating_sub(1)] {
        if !current.is_empty() {
            current.push('/');
        }
        current.push_str(component);
        dirs.push(current.clone());
    }
    dirs
}

/// Encode a repository into the graph store.
pub async fn encode(
    root: &Path,
    store: &dyn GraphStore,
    features: &FeatureExtractor,
    opts: &EncodeOptions,
) -> Result<EncodeReport> {
    let started = Instant::now();
    let mut warnings = Vec::new();

    let files = collect_files(root, opts, &mut warnings)?;
    info!("encoding {} files under {}", files.len(), root.display());

    let parsed = parse_files(root, files, opts.parse_concurrency, &mut warnings).await;
    for file in &parsed {
        for error in &file.result.errors {
            warnings.push(format!("{}: {error}", file.path));
        }
    }

    let mut entities_extracted = 0;

    // Per-file features, then directory features aggregated from children.
    let mut file_features: BTreeMap<String, Feature> = BTreeMap::new();
    let mut entity_features: BTreeMap<String, Vec<Feature>> = BTreeMap::new();
    for file in &parsed {
        let subjects: Vec<(EntityType, String, String)> = file
            .result
            .entities
            .iter()
            .map(|e| (e.entity_type, e.name.clone(), file.path.clone()))
            .collect();
        entity_features.insert(file.path.clone(), features.extract_batch(&subjects).await);

        let stem = file
            .path
            .rsplit('/')
            .next()
            .and_then(|name| name.rsplit_once('.').map(|(s, _)| s))
            .unwrap_or(&file.path);
        file_features.insert(
            file.path.clone(),
            features.extract(EntityType::File, stem, &file.path).await,
        );
    }

    // Directory set, deepest paths included transitively.
    let mut directories: BTreeSet<String> = BTreeSet::new();
    directories.insert(".".to_string());
    for file in &parsed {
        directories.extend(ancestor_directories(&file.path));
    }

    // Directory features bottom-up: any directory sorts before its
    // subdirectories, so reverse lexicographic order visits children first.
    let mut dir_features: BTreeMap<String, Feature> = BTreeMap::new();
    for directory in directories.iter().rev() {
        let mut children: Vec<Feature> = parsed
            .iter()
            .filter(|f| {
                if directory == "." {
                    !f.path.contains('/')
                } else {
                    f.path
                        .rsplit_once('/')
                        .is_some_and(|(dir, _)| dir == directory)
                }
            })
            .filter_map(|f| file_features.get(&f.path).cloned())
            .collect();
        // Subdirectory features were computed in earlier (deeper) passes.
        children.extend(
            directories
                .iter()
                .filter(|d| is_direct_subdirectory(directory, d))
                .filter_map(|d| dir_features.get(d.as_str()).cloned()),
        );
        let child_refs: Vec<&Feature> = children.iter().collect();
        dir_features.insert(
            directory.clone(),
            features::directory_feature(directory, &child_refs),
        );
    }



    // Nodes: directories first (parents before children keeps edge
    // insertion simple), then files, then entities.
    for directory in &directories {
        let feature = dir_features.get(directory).cloned().unwrap_or_default();
        store
            .add_node(Node::high_level(ids::dir_id(directory), directory.clone()).with_feature(feature))
            .await?;
    }

    // Directory → subdirectory edges.
    for directory in &directories {
        if directory == "." {
            continue;
        }
        let parent = match directory.rsplit_once('/') {
            Some((parent, _)) => parent.to_string(),
            None => ".".to_string(),
        };
        store
            .add_edge(Edge::functional(ids::dir_id(&parent), ids::dir_id(directory)))
            .await?;
    }

    for file in &parsed {
        let file_id = ids::file_id(&file.path);
        let line_count = file
            .result
            .entities
            .iter()
            .map(|e| e.end_line)
            .max()
            .unwrap_or(1);
        let feature = file_features
            .get(&file.path)
            .cloned()
            .unwrap_or_default();
        store
            .add_node(
                Node::low_level(
                    &file_id,
                    EntityMeta {
                        entity_type: EntityType::File,
                        path: file.path.clone(),
                        start_line: Some(1),
                        end_line: Some(line_count),
                    },
                )
                .with_feature(feature),
            )
            .await?;

        let parent_dir = match file.path.rsplit_once('/') {
            Some((dir, _)) => dir.to_string(),
            None => ".".to_string(),
        };
        store
            .add_edge(Edge::functional(ids::dir_id(&parent_dir), &file_id))
            .await?;

        // Class ids by name, for method attachment.
        let class_ids: BTreeMap<&str, String> = file
            .result
            .entities
            .iter()
            .filter(|e| e.entity_type == EntityType::Class)
            .map(|e| (e.name.as_str(), entity_node_id(&file.path, e)))
            .collect();

        let empty = Vec::new();
        let file_entity_features = entity_features.get(&file.path).unwrap_or(&empty);
        let mut method_order: BTreeMap<&str, u32> = BTreeMap::new();

        for (index, code_entity) in file.result.entities.iter().enumerate() {
            let node_id = entity_node_id(&file.path, code_entity);
            let feature = file_entity_features.get(index).cloned().unwrap_or_default();
            store
                .add_node(
                    Node::low_level(
                        &node_id,
                        EntityMeta {
                            entity_type: code_entity.entity_type,
                            path: file.path.clone(),
                            start_line: Some(code_entity.start_line),
                            end_line: Some(code_entity.end_line),
                        },
                    )
                    .with_feature(feature),
                )
                .await?;
            entities_extracted += 1;

            let edge = match code_entity
                .parent
                .as_deref()
                .and_then(|parent| class_ids.get(parent))
            {
                Some(class_id) => {
                    let parent_name = code_entity.parent.as_deref().unwrap_or_default();
                    let order = method_order.entry(parent_name).or_insert(0);
                    let edge = Edge::functional_ordered(class_id, &node_id, *order);
                    *order += 1;
                    edge
                }
                None => Edge::functional(&file_id, &node_id),
            };
            store.add_edge(edge).await?;
        }
    }

    // Data-flow pass over all parsed files.
    for edge in dataflow::detect_all(&parsed) {
        if let Err(e) = store.add_edge(edge).await {
            warnings.push(format!("data-flow edge dropped: {e}"));
        }
    }

    // Provenance stamp when the root is a git work tree.
    let git = GitRunner::new(root);
    if git.is_work_tree().await {
        match git.head_sha().await {
            Ok(sha) => {
                let now = Utc::now();
                for node in store.list_nodes(None).await? {
                    store
                        .update_node(
                            &node.id,
                            NodePatch::default().with_provenance(Provenance {
                                commit_sha: sha.clone(),
                                updated_at: now,
                            }),
                        )
                        .await?;
                }
                debug!("stamped graph at {sha}");
            }
            Err(e) => warnings.push(format!("provenance stamp skipped: {e}")),
        }
    }

    for warning in &warnings {
        warn!("{warning}");
    }

    Ok(EncodeReport {
        files_processed: parsed.len(),
        entities_extracted,
        duration_ms: started.elapsed().as_millis() as u64,
        warnings,
    })
}

fn entity_node_id(path: &str, entity: &CodeEntity) -> String {
    ids::entity_id_at(
        path,
        entity.entity_type,
        &entity.qualified_name(),
        entity.start_line,
    )
}

/// Whether `candidate` is a direct subdirectory of `directory`.
fn is_direct_subdirectory(directory: &str, candidate: &str) -> bool {
    if candidate == "." {
        return false;
    }
    if directory == "." {
        return !candidate.contains('/');
    }
    candidate
        .strip_prefix(directory)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ancestor_directories() {
        assert_eq!(
            ancestor_directories("src/auth/login.ts"),
            vec!["src".to_string(), "src/auth".to_string()]
        );
        assert!(ancestor_directories("main.ts").is_empty());
    }

    #[test]
    fn test_is_direct_subdirectory() {
        assert!(is_direct_subdirectory(".", "src"));
        assert!(is_direct_subdirectory("src", "src/auth"));
        assert!(!is_direct_subdirectory("src", "src/auth/deep"));
        assert!(!is_direct_subdirectory("src", "srcx"));
        assert!(!is_direct_subdirectory("src", "."));
    }
}
