//! Entity-level diff parsing over a git commit range.
//!
//! Turns `"<sha>"` or `"<a>..<b>"` into `{insertions, deletions,
//! modifications}` by parsing only the changed files at both revisions and
//! matching entities by their line-free stable ids. Every file-level change
//! also yields a synthetic `file` entity.

use crate::git::GitRunner;
use repograph_core::ids;
use repograph_core::node::EntityType;
use repograph_core::{Error, Result};
use repograph_parser::{CodeEntity, Language};
use std::collections::BTreeMap;
use tracing::debug;

/// One changed entity, carrying enough to re-create or remove its node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedEntity {
    /// Line-free stable id: `{path}:{entity_type}:{qualified_name}`.
    pub id: String,
    pub file_path: String,
    pub entity_type: EntityType,
    pub entity_name: String,
    pub qualified_name: String,
    pub source_code: Option<String>,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
}

impl ChangedEntity {
    fn from_entity(path: &str, entity: &CodeEntity, source: &str) -> Self {
        let qualified_name = entity.qualified_name();
        Self {
            id: ids::entity_id(path, entity.entity_type, &qualified_name),
            file_path: path.to_string(),
            entity_type: entity.entity_type,
            entity_name: entity.name.clone(),
            qualified_name,
            source_code: Some(slice_lines(source, entity.start_line, entity.end_line)),
            start_line: Some(entity.start_line),
            end_line: Some(entity.end_line),
        }
    }

    /// Synthetic entity representing the whole file.
    pub fn for_file(path: &str, source: Option<&str>) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        Self {
            id: ids::file_id(path),
            file_path: path.to_string(),
            entity_type: EntityType::File,
            entity_name: name,
            qualified_name: path.to_string(),
            source_code: source.map(String::from),
            start_line: None,
            end_line: None,
        }
    }
}

fn slice_lines(source: &str, start_line: u32, end_line: u32) -> String {
    source
        .lines()
        .skip(start_line.saturating_sub(1) as usize)
        .take((end_line.saturating_sub(start_line) + 1) as usize)
        .collect::<Vec<_>>()
        .join("\n")
}

/// A modified entity: same id, old and new states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    pub old: ChangedEntity,
    pub new: ChangedEntity,
}

/// Entity-level view of a commit range.
#[derive(Debug, Clone, Default)]
pub struct EntityDiff {
    pub insertions: Vec<ChangedEntity>,
    pub deletions: Vec<ChangedEntity>,
    pub modifications: Vec<Modification>,
}

impl EntityDiff {
    pub fn is_empty(&self) -> bool {
        self.insertions.is_empty() && self.deletions.is_empty() && self.modifications.is_empty()
    }
}

/// Validated commit range: the raw range string plus both endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRange {
    pub range: String,
    pub old_rev: String,
    pub new_rev: String,
}

/// Validate and normalize a commit range. `"<sha>"` means `<sha>~1..<sha>`.
/// Any component starting with `-` is rejected — range strings reach git's
/// argv, and a leading dash would be parsed as an option.
pub fn normalize_range(range: &str) -> Result<CommitRange> {
    let trimmed = range.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("empty commit range".to_string()));
    }

    let (old_rev, new_rev) = match trimmed.split_once("..") {
        Some((a, b)) => (a.to_string(), b.to_string()),
        None => (format!("{trimmed}~1"), trimmed.to_string()),
    };

    for part in [old_rev.as_str(), new_rev.as_str()] {
        if part.is_empty() {
            return Err(Error::InvalidInput(format!(
                "commit range {trimmed:?} has an empty endpoint"
            )));
        }
        if part.starts_with('-') {
            return Err(Error::InvalidInput(format!(
                "commit range component {part:?} must not start with '-'"
            )));
        }
        if part.chars().any(char::is_whitespace) {
            return Err(Error::InvalidInput(format!(
                "commit range component {part:?} contains whitespace"
            )));
        }
    }

    Ok(CommitRange {
        range: format!("{old_rev}..{new_rev}"),
        old_rev,
        new_rev,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

/// Parse `--name-status` output into per-file changes. Renames decompose
/// into delete + add, copies into add.
fn parse_name_status(output: &str) -> Vec<(ChangeKind, String)> {
    let mut changes = Vec::new();
    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        let mut parts = line.split('\t');
        let Some(status) = parts.next() else { continue };
        match status.chars().next() {
            Some('A') => {
                if let Some(path) = parts.next() {
                    changes.push((ChangeKind::Added, path.to_string()));
                }
            }
            Some('M') | Some('T') => {
                if let Some(path) = parts.next() {
                    changes.push((ChangeKind::Modified, path.to_string()));
                }
            }
            Some('D') => {
                if let Some(path) = parts.next() {
                    changes.push((ChangeKind::Deleted, path.to_string()));
                }
            }
            Some('R') => {
                if let (Some(from), Some(to)) = (parts.next(), parts.next()) {
                    changes.push((ChangeKind::Deleted, from.to_string()));
                    changes.push((ChangeKind::Added, to.to_string()));
                }
            }
            Some('C') => {
                if let (Some(_from), Some(to)) = (parts.next(), parts.next()) {
                    changes.push((ChangeKind::Added, to.to_string()));
                }
            }
            _ => {}
        }
    }
    changes
}

fn looks_binary(source: &str) -> bool {
    source.contains('\0')
}

/// Parse a commit range into entity-level changes. Only changed files are
/// processed — the repository is never walked.
pub async fn parse_commit_range(git: &GitRunner, range: &str) -> Result<EntityDiff> {
    let range = normalize_range(range)?;
    let raw = git.diff_name_status(&range.range).await?;

    let mut diff = EntityDiff::default();
    for (kind, path) in parse_name_status(&raw) {
        let Some(language) = Language::detect(std::path::Path::new(&path)) else {
            continue;
        };
        match kind {
            ChangeKind::Added => {
                let source = git.show(&range.new_rev, &path).await?;
                if looks_binary(&source) {
                    continue;
                }
                collect_file_entities(&path, &source, language, &mut diff.insertions);
            }
            ChangeKind::Deleted => {
                let source = git.show(&range.old_rev, &path).await?;
                if looks_binary(&source) {
                    continue;
                }
                collect_file_entities(&path, &source, language, &mut diff.deletions);
            }
            ChangeKind::Modified => {
                let (old_source, new_source) = futures_util::try_join!(
                    git.show(&range.old_rev, &path),
                    git.show(&range.new_rev, &path),
                )?;
                if looks_binary(&old_source) || looks_binary(&new_source) {
                    continue;
                }
                diff_modified_file(&path, &old_source, &new_source, language, &mut diff);
            }
        }
    }

    debug!(
        "diff {}: +{} -{} ~{}",
        range.range,
        diff.insertions.len(),
        diff.deletions.len(),
        diff.modifications.len()
    );
    Ok(diff)
}

fn collect_file_entities(
    path: &str,
    source: &str,
    language: Language,
    out: &mut Vec<ChangedEntity>,
) {
    out.push(ChangedEntity::for_file(path, Some(source)));
    let result = repograph_parser::parse(source, language);
    for entity in &result.entities {
        out.push(ChangedEntity::from_entity(path, entity, source));
    }
}

/// Match old and new entities of one modified file by stable id.
fn diff_modified_file(
    path: &str,
    old_source: &str,
    new_source: &str,
    language: Language,
    diff: &mut EntityDiff,
) {
    let old_entities: BTreeMap<String, ChangedEntity> =
        repograph_parser::parse(old_source, language)
            .entities
            .iter()
            .map(|e| ChangedEntity::from_entity(path, e, old_source))
            .map(|c| (c.id.clone(), c))
            .collect();
    let new_entities: BTreeMap<String, ChangedEntity> =
        repograph_parser::parse(new_source, language)
            .entities
            .iter()
            .map(|e| ChangedEntity::from_entity(path, e, new_source))
            .map(|c| (c.id.clone(), c))
            .collect();

    for (id, old) in &old_entities {
        match new_entities.get(id) {
            None => diff.deletions.push(old.clone()),
            Some(new) if new.source_code != old.source_code => {
                diff.modifications.push(Modification {
                    old: old.clone(),
                    new: new.clone(),
                });
            }
            Some(_) => {}
        }
    }
    for (id, new) in &new_entities {
        if !old_entities.contains_key(id) {
            diff.insertions.push(new.clone());
        }
    }

    // The file itself changed; surface that as a modification of the
    // synthetic file entity.
    diff.modifications.push(Modification {
        old: ChangedEntity::for_file(path, Some(old_source)),
        new: ChangedEntity::for_file(path, Some(new_source)),
    });
}
