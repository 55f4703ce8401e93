//! Data-flow detection: derive Dependency edges from parsed files.
//!
//! Inter-module: relative imports resolved to sibling files, one Import edge
//! per imported name the target actually defines at top level. External
//! (non-relative) imports are skipped.
//!
//! Intra-module: parameter/local forwarding into local functions, one Call
//! edge per forwarding call site.
//!
//! The detector is a pure function over parsed inputs: it returns edges and
//! never touches the graph.

use repograph_core::edge::{DepType, Edge, EdgeKind};
use repograph_core::ids;
use repograph_parser::flows::FileFlows;
use repograph_parser::{Language, ParseResult};
use std::collections::{HashMap, HashSet};

/// One fully parsed file, as the pipeline hands it to the detector.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// Repository-relative path with `/` separators.
    pub path: String,
    pub language: Language,
    pub result: ParseResult,
    pub flows: FileFlows,
}

impl ParsedFile {
    /// Parse a source file into the detector's input shape.
    pub fn parse(path: impl Into<String>, source: &str, language: Language) -> Self {
        Self {
            path: path.into(),
            language,
            result: repograph_parser::parse(source, language),
            flows: repograph_parser::flows::extract_flows(source, language),
        }
    }
}

/// Whether an import module path is relative to the importing file.
fn is_relative(module: &str, language: Language) -> bool {
    module.starts_with("./")
        || module.starts_with("../")
        || (language == Language::Python && module.starts_with('.'))
}

/// Resolve a relative module path against the importing file's directory.
/// Returns `None` when the path escapes the repository root.
fn resolve_relative(importer: &str, module: &str, language: Language) -> Option<String> {
    let base = match importer.rsplit_once('/') {
        Some((dir, _)) => dir,
        None => "",
    };

    let rel = if language == Language::Python && module.starts_with('.') {
        // `.util` → `./util`, `..pkg.mod` → `../pkg/mod`
        let dots = module.chars().take_while(|c| *c == '.').count();
        let rest = module[dots..].replace('.', "/");
        let mut prefix = String::new();
        for _ in 1..dots {
            prefix.push_str("../");
        }
        if prefix.is_empty() {
            format!("./{rest}")
        } else {
            format!("{prefix}{rest}")
        }
    } else {
        module.to_string()
    };

    let mut stack: Vec<&str> = base.split('/').filter(|c| !c.is_empty()).collect();
    for component in rel.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                // Popping past the root would escape the repository.
                stack.pop()?;
            }
            other => stack.push(other),
        }
    }
    Some(stack.join("/"))
}

/// Candidate file paths a resolved module stem may refer to.
fn candidate_paths(stem: &str, language: Language) -> Vec<String> {
    let mut candidates = Vec::new();
    for ext in language.import_extensions() {
        candidates.push(format!("{stem}.{ext}"));
    }
    if language.uses_index_files() {
        for ext in language.import_extensions() {
            candidates.push(format!("{stem}/index.{ext}"));
        }
    }
    candidates
}

/// Import-based flows across files. For each relative import, resolves the
/// target file and emits `(target_file → importing_file)` Import edges, one
/// per imported name the target defines at top level.
pub fn detect_inter_module(files: &[ParsedFile]) -> Vec<Edge> {
    let by_path: HashMap<&str, &ParsedFile> =
        files.iter().map(|f| (f.path.as_str(), f)).collect();
    let top_level: HashMap<&str, HashSet<&str>> = files
        .iter()
        .map(|f| {
            let names: HashSet<&str> = f
                .result
                .entities
                .iter()
                .filter(|e| e.parent.is_none())
                .map(|e| e.name.as_str())
                .collect();
            (f.path.as_str(), names)
        })
        .collect();

    let mut edges = Vec::new();
    for importer in files {
        for import in &importer.result.imports {
            if !is_relative(&import.module, importer.language) {
                continue;
            }
            let Some(stem) = resolve_relative(&importer.path, &import.module, importer.language)
            else {
                continue;
            };
            let Some(target) = candidate_paths(&stem, importer.language)
                .into_iter()
                .find_map(|candidate| by_path.get(candidate.as_str()).copied())
            else {
                continue;
            };
            if target.path == importer.path {
                continue;
            }
            let exposed = &top_level[target.path.as_str()];
            for name in &import.names {
                if exposed.contains(name.as_str()) {
                    edges.push(Edge {
                        source: ids::file_id(&target.path),
                        target: ids::file_id(&importer.path),
                        kind: EdgeKind::Dependency {
                            dep_type: DepType::Import,
                            symbol: Some(name.clone()),
                            target_symbol: None,
                            line: None,
                        },
                    });
                }
            }
        }
    }
    edges
}

/// Parameter-forwarding flows within one file: a call to a local function
/// passing a parameter of the enclosing function, or a variable defined in
/// it, yields a Call edge from the caller entity to the callee entity.
pub fn detect_intra_module(file: &ParsedFile) -> Vec<Edge> {
    let entity_by_name: HashMap<&str, &repograph_parser::CodeEntity> = file
        .result
        .entities
        .iter()
        .map(|e| (e.name.as_str(), e))
        .collect();

    let mut edges = Vec::new();
    for call in &file.flows.calls {
        // Callee must be a function defined in this file.
        if file.flows.scope(&call.callee).is_none() {
            continue;
        }
        let Some(caller_name) = &call.caller else {
            continue;
        };
        let Some(caller_scope) = file.flows.scope(caller_name) else {
            continue;
        };
        let Some(forwarded) = call.args.iter().find(|arg| {
            caller_scope.params.contains(arg) || caller_scope.locals.contains(arg)
        }) else {
            continue;
        };

        let (Some(caller_entity), Some(callee_entity)) = (
            entity_by_name.get(caller_name.as_str()),
            entity_by_name.get(call.callee.as_str()),
        ) else {
            continue;
        };

        edges.push(Edge {
            source: entity_node_id(&file.path, caller_entity),
            target: entity_node_id(&file.path, callee_entity),
            kind: EdgeKind::Dependency {
                dep_type: DepType::Call,
                symbol: Some(forwarded.clone()),
                target_symbol: None,
                line: Some(call.line),
            },
        });
    }
    edges
}

/// Line-suffixed node id for an entity, matching what the encoder creates.
fn entity_node_id(path: &str, entity: &repograph_parser::CodeEntity) -> String {
    ids::entity_id_at(
        path,
        entity.entity_type,
        &entity.qualified_name(),
        entity.start_line,
    )
}

/// Run both passes over every file.
pub fn detect_all(files: &[ParsedFile]) -> Vec<Edge> {
    let mut edges = detect_inter_module(files);
    for file in files {
        edges.extend(detect_intra_module(file));
    }
    edges
}
