//! Extract import declarations (module path + imported names) from AST.

use crate::languages::Language;

/// One import: the module path as written, plus the imported names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub module: String,
    pub names: Vec<String>,
}

fn parse_tree(source: &str, language: Language) -> Option<tree_sitter::Tree> {
    let mut parser = tree_sitter::Parser::new();
    parser.set_language(&language.ts_language()).ok()?;
    parser.parse(source.as_bytes(), None)
}

/// Extract imports from a source file. Returns an empty list when the
/// language has no recognizable import syntax or parsing fails.
pub fn extract_imports(source: &str, language: Language) -> Vec<Import> {
    let Some(tree) = parse_tree(source, language) else {
        return Vec::new();
    };
    let root = tree.root_node();
    let mut imports = Vec::new();

    match language {
        Language::Ruby => collect_ruby_requires(&root, source, &mut imports),
        _ => collect_import_nodes(&root, source, language, &mut imports),
    }
    imports
}

fn collect_import_nodes(
    node: &tree_sitter::Node,
    source: &str,
    language: Language,
    imports: &mut Vec<Import>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if language.import_kinds().contains(&child.kind()) {
            if language == Language::Go {
                // One declaration may group several specs; each path is its
                // own module.
                collect_go_import_specs(&child, source, imports);
            } else if let Some(import) = parse_import_node(&child, source, language) {
                imports.push(import);
            }
        } else {
            // Imports are near the top level in every supported language,
            // but Rust allows `use` inside modules and functions.
            collect_import_nodes(&child, source, language, imports);
        }
    }
}

fn parse_import_node(
    node: &tree_sitter::Node,
    source: &str,
    language: Language,
) -> Option<Import> {
    match language {
        Language::TypeScript | Language::JavaScript => parse_js_import(node, source),
        Language::Python => parse_python_import(node, source),
        Language::Rust => parse_rust_use(&source[node.byte_range()]),
        Language::Go => None, // handled in collect_go_import_specs
        Language::Java | Language::Kotlin => {
            parse_dotted_import(&source[node.byte_range()], &["import", "static"])
        }
        Language::CSharp => {
            let text = source[node.byte_range()]
                .trim_start_matches("using")
                .trim()
                .trim_end_matches(';')
                .trim();
            (!text.is_empty()).then(|| Import {
                module: text.to_string(),
                names: Vec::new(),
            })
        }
        Language::C | Language::Cpp => {
            let path = node.child_by_field_name("path")?;
            let module = source[path.byte_range()]
                .trim_matches(|c| c == '"' || c == '<' || c == '>')
                .to_string();
            Some(Import {
                module,
                names: Vec::new(),
            })
        }
        Language::Ruby => None,
    }
}

fn parse_js_import(node: &tree_sitter::Node, source: &str) -> Option<Import> {
    let source_node = node.child_by_field_name("source")?;
    let module = source[source_node.byte_range()]
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string();

    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "import_clause" {
            collect_js_import_names(&child, source, &mut names);
        }
    }
    Some(Import { module, names })
}

fn collect_js_import_names(node: &tree_sitter::Node, source: &str, names: &mut Vec<String>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            // Default import: `import helper from './helper'`
            "identifier" => names.push(source[child.byte_range()].to_string()),
            "named_imports" => {
                let mut inner = child.walk();
                for spec in child.children(&mut inner) {
                    if spec.kind() == "import_specifier"
                        && let Some(name) = spec.child_by_field_name("name")
                    {
                        // `{a as b}` matches the exported symbol `a`.
                        names.push(source[name.byte_range()].to_string());
                    }
                }
            }
            // Namespace import `* as ns` carries no individual names.
            "namespace_import" => {}
            _ => {}
        }
    }
}

fn parse_python_import(node: &tree_sitter::Node, source: &str) -> Option<Import> {
    match node.kind() {
        "import_statement" => {
            // `import a.b` / `import a.b as c`
            let mut cursor = node.walk();
            let module = node
                .children(&mut cursor)
                .find(|c| c.kind() == "dotted_name" || c.kind() == "aliased_import")
                .map(|c| {
                    let target = if c.kind() == "aliased_import" {
                        c.child_by_field_name("name").unwrap_or(c)
                    } else {
                        c
                    };
                    source[target.byte_range()].to_string()
                })?;
            Some(Import {
                module,
                names: Vec::new(),
            })
        }
        "import_from_statement" => {
            let module_node = node.child_by_field_name("module_name")?;
            let module = source[module_node.byte_range()].to_string();
            let mut names = Vec::new();
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.id() == module_node.id() {
                    continue;
                }
                match child.kind() {
                    "dotted_name" => names.push(source[child.byte_range()].to_string()),
                    "aliased_import" => {
                        if let Some(name) = child.child_by_field_name("name") {
                            names.push(source[name.byte_range()].to_string());
                        }
                    }
                    "wildcard_import" => names.push("*".to_string()),
                    _ => {}
                }
            }
            Some(Import { module, names })
        }
        _ => None,
    }
}

/// Parse a Rust `use` declaration from its text form.
/// `use a::b::{c, d};` → module `a::b`, names `[c, d]`.
fn parse_rust_use(text: &str) -> Option<Import> {
    let body = text
        .trim()
        .strip_prefix("pub")
        .unwrap_or(text.trim())
        .trim()
        .strip_prefix("use")?
        .trim()
        .trim_end_matches(';')
        .trim();

    if let Some((module, list)) = body.split_once('{') {
        let module = module.trim_end_matches("::").trim();
        let names = list
            .trim_end_matches('}')
            .split(',')
            .map(|n| {
                // `x as y` imports the symbol `x`.
                n.split_whitespace().next().unwrap_or("").to_string()
            })
            .filter(|n| !n.is_empty())
            .collect();
        return Some(Import {
            module: module.to_string(),
            names,
        });
    }

    let body = body.split(" as ").next().unwrap_or(body).trim();
    match body.rsplit_once("::") {
        Some((module, name)) => Some(Import {
            module: module.to_string(),
            names: vec![name.to_string()],
        }),
        None => Some(Import {
            module: body.to_string(),
            names: Vec::new(),
        }),
    }
}

fn collect_go_import_specs(node: &tree_sitter::Node, source: &str, imports: &mut Vec<Import>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "import_spec" {
            if let Some(path) = child.child_by_field_name("path") {
                imports.push(Import {
                    module: source[path.byte_range()].trim_matches('"').to_string(),
                    names: Vec::new(),
                });
            }
        } else {
            collect_go_import_specs(&child, source, imports);
        }
    }
}

/// Parse `import a.b.C;`-style declarations (Java, Kotlin).
fn parse_dotted_import(text: &str, keywords: &[&str]) -> Option<Import> {
    let mut body = text.trim().trim_end_matches(';').trim();
    for kw in keywords {
        body = body.strip_prefix(kw).unwrap_or(body).trim();
    }
    if body.is_empty() {
        return None;
    }
    match body.rsplit_once('.') {
        Some((module, name)) if name != "*" => Some(Import {
            module: module.to_string(),
            names: vec![name.to_string()],
        }),
        Some((module, _)) => Some(Import {
            module: module.to_string(),
            names: Vec::new(),
        }),
        None => Some(Import {
            module: body.to_string(),
            names: Vec::new(),
        }),
    }
}

fn collect_ruby_requires(node: &tree_sitter::Node, source: &str, imports: &mut Vec<Import>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "call" {
            let method = child
                .child_by_field_name("method")
                .map(|m| &source[m.byte_range()]);
            if matches!(method, Some("require") | Some("require_relative"))
                && let Some(args) = child.child_by_field_name("arguments")
            {
                let mut ac = args.walk();
                for arg in args.children(&mut ac) {
                    if arg.kind() == "string" {
                        let module = source[arg.byte_range()]
                            .trim_matches(|c| c == '"' || c == '\'')
                            .to_string();
                        imports.push(Import {
                            module,
                            names: Vec::new(),
                        });
                    }
                }
            }
        }
        collect_ruby_requires(&child, source, imports);
    }
}
