//! Call-site and scope extraction for data-flow detection.
//!
//! Collects, per file, the function scopes (with parameter and local
//! variable names) and the call expressions whose callee is a plain
//! identifier, with identifier arguments. The data-flow detector combines
//! the two to find parameter forwarding between local functions.
//! Implemented for typescript/javascript, python, and rust; other languages
//! yield empty flows.

use crate::languages::Language;

/// A function or method body that can contain call sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionScope {
    pub name: String,
    pub params: Vec<String>,
    pub locals: Vec<String>,
    pub start_line: u32,
    pub end_line: u32,
}

/// A call expression with a plain-identifier callee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Name of the enclosing function scope, when the call sits inside one.
    pub caller: Option<String>,
    pub callee: String,
    pub line: u32,
    /// Identifier arguments, in call order.
    pub args: Vec<String>,
}

/// Scopes and calls extracted from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileFlows {
    pub scopes: Vec<FunctionScope>,
    pub calls: Vec<CallSite>,
}

impl FileFlows {
    /// The scope with the given name, if any.
    pub fn scope(&self, name: &str) -> Option<&FunctionScope> {
        self.scopes.iter().find(|s| s.name == name)
    }
}

/// Extract flow information from a source file.
pub fn extract_flows(source: &str, language: Language) -> FileFlows {
    let spec = match language {
        Language::TypeScript | Language::JavaScript => LangFlowSpec {
            function_kinds: &[
                "function_declaration",
                "generator_function_declaration",
                "method_definition",
            ],
            call_kind: "call_expression",
            local_decl_kinds: &["lexical_declaration", "variable_declaration"],
        },
        Language::Python => LangFlowSpec {
            function_kinds: &["function_definition"],
            call_kind: "call",
            local_decl_kinds: &["assignment"],
        },
        Language::Rust => LangFlowSpec {
            function_kinds: &["function_item"],
            call_kind: "call_expression",
            local_decl_kinds: &["let_declaration"],
        },
        _ => return FileFlows::default(),
    };

    let mut parser = tree_sitter::Parser::new();
    if parser.set_language(&language.ts_language()).is_err() {
        return FileFlows::default();
    }
    let Some(tree) = parser.parse(source.as_bytes(), None) else {
        return FileFlows::default();
    };

    let mut flows = FileFlows::default();
    collect_scopes(&tree.root_node(), source, language, &spec, &mut flows.scopes);
    collect_calls(&tree.root_node(), source, &spec, &flows.scopes, &mut flows.calls);
    flows
}

struct LangFlowSpec {
    function_kinds: &'static [&'static str],
    call_kind: &'static str,
    local_decl_kinds: &'static [&'static str],
}

fn collect_scopes(
    node: &tree_sitter::Node,
    source: &str,
    language: Language,
    spec: &LangFlowSpec,
    scopes: &mut Vec<FunctionScope>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if spec.function_kinds.contains(&child.kind()) {
            if let Some(name_node) = child.child_by_field_name("name") {
                let name = source[name_node.byte_range()].to_string();
                let params = parameter_names(&child, source, language);
                let mut locals = Vec::new();
                if let Some(body) = child.child_by_field_name("body") {
                    collect_locals(&body, source, language, spec, &mut locals);
                }
                scopes.push(FunctionScope {
                    name,
                    params,
                    locals,
                    start_line: child.start_position().row as u32 + 1,
                    end_line: child.end_position().row as u32 + 1,
                });
            }
        }
        collect_scopes(&child, source, language, spec, scopes);
    }
}

fn parameter_names(node: &tree_sitter::Node, source: &str, language: Language) -> Vec<String> {
    let Some(params_node) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut params = Vec::new();
    let mut cursor = params_node.walk();
    for child in params_node.children(&mut cursor) {
        match (language, child.kind()) {
            (_, "identifier") => params.push(source[child.byte_range()].to_string()),
            (Language::TypeScript | Language::JavaScript, "required_parameter" | "optional_parameter") => {
                if let Some(pattern) = child
                    .child_by_field_name("pattern")
                    .filter(|p| p.kind() == "identifier")
                {
                    params.push(source[pattern.byte_range()].to_string());
                }
            }
            (Language::Python, "typed_parameter") => {
                if let Some(name) = child.child(0).filter(|n| n.kind() == "identifier") {
                    params.push(source[name.byte_range()].to_string());
                }
            }
            (Language::Python, "default_parameter" | "typed_default_parameter") => {
                if let Some(name) = child
                    .child_by_field_name("name")
                    .filter(|n| n.kind() == "identifier")
                {
                    params.push(source[name.byte_range()].to_string());
                }
            }
            (Language::Rust, "parameter") => {
                if let Some(pattern) = child
                    .child_by_field_name("pattern")
                    .filter(|p| p.kind() == "identifier")
                {
                    params.push(source[pattern.byte_range()].to_string());
                }
            }
            _ => {}
        }
    }
    params
        .into_iter()
        .filter(|p| p != "self" && p != "cls")
        .collect()
}

fn collect_locals(
    node: &tree_sitter::Node,
    source: &str,
    language: Language,
    spec: &LangFlowSpec,
    locals: &mut Vec<String>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if spec.local_decl_kinds.contains(&child.kind()) {
            match language {
                Language::TypeScript | Language::JavaScript => {
                    let mut inner = child.walk();
                    for decl in child.children(&mut inner) {
                        if decl.kind() == "variable_declarator"
                            && let Some(name) = decl
                                .child_by_field_name("name")
                                .filter(|n| n.kind() == "identifier")
                        {
                            locals.push(source[name.byte_range()].to_string());
                        }
                    }
                }
                Language::Python => {
                    if let Some(left) = child
                        .child_by_field_name("left")
                        .filter(|n| n.kind() == "identifier")
                    {
                        locals.push(source[left.byte_range()].to_string());
                    }
                }
                Language::Rust => {
                    if let Some(pattern) = child
                        .child_by_field_name("pattern")
                        .filter(|p| p.kind() == "identifier")
                    {
                        locals.push(source[pattern.byte_range()].to_string());
                    }
                }
                _ => {}
            }
        }
        // Nested functions open their own scopes; their declarations are
        // not locals of the enclosing function.
        if !spec.function_kinds.contains(&child.kind()) {
            collect_locals(&child, source, language, spec, locals);
        }
    }
}

fn collect_calls(
    node: &tree_sitter::Node,
    source: &str,
    spec: &LangFlowSpec,
    scopes: &[FunctionScope],
    calls: &mut Vec<CallSite>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == spec.call_kind
            && let Some(function) = child.child_by_field_name("function")
            && function.kind() == "identifier"
        {
            let callee = source[function.byte_range()].to_string();
            let row = child.start_position().row as u32 + 1;
            let mut args = Vec::new();
            if let Some(arguments) = child.child_by_field_name("arguments") {
                let mut ac = arguments.walk();
                for arg in arguments.children(&mut ac) {
                    if arg.kind() == "identifier" {
                        args.push(source[arg.byte_range()].to_string());
                    }
                }
            }
            calls.push(CallSite {
                caller: enclosing_scope(scopes, row),
                callee,
                line: row,
                args,
            });
        }
        collect_calls(&child, source, spec, scopes, calls);
    }
}

/// The innermost scope whose line range contains the given row.
fn enclosing_scope(scopes: &[FunctionScope], row: u32) -> Option<String> {
    scopes
        .iter()
        .filter(|s| s.start_line <= row && row <= s.end_line)
        .min_by_key(|s| s.end_line - s.start_line)
        .map(|s| s.name.clone())
}
