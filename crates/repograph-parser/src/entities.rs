//! Extract code entities (classes, functions, methods, variables) from AST.

use crate::languages::Language;
use repograph_core::node::EntityType;

/// A source-level construct extracted from one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeEntity {
    pub entity_type: EntityType,
    pub name: String,
    pub start_line: u32,
    pub end_line: u32,
    pub start_column: u32,
    pub end_column: u32,
    /// Enclosing class/struct name for nested entities.
    pub parent: Option<String>,
    /// Parameter names, for callables.
    pub parameters: Option<Vec<String>>,
}

impl CodeEntity {
    /// `parent.name` for nested entities, `name` otherwise. The `.` join is
    /// used for every language.
    pub fn qualified_name(&self) -> String {
        repograph_core::ids::qualified_name(self.parent.as_deref(), &self.name)
    }
}

fn parse_tree(source: &str, language: Language) -> Option<tree_sitter::Tree> {
    let mut parser = tree_sitter::Parser::new();
    parser.set_language(&language.ts_language()).ok()?;
    parser.parse(source.as_bytes(), None)
}

fn entity(
    node: &tree_sitter::Node,
    entity_type: EntityType,
    name: &str,
    parent: Option<&str>,
    parameters: Option<Vec<String>>,
) -> CodeEntity {
    CodeEntity {
        entity_type,
        name: name.to_string(),
        start_line: node.start_position().row as u32 + 1,
        end_line: node.end_position().row as u32 + 1,
        start_column: node.start_position().column as u32,
        end_column: node.end_position().column as u32,
        parent: parent.map(String::from),
        parameters,
    }
}

fn field_text<'a>(
    node: &tree_sitter::Node,
    field: &str,
    source: &'a str,
) -> Option<&'a str> {
    node.child_by_field_name(field)
        .map(|n| &source[n.byte_range()])
}

/// Collect syntax errors (ERROR and missing nodes) as human-readable strings.
/// Parsing never fails; these land in `ParseResult::errors`.
pub fn collect_syntax_errors(source: &str, language: Language) -> Vec<String> {
    let Some(tree) = parse_tree(source, language) else {
        return vec!["tree-sitter failed to produce a parse tree".to_string()];
    };
    let mut errors = Vec::new();
    collect_error_nodes(&tree.root_node(), &mut errors);
    errors
}

fn collect_error_nodes(node: &tree_sitter::Node, errors: &mut Vec<String>) {
    // Cap the list so a mangled file does not flood the result.
    if errors.len() >= 20 {
        return;
    }
    if node.is_error() || node.is_missing() {
        let pos = node.start_position();
        errors.push(format!(
            "syntax error at line {}, column {}",
            pos.row + 1,
            pos.column
        ));
        return;
    }
    if !node.has_error() {
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_error_nodes(&child, errors);
    }
}

/// Generic entity extraction dispatching to the correct language walker.
pub fn extract_entities(source: &str, language: Language) -> Vec<CodeEntity> {
    let Some(tree) = parse_tree(source, language) else {
        return Vec::new();
    };
    let root = tree.root_node();
    let mut entities = Vec::new();
    match language {
        Language::TypeScript | Language::JavaScript => {
            extract_js_node(&root, source, None, &mut entities);
        }
        Language::Python => extract_python_node(&root, source, None, &mut entities),
        Language::Rust => extract_rust_node(&root, source, None, &mut entities),
        Language::Go => extract_go_node(&root, source, &mut entities),
        Language::Java | Language::CSharp => {
            extract_java_like_node(&root, source, None, &mut entities);
        }
        Language::Ruby => extract_ruby_node(&root, source, None, &mut entities),
        Language::Kotlin => extract_kotlin_node(&root, source, None, &mut entities),
        Language::C | Language::Cpp => {
            extract_c_node(&root, source, None, &mut entities, language);
        }
    }
    entities
}

// ---------------------------------------------------------------------------
// TypeScript / JavaScript
// ---------------------------------------------------------------------------

fn extract_js_node(
    node: &tree_sitter::Node,
    source: &str,
    parent_class: Option<&str>,
    entities: &mut Vec<CodeEntity>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    let entity_type = if parent_class.is_some() {
                        EntityType::Method
                    } else {
                        EntityType::Function
                    };
                    entities.push(entity(
                        &child,
                        entity_type,
                        name,
                        parent_class,
                        js_parameters(&child, source),
                    ));
                }
            }
            "class_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    entities.push(entity(&child, EntityType::Class, name, None, None));
                    if let Some(body) = child.child_by_field_name("body") {
                        extract_js_node(&body, source, Some(name), entities);
                    }
                }
            }
            "interface_declaration" | "type_alias_declaration" | "enum_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    entities.push(entity(&child, EntityType::Class, name, None, None));
                }
            }
            "method_definition" => {
                if let Some(name) = field_text(&child, "name", source) {
                    entities.push(entity(
                        &child,
                        EntityType::Method,
                        name,
                        parent_class,
                        js_parameters(&child, source),
                    ));
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                let mut inner = child.walk();
                for decl in child.children(&mut inner) {
                    if decl.kind() != "variable_declarator" {
                        continue;
                    }
                    let Some(name_node) = decl.child_by_field_name("name") else {
                        continue;
                    };
                    if name_node.kind() != "identifier" {
                        continue;
                    }
                    let name = &source[name_node.byte_range()];
                    let value = decl.child_by_field_name("value");
                    let is_callable = value.is_some_and(|v| {
                        matches!(v.kind(), "arrow_function" | "function_expression" | "function")
                    });
                    if is_callable {
                        let params = value.and_then(|v| js_parameters(&v, source));
                        entities.push(entity(
                            &child,
                            if parent_class.is_some() {
                                EntityType::Method
                            } else {
                                EntityType::Function
                            },
                            name,
                            parent_class,
                            params,
                        ));
                    } else if parent_class.is_none() {
                        entities.push(entity(&decl, EntityType::Variable, name, None, None));
                    }
                }
            }
            "export_statement" => {
                extract_js_node(&child, source, parent_class, entities);
            }
            _ => {
                if parent_class.is_none() {
                    extract_js_node(&child, source, None, entities);
                }
            }
        }
    }
}

fn js_parameters(node: &tree_sitter::Node, source: &str) -> Option<Vec<String>> {
    let params_node = node.child_by_field_name("parameters").or_else(|| {
        let mut c = node.walk();
        node.children(&mut c)
            .find(|n| n.kind() == "formal_parameters")
    })?;
    let mut params = Vec::new();
    let mut cursor = params_node.walk();
    for child in params_node.children(&mut cursor) {
        match child.kind() {
            "identifier" => params.push(source[child.byte_range()].to_string()),
            "required_parameter" | "optional_parameter" => {
                if let Some(pattern) = child
                    .child_by_field_name("pattern")
                    .or_else(|| child.child_by_field_name("name"))
                    && pattern.kind() == "identifier"
                {
                    params.push(source[pattern.byte_range()].to_string());
                }
            }
            "assignment_pattern" => {
                if let Some(left) = child.child_by_field_name("left")
                    && left.kind() == "identifier"
                {
                    params.push(source[left.byte_range()].to_string());
                }
            }
            _ => {}
        }
    }
    Some(params)
}

// ---------------------------------------------------------------------------
// Python
// ---------------------------------------------------------------------------

fn extract_python_node(
    node: &tree_sitter::Node,
    source: &str,
    parent_class: Option<&str>,
    entities: &mut Vec<CodeEntity>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_definition" => {
                if let Some(name) = field_text(&child, "name", source) {
                    let entity_type = if parent_class.is_some() {
                        EntityType::Method
                    } else {
                        EntityType::Function
                    };
                    entities.push(entity(
                        &child,
                        entity_type,
                        name,
                        parent_class,
                        python_parameters(&child, source),
                    ));
                }
            }
            "decorated_definition" => {
                extract_python_node(&child, source, parent_class, entities);
            }
            "class_definition" => {
                if let Some(name) = field_text(&child, "name", source) {
                    entities.push(entity(&child, EntityType::Class, name, None, None));
                    if let Some(body) = child.child_by_field_name("body") {
                        extract_python_node(&body, source, Some(name), entities);
                    }
                }
            }
            _ => {
                if parent_class.is_none() {
                    extract_python_node(&child, source, None, entities);
                }
            }
        }
    }
}

fn python_parameters(node: &tree_sitter::Node, source: &str) -> Option<Vec<String>> {
    let params_node = node.child_by_field_name("parameters")?;
    let mut params = Vec::new();
    let mut cursor = params_node.walk();
    for child in params_node.children(&mut cursor) {
        let name = match child.kind() {
            "identifier" => Some(source[child.byte_range()].to_string()),
            "typed_parameter" => child
                .child(0)
                .filter(|n| n.kind() == "identifier")
                .map(|n| source[n.byte_range()].to_string()),
            "default_parameter" | "typed_default_parameter" => child
                .child_by_field_name("name")
                .filter(|n| n.kind() == "identifier")
                .map(|n| source[n.byte_range()].to_string()),
            _ => None,
        };
        if let Some(name) = name {
            if name == "self" || name == "cls" {
                continue;
            }
            params.push(name);
        }
    }
    Some(params)
}

// ---------------------------------------------------------------------------
// Rust
// ---------------------------------------------------------------------------

fn extract_rust_node(
    node: &tree_sitter::Node,
    source: &str,
    parent_type: Option<&str>,
    entities: &mut Vec<CodeEntity>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_item" => {
                if let Some(name) = field_text(&child, "name", source) {
                    let entity_type = if parent_type.is_some() {
                        EntityType::Method
                    } else {
                        EntityType::Function
                    };
                    entities.push(entity(
                        &child,
                        entity_type,
                        name,
                        parent_type,
                        rust_parameters(&child, source),
                    ));
                }
            }
            "struct_item" | "enum_item" | "trait_item" => {
                if let Some(name) = field_text(&child, "name", source) {
                    entities.push(entity(&child, EntityType::Class, name, None, None));
                    // Trait bodies may carry default method implementations.
                    if child.kind() == "trait_item"
                        && let Some(body) = child.child_by_field_name("body")
                    {
                        extract_rust_node(&body, source, Some(name), entities);
                    }
                }
            }
            "impl_item" => {
                if let Some(type_name) = field_text(&child, "type", source)
                    && let Some(body) = child.child_by_field_name("body")
                {
                    extract_rust_node(&body, source, Some(type_name), entities);
                }
            }
            "const_item" | "static_item" => {
                if parent_type.is_none()
                    && let Some(name) = field_text(&child, "name", source)
                {
                    entities.push(entity(&child, EntityType::Variable, name, None, None));
                }
            }
            _ => {
                if parent_type.is_none() {
                    extract_rust_node(&child, source, None, entities);
                }
            }
        }
    }
}

fn rust_parameters(node: &tree_sitter::Node, source: &str) -> Option<Vec<String>> {
    let params_node = node.child_by_field_name("parameters")?;
    let mut params = Vec::new();
    let mut cursor = params_node.walk();
    for child in params_node.children(&mut cursor) {
        if child.kind() == "parameter"
            && let Some(pattern) = child.child_by_field_name("pattern")
            && pattern.kind() == "identifier"
        {
            params.push(source[pattern.byte_range()].to_string());
        }
    }
    Some(params)
}

// ---------------------------------------------------------------------------
// Go
// ---------------------------------------------------------------------------

fn extract_go_node(node: &tree_sitter::Node, source: &str, entities: &mut Vec<CodeEntity>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    entities.push(entity(
                        &child,
                        EntityType::Function,
                        name,
                        None,
                        go_parameters(&child, source),
                    ));
                }
            }
            "method_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    let receiver = child
                        .child_by_field_name("receiver")
                        .and_then(|r| {
                            let mut c = r.walk();
                            r.children(&mut c)
                                .find(|n| n.kind() == "parameter_declaration")
                        })
                        .and_then(|pd| pd.child_by_field_name("type"))
                        .map(|t| source[t.byte_range()].trim_start_matches('*').to_string());
                    entities.push(entity(
                        &child,
                        EntityType::Method,
                        name,
                        receiver.as_deref(),
                        go_parameters(&child, source),
                    ));
                }
            }
            "type_declaration" => {
                let mut tc = child.walk();
                for spec in child.children(&mut tc) {
                    if spec.kind() == "type_spec"
                        && let Some(name) = field_text(&spec, "name", source)
                    {
                        entities.push(entity(&spec, EntityType::Class, name, None, None));
                    }
                }
            }
            "var_declaration" | "const_declaration" => {
                let mut vc = child.walk();
                for spec in child.children(&mut vc) {
                    if (spec.kind() == "var_spec" || spec.kind() == "const_spec")
                        && let Some(name) = field_text(&spec, "name", source)
                    {
                        entities.push(entity(&spec, EntityType::Variable, name, None, None));
                    }
                }
            }
            _ => {}
        }
    }
}

fn go_parameters(node: &tree_sitter::Node, source: &str) -> Option<Vec<String>> {
    let params_node = node.child_by_field_name("parameters")?;
    let mut params = Vec::new();
    let mut cursor = params_node.walk();
    for child in params_node.children(&mut cursor) {
        if child.kind() == "parameter_declaration" {
            let mut gc = child.walk();
            for name in child
                .children(&mut gc)
                .filter(|n| n.kind() == "identifier")
            {
                params.push(source[name.byte_range()].to_string());
            }
        }
    }
    Some(params)
}

// ---------------------------------------------------------------------------
// Java / C# (same declaration shape in both grammars)
// ---------------------------------------------------------------------------

fn extract_java_like_node(
    node: &tree_sitter::Node,
    source: &str,
    parent_class: Option<&str>,
    entities: &mut Vec<CodeEntity>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "class_declaration"
            | "interface_declaration"
            | "enum_declaration"
            | "record_declaration"
            | "struct_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    entities.push(entity(&child, EntityType::Class, name, parent_class, None));
                    if let Some(body) = child.child_by_field_name("body") {
                        extract_java_like_node(&body, source, Some(name), entities);
                    }
                }
            }
            "method_declaration" | "constructor_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    entities.push(entity(
                        &child,
                        EntityType::Method,
                        name,
                        parent_class,
                        java_like_parameters(&child, source),
                    ));
                }
            }
            "namespace_declaration" | "file_scoped_namespace_declaration" => {
                extract_java_like_node(&child, source, parent_class, entities);
            }
            _ => {
                if parent_class.is_none() {
                    extract_java_like_node(&child, source, None, entities);
                }
            }
        }
    }
}

fn java_like_parameters(node: &tree_sitter::Node, source: &str) -> Option<Vec<String>> {
    let params_node = node.child_by_field_name("parameters")?;
    let mut params = Vec::new();
    let mut cursor = params_node.walk();
    for child in params_node.children(&mut cursor) {
        if matches!(child.kind(), "formal_parameter" | "parameter" | "spread_parameter")
            && let Some(name) = field_text(&child, "name", source)
        {
            params.push(name.to_string());
        }
    }
    Some(params)
}

// ---------------------------------------------------------------------------
// Ruby
// ---------------------------------------------------------------------------

fn extract_ruby_node(
    node: &tree_sitter::Node,
    source: &str,
    parent_class: Option<&str>,
    entities: &mut Vec<CodeEntity>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "class" | "module" => {
                if let Some(name) = field_text(&child, "name", source) {
                    entities.push(entity(&child, EntityType::Class, name, parent_class, None));
                    if let Some(body) = child.child_by_field_name("body") {
                        extract_ruby_node(&body, source, Some(name), entities);
                    }
                }
            }
            "method" | "singleton_method" => {
                if let Some(name) = field_text(&child, "name", source) {
                    let entity_type = if parent_class.is_some() {
                        EntityType::Method
                    } else {
                        EntityType::Function
                    };
                    entities.push(entity(&child, entity_type, name, parent_class, None));
                }
            }
            _ => {
                extract_ruby_node(&child, source, parent_class, entities);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Kotlin
// ---------------------------------------------------------------------------

fn extract_kotlin_node(
    node: &tree_sitter::Node,
    source: &str,
    parent_class: Option<&str>,
    entities: &mut Vec<CodeEntity>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "class_declaration" | "object_declaration" | "interface_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    entities.push(entity(&child, EntityType::Class, name, parent_class, None));
                    // kotlin-ng uses "class_body" child nodes, not a "body" field
                    let body = child.child_by_field_name("body").or_else(|| {
                        let mut c = child.walk();
                        child
                            .children(&mut c)
                            .find(|n| n.kind() == "class_body" || n.kind() == "enum_class_body")
                    });
                    if let Some(body) = body {
                        extract_kotlin_node(&body, source, Some(name), entities);
                    }
                }
            }
            "function_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    let entity_type = if parent_class.is_some() {
                        EntityType::Method
                    } else {
                        EntityType::Function
                    };
                    entities.push(entity(&child, entity_type, name, parent_class, None));
                }
            }
            _ => {
                extract_kotlin_node(&child, source, parent_class, entities);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// C / C++
// ---------------------------------------------------------------------------

fn extract_c_node(
    node: &tree_sitter::Node,
    source: &str,
    parent_class: Option<&str>,
    entities: &mut Vec<CodeEntity>,
    language: Language,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_definition" => {
                if let Some(declarator) = child.child_by_field_name("declarator")
                    && let Some(name) = c_declarator_name(&declarator, source)
                {
                    let entity_type = if parent_class.is_some() {
                        EntityType::Method
                    } else {
                        EntityType::Function
                    };
                    entities.push(entity(&child, entity_type, &name, parent_class, None));
                }
            }
            "struct_specifier" | "class_specifier" => {
                if let Some(name) = field_text(&child, "name", source) {
                    entities.push(entity(&child, EntityType::Class, name, None, None));
                    if language == Language::Cpp
                        && let Some(body) = child.child_by_field_name("body")
                    {
                        extract_c_node(&body, source, Some(name), entities, language);
                    }
                }
            }
            _ => {
                if parent_class.is_none() {
                    extract_c_node(&child, source, None, entities, language);
                }
            }
        }
    }
}

/// Extract the function name from a C/C++ declarator, descending through
/// pointer and function declarators.
fn c_declarator_name(node: &tree_sitter::Node, source: &str) -> Option<String> {
    match node.kind() {
        "function_declarator" | "pointer_declarator" => node
            .child_by_field_name("declarator")
            .and_then(|d| c_declarator_name(&d, source)),
        "identifier" | "field_identifier" => Some(source[node.byte_range()].to_string()),
        "qualified_identifier" => {
            let mut cursor = node.walk();
            node.children(&mut cursor)
                .filter(|c| c.kind() == "identifier" || c.kind() == "destructor_name")
                .last()
                .map(|n| source[n.byte_range()].to_string())
        }
        _ => None,
    }
}
