use repograph_core::node::EntityType;
use repograph_parser::{Language, parse};
use repograph_parser::flows::extract_flows;

const SOURCE: &str = r#"
from .util import normalize, tokenize
import os.path

def load(path):
    return path

class Indexer:
    def __init__(self, root):
        self.root = root

    def index(self, path, depth=1):
        return path

@staticmethod
def decorated(x):
    return x
"#;

#[test]
fn test_extracts_functions_and_methods() {
    let result = parse(SOURCE, Language::Python);

    let load = result
        .entities
        .iter()
        .find(|e| e.name == "load")
        .expect("load extracted");
    assert_eq!(load.entity_type, EntityType::Function);
    assert_eq!(load.parameters.as_deref(), Some(&["path".to_string()][..]));

    let indexer = result
        .entities
        .iter()
        .find(|e| e.name == "Indexer")
        .expect("Indexer extracted");
    assert_eq!(indexer.entity_type, EntityType::Class);

    let index = result
        .entities
        .iter()
        .find(|e| e.name == "index")
        .expect("index extracted");
    assert_eq!(index.entity_type, EntityType::Method);
    assert_eq!(index.parent.as_deref(), Some("Indexer"));
    assert_eq!(index.qualified_name(), "Indexer.index");
    // `self` is dropped; the default parameter keeps its name.
    assert_eq!(
        index.parameters.as_deref(),
        Some(&["path".to_string(), "depth".to_string()][..])
    );
}

#[test]
fn test_decorated_definitions_recursed() {
    let result = parse(SOURCE, Language::Python);
    assert!(result.entities.iter().any(|e| e.name == "decorated"));
}

#[test]
fn test_relative_import_keeps_leading_dot() {
    let result = parse(SOURCE, Language::Python);

    let relative = result
        .imports
        .iter()
        .find(|i| i.module == ".util")
        .expect("relative import");
    assert_eq!(
        relative.names,
        vec!["normalize".to_string(), "tokenize".to_string()]
    );

    assert!(result.imports.iter().any(|i| i.module == "os.path"));
}

#[test]
fn test_flow_extraction_parameter_forwarding() {
    let source = r#"
def sink(data):
    return data

def pipeline(payload):
    cleaned = payload
    return sink(cleaned)
"#;
    let flows = extract_flows(source, Language::Python);

    let pipeline = flows.scope("pipeline").expect("pipeline scope");
    assert_eq!(pipeline.params, vec!["payload".to_string()]);
    assert!(pipeline.locals.contains(&"cleaned".to_string()));

    let call = flows.calls.iter().find(|c| c.callee == "sink").expect("call");
    assert_eq!(call.caller.as_deref(), Some("pipeline"));
    assert_eq!(call.args, vec!["cleaned".to_string()]);
}
