use repograph_core::node::EntityType;
use repograph_parser::{Language, parse};

const SOURCE: &str = r#"
use std::collections::{HashMap, HashSet};
use crate::codec::decode;

pub const LIMIT: usize = 64;

pub struct Decoder {
    dimension: usize,
}

impl Decoder {
    pub fn decode(&self, input: &str) -> Vec<f32> {
        Vec::new()
    }
}

pub trait Sink {
    fn accept(&mut self, value: u8) {
        let _ = value;
    }
}

fn standalone(count: usize) -> usize {
    count
}
"#;

#[test]
fn test_structs_traits_are_classes() {
    let result = parse(SOURCE, Language::Rust);

    let decoder = result
        .entities
        .iter()
        .find(|e| e.name == "Decoder")
        .expect("Decoder extracted");
    assert_eq!(decoder.entity_type, EntityType::Class);

    let sink = result
        .entities
        .iter()
        .find(|e| e.name == "Sink")
        .expect("Sink extracted");
    assert_eq!(sink.entity_type, EntityType::Class);
}

#[test]
fn test_impl_methods_carry_parent() {
    let result = parse(SOURCE, Language::Rust);

    let decode = result
        .entities
        .iter()
        .find(|e| e.name == "decode")
        .expect("decode extracted");
    assert_eq!(decode.entity_type, EntityType::Method);
    assert_eq!(decode.parent.as_deref(), Some("Decoder"));
    assert_eq!(decode.qualified_name(), "Decoder.decode");
    // `&self` is not a named parameter.
    assert_eq!(decode.parameters.as_deref(), Some(&["input".to_string()][..]));
}

#[test]
fn test_trait_default_methods_extracted() {
    let result = parse(SOURCE, Language::Rust);
    let accept = result
        .entities
        .iter()
        .find(|e| e.name == "accept")
        .expect("accept extracted");
    assert_eq!(accept.entity_type, EntityType::Method);
    assert_eq!(accept.parent.as_deref(), Some("Sink"));
}

#[test]
fn test_free_functions_and_consts() {
    let result = parse(SOURCE, Language::Rust);

    let standalone = result
        .entities
        .iter()
        .find(|e| e.name == "standalone")
        .expect("standalone extracted");
    assert_eq!(standalone.entity_type, EntityType::Function);
    assert!(standalone.parent.is_none());

    let limit = result
        .entities
        .iter()
        .find(|e| e.name == "LIMIT")
        .expect("LIMIT extracted");
    assert_eq!(limit.entity_type, EntityType::Variable);
}

#[test]
fn test_use_declarations() {
    let result = parse(SOURCE, Language::Rust);

    let grouped = result
        .imports
        .iter()
        .find(|i| i.module == "std::collections")
        .expect("grouped use");
    assert_eq!(
        grouped.names,
        vec!["HashMap".to_string(), "HashSet".to_string()]
    );

    let single = result
        .imports
        .iter()
        .find(|i| i.module == "crate::codec")
        .expect("single use");
    assert_eq!(single.names, vec!["decode".to_string()]);
}
