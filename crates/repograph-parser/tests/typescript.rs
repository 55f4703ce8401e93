use repograph_core::node::EntityType;
use repograph_parser::{Language, parse};
use repograph_parser::flows::extract_flows;

const SOURCE: &str = r#"
import { format, validate } from './util';
import Router from 'express';

export const MAX_RETRIES = 3;

export function login(user, password) {
    const normalized = format(user);
    return validate(normalized, password);
}

export class Session {
    refresh(token) {
        return token;
    }
}

const toUpper = (value) => value.toUpperCase();
"#;

#[test]
fn test_extracts_functions_classes_methods() {
    let result = parse(SOURCE, Language::TypeScript);

    let login = result
        .entities
        .iter()
        .find(|e| e.name == "login")
        .expect("login extracted");
    assert_eq!(login.entity_type, EntityType::Function);
    assert_eq!(
        login.parameters.as_deref(),
        Some(&["user".to_string(), "password".to_string()][..])
    );

    let session = result
        .entities
        .iter()
        .find(|e| e.name == "Session")
        .expect("Session extracted");
    assert_eq!(session.entity_type, EntityType::Class);

    let refresh = result
        .entities
        .iter()
        .find(|e| e.name == "refresh")
        .expect("refresh extracted");
    assert_eq!(refresh.entity_type, EntityType::Method);
    assert_eq!(refresh.parent.as_deref(), Some("Session"));
    assert_eq!(refresh.qualified_name(), "Session.refresh");
}

#[test]
fn test_arrow_function_and_variable() {
    let result = parse(SOURCE, Language::TypeScript);

    let arrow = result
        .entities
        .iter()
        .find(|e| e.name == "toUpper")
        .expect("toUpper extracted");
    assert_eq!(arrow.entity_type, EntityType::Function);

    let constant = result
        .entities
        .iter()
        .find(|e| e.name == "MAX_RETRIES")
        .expect("MAX_RETRIES extracted");
    assert_eq!(constant.entity_type, EntityType::Variable);
}

#[test]
fn test_imports_with_names() {
    let result = parse(SOURCE, Language::TypeScript);

    let util = result
        .imports
        .iter()
        .find(|i| i.module == "./util")
        .expect("./util import");
    assert_eq!(util.names, vec!["format".to_string(), "validate".to_string()]);

    let express = result
        .imports
        .iter()
        .find(|i| i.module == "express")
        .expect("express import");
    assert_eq!(express.names, vec!["Router".to_string()]);
}

#[test]
fn test_line_numbers_are_one_based() {
    let result = parse("function first() {}\n", Language::TypeScript);
    assert_eq!(result.entities.len(), 1);
    assert_eq!(result.entities[0].start_line, 1);
    assert_eq!(result.entities[0].end_line, 1);
}

#[test]
fn test_syntax_errors_recorded_not_thrown() {
    let result = parse("function ok() {}\nfunction {{{\n", Language::TypeScript);
    assert!(!result.errors.is_empty());
    assert!(result.errors[0].contains("syntax error"));
    // The healthy part of the file still yields its entity.
    assert!(result.entities.iter().any(|e| e.name == "ok"));
}

#[test]
fn test_clean_file_has_no_errors() {
    let result = parse(SOURCE, Language::TypeScript);
    assert!(result.errors.is_empty(), "unexpected: {:?}", result.errors);
}

#[test]
fn test_flow_extraction_scopes_and_calls() {
    let source = r#"
function helper(value) {
    return value + 1;
}

function caller(input) {
    const doubled = input * 2;
    return helper(doubled);
}
"#;
    let flows = extract_flows(source, Language::TypeScript);

    let caller = flows.scope("caller").expect("caller scope");
    assert_eq!(caller.params, vec!["input".to_string()]);
    assert!(caller.locals.contains(&"doubled".to_string()));

    let call = flows
        .calls
        .iter()
        .find(|c| c.callee == "helper")
        .expect("helper call");
    assert_eq!(call.caller.as_deref(), Some("caller"));
    assert_eq!(call.args, vec!["doubled".to_string()]);
}
