//! Tree-sitter based extraction of entities, imports, and call flows.
//!
//! Parsing never errors: syntactic problems become entries in
//! [`ParseResult::errors`] and extraction proceeds over whatever the parser
//! recovered.

pub mod entities;
pub mod flows;
pub mod imports;
pub mod languages;

pub use entities::CodeEntity;
pub use flows::{CallSite, FileFlows, FunctionScope};
pub use imports::Import;
pub use languages::Language;

/// Everything extracted from one source file.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub entities: Vec<CodeEntity>,
    pub imports: Vec<Import>,
    pub errors: Vec<String>,
}

/// Parse a source file into entities and imports.
pub fn parse(source: &str, language: Language) -> ParseResult {
    ParseResult {
        entities: entities::extract_entities(source, language),
        imports: imports::extract_imports(source, language),
        errors: entities::collect_syntax_errors(source, language),
    }
}

/// Whether a language detected from a path is supported.
pub fn is_supported(path: &std::path::Path) -> bool {
    Language::detect(path).is_some()
}
