//! Stable node-id construction and parsing.
//!
//! Id formats:
//! - file: `"{path}:file:{path}"`
//! - named entity: `"{path}:{entity_type}:{qualified_name}[:{start_line}]"`
//!   (the initial encoder appends the start line; the evolution path emits
//!   line-free ids — readers accept both)
//! - directory: `"dir:{path}"`

use crate::node::EntityType;

/// Id of the LowLevel node representing a whole file.
pub fn file_id(path: &str) -> String {
    format!("{path}:file:{path}")
}

/// Line-free entity id, as emitted by the evolution path.
pub fn entity_id(path: &str, entity_type: EntityType, qualified_name: &str) -> String {
    format!("{path}:{}:{qualified_name}", entity_type.as_str())
}

/// Line-suffixed entity id, as emitted by the initial encoder.
pub fn entity_id_at(
    path: &str,
    entity_type: EntityType,
    qualified_name: &str,
    start_line: u32,
) -> String {
    format!(
        "{path}:{}:{qualified_name}:{start_line}",
        entity_type.as_str()
    )
}

/// Id of a HighLevel directory node.
pub fn dir_id(path: &str) -> String {
    format!("dir:{path}")
}

/// Qualified name: `parent.name` for nested entities, `name` otherwise.
/// The `.` separator is used for every language.
pub fn qualified_name(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) => format!("{parent}.{name}"),
        None => name.to_string(),
    }
}

/// Strip a trailing `:{line}` suffix from an entity id, if present.
/// `"src/a.ts:function:foo:12"` → `"src/a.ts:function:foo"`.
pub fn strip_line_suffix(id: &str) -> &str {
    if let Some((prefix, last)) = id.rsplit_once(':')
        && !last.is_empty()
        && last.bytes().all(|b| b.is_ascii_digit())
        // A bare file id like "a.ts:file:a.ts" has no line suffix; the
        // segment before the candidate suffix must still contain an
        // entity-type segment for the suffix to be a line number.
        && prefix.split(':').any(|seg| EntityType::parse(seg).is_some())
    {
        return prefix;
    }
    id
}

/// Whether `node_id` identifies the same entity as the line-free id built
/// from `(path, entity_type, name)` — exact match or line-suffixed match.
pub fn matches_entity(node_id: &str, path: &str, entity_type: EntityType, name: &str) -> bool {
    let prefix = format!("{path}:{}:{name}", entity_type.as_str());
    node_id == prefix
        || (node_id.starts_with(&prefix)
            && node_id[prefix.len()..].starts_with(':')
            && node_id[prefix.len() + 1..].bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_repeats_path() {
        assert_eq!(file_id("src/auth.ts"), "src/auth.ts:file:src/auth.ts");
    }

    #[test]
    fn test_entity_ids() {
        assert_eq!(
            entity_id("src/a.ts", EntityType::Function, "helper"),
            "src/a.ts:function:helper"
        );
        assert_eq!(
            entity_id_at("src/a.ts", EntityType::Method, "Auth.login", 42),
            "src/a.ts:method:Auth.login:42"
        );
    }

    #[test]
    fn test_qualified_name_join() {
        assert_eq!(qualified_name(None, "helper"), "helper");
        assert_eq!(qualified_name(Some("Auth"), "login"), "Auth.login");
    }

    #[test]
    fn test_strip_line_suffix() {
        assert_eq!(
            strip_line_suffix("src/a.ts:function:foo:12"),
            "src/a.ts:function:foo"
        );
        assert_eq!(
            strip_line_suffix("src/a.ts:function:foo"),
            "src/a.ts:function:foo"
        );
        // File ids repeat the path; no line suffix to strip.
        assert_eq!(strip_line_suffix("a.ts:file:a.ts"), "a.ts:file:a.ts");
    }

    #[test]
    fn test_matches_entity_both_forms() {
        assert!(matches_entity(
            "src/a.ts:function:foo",
            "src/a.ts",
            EntityType::Function,
            "foo"
        ));
        assert!(matches_entity(
            "src/a.ts:function:foo:12",
            "src/a.ts",
            EntityType::Function,
            "foo"
        ));
        assert!(!matches_entity(
            "src/a.ts:function:foobar",
            "src/a.ts",
            EntityType::Function,
            "foo"
        ));
        assert!(!matches_entity(
            "src/a.ts:function:foo:12x",
            "src/a.ts",
            EntityType::Function,
            "foo"
        ));
    }

    #[test]
    fn test_dir_id() {
        assert_eq!(dir_id("src/auth"), "dir:src/auth");
    }
}
