//! Language detection and tree-sitter grammar loading.

use std::path::Path;

/// Supported programming languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    TypeScript,
    JavaScript,
    Python,
    Rust,
    Go,
    Java,
    CSharp,
    Ruby,
    Kotlin,
    C,
    Cpp,
}

impl Language {
    /// Detect language from file extension. Unknown extensions yield `None`
    /// and are skipped by the pipeline.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "ts" | "tsx" => Some(Self::TypeScript),
            "js" | "jsx" => Some(Self::JavaScript),
            "py" => Some(Self::Python),
            "rs" => Some(Self::Rust),
            "go" => Some(Self::Go),
            "java" => Some(Self::Java),
            "cs" => Some(Self::CSharp),
            "rb" => Some(Self::Ruby),
            "kt" => Some(Self::Kotlin),
            "c" | "h" => Some(Self::C),
            "cpp" | "cc" | "cxx" | "hpp" => Some(Self::Cpp),
            _ => None,
        }
    }

    /// Detect language from a file path.
    pub fn detect(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
            Self::Python => "python",
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Java => "java",
            Self::CSharp => "csharp",
            Self::Ruby => "ruby",
            Self::Kotlin => "kotlin",
            Self::C => "c",
            Self::Cpp => "cpp",
        }
    }

    /// Parse language from name string (as returned by `name()`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "typescript" => Some(Self::TypeScript),
            "javascript" => Some(Self::JavaScript),
            "python" => Some(Self::Python),
            "rust" => Some(Self::Rust),
            "go" => Some(Self::Go),
            "java" => Some(Self::Java),
            "csharp" => Some(Self::CSharp),
            "ruby" => Some(Self::Ruby),
            "kotlin" => Some(Self::Kotlin),
            "c" => Some(Self::C),
            "cpp" => Some(Self::Cpp),
            _ => None,
        }
    }

    /// Get the tree-sitter Language for parsing.
    pub fn ts_language(self) -> tree_sitter::Language {
        match self {
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            Self::Go => tree_sitter_go::LANGUAGE.into(),
            Self::Java => tree_sitter_java::LANGUAGE.into(),
            Self::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
            Self::Ruby => tree_sitter_ruby::LANGUAGE.into(),
            Self::Kotlin => tree_sitter_kotlin_ng::LANGUAGE.into(),
            Self::C => tree_sitter_c::LANGUAGE.into(),
            Self::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        }
    }

    /// File extension candidates tried when resolving a relative import
    /// against this language's family, in preference order.
    pub fn import_extensions(self) -> &'static [&'static str] {
        match self {
            Self::TypeScript => &["ts", "tsx", "js", "jsx"],
            Self::JavaScript => &["js", "jsx", "ts", "tsx"],
            Self::Python => &["py"],
            Self::Rust => &["rs"],
            Self::Go => &["go"],
            Self::Java => &["java"],
            Self::CSharp => &["cs"],
            Self::Ruby => &["rb"],
            Self::Kotlin => &["kt"],
            Self::C => &["h", "c"],
            Self::Cpp => &["hpp", "h", "cpp"],
        }
    }

    /// Whether relative imports in this language may resolve to a
    /// directory's `index.*` file.
    pub fn uses_index_files(self) -> bool {
        matches!(self, Self::TypeScript | Self::JavaScript)
    }

    /// AST node kinds classified as imports for this language.
    pub fn import_kinds(self) -> &'static [&'static str] {
        match self {
            Self::TypeScript | Self::JavaScript => &["import_statement"],
            Self::Python => &["import_statement", "import_from_statement"],
            Self::Rust => &["use_declaration"],
            Self::Go => &["import_declaration"],
            Self::Java => &["import_declaration"],
            Self::CSharp => &["using_directive"],
            Self::Ruby => &[], // `require` is a call, handled separately
            Self::Kotlin => &["import_header"],
            Self::C | Self::Cpp => &["preproc_include"],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_mapping() {
        assert_eq!(Language::from_extension("ts"), Some(Language::TypeScript));
        assert_eq!(Language::from_extension("tsx"), Some(Language::TypeScript));
        assert_eq!(Language::from_extension("jsx"), Some(Language::JavaScript));
        assert_eq!(Language::from_extension("py"), Some(Language::Python));
        assert_eq!(Language::from_extension("rs"), Some(Language::Rust));
        assert_eq!(Language::from_extension("h"), Some(Language::C));
        assert_eq!(Language::from_extension("hpp"), Some(Language::Cpp));
        assert_eq!(Language::from_extension("kt"), Some(Language::Kotlin));
        assert_eq!(Language::from_extension("exe"), None);
    }

    #[test]
    fn test_detect_from_path() {
        assert_eq!(
            Language::detect(Path::new("src/auth.ts")),
            Some(Language::TypeScript)
        );
        assert_eq!(Language::detect(Path::new("README.md")), None);
        assert_eq!(Language::detect(Path::new("Makefile")), None);
    }

    #[test]
    fn test_name_roundtrip() {
        for lang in [
            Language::TypeScript,
            Language::JavaScript,
            Language::Python,
            Language::Rust,
            Language::Go,
            Language::Java,
            Language::CSharp,
            Language::Ruby,
            Language::Kotlin,
            Language::C,
            Language::Cpp,
        ] {
            assert_eq!(Language::from_name(lang.name()), Some(lang));
        }
    }
}
