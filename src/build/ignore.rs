use std::path::Path;

/// Filename of the ignore file read from the build context root.
pub const IGNORE_FILENAME: &str = ".bentoignore";

/// Exclude patterns parsed from a `.bentoignore` file. They are applied as
/// additional excludes with the same precedence as explicit `exclude` rules:
/// after includes, winning on conflict.
#[derive(Debug, Default)]
pub struct IgnoreRules {
    patterns: Vec<String>,
}

impl IgnoreRules {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the ignore file from the build context root; a missing or
    /// unreadable file means no extra excludes.
    pub fn from_context(root: &Path) -> Self {
        match std::fs::read_to_string(root.join(IGNORE_FILENAME)) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::empty(),
        }
    }

    /// Parse rules from a string, dropping blanks and `#` comments.
    pub fn parse(content: &str) -> Self {
        let patterns = content
            .lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| line.to_string())
            .collect();
        Self { patterns }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}
