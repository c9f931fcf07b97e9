use std::collections::BTreeSet;
use std::io;
use std::path::Path;

use glob::Pattern;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Compiled include or exclude rules.
///
/// A pattern with a leading `/` is root-relative and matches only from the
/// build-context root; any other pattern matches at any depth. Matching a
/// directory matches everything beneath it. Matching is case-sensitive with
/// shell/gitignore `*` and `**` semantics.
#[derive(Debug, Default)]
pub struct PatternSet {
    rooted: Vec<Pattern>,
    floating: Vec<Pattern>,
}

impl PatternSet {
    pub fn compile(patterns: &[String]) -> Result<Self> {
        let mut set = PatternSet::default();
        for raw in patterns {
            let (target, source) = match raw.strip_prefix('/') {
                Some(rest) => (&mut set.rooted, rest),
                None => (&mut set.floating, raw.as_str()),
            };
            let pattern = Pattern::new(source)
                .map_err(|e| Error::Build(format!("invalid glob pattern {raw:?}: {e}")))?;
            target.push(pattern);
        }
        Ok(set)
    }

    pub fn is_empty(&self) -> bool {
        self.rooted.is_empty() && self.floating.is_empty()
    }

    /// True when the set matches `rel` or any of its ancestor directories.
    pub fn matches(&self, rel: &str) -> bool {
        ancestors(rel).any(|candidate| self.matches_path(candidate))
    }

    fn matches_path(&self, candidate: &str) -> bool {
        if self.rooted.iter().any(|p| p.matches(candidate)) {
            return true;
        }
        // a floating pattern may match starting at any path component
        self.floating
            .iter()
            .any(|p| suffixes(candidate).any(|s| p.matches(s)))
    }
}

/// `a/b/c` → `a/b/c`, `a/b`, `a`.
fn ancestors(rel: &str) -> impl Iterator<Item = &str> {
    std::iter::once(rel).chain(
        rel.rmatch_indices('/')
            .map(move |(idx, _)| &rel[..idx]),
    )
}

/// `a/b/c` → `a/b/c`, `b/c`, `c`.
fn suffixes(candidate: &str) -> impl Iterator<Item = &str> {
    std::iter::once(candidate).chain(
        candidate
            .match_indices('/')
            .map(move |(idx, _)| &candidate[idx + 1..]),
    )
}

/// Deterministic file selection over a build context: walk every file under
/// `root`, keep those matching `include` and not `exclude`, and return their
/// `/`-separated relative paths in lexicographic order, duplicate-free.
pub fn select_files(root: &Path, include: &PatternSet, exclude: &PatternSet) -> Result<Vec<String>> {
    let mut selected = BTreeSet::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if rel.is_empty() {
            continue;
        }
        if include.matches(&rel) && !exclude.matches(&rel) {
            selected.insert(rel);
        }
    }
    Ok(selected.into_iter().collect())
}
