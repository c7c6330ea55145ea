//! Collect Python sources under a directory.
//!
//! The walk honours `.gitignore` / `.ignore`, skips hidden entries and the
//! environment and cache directories in [`SKIPPED_DIRS`], and drops any path
//! with a component matching a caller-supplied exclude pattern.

use std::path::{Component, Path, PathBuf};

use anyhow::Result;
use ignore::WalkBuilder;

/// Source extensions the parser accepts; stubs share the module grammar.
const PYTHON_EXTENSIONS: &[&str] = &["py", "pyi"];

/// Directories never worth parsing even when they are not hidden or ignored.
const SKIPPED_DIRS: &[&str] = &[
    "venv",
    "env",
    ".venv",
    "virtualenv",
    "__pycache__",
    ".mypy_cache",
    ".ruff_cache",
    ".pytest_cache",
    "build",
    "dist",
    ".eggs",
    ".git",
    ".hg",
    "node_modules",
    ".tox",
    ".nox",
];

fn is_python_source(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| PYTHON_EXTENSIONS.contains(&ext))
}

/// A path is skipped when any of its components is a known environment
/// directory or contains one of the `exclude` patterns.
fn is_excluded(path: &Path, exclude: &[String]) -> bool {
    path.components().any(|component| {
        let Component::Normal(name) = component else {
            return false;
        };
        let name = name.to_string_lossy();
        SKIPPED_DIRS.contains(&name.as_ref())
            || exclude.iter().any(|pat| name.contains(pat.as_str()))
    })
}

/// All Python sources reachable from `root`, in walk order.
pub fn discover_python_files(root: &Path, exclude: &[String]) -> Result<Vec<PathBuf>> {
    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .require_git(false)
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        if is_python_source(path) && !is_excluded(path, exclude) {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}
