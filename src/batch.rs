use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::parser::{ParseMode, parse};
use crate::report::Diagnostic;
use crate::sst::{NodeKind, Sst};

// ── per-file result ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub file: String,
    /// Top-level statements in the parsed tree; 0 on failure.
    pub statements: usize,
    pub scopes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
    /// The tree itself, kept only when the caller asked for it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree: Option<Sst>,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        self.diagnostic.is_none()
    }
}

// ── public entry points ──────────────────────────────────────────────────────

/// Parse every file in parallel. Files that cannot be read are logged and
/// skipped. Outcomes come back sorted by file name.
pub fn parse_files(files: &[PathBuf], mode: &ParseMode, keep_trees: bool) -> Result<Vec<FileOutcome>> {
    let mut outcomes: Vec<FileOutcome> = files
        .par_iter()
        .filter_map(|path| match read_source(path) {
            Ok(source) => Some(parse_source(
                &path.to_string_lossy(),
                &source,
                mode,
                keep_trees,
            )),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping unreadable file");
                None
            }
        })
        .collect();
    outcomes.sort_by(|a, b| a.file.cmp(&b.file));
    Ok(outcomes)
}

/// Parse one in-memory source.
pub fn parse_source(file: &str, source: &str, mode: &ParseMode, keep_trees: bool) -> FileOutcome {
    match parse(source, mode) {
        Ok(sst) => {
            let statements = top_level_statements(&sst);
            debug!(file, statements, "parsed");
            FileOutcome {
                file: file.to_string(),
                statements,
                scopes: sst.scopes.len(),
                diagnostic: None,
                tree: keep_trees.then_some(sst),
            }
        }
        Err(err) => FileOutcome {
            file: file.to_string(),
            statements: 0,
            scopes: 0,
            diagnostic: Some(Diagnostic::from_error(file, &err)),
            tree: None,
        },
    }
}

/// Read a source file as UTF-8 text, without its byte order mark.
pub fn read_source(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(strip_bom(String::from_utf8(bytes)?))
}

/// A UTF-8 byte order mark is not part of the program text.
pub fn strip_bom(source: String) -> String {
    match source.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => source,
    }
}

fn top_level_statements(sst: &Sst) -> usize {
    match &sst.root.kind {
        NodeKind::Module { body }
        | NodeKind::Interactive { body }
        | NodeKind::FunctionBody { body, .. } => body.len(),
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_parse_files_mixed() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("a.py");
        let bad = dir.path().join("b.py");
        fs::write(&good, "import os\nx = 1\n").unwrap();
        fs::write(&bad, "def f():\n  break\n").unwrap();

        let outcomes = parse_files(&[good, bad], &ParseMode::Module, false).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_ok());
        assert_eq!(outcomes[0].statements, 2);
        assert!(outcomes[0].tree.is_none());

        let d = outcomes[1].diagnostic.as_ref().unwrap();
        assert_eq!(d.kind, ErrorKind::Semantic);
        assert_eq!(d.message, "'break' outside loop");
        assert_eq!(d.line, 2);
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.py");
        let outcomes = parse_files(&[missing], &ParseMode::Module, false).unwrap();
        assert!(outcomes.is_empty());
    }

    #[test]
    fn test_bom_is_stripped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bom.py");
        fs::write(&path, "\u{feff}x = 1\n").unwrap();
        let outcomes = parse_files(&[path], &ParseMode::Module, true).unwrap();
        assert!(outcomes[0].is_ok());
        assert!(outcomes[0].tree.is_some());
    }
}
