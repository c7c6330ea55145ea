use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

// ── helpers ──────────────────────────────────────────────────────────────────

fn pyfront_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_pyfront"))
}

struct TempPy {
    dir: tempfile::TempDir,
    files: Vec<PathBuf>,
}

impl TempPy {
    fn new() -> Self {
        Self {
            dir: tempfile::TempDir::new().unwrap(),
            files: Vec::new(),
        }
    }

    fn file(&mut self, name: &str, content: &str) -> &mut Self {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        self.files.push(path);
        self
    }

    /// Run pyfront on the files with extra args. Returns (stdout, stderr, exit code).
    fn run(&self, extra: &[&str]) -> (String, String, i32) {
        let mut cmd = Command::new(pyfront_bin());
        for f in &self.files {
            cmd.arg(f);
        }
        cmd.args(extra);
        let out = cmd.output().expect("failed to run pyfront");
        (
            String::from_utf8_lossy(&out.stdout).into_owned(),
            String::from_utf8_lossy(&out.stderr).into_owned(),
            out.status.code().unwrap_or(-1),
        )
    }

    fn run_no_exit(&self, extra: &[&str]) -> String {
        let mut args = vec!["--no-exit-code"];
        args.extend_from_slice(extra);
        self.run(&args).0
    }
}

/// Feed `input` to pyfront on stdin.
fn run_stdin(args: &[&str], input: &str) -> (String, i32) {
    let mut child = Command::new(pyfront_bin())
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run pyfront");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();
    let out = child.wait_with_output().unwrap();
    (
        String::from_utf8_lossy(&out.stdout).into_owned(),
        out.status.code().unwrap_or(-1),
    )
}

// ── summary and exit codes ───────────────────────────────────────────────────

#[test]
fn test_clean_file() {
    let mut t = TempPy::new();
    t.file("clean.py", "x = 1\nprint(x)\n");
    let (out, _, code) = t.run(&[]);
    assert_eq!(code, 0);
    assert!(out.contains("Parsed 1 file(s), no syntax errors"));
}

#[test]
fn test_exit_code_1_on_syntax_error() {
    let mut t = TempPy::new();
    t.file("bad.py", "def f(:\n");
    let (_, _, code) = t.run(&[]);
    assert_eq!(code, 1);
}

#[test]
fn test_no_exit_code_flag() {
    let mut t = TempPy::new();
    t.file("bad.py", "def f(:\n");
    let (_, _, code) = t.run(&["--no-exit-code"]);
    assert_eq!(code, 0);
}

#[test]
fn test_error_count_in_summary() {
    let mut t = TempPy::new();
    t.file("a.py", "x = (\n");
    t.file("b.py", "for x in y:\nbreak\n");
    t.file("c.py", "ok = 1\n");
    let out = t.run_no_exit(&[]);
    assert!(out.contains("Found 2 syntax error(s)"));
}

// ── diagnostics ──────────────────────────────────────────────────────────────

#[test]
fn test_diagnostic_location_and_kind() {
    let mut t = TempPy::new();
    t.file("loop.py", "x = 1\ndef f():\n    break\n");
    let out = t.run_no_exit(&[]);
    assert!(out.contains("loop.py:3:5: SyntaxError 'break' outside loop"), "{out}");
}

#[test]
fn test_tab_error_reported() {
    let mut t = TempPy::new();
    t.file("tabs.py", "if x:\n        a = 1\n\tb = 2\n");
    let out = t.run_no_exit(&[]);
    assert!(out.contains("TabError"), "{out}");
}

#[test]
fn test_indentation_error_reported() {
    let mut t = TempPy::new();
    t.file("indent.py", "if x:\n    a = 1\n  b = 2\n");
    let out = t.run_no_exit(&[]);
    assert!(out.contains("IndentationError"), "{out}");
    assert!(out.contains("unindent does not match any outer indentation level"));
}

#[test]
fn test_directory_walk_with_exclude() {
    let mut t = TempPy::new();
    t.file("pkg/a.py", "x = 1\n");
    t.file("tests/broken.py", "x = (\n");
    let dir = t.dir.path().to_string_lossy().into_owned();
    let mut cmd = Command::new(pyfront_bin());
    cmd.arg(&dir).args(["--exclude", "tests"]);
    let out = cmd.output().unwrap();
    assert_eq!(out.status.code(), Some(0));
}

// ── JSON ─────────────────────────────────────────────────────────────────────

#[test]
fn test_json_output_is_valid() {
    let mut t = TempPy::new();
    t.file("a.py", "def f(a, b=1):\n    return a + b\n");
    t.file("b.py", "def f(a, b=1, c):\n    pass\n");
    let out = t.run_no_exit(&["--json"]);
    let value: serde_json::Value = serde_json::from_str(&out).expect("valid JSON");
    assert_eq!(value["errors"], 1);
    let files = value["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert!(files[0]["tree"].is_object());
    assert_eq!(
        files[1]["diagnostic"]["message"],
        "non-default argument follows default argument"
    );
}

#[test]
fn test_token_dump_json() {
    let mut t = TempPy::new();
    t.file("a.py", "if True:\n    pass");
    let out = t.run_no_exit(&["--tokens", "--json"]);
    let value: serde_json::Value = serde_json::from_str(&out).expect("valid JSON");
    let kinds: Vec<&str> = value["tokens"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["kind"].as_str())
        .collect();
    assert_eq!(&kinds[kinds.len() - 3..], &["Newline", "Dedent", "Eof"]);
}

#[test]
fn test_token_dump_skips_byte_order_mark() {
    let mut t = TempPy::new();
    t.file("bom.py", "\u{feff}x = 1\n");
    let out = t.run_no_exit(&["--tokens", "--json"]);
    let value: serde_json::Value = serde_json::from_str(&out).expect("valid JSON");
    let first = &value["tokens"][0];
    assert_eq!(first["kind"], "Name");
    assert_eq!(first["start"], 0);
}

// ── stdin and modes ──────────────────────────────────────────────────────────

#[test]
fn test_stdin_module() {
    let (out, code) = run_stdin(&[], "import os\nprint(os.sep)\n");
    assert_eq!(code, 0);
    assert!(out.contains("no syntax errors"));
}

#[test]
fn test_interactive_mode_incomplete() {
    let (out, code) = run_stdin(&["--mode", "interactive"], "for x in y:\n");
    assert_eq!(code, 1);
    assert!(out.contains("incomplete input"), "{out}");
}

#[test]
fn test_arguments_mode_allows_return() {
    let (_, code) = run_stdin(&["--mode", "arguments", "--arg", "a"], "return a\n");
    assert_eq!(code, 0);
    let (_, code) = run_stdin(&[], "return a\n");
    assert_eq!(code, 1);
}

#[test]
fn test_inline_mode_frame_locals() {
    let (out, code) = run_stdin(&["--mode", "inline", "--frame", "x", "--json"], "x + y");
    assert_eq!(code, 0);
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    let root = &value["files"][0]["tree"]["root"]["kind"]["InlineExpression"];
    assert_eq!(root["frame_locals"], serde_json::json!(["x"]));
}
