use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use colored::Colorize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use pyfront::batch::{self, FileOutcome};
use pyfront::parser::lexer::{Channel, tokenize};
use pyfront::{LexicalFrame, ParseMode, discovery};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// A whole file.
    Module,
    /// Exactly one statement.
    Statement,
    /// One statement typed at a prompt; unfinished input is reported as
    /// incomplete.
    Interactive,
    /// A body compiled as a function of the `--arg` names.
    Arguments,
    /// One expression evaluated in a frame binding the `--frame` names.
    Inline,
}

#[derive(Parser)]
#[command(
    name = "pyfront",
    about = "Python 3 front-end: tokenize and parse Python sources",
    version,
    long_about = "pyfront tokenizes and parses Python 3 source into a syntax tree, \
                  reporting the first syntax error in each file.\n\n\
                  With no paths, source is read from standard input."
)]
struct Cli {
    /// Files or directories to parse. Omit to read standard input.
    #[arg()]
    paths: Vec<PathBuf>,

    /// Which grammar entry point to parse with.
    #[arg(long, value_enum, default_value_t = Mode::Module)]
    mode: Mode,

    /// Parameter name for `--mode arguments` (repeatable).
    #[arg(long = "arg", value_name = "NAME")]
    args: Vec<String>,

    /// Name bound in the enclosing frame for `--mode inline` (repeatable).
    #[arg(long = "frame", value_name = "NAME")]
    frame: Vec<String>,

    /// Print the token stream instead of parsing.
    #[arg(long)]
    tokens: bool,

    /// Emit JSON (trees or tokens) instead of text.
    #[arg(long)]
    json: bool,

    /// Skip paths with a component containing any of these comma-separated
    /// names (e.g. --exclude tests,migrations).
    #[arg(long, value_delimiter = ',')]
    exclude: Option<Vec<String>>,

    /// Exit with code 0 even when syntax errors are found.
    #[arg(long)]
    no_exit_code: bool,

    /// Log parser activity to stderr (overridden by PYFRONT_LOG).
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn parse_mode(&self) -> ParseMode {
        match self.mode {
            Mode::Module => ParseMode::Module,
            Mode::Statement => ParseMode::Statement { interactive: false },
            Mode::Interactive => ParseMode::Statement { interactive: true },
            Mode::Arguments => ParseMode::WithArguments(self.args.clone()),
            Mode::Inline => ParseMode::Inline(LexicalFrame::new(self.frame.iter().cloned())),
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("PYFRONT_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{}: {message}", "error".red().bold());
    process::exit(2);
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let mode = cli.parse_mode();

    // ── stdin ─────────────────────────────────────────────────────────────────
    if cli.paths.is_empty() {
        let mut source = String::new();
        if let Err(e) = io::stdin().read_to_string(&mut source) {
            fail(e);
        }
        let source = batch::strip_bom(source);
        if cli.tokens {
            print_tokens("<stdin>", &source, cli.json);
            return;
        }
        let outcome = batch::parse_source("<stdin>", &source, &mode, cli.json);
        finish(&cli, &[outcome]);
        return;
    }

    // ── file discovery ────────────────────────────────────────────────────────
    let exclude = cli.exclude.clone().unwrap_or_default();
    let mut files = Vec::new();
    for path in &cli.paths {
        if path.is_file() {
            files.push(path.clone());
        } else {
            match discovery::discover_python_files(path, &exclude) {
                Ok(found) => files.extend(found),
                Err(e) => fail(e),
            }
        }
    }

    if cli.tokens {
        for file in &files {
            match batch::read_source(file) {
                Ok(source) => print_tokens(&file.to_string_lossy(), &source, cli.json),
                Err(e) => fail(format!("{}: {e}", file.display())),
            }
        }
        return;
    }

    // ── parsing ───────────────────────────────────────────────────────────────
    let outcomes = match batch::parse_files(&files, &mode, cli.json) {
        Ok(outcomes) => outcomes,
        Err(e) => fail(e),
    };
    finish(&cli, &outcomes);
}

/// Print results and exit with 1 when any file failed to parse.
fn finish(cli: &Cli, outcomes: &[FileOutcome]) {
    let failures = outcomes.iter().filter(|o| !o.is_ok()).count();

    if cli.json {
        print_json(outcomes, failures);
    } else {
        for diagnostic in outcomes.iter().filter_map(|o| o.diagnostic.as_ref()) {
            println!("{diagnostic}");
        }
        if failures == 0 {
            let parsed = outcomes.len();
            println!("{}", format!("Parsed {parsed} file(s), no syntax errors").green());
        } else {
            println!("{}", format!("Found {failures} syntax error(s)").yellow().bold());
        }
    }

    if !cli.no_exit_code && failures > 0 {
        process::exit(1);
    }
}

fn print_json(outcomes: &[FileOutcome], failures: usize) {
    let output = json!({
        "files":  outcomes,
        "errors": failures,
    });
    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{text}"),
        Err(e) => fail(e),
    }
}

fn print_tokens(file: &str, source: &str, as_json: bool) {
    let tokens = tokenize(source);
    if as_json {
        let output = json!({ "file": file, "tokens": tokens });
        match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{text}"),
            Err(e) => fail(e),
        }
        return;
    }
    println!("{}", file.bold());
    for tok in tokens.iter().filter(|t| t.channel == Channel::Default) {
        println!(
            "{:>4}:{:<4} {:<20} {:?}",
            tok.line,
            tok.column,
            format!("{:?}", tok.kind),
            tok.text
        );
    }
}
