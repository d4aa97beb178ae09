use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use formulang::{tokenize, Definitions, EvalConfig, Evaluator, Formula, Value};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Evaluate a formula against a JSON subject and print the result as JSON.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Treat FORMULA as the path of a file holding the formula.
    #[arg(short, long)]
    file: bool,

    /// JSON file holding the subject record.
    #[arg(short, long)]
    subject: Option<PathBuf>,

    /// JSON definitions document (variables, functions, constants, keywords).
    #[arg(short, long)]
    definitions: Option<PathBuf>,

    /// Print the token sequence instead of evaluating.
    #[arg(long)]
    tokens: bool,

    /// Print the parsed AST instead of evaluating.
    #[arg(long)]
    ast: bool,

    /// Fail when the formula is not completely parsed.
    #[arg(long)]
    strict: bool,

    formula: String,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read(path: &Path, what: &str) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("failed to read the {what} file '{}'", path.display()))
}

fn run(args: Args) -> Result<()> {
    let source = if args.file {
        read(Path::new(&args.formula), "formula")?
    } else {
        args.formula.clone()
    };

    if args.tokens {
        println!("{}", serde_json::to_string(&tokenize(&source))?);
        return Ok(());
    }

    let formula = Formula::new(&source);
    if !formula.is_valid() {
        if args.strict {
            bail!("invalid formula, unparsed tokens: {}", formula.remaining().join(" "));
        }
        warn!(remaining = ?formula.remaining(), "formula is not valid");
    }

    if args.ast {
        println!("{}", serde_json::to_string_pretty(formula.ast())?);
        return Ok(());
    }

    let subject = match &args.subject {
        Some(path) => Value::from_json_str(&read(path, "subject")?)
            .with_context(|| format!("invalid subject JSON in '{}'", path.display()))?,
        None => Value::Null,
    };
    let definitions = match &args.definitions {
        Some(path) => Definitions::from_json_str(&read(path, "definitions")?)
            .with_context(|| format!("invalid definitions in '{}'", path.display()))?,
        None => Definitions::default(),
    };
    let (environment, host) = definitions.compile()?;

    let mut evaluator = Evaluator::new(&environment, &host).with_config(EvalConfig::from_env());
    let result = formula.evaluate_with(&mut evaluator, &subject, None)?;
    println!("{}", result.to_json_string_pretty()?);
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    run(Args::parse())
}
