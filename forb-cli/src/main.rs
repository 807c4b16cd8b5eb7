//! forb command line
//!
//! Usage: `forb [--only DECODER]... [INPUT...]`, or one input per line on
//! stdin.
//!
//! Each input is run through the decoders; the ranked interpretations
//! and the trait facts of the best one are printed. Inputs starting with
//! `=` call the expression table: `=PI`, `=factorial(5)`, `=gcd(12, 18)`.
//! `--list` prints every registered capability.

use clap::Parser;
use forb::{ConfigError, EngineConfig, Forb};
use forb_core::{ForbError, Number};
use forb_plugin::CapabilityKind;
use std::io::{self, BufRead, IsTerminal};
use tracing::{debug, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "forb", about = "Interpret raw input through pluggable decoders")]
struct Cli {
    /// Inputs to interpret; read from stdin when none are given
    inputs: Vec<String>,

    /// Print every registered capability and exit
    #[arg(long)]
    list: bool,

    /// Log level (trace, debug, info, warn, error); overrides the config value
    #[arg(long)]
    log_level: Option<String>,

    /// Run only these decoders, by id or alias (repeatable)
    #[arg(long = "only", value_name = "DECODER")]
    filter: Vec<String>,
}

impl Cli {
    fn decoders(&self) -> Vec<&str> {
        self.filter.iter().map(String::as_str).collect()
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logging needs the configured level, so config errors are reported after init.
    let loaded = EngineConfig::discover();
    let level = cli
        .log_level
        .clone()
        .or_else(|| loaded.as_ref().ok().map(|c| c.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    init_telemetry(&level);
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            report_config_error(&e);
            EngineConfig::default()
        }
    };

    // Rejected registrations are logged while loading.
    let (forb, _report) = Forb::with_standard_library(config);

    if cli.list {
        print_capabilities(&forb);
        return;
    }

    let only = cli.decoders();
    if cli.inputs.is_empty() {
        let stdin = io::stdin();
        if stdin.is_terminal() {
            eprintln!("usage: forb [--list] [--only DECODER]... [INPUT...]");
            return;
        }
        for line in stdin.lock().lines().map_while(Result::ok) {
            let line = line.trim();
            if !line.is_empty() {
                handle(&forb, line, &only).await;
            }
        }
    } else {
        for input in &cli.inputs {
            handle(&forb, input, &only).await;
        }
    }
}

fn init_telemetry(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

fn report_config_error(err: &ConfigError) {
    warn!(error = %err, "invalid configuration, using defaults");
}

async fn handle(forb: &Forb, input: &str, only: &[&str]) {
    if let Some(expr) = input.strip_prefix('=') {
        match evaluate(forb, expr) {
            Ok(value) => println!("{} = {}", expr.trim(), value),
            Err(err) => println!("{} -> {}", expr.trim(), err),
        }
        return;
    }

    // Plugin faults are logged by the engine as they are recorded.
    let result = if only.is_empty() {
        forb.interpret(input)
    } else {
        forb.interpret_filtered(input, only)
    };
    println!("{}", input);
    let Some(top) = result.top() else {
        println!("  (no interpretation)");
        return;
    };

    let limit = forb.config().dispatch.max_alternatives;
    let shown = std::iter::once(top).chain(result.alternatives(limit));
    for (rank, interp) in shown.enumerate() {
        println!(
            "  {}. [{:.2}] {} ({}): {}",
            rank + 1,
            interp.confidence(),
            interp.value(),
            interp.source_decoder(),
            interp.description()
        );
    }

    let sheet = forb.describe_value(top.value()).await;
    for fact in &sheet.facts {
        println!("     {}", fact.text);
    }
    if !sheet.gated.is_empty() {
        debug!(gated = ?sheet.gated, "traits skipped for input size");
    }
}

/// `NAME` reads a constant; `NAME(a, b, ...)` calls a function.
fn evaluate(forb: &Forb, expr: &str) -> Result<Number, ForbError> {
    match parse_call(expr)? {
        (name, None) => forb.expr().constant(name),
        (name, Some(args)) => forb.expr().call(name, &args),
    }
}

fn parse_call(expr: &str) -> Result<(&str, Option<Vec<Number>>), ForbError> {
    let expr = expr.trim();
    let Some(open) = expr.find('(') else {
        return Ok((expr, None));
    };
    let name = expr[..open].trim();
    let inner = expr[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| ForbError::parse_error(format!("missing ')' in '{}'", expr)))?;

    if inner.trim().is_empty() {
        return Ok((name, Some(Vec::new())));
    }
    let args = inner
        .split(',')
        .map(|a| Number::from_str(a).map_err(ForbError::from))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((name, Some(args)))
}

fn print_capabilities(forb: &Forb) {
    let kinds = [
        CapabilityKind::Decoder,
        CapabilityKind::Trait,
        CapabilityKind::CurrencyProvider,
        CapabilityKind::ExprVar,
    ];
    for kind in kinds {
        println!("{}:", kind);
        for meta in forb.registry().describe(kind) {
            if meta.aliases.is_empty() {
                println!("  {:<16} {}", meta.id, meta.description);
            } else {
                println!("  {:<16} {} (aliases: {})", meta.id, meta.description, meta.aliases.join(", "));
            }
        }
    }
    println!("{}:", CapabilityKind::ExprFunc);
    for func in forb.expr().functions() {
        println!("  {:<32} {}", func.usage(), func.description);
    }
}
