//! Requirement conflict detection CLI
//!
//! # Usage
//!
//! ```bash
//! # Detect conflicts in a modelled-requirements file
//! reqconflict detect --model reqs.txt --output conflicts.txt
//!
//! # Same, with a custom rules document and JSON output
//! reqconflict detect --model reqs.txt --rules my-rules.yaml --format json
//!
//! # Compile a rules document and list its rules
//! reqconflict check-rules --rules my-rules.yaml
//!
//! # Re-serialize a model file (renumbered ids, canonical spacing)
//! reqconflict normalize --model reqs.txt
//! ```
//!
//! Without `--rules`, the rules document comes from `REQCONFLICT_RULES`, then
//! `config/rules.yaml`, then the built-in default.

use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::info;

use reqconflict::model::{load_model_file, render_model};
use reqconflict::report::{write_report, ReportFormat};
use reqconflict::{ConfigLoader, Detector, EntityPool};

#[derive(Parser)]
#[command(name = "reqconflict")]
#[command(version)]
#[command(about = "Detect logical conflicts among modelled requirements")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log detection details to stderr (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect conflicts among the requirements of a model file
    Detect {
        /// Modelled-requirements file, one tuple per line
        #[arg(short, long)]
        model: PathBuf,

        /// Rules document
        #[arg(short, long, env = "REQCONFLICT_RULES")]
        rules: Option<PathBuf>,

        /// Report file (writes stdout if not provided)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report format
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
    },

    /// Compile a rules document and list its rules
    CheckRules {
        /// Rules document
        #[arg(short, long, env = "REQCONFLICT_RULES")]
        rules: Option<PathBuf>,
    },

    /// Parse a model file and write it back in canonical form
    Normalize {
        /// Modelled-requirements file
        #[arg(short, long)]
        model: PathBuf,

        /// Output file (writes stdout if not provided)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// =============================================================================
// MAIN
// =============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Detect {
            model,
            rules,
            output,
            format,
        } => cmd_detect(&model, rules.as_deref(), output.as_deref(), format),
        Commands::CheckRules { rules } => cmd_check_rules(rules.as_deref()),
        Commands::Normalize { model, output } => cmd_normalize(&model, output.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .init();
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

fn cmd_detect(
    model: &Path,
    rules: Option<&Path>,
    output: Option<&Path>,
    format: ReportFormat,
) -> Result<()> {
    let rules = ConfigLoader::resolve(rules).load_rule_set()?;

    let mut pool = EntityPool::new();
    let reqs = load_model_file(model, &mut pool)?;

    let conflicts = Detector::new(&rules)
        .detect(&reqs)
        .with_context(|| format!("Detection failed for {}", model.display()))?;

    let mut out = open_output(output)?;
    write_report(&mut out, &conflicts, format)?;
    out.flush().context("Failed to flush report")?;

    info!("{} conflicts written", conflicts.len());
    Ok(())
}

fn cmd_check_rules(rules: Option<&Path>) -> Result<()> {
    let loader = ConfigLoader::resolve(rules);
    let rule_set = loader.load_rule_set()?;

    println!("{}: {} rules", loader.source(), rule_set.len());
    for name in rule_set.names() {
        println!("  {}", name);
    }
    Ok(())
}

fn cmd_normalize(model: &Path, output: Option<&Path>) -> Result<()> {
    let mut pool = EntityPool::new();
    let reqs = load_model_file(model, &mut pool)?;

    let mut out = open_output(output)?;
    out.write_all(render_model(&reqs).as_bytes())
        .context("Failed to write model")?;
    out.flush().context("Failed to flush model")?;
    Ok(())
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}
