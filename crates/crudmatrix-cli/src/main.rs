//! crudmatrix CLI - declarative CRUD endpoint test matrices

mod demo;
mod storage;

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crudmatrix_core::{SuiteConfig, SuitePlan};
use crudmatrix_runner::TestSuite;

#[derive(Parser)]
#[command(name = "crudmatrix")]
#[command(about = "Exercise CRUD endpoints under every declared input category")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Verbose output (every scenario with its inputs)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured suite against a live server
    Run {
        /// Config file (default: .crudmatrix.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Only run scenarios whose name contains this text (repeatable)
        #[arg(long)]
        only: Vec<String>,

        /// Show the scenario plan without sending requests
        #[arg(long)]
        dry_run: bool,

        /// Directory for saved reports (default: ~/.crudmatrix/reports)
        #[arg(long)]
        report_dir: Option<PathBuf>,
    },

    /// Initialize config file
    Init,

    /// Export JSON Schema for the report format
    Schema,

    /// Run the built-in departments/employees suite in process
    Demo {
        /// Only run scenarios whose name contains this text (repeatable)
        #[arg(long)]
        only: Vec<String>,

        /// Show the scenario plan without running it
        #[arg(long)]
        dry_run: bool,

        /// Directory for saved reports (default: ~/.crudmatrix/reports)
        #[arg(long)]
        report_dir: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(3)
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Run {
            config,
            only,
            dry_run,
            report_dir,
        } => {
            let cfg = match config {
                Some(path) => SuiteConfig::load(&path)?,
                None => SuiteConfig::load_default()?,
            };

            // Dry run: plan and config checks only
            if dry_run {
                let plan = SuitePlan::from_config(&cfg);
                print_plan(&plan, cli.output)?;
                return Ok(if plan.has_errors() { 1 } else { 0 });
            }

            tracing::debug!(endpoints = cfg.endpoints.len(), base_url = %cfg.base_url, "config loaded");
            let suite = TestSuite::from_config("config", &cfg).context("invalid suite configuration")?;

            if cli.output != OutputFormat::Silent {
                eprintln!("Config:");
                eprintln!("  base_url:  {}", cfg.base_url);
                eprintln!("  endpoints: {}", cfg.endpoints.len());
                if !cfg.fixture.is_empty() {
                    eprintln!("  fixture:   {} values", cfg.fixture.len());
                }
                eprintln!();
            }

            let opts = RunOptions {
                only: &only,
                output: cli.output,
                verbose: cli.verbose,
                report_dir: report_dir.as_deref(),
            };
            execute(&suite, &opts, Some(&cfg), &cfg.base_url)
        }

        Commands::Demo {
            only,
            dry_run,
            report_dir,
        } => {
            let suite = demo::suite()?;
            if dry_run {
                let plan = suite.plan();
                print_plan(&plan, cli.output)?;
                return Ok(if plan.has_errors() { 1 } else { 0 });
            }
            let opts = RunOptions {
                only: &only,
                output: cli.output,
                verbose: cli.verbose,
                report_dir: report_dir.as_deref(),
            };
            execute(&suite, &opts, None, "in-process")
        }

        Commands::Init => {
            let config_path = ".crudmatrix.toml";
            if Path::new(config_path).exists() {
                eprintln!("{config_path} already exists");
                return Ok(1);
            }

            std::fs::write(config_path, SuiteConfig::example())?;
            println!("Created {config_path}");
            println!("\nEdit the file to configure:");
            println!("  - base_url: server to test");
            println!("  - [fixture]: ids, tokens and other values referenced by endpoints");
            println!("  - [[endpoints]]: kind, path and per-category inputs");
            Ok(0)
        }

        Commands::Schema => {
            let schema = crudmatrix_core::schema::generate_schema();
            println!("{schema}");
            Ok(0)
        }
    }
}

fn print_plan(plan: &SuitePlan, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Terminal => println!("{}", plan.to_terminal()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(plan)?),
        OutputFormat::Silent => {}
    }
    Ok(())
}

struct RunOptions<'a> {
    only: &'a [String],
    output: OutputFormat,
    verbose: bool,
    report_dir: Option<&'a Path>,
}

/// Run (a filtered subset of) the suite, print the report, persist it and
/// return the verdict's exit code.
fn execute(
    suite: &TestSuite,
    opts: &RunOptions,
    config: Option<&SuiteConfig>,
    target: &str,
) -> Result<i32> {
    let filtered = !opts.only.is_empty();
    if filtered {
        let names = suite.scenario_names();
        if !names.iter().any(|n| matches_any(n, opts.only)) {
            eprintln!("Error: --only matched none of the {} scenarios", names.len());
            return Ok(3);
        }
    }

    let start = Instant::now();
    let report = suite.run_filtered(|name| !filtered || matches_any(name, opts.only));
    let duration_secs = start.elapsed().as_secs_f64();
    let verdict = report.verdict();

    match opts.output {
        OutputFormat::Terminal => {
            println!("{}", report.to_terminal(opts.verbose));
            println!("  Exit code: {}", verdict.exit_code);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Silent => {}
    }

    let data = storage::ReportData {
        config,
        report: &report,
        target,
        duration_secs,
    };
    match storage::save_report(&data, opts.report_dir) {
        Ok(path) => {
            if opts.output != OutputFormat::Silent {
                eprintln!("Report saved: {}", path.display());
            }
        }
        Err(e) => eprintln!("Warning: failed to save report: {e}"),
    }

    Ok(verdict.exit_code)
}

fn matches_any(name: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| name.contains(p.as_str()))
}
