//! paramtree CLI
//!
//! Inspects, checks and rewrites hierarchical config files without an
//! application around them.

mod cli;
mod commands;
mod error;
mod settings;

use clap::Parser;
use colored::Colorize;
use paramtree_core::CheckingMode;
use paramtree_fs::NormalizedPath;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cli::{Cli, Commands};
use commands::check::CheckOptions;
use error::Result;
use settings::Settings;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command else {
        println!("{} hierarchical config tool", "paramtree".green().bold());
        println!();
        println!("Run {} for available commands.", "paramtree --help".cyan());
        return Ok(());
    };

    let settings = Settings::load(cli.settings.as_deref())?;
    execute_command(&settings, command)
}

/// Log to stderr when `--verbose` is given or `RUST_LOG` is set.
fn init_tracing(verbose: bool) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) => EnvFilter::new(directives),
        Err(_) if verbose => EnvFilter::new("debug"),
        Err(_) => return,
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        tracing::debug!("logging enabled");
    }
}

fn execute_command(settings: &Settings, command: Commands) -> Result<()> {
    match command {
        Commands::Check {
            configs,
            facts,
            search,
            strict,
            lenient,
            cmdline,
        } => {
            let mode = match (strict, lenient) {
                (true, _) => Some(CheckingMode::Strict),
                (_, true) => Some(CheckingMode::Lenient),
                _ => None,
            };
            let options = CheckOptions {
                configs,
                facts,
                search: search.iter().map(NormalizedPath::new).collect(),
                mode,
                cmdline,
            };
            commands::run_check(settings, &options)
        }
        Commands::Dump {
            config,
            json,
            resolved,
            facts,
        } => commands::run_dump(settings, &config, &facts, json, resolved),
        Commands::Convert { input, output } => commands::run_convert(settings, &input, &output),
        Commands::Templates { config, prefix } => commands::run_templates(&config, prefix.as_deref()),
        Commands::Instantiate {
            config,
            spec,
            instances,
            write,
        } => commands::run_instantiate(&config, &spec, &instances, write),
        Commands::Normalize { config } => commands::run_normalize(&config),
        Commands::Diff { a, b } => commands::run_diff(&a, &b),
    }
}
