//! hrline - HR API extraction pipeline
//!
//! Extracts Personio resources into a local destination and reports each
//! run to Slack and the log directory.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "hrline")]
#[command(about = "Personio extraction pipeline with run reporting")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./hrline.toml or ~/.config/hrline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Extract all (or selected) resources and report the run
    Run(cmd::run::RunArgs),
    /// List the resource registry
    Resources,
    /// Show current configuration
    Config,
}

/// Exit code for failures that happen before a run report exists
const EXIT_FATAL: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Fatal error: {e:#}");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    match cli.command {
        Command::Run(args) => cmd::run::run(args, &config, cli.debug),
        Command::Resources => report_fatal(cmd::show::resources(&config, cli.debug)),
        Command::Config => report_fatal(cmd::show::config(&config, cli.debug)),
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    config.validate()?;
    Ok(config)
}

fn report_fatal(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Fatal error: {e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}
