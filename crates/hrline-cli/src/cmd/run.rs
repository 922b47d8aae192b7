//! Run subcommand - one full extraction + report

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;

use hrline_core::{
    HttpConfig, PipelineError, ProgressContext, ReqwestTransport, RunMeta, Transport,
};
use hrline_report::{Delivery, Reporter, ReporterConfig, SlackWebhook};

use crate::config::{Config, Overrides};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Number of resources extracted in parallel
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Only extract these resources (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub only: Option<Vec<String>>,

    /// Mark resources not started within this many seconds as failed
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Extract into memory only; nothing is written to the data directory
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            workers: self.workers,
            only: self.only.clone(),
            timeout_secs: self.timeout,
            dry_run: self.dry_run,
        }
    }
}

fn build_reporter(config: &Config) -> Result<Reporter> {
    let mut reporter_config = ReporterConfig::new(&config.output.log_dir)
        .with_timestamp_fmt(&config.output.timestamp_fmt);
    if let Some(hook) = &config.notify.slack_hook {
        let transport: Arc<dyn Transport> = Arc::new(
            ReqwestTransport::new(HttpConfig::default())
                .context("Failed to build webhook HTTP client")?,
        );
        reporter_config = reporter_config.with_channel(Box::new(SlackWebhook::new(hook, transport)));
    }
    Ok(Reporter::new(reporter_config))
}

/// 0 when every resource succeeded, 1 on any failure, 2 when no report
/// could be produced
pub fn run(args: RunArgs, config: &Config, debug: bool) -> ExitCode {
    let progress = ProgressContext::new();

    let reporter = match build_reporter(config) {
        Ok(reporter) => reporter,
        Err(e) => {
            eprintln!("Fatal error: {e:#}");
            return ExitCode::from(2);
        }
    };

    // Progress bars and log lines share the terminal; the run log gets a copy
    let multi = progress.is_tty().then(|| progress.multi());
    let run_log = reporter.run_log_path();
    if let Err(e) = hrline_core::init_logging(false, debug, multi, Some(&run_log)) {
        eprintln!("Warning: cannot write run log {}: {e}", run_log.display());
        let _ = hrline_core::init_logging(false, debug, multi, None);
    }
    match &config.source {
        Some(path) => log::info!("Loaded config from {}", path.display()),
        None => log::debug!("No config file found, using defaults"),
    }

    if let Err(e) = hrline_core::install_signal_handlers() {
        log::warn!("Cannot install signal handlers: {e}");
    }

    match execute(&args, config, &reporter, &progress) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("Fatal error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn execute(
    args: &RunArgs,
    config: &Config,
    reporter: &Reporter,
    progress: &ProgressContext,
) -> Result<bool> {
    let personio = match config.personio(&args.overrides()) {
        Ok(personio) => personio,
        Err(e) => {
            reject(config, reporter, e);
            return Ok(false);
        }
    };
    if args.dry_run {
        log::info!("Dry run: records are kept in memory only");
    }
    let output = hrline_personio::run(&personio, reporter, Some(progress));
    Ok(output.succeeded())
}

/// Report a configuration that could not be turned into a pipeline run
fn reject(config: &Config, reporter: &Reporter, error: PipelineError) -> Delivery {
    log::error!("{error}");
    let meta = RunMeta::new(
        &config.pipeline.name,
        &config.pipeline.destination,
        &config.pipeline.dataset,
    );
    let report = reporter.finalize(meta, Utc::now(), Err(error));
    let delivery = reporter.handle_results(&report);
    log::info!("Artifacts: {} written", delivery.artifacts.len());
    delivery
}
