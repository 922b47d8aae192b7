//! Pipeline orchestration for one Personio ingestion run

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use hrline_core::{
    Extractor, JsonLinesSink, MemorySink, Orchestrator, PipelineError, ProgressContext,
    ReqwestTransport, ResourceSpec, RetryPolicy, RunMeta, RunReport, Sink, TokenConfig,
    TokenManager, Transport, fmt_num,
};
use hrline_report::{Delivery, Reporter};

use crate::config::{Destination, PersonioConfig};
use crate::registry;

/// First backoff step between retries of a transient page failure
const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

/// Report of a finished run and what happened to it afterwards
#[derive(Debug)]
pub struct RunOutput {
    pub report: RunReport,
    pub delivery: Delivery,
}

impl RunOutput {
    pub fn succeeded(&self) -> bool {
        self.report.succeeded()
    }
}

fn describe_destination(config: &PersonioConfig) -> String {
    match config.destination {
        Destination::Memory => "memory".to_string(),
        Destination::JsonLines => format!("jsonl:{}", dataset_dir(config).display()),
    }
}

fn dataset_dir(config: &PersonioConfig) -> PathBuf {
    config.data_dir.join(&config.dataset)
}

fn build_sink(config: &PersonioConfig) -> Result<Box<dyn Sink>, PipelineError> {
    Ok(match config.destination {
        Destination::Memory => Box::new(MemorySink::new()),
        Destination::JsonLines => {
            let dir = dataset_dir(config);
            let sink = JsonLinesSink::new(&dir).map_err(|e| {
                PipelineError::sink(
                    &config.dataset,
                    format!("cannot create data directory {}: {e}", dir.display()),
                )
            })?;
            Box::new(sink)
        }
    })
}

fn token_config(config: &PersonioConfig) -> TokenConfig {
    TokenConfig {
        default_expiration: config.default_expiration,
        safety_margin: config.safety_margin,
        ..TokenConfig::new(&config.token_url, &config.client_id, &config.client_secret)
    }
}

/// Run the Personio pipeline: extract every selected resource, then persist
/// and deliver the run report.
///
/// Every failure that stops the run before extraction ends up in the report
/// as its exception, so artifacts are written either way.
pub fn run(
    config: &PersonioConfig,
    reporter: &Reporter,
    progress: Option<&ProgressContext>,
) -> RunOutput {
    match ReqwestTransport::new(config.http) {
        Ok(transport) => run_with_transport(config, reporter, progress, Arc::new(transport)),
        Err(e) => {
            let started_at = Utc::now();
            let meta = RunMeta::new(&config.pipeline, describe_destination(config), &config.dataset);
            let error = PipelineError::Configuration(format!("cannot build HTTP client: {e}"));
            conclude(reporter, abort(reporter, meta, started_at, error), Instant::now())
        }
    }
}

/// [`run`] over a caller-provided transport
pub fn run_with_transport(
    config: &PersonioConfig,
    reporter: &Reporter,
    progress: Option<&ProgressContext>,
    transport: Arc<dyn Transport>,
) -> RunOutput {
    let start = Instant::now();
    let started_at = Utc::now();
    let meta = RunMeta::new(&config.pipeline, describe_destination(config), &config.dataset);

    let prepared = plan(config).and_then(|resources| {
        let sink = build_sink(config)?;
        announce(config, reporter, &resources)?;
        Ok((resources, sink))
    });

    let report = match prepared {
        Ok((resources, sink)) => {
            let tokens = Arc::new(TokenManager::new(transport.clone(), token_config(config)));
            let extractor = Extractor::new(transport, tokens, &config.base_url)
                .with_retry(RetryPolicy::new(config.max_retries, RETRY_BASE_DELAY));

            let mut orchestrator = Orchestrator::new(&extractor, sink.as_ref())
                .workers(config.workers)
                .timeout(config.timeout);
            if let Some(progress) = progress {
                orchestrator = orchestrator.progress(progress);
            }
            orchestrator.run(&meta, &resources)
        }
        Err(e) => abort(reporter, meta, started_at, e),
    };

    conclude(reporter, report, start)
}

fn abort(
    reporter: &Reporter,
    meta: RunMeta,
    started_at: DateTime<Utc>,
    error: PipelineError,
) -> RunReport {
    log::error!("{error}");
    reporter.finalize(meta, started_at, Err(error))
}

fn conclude(reporter: &Reporter, report: RunReport, start: Instant) -> RunOutput {
    let delivery = reporter.handle_results(&report);
    log_summary(&report, &delivery, start.elapsed());
    RunOutput { report, delivery }
}

fn plan(config: &PersonioConfig) -> Result<Vec<ResourceSpec>, PipelineError> {
    config.validate()?;
    registry::select(registry::resources(config), &config.only)
}

/// Start-of-run notification. A missing channel aborts the run; a failed
/// delivery does not.
fn announce(
    config: &PersonioConfig,
    reporter: &Reporter,
    resources: &[ResourceSpec],
) -> Result<(), PipelineError> {
    if !config.notify_start {
        return Ok(());
    }
    let names: Vec<&str> = resources.iter().map(|r| r.name.as_str()).collect();
    if reporter.notify_start(&config.pipeline, &names)? {
        log::debug!("Start notification sent");
    } else {
        log::warn!("Start notification was not delivered");
    }
    Ok(())
}

fn log_summary(report: &RunReport, delivery: &Delivery, elapsed: Duration) {
    log::info!("=== Run Summary ===");
    log::info!(
        "Resources: {}/{} succeeded ({} failed)",
        report.outcomes.len() - report.failed_count(),
        report.outcomes.len(),
        report.failed_count()
    );
    log::info!("Records: {}", fmt_num(report.total_records()));
    if let Some(exc) = &report.exception {
        log::error!("Run aborted: {exc}");
    }
    log::info!(
        "Artifacts: {} written, notification {}",
        delivery.artifacts.len(),
        if delivery.delivered { "delivered" } else { "not delivered" }
    );
    log::info!("Time: {:.1}s", elapsed.as_secs_f64());
}
