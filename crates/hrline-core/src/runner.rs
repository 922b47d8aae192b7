//! Extraction orchestrator: resources → pages → sink, one outcome per resource

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use indicatif::ProgressBar;
use rayon::prelude::*;

use crate::error::PipelineError;
use crate::paginate::Extractor;
use crate::progress::ProgressContext;
use crate::report::{JobOutcome, RunMeta, RunReport};
use crate::resource::{ResourceSpec, WritePolicy};
use crate::shutdown::shutdown_flag;
use crate::sink::Sink;

/// Runs every resource of a registry through the extractor into a sink.
///
/// A failing resource is recorded and the run moves on; only a failure to
/// obtain the very first token aborts the run.
pub struct Orchestrator<'a> {
    extractor: &'a Extractor,
    sink: &'a dyn Sink,
    workers: usize,
    timeout: Option<Duration>,
    cancel: &'a AtomicBool,
    progress: Option<&'a ProgressContext>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(extractor: &'a Extractor, sink: &'a dyn Sink) -> Self {
        Self {
            extractor,
            sink,
            workers: 1,
            timeout: None,
            cancel: shutdown_flag(),
            progress: None,
        }
    }

    /// Resources extracted in parallel (1 = sequential)
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Resources not started within `timeout` of the run start are marked failed
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Flag checked before each resource (defaults to the process shutdown flag)
    pub fn cancel_flag(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn progress(mut self, progress: &'a ProgressContext) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn run(&self, meta: &RunMeta, resources: &[ResourceSpec]) -> RunReport {
        let started_at = Utc::now();
        let start = Instant::now();

        if let Err(e) = self.extractor.tokens().get_token() {
            log::error!("Cannot obtain an access token, aborting run: {e}");
            return RunReport::aborted(meta.clone(), started_at, Utc::now(), &e);
        }

        log::info!(
            "{}: extracting {} resources ({} worker{})",
            meta.pipeline,
            resources.len(),
            self.workers,
            if self.workers == 1 { "" } else { "s" }
        );

        let deadline = self.timeout.map(|t| start + t);
        let outcomes = if self.workers > 1 && resources.len() > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.workers)
                .build()
            {
                Ok(pool) => pool.install(|| {
                    resources
                        .par_iter()
                        .map(|r| self.run_resource(r, deadline))
                        .collect::<Vec<_>>()
                }),
                Err(e) => {
                    log::warn!("Cannot create worker pool ({e}), running sequentially");
                    self.run_sequential(resources, deadline)
                }
            }
        } else {
            self.run_sequential(resources, deadline)
        };

        let report = RunReport {
            meta: meta.clone(),
            started_at,
            finished_at: Utc::now(),
            outcomes,
            exception: None,
        };
        log::info!(
            "{}: {}/{} resources succeeded, {} records in {:.1}s",
            meta.pipeline,
            report.outcomes.len() - report.failed_count(),
            report.outcomes.len(),
            report.total_records(),
            start.elapsed().as_secs_f64()
        );
        report
    }

    fn run_sequential(&self, resources: &[ResourceSpec], deadline: Option<Instant>) -> Vec<JobOutcome> {
        resources
            .iter()
            .map(|r| self.run_resource(r, deadline))
            .collect()
    }

    fn run_resource(&self, resource: &ResourceSpec, deadline: Option<Instant>) -> JobOutcome {
        let name = &resource.name;
        if self.cancel.load(Ordering::Relaxed) {
            log::warn!("{name}: skipped, shutdown requested");
            return JobOutcome::failed(name, "interrupted", 0);
        }
        if let (Some(deadline), Some(timeout)) = (deadline, self.timeout) {
            if Instant::now() >= deadline {
                log::warn!("{name}: skipped, run timeout reached");
                return JobOutcome::failed(
                    name,
                    format!("run timed out after {}s", timeout.as_secs()),
                    0,
                );
            }
        }

        let pb = self
            .progress
            .map_or_else(ProgressBar::hidden, |p| p.resource_line(name));
        log::info!("{name}: extracting ({})", resource.paginator.label());

        match self.load(resource, &pb) {
            Ok(count) => {
                pb.finish_with_message("done");
                log::info!("{name}: {count} records loaded");
                JobOutcome::success(name, count)
            }
            Err((e, count)) => {
                pb.abandon_with_message("failed");
                log::error!("{e}");
                JobOutcome::failed(name, e.detail(), count)
            }
        }
    }

    /// Stream pages into the sink. On failure, also returns the records
    /// already written.
    fn load(&self, resource: &ResourceSpec, pb: &ProgressBar) -> Result<usize, (PipelineError, usize)> {
        let mut policy = resource.write_policy;
        let mut written = 0usize;
        let mut wrote_any = false;

        for page in self.extractor.fetch(resource) {
            let records = page.map_err(|e| (e, written))?;
            if records.is_empty() && wrote_any {
                continue;
            }
            let n = self
                .sink
                .write(&resource.name, policy, &records)
                .map_err(|e| (e, written))?;
            written += n;
            wrote_any = true;
            policy = WritePolicy::Append;
            pb.inc(n as u64);
        }

        // Truncate the target even when the resource came back empty
        if !wrote_any && resource.write_policy == WritePolicy::Replace {
            self.sink
                .write(&resource.name, WritePolicy::Replace, &[])
                .map_err(|e| (e, written))?;
        }
        Ok(written)
    }
}
