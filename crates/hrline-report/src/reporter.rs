//! Reporter: turns a finished run into notifications and on-disk artifacts

use std::fs;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};
use hrline_core::{PipelineError, RunMeta, RunReport};

use crate::notify::Notifier;
use crate::render::{render_report, render_start};

pub const DEFAULT_TIMESTAMP_FMT: &str = "%Y-%m-%d_%H-%M-%S";

/// Formatting with an invalid strftime string panics, so configs are
/// checked up front.
pub fn is_valid_timestamp_fmt(fmt: &str) -> bool {
    !fmt.is_empty() && !StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error))
}

pub struct ReporterConfig {
    pub log_dir: PathBuf,
    /// strftime format of the `T` in artifact names
    pub timestamp_fmt: String,
    /// None disables notifications; artifacts are still written
    pub channel: Option<Box<dyn Notifier>>,
}

impl ReporterConfig {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            timestamp_fmt: DEFAULT_TIMESTAMP_FMT.to_string(),
            channel: None,
        }
    }

    pub fn with_channel(mut self, channel: Box<dyn Notifier>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_timestamp_fmt(mut self, fmt: impl Into<String>) -> Self {
        self.timestamp_fmt = fmt.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// `log_T.json`: the full report
    Log,
    /// `summary_T.txt`: the rendered message
    Summary,
    /// `error_T.log`: only for runs with an exception
    Error,
}

/// One file to be written for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub contents: String,
}

/// Result of [`Reporter::handle_results`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: bool,
    pub artifacts: Vec<PathBuf>,
}

pub struct Reporter {
    config: ReporterConfig,
    created_at: DateTime<Local>,
}

impl Reporter {
    /// Captures the run timestamp used in every artifact name
    pub fn new(config: ReporterConfig) -> Self {
        Self {
            config,
            created_at: Local::now(),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.config.log_dir
    }

    /// Formatted run timestamp (`T`)
    pub fn stamp(&self) -> String {
        self.created_at.format(&self.config.timestamp_fmt).to_string()
    }

    fn file_name(&self, prefix: &str, ext: &str) -> PathBuf {
        self.config
            .log_dir
            .join(format!("{prefix}_{}.{ext}", self.stamp()))
    }

    /// `run_T.log`, where the process log of this run is mirrored
    pub fn run_log_path(&self) -> PathBuf {
        self.file_name("run", "log")
    }

    pub fn has_channel(&self) -> bool {
        self.config.channel.is_some()
    }

    /// Announce the run. Asking for a start notification without a channel
    /// is a configuration mistake.
    pub fn notify_start(&self, pipeline: &str, resources: &[&str]) -> Result<bool, PipelineError> {
        let Some(channel) = &self.config.channel else {
            return Err(PipelineError::Configuration(
                "start notification requested but no notification channel is configured".into(),
            ));
        };
        Ok(channel.send(&render_start(pipeline, resources, &self.stamp())))
    }

    /// Report as-is, or an aborted report carrying the run-scoped error
    pub fn finalize(
        &self,
        meta: RunMeta,
        started_at: DateTime<Utc>,
        result: Result<RunReport, PipelineError>,
    ) -> RunReport {
        match result {
            Ok(report) => report,
            Err(e) => RunReport::aborted(meta, started_at, Utc::now(), &e),
        }
    }

    pub fn render(&self, report: &RunReport) -> String {
        render_report(report)
    }

    pub fn notify(&self, report: &RunReport) -> bool {
        match &self.config.channel {
            Some(channel) => channel.send(&self.render(report)),
            None => {
                log::warn!("No notification channel configured, skipping run notification");
                false
            }
        }
    }

    pub fn artifacts(&self, report: &RunReport) -> Vec<Artifact> {
        let json = report.to_json_pretty().unwrap_or_else(|e| {
            log::error!("Cannot serialize run report: {e}");
            String::from("{}")
        });
        let mut artifacts = vec![
            Artifact {
                kind: ArtifactKind::Log,
                path: self.file_name("log", "json"),
                contents: json,
            },
            Artifact {
                kind: ArtifactKind::Summary,
                path: self.file_name("summary", "txt"),
                contents: self.render(report),
            },
        ];
        if let Some(exc) = &report.exception {
            artifacts.push(Artifact {
                kind: ArtifactKind::Error,
                path: self.file_name("error", "log"),
                contents: exc.to_string(),
            });
        }
        artifacts
    }

    /// Write every artifact into the log directory
    pub fn persist(&self, report: &RunReport) -> std::io::Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.config.log_dir)?;
        let mut written = Vec::new();
        for artifact in self.artifacts(report) {
            fs::write(&artifact.path, artifact.contents)?;
            log::debug!("Wrote {}", artifact.path.display());
            written.push(artifact.path);
        }
        Ok(written)
    }

    /// Persist first, then notify. A persistence failure is logged and does
    /// not prevent the notification.
    pub fn handle_results(&self, report: &RunReport) -> Delivery {
        let artifacts = match self.persist(report) {
            Ok(paths) => paths,
            Err(e) => {
                log::error!(
                    "Cannot write run artifacts to {}: {e}",
                    self.config.log_dir.display()
                );
                Vec::new()
            }
        };
        let delivered = self.notify(report);
        Delivery {
            delivered,
            artifacts,
        }
    }
}
