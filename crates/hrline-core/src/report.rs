//! Run report data model: per-resource outcomes plus run metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Success,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("Success"),
            Self::Failed => f.write_str("Failed"),
        }
    }
}

/// Terminal status of one resource within a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub resource: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Records written to the sink (for failures: written before the failure)
    pub records: usize,
}

impl JobOutcome {
    pub fn success(resource: impl Into<String>, records: usize) -> Self {
        Self {
            resource: resource.into(),
            status: JobStatus::Success,
            detail: None,
            records,
        }
    }

    pub fn failed(resource: impl Into<String>, detail: impl Into<String>, records: usize) -> Self {
        Self {
            resource: resource.into(),
            status: JobStatus::Failed,
            detail: Some(detail.into()),
            records,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }
}

/// Run-scoped error captured in a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    /// Taxonomy name, e.g. `AuthError`
    pub kind: String,
    pub message: String,
}

impl From<&PipelineError> for ExceptionInfo {
    fn from(e: &PipelineError) -> Self {
        Self {
            kind: e.kind().to_string(),
            message: e.to_string(),
        }
    }
}

impl std::fmt::Display for ExceptionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// What is being loaded where
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMeta {
    pub pipeline: String,
    pub destination: String,
    pub dataset: String,
}

impl RunMeta {
    pub fn new(
        pipeline: impl Into<String>,
        destination: impl Into<String>,
        dataset: impl Into<String>,
    ) -> Self {
        Self {
            pipeline: pipeline.into(),
            destination: destination.into(),
            dataset: dataset.into(),
        }
    }
}

/// Outcome of one pipeline run. Built once, then only read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub meta: RunMeta,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One entry per resource, in registry order
    pub outcomes: Vec<JobOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
}

impl RunReport {
    /// Report for a run that ended before any resource was attempted
    pub fn aborted(
        meta: RunMeta,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        error: &PipelineError,
    ) -> Self {
        Self {
            meta,
            started_at,
            finished_at,
            outcomes: Vec::new(),
            exception: Some(error.into()),
        }
    }

    /// No top-level exception and every resource succeeded
    pub fn succeeded(&self) -> bool {
        self.exception.is_none() && self.outcomes.iter().all(JobOutcome::is_success)
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    pub fn total_records(&self) -> usize {
        self.outcomes.iter().map(|o| o.records).sum()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
