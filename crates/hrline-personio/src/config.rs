//! Personio pipeline configuration

use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use hrline_core::{HttpConfig, PipelineError};

pub const DEFAULT_BASE_URL: &str = "https://api.personio.de/v1";
pub const DEFAULT_TOKEN_URL: &str = "https://api.personio.de/v1/auth";

/// Where extracted records go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Destination {
    /// One `{resource}.jsonl` file per resource under `{data_dir}/{dataset}`
    #[default]
    JsonLines,
    /// Keep records in memory and drop them at exit (dry runs)
    Memory,
}

impl std::str::FromStr for Destination {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jsonl" | "json_lines" => Ok(Self::JsonLines),
            "memory" => Ok(Self::Memory),
            other => Err(PipelineError::Configuration(format!(
                "unknown destination `{other}` (expected jsonl or memory)"
            ))),
        }
    }
}

/// Runtime configuration for the Personio pipeline
#[derive(Clone)]
pub struct PersonioConfig {
    pub pipeline: String,
    pub dataset: String,
    pub destination: Destination,
    /// Root directory of the JSON-lines destination
    pub data_dir: PathBuf,
    /// Resources extracted in parallel
    pub workers: usize,
    /// Resources not started within this long are marked failed
    pub timeout: Option<Duration>,
    /// Restrict the run to these resources (empty = all)
    pub only: Vec<String>,
    pub base_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub default_expiration: Duration,
    pub safety_margin: Duration,
    /// Attendance date range; `end_date` None means today
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub http: HttpConfig,
    /// Retries of transient page failures
    pub max_retries: u32,
    /// Send a start-of-run notification when a channel is configured
    pub notify_start: bool,
}

impl Default for PersonioConfig {
    fn default() -> Self {
        Self {
            pipeline: "load_personio_warehouse".to_string(),
            dataset: "personio_raw".to_string(),
            destination: Destination::default(),
            data_dir: PathBuf::from("./data"),
            workers: 1,
            timeout: None,
            only: Vec::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            default_expiration: Duration::from_secs(86_400),
            safety_margin: Duration::from_secs(60),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            end_date: None,
            http: HttpConfig::default(),
            max_retries: 2,
            notify_start: true,
        }
    }
}

impl std::fmt::Debug for PersonioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonioConfig")
            .field("pipeline", &self.pipeline)
            .field("dataset", &self.dataset)
            .field("destination", &self.destination)
            .field("data_dir", &self.data_dir)
            .field("workers", &self.workers)
            .field("only", &self.only)
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish_non_exhaustive()
    }
}

impl PersonioConfig {
    /// Attendance range end, resolved against the local date
    pub fn end_date(&self) -> NaiveDate {
        self.end_date
            .unwrap_or_else(|| Local::now().date_naive())
    }

    /// Checked before any network activity
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(PipelineError::Configuration(
                "Personio client_id and client_secret are required \
                 (set PERSONIO_CLIENT_ID / PERSONIO_CLIENT_SECRET)"
                    .into(),
            ));
        }
        if self.workers == 0 {
            return Err(PipelineError::Configuration("workers must be >= 1".into()));
        }
        let end = self.end_date();
        if self.start_date > end {
            return Err(PipelineError::Configuration(format!(
                "start_date {} is after end_date {end}",
                self.start_date
            )));
        }
        Ok(())
    }
}
