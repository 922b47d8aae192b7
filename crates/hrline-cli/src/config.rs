//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Deserialize;

use hrline_core::{HttpConfig, PipelineError};
use hrline_personio::{Destination, PersonioConfig};
use hrline_report::{DEFAULT_TIMESTAMP_FMT, is_valid_timestamp_fmt};

/// Global configuration for hrline
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub personio: PersonioSection,
    pub http: HttpSection,
    pub notify: NotifyConfig,
    pub output: OutputConfig,
    /// File this config was read from (None = defaults)
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub name: String,
    /// `jsonl` or `memory`
    pub destination: String,
    pub dataset: String,
    pub workers: usize,
    pub timeout_secs: Option<u64>,
    pub only: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "load_personio_warehouse".to_string(),
            destination: "jsonl".to_string(),
            dataset: "personio_raw".to_string(),
            workers: 1,
            timeout_secs: None,
            only: Vec::new(),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct PersonioSection {
    pub base_url: String,
    pub token_url: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub client_id: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub client_secret: Option<String>,
    pub default_expiration: u64,
    pub safety_margin_secs: u64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl Default for PersonioSection {
    fn default() -> Self {
        let defaults = PersonioConfig::default();
        Self {
            base_url: defaults.base_url,
            token_url: defaults.token_url,
            client_id: std::env::var("PERSONIO_CLIENT_ID").ok(),
            client_secret: std::env::var("PERSONIO_CLIENT_SECRET").ok(),
            default_expiration: defaults.default_expiration.as_secs(),
            safety_margin_secs: defaults.safety_margin.as_secs(),
            start_date: defaults.start_date,
            end_date: None,
        }
    }
}

impl std::fmt::Debug for PersonioSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonioSection")
            .field("base_url", &self.base_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("start_date", &self.start_date)
            .field("end_date", &self.end_date)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for HttpSection {
    fn default() -> Self {
        let defaults = HttpConfig::default();
        Self {
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
            request_timeout_secs: defaults.request_timeout.as_secs(),
            max_retries: 2,
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    #[serde(deserialize_with = "deserialize_env_var")]
    pub slack_hook: Option<String>,
    pub notify_start: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            slack_hook: std::env::var("SLACK_HOOK").ok().filter(|s| !s.is_empty()),
            notify_start: true,
        }
    }
}

impl std::fmt::Debug for NotifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyConfig")
            .field("slack_hook", &self.slack_hook.as_ref().map(|_| "***"))
            .field("notify_start", &self.notify_start)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub timestamp_fmt: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            log_dir: PathBuf::from("./logs"),
            timestamp_fmt: DEFAULT_TIMESTAMP_FMT.to_string(),
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value; empty values count as unset
fn expand_env_var(s: &str) -> Option<String> {
    let value = if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()?
    } else {
        s.to_string()
    };
    (!value.is_empty()).then_some(value)
}

/// Run-level overrides from the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub workers: Option<usize>,
    pub only: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
    pub dry_run: bool,
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./hrline.toml (current directory)
    /// 2. ~/.config/hrline/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("hrline.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "hrline") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Settings the pipeline cannot start without a valid value for
    pub fn validate(&self) -> Result<()> {
        if !is_valid_timestamp_fmt(&self.output.timestamp_fmt) {
            bail!(
                "Invalid output.timestamp_fmt `{}` (expected a strftime format)",
                self.output.timestamp_fmt
            );
        }
        Ok(())
    }

    /// Effective pipeline configuration after command-line overrides
    pub fn personio(&self, overrides: &Overrides) -> Result<PersonioConfig, PipelineError> {
        let destination = if overrides.dry_run {
            Destination::Memory
        } else {
            self.pipeline.destination.parse::<Destination>()?
        };
        let p = &self.personio;
        Ok(PersonioConfig {
            pipeline: self.pipeline.name.clone(),
            dataset: self.pipeline.dataset.clone(),
            destination,
            data_dir: self.output.data_dir.clone(),
            workers: overrides.workers.unwrap_or(self.pipeline.workers),
            timeout: overrides
                .timeout_secs
                .or(self.pipeline.timeout_secs)
                .map(Duration::from_secs),
            only: overrides
                .only
                .clone()
                .unwrap_or_else(|| self.pipeline.only.clone()),
            base_url: p.base_url.clone(),
            token_url: p.token_url.clone(),
            client_id: p.client_id.clone().unwrap_or_default(),
            client_secret: p.client_secret.clone().unwrap_or_default(),
            default_expiration: Duration::from_secs(p.default_expiration),
            safety_margin: Duration::from_secs(p.safety_margin_secs),
            start_date: p.start_date,
            end_date: p.end_date,
            http: HttpConfig {
                connect_timeout: Duration::from_secs(self.http.connect_timeout_secs),
                request_timeout: Duration::from_secs(self.http.request_timeout_secs),
            },
            max_retries: self.http.max_retries,
            notify_start: self.notify.notify_start,
        })
    }
}
