//! Destination sinks: JSON-lines directory writer and in-memory collector

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::PipelineError;
use crate::resource::{Record, WritePolicy};

/// Destination accepting record batches per resource.
///
/// `write` is called once per page. The first call for a resource carries the
/// resource's own policy (`Replace` truncates the target); later calls in the
/// same run carry `Append`.
pub trait Sink: Send + Sync {
    /// Human-readable destination descriptor for reports
    fn describe(&self) -> String;

    /// Write one batch, returning the number of records written
    fn write(
        &self,
        resource: &str,
        policy: WritePolicy,
        records: &[Record],
    ) -> Result<usize, PipelineError>;
}

/// Writes each resource to `{dir}/{resource}.jsonl`, one JSON document per line
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    dir: PathBuf,
}

impl JsonLinesSink {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn table_path(&self, resource: &str) -> PathBuf {
        self.dir.join(format!("{resource}.jsonl"))
    }

    fn open(&self, resource: &str, policy: WritePolicy) -> std::io::Result<File> {
        let path = self.table_path(resource);
        match policy {
            WritePolicy::Replace => File::create(&path),
            WritePolicy::Append => OpenOptions::new().create(true).append(true).open(&path),
        }
    }
}

/// Table names become file names; keep them to a safe alphabet
fn is_safe_table_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl Sink for JsonLinesSink {
    fn describe(&self) -> String {
        format!("jsonl:{}", self.dir.display())
    }

    fn write(
        &self,
        resource: &str,
        policy: WritePolicy,
        records: &[Record],
    ) -> Result<usize, PipelineError> {
        if !is_safe_table_name(resource) {
            return Err(PipelineError::sink(resource, "invalid table name"));
        }
        let io_err = |e: std::io::Error| PipelineError::sink(resource, e.to_string());

        let file = self.open(resource, policy).map_err(io_err)?;
        let mut out = BufWriter::new(file);
        for record in records {
            serde_json::to_writer(&mut out, record)
                .map_err(|e| PipelineError::sink(resource, e.to_string()))?;
            out.write_all(b"\n").map_err(io_err)?;
        }
        out.flush().map_err(io_err)?;
        Ok(records.len())
    }
}

/// Count lines of a JSON-lines table (0 if absent)
pub fn count_lines(path: &Path) -> std::io::Result<usize> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content.lines().filter(|l| !l.is_empty()).count()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e),
    }
}

/// Keeps everything in memory; used for dry runs and tests
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: Mutex<BTreeMap<String, Vec<Record>>>,
    writes: Mutex<Vec<(String, WritePolicy, usize)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records currently held for a table
    pub fn records(&self, resource: &str) -> Vec<Record> {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(resource)
            .cloned()
            .unwrap_or_default()
    }

    /// Every `write` call in order: (resource, policy, batch size)
    pub fn writes(&self) -> Vec<(String, WritePolicy, usize)> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Sink for MemorySink {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn write(
        &self,
        resource: &str,
        policy: WritePolicy,
        records: &[Record],
    ) -> Result<usize, PipelineError> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let table = tables.entry(resource.to_string()).or_default();
        if policy == WritePolicy::Replace {
            table.clear();
        }
        table.extend_from_slice(records);
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((resource.to_string(), policy, records.len()));
        Ok(records.len())
    }
}
