//! Logging utilities with indicatif integration and a per-run log file

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use indicatif::MultiProgress;

/// ANSI color code and padded label for a log level.
fn level_style(level: log::Level, color: bool) -> (&'static str, &'static str, &'static str) {
    let label = match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    };
    if !color {
        return ("", label, "");
    }
    let ansi = match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    };
    (ansi, label, "\x1b[0m")
}

fn file_line(record: &log::Record) -> String {
    let (_, label, _) = level_style(record.level(), false);
    format!(
        "{} [{label}] {}\n",
        chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
        record.args()
    )
}

/// Logger that prints through indicatif MultiProgress to avoid mixing with
/// progress bars, and mirrors every line into the run log file.
pub struct IndicatifLogger {
    inner: env_logger::Logger,
    multi: MultiProgress,
    file: Option<Mutex<File>>,
}

impl IndicatifLogger {
    pub fn new(inner: env_logger::Logger, multi: MultiProgress, file: Option<File>) -> Self {
        Self {
            inner,
            multi,
            file: file.map(Mutex::new),
        }
    }
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if self.inner.enabled(record.metadata()) {
            let (pre, label, post) = level_style(record.level(), true);
            let line = format!("[{pre}{label}{post}] {}", record.args());
            self.multi.suspend(|| eprintln!("{line}"));
            if let Some(file) = &self.file {
                if let Ok(mut f) = file.lock() {
                    let _ = f.write_all(file_line(record).as_bytes());
                }
            }
        }
    }

    fn flush(&self) {
        self.inner.flush();
        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                let _ = f.flush();
            }
        }
    }
}

/// Non-TTY target: every formatted line goes to stderr and the run log
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Initialize logging.
///
/// `multi` enables TTY mode (indicatif integration). `log_file`, when given,
/// receives a timestamped copy of every log line for the run. Fails if the
/// log file cannot be created or a logger is already installed.
pub fn init_logging(
    quiet: bool,
    debug: bool,
    multi: Option<&MultiProgress>,
    log_file: Option<&Path>,
) -> io::Result<()> {
    let default_level = if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let env = env_logger::Env::default().default_filter_or(default_level);

    let file = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Some(File::create(path)?)
        }
        None => None,
    };

    if let Some(multi) = multi {
        let logger = env_logger::Builder::from_env(env)
            .format_timestamp_millis()
            .build();
        let max_level = logger.filter();

        log::set_boxed_logger(Box::new(IndicatifLogger::new(logger, multi.clone(), file)))
            .map_err(io::Error::other)?;
        log::set_max_level(max_level);
    } else {
        // Non-TTY: no ANSI colors; timestamps only go to the run log
        let mut builder = env_logger::Builder::from_env(env);
        match file {
            Some(file) => {
                builder
                    .format(|buf, record| {
                        let line = file_line(record);
                        buf.write_all(line.as_bytes())
                    })
                    .target(env_logger::Target::Pipe(Box::new(TeeWriter { file })));
            }
            None => {
                builder.format(|buf, record| {
                    let (_, label, _) = level_style(record.level(), false);
                    writeln!(buf, "[{label}] {}", record.args())
                });
            }
        }
        builder.try_init().map_err(io::Error::other)?;
    }
    Ok(())
}
