//! hrline Personio - Personio HR API extraction
//!
//! Declares the Personio resources and wires the token manager, pagination
//! engine, sink and reporter into one run.
//!
//! # Example
//!
//! ```no_run
//! use hrline_personio::{PersonioConfig, run};
//! use hrline_report::{Reporter, ReporterConfig};
//!
//! let config = PersonioConfig {
//!     client_id: "id".into(),
//!     client_secret: "secret".into(),
//!     ..Default::default()
//! };
//! let reporter = Reporter::new(ReporterConfig::new("logs"));
//!
//! let output = run(&config, &reporter, None);
//! println!("{} records", output.report.total_records());
//! ```

pub mod config;
pub mod registry;
pub mod runner;

// Re-exports for convenience
pub use config::{Destination, PersonioConfig};
pub use registry::{resources, select};
pub use runner::{RunOutput, run, run_with_transport};
