//! hrline core - building blocks for paginated REST extraction
//!
//! Token management, pagination strategies, sinks and the run orchestrator.
//! Source-specific crates only supply a resource registry and configuration.

pub mod auth;
pub mod error;
pub mod http;
pub mod json_path;
pub mod logging;
pub mod paginate;
pub mod progress;
pub mod report;
pub mod resource;
pub mod retry;
pub mod runner;
pub mod shutdown;
pub mod sink;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use auth::{TokenConfig, TokenManager, TokenStatus};
pub use error::PipelineError;
pub use http::{HttpConfig, HttpResponse, ReqwestTransport, SHARED_RUNTIME, Transport, TransportError};
pub use logging::{IndicatifLogger, init_logging};
pub use paginate::{Cursor, Extractor, PaginationStrategy, Pages};
pub use progress::{ProgressContext, fmt_num};
pub use report::{ExceptionInfo, JobOutcome, JobStatus, RunMeta, RunReport};
pub use resource::{Record, ResourceSpec, WritePolicy};
pub use retry::RetryPolicy;
pub use runner::Orchestrator;
pub use shutdown::{install_signal_handlers, shutdown_flag};
pub use sink::{JsonLinesSink, MemorySink, Sink, count_lines};
