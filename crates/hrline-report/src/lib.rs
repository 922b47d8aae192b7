//! Run reporting: notification text, durable run artifacts, webhook delivery

pub mod notify;
pub mod render;
pub mod reporter;

pub use notify::{Notifier, SlackWebhook};
pub use render::{render_report, render_start};
pub use reporter::{
    Artifact, ArtifactKind, DEFAULT_TIMESTAMP_FMT, Delivery, Reporter, ReporterConfig,
    is_valid_timestamp_fmt,
};
