//! Notification channels

use std::sync::Arc;

use hrline_core::Transport;

/// Delivers a rendered message somewhere a human will see it.
///
/// Delivery failures are reported as `false`, never as errors: a lost
/// notification must not fail a run whose data already landed.
pub trait Notifier: Send + Sync {
    fn send(&self, text: &str) -> bool;
}

/// Slack incoming webhook: POSTs `{"text": ...}` to the hook URL
pub struct SlackWebhook {
    url: String,
    transport: Arc<dyn Transport>,
}

impl SlackWebhook {
    pub fn new(url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            url: url.into(),
            transport,
        }
    }
}

impl std::fmt::Debug for SlackWebhook {
    // The hook URL is a credential
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackWebhook").field("url", &"***").finish()
    }
}

impl Notifier for SlackWebhook {
    fn send(&self, text: &str) -> bool {
        let payload = serde_json::json!({ "text": text });
        match self.transport.post_json(&self.url, &payload) {
            Ok(resp) if resp.is_success() => true,
            Ok(resp) => {
                log::warn!("Slack notification rejected: HTTP {}", resp.status);
                false
            }
            Err(e) => {
                log::warn!("Slack notification failed: {e}");
                false
            }
        }
    }
}
