//! Error taxonomy shared by every pipeline stage

/// Maximum number of response-body bytes kept in an [`PipelineError::Extraction`].
const BODY_SNIPPET_LEN: usize = 512;

/// Error raised while authenticating, extracting or loading a resource.
///
/// Run-scoped variants ([`Configuration`](Self::Configuration) and
/// [`Auth`](Self::Auth) before the first token) abort the run; the rest are
/// scoped to one resource and end up in that resource's `JobOutcome`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Required configuration missing or invalid
    Configuration(String),
    /// Token endpoint unreachable, rejected the credentials, or returned no usable token
    Auth(String),
    /// Non-2xx (or failed) HTTP request while fetching a resource page
    Extraction {
        resource: String,
        status: Option<u16>,
        body: String,
    },
    /// Malformed pagination metadata in a response
    Pagination { resource: String, message: String },
    /// Destination write failure
    Sink { resource: String, message: String },
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.resource() {
            Some(resource) => write!(f, "{resource}: {}", self.detail()),
            None => f.write_str(&self.detail()),
        }
    }
}

impl std::error::Error for PipelineError {}

impl PipelineError {
    /// Build an extraction error, truncating large bodies
    pub fn extraction(resource: &str, status: Option<u16>, body: &str) -> Self {
        let body = if body.len() > BODY_SNIPPET_LEN {
            let mut end = BODY_SNIPPET_LEN;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &body[..end])
        } else {
            body.to_string()
        };
        Self::Extraction {
            resource: resource.to_string(),
            status,
            body,
        }
    }

    pub fn pagination(resource: &str, message: impl Into<String>) -> Self {
        Self::Pagination {
            resource: resource.to_string(),
            message: message.into(),
        }
    }

    pub fn sink(resource: &str, message: impl Into<String>) -> Self {
        Self::Sink {
            resource: resource.to_string(),
            message: message.into(),
        }
    }

    /// Resource the error is scoped to, if any
    pub fn resource(&self) -> Option<&str> {
        match self {
            Self::Configuration(_) | Self::Auth(_) => None,
            Self::Extraction { resource, .. }
            | Self::Pagination { resource, .. }
            | Self::Sink { resource, .. } => Some(resource),
        }
    }

    /// Message without the resource prefix (the `JobOutcome` already names it)
    pub fn detail(&self) -> String {
        match self {
            Self::Configuration(msg) => format!("configuration error: {msg}"),
            Self::Auth(msg) => format!("authentication failed: {msg}"),
            Self::Extraction {
                status: Some(s),
                body,
                ..
            } => format!("HTTP {s}: {body}"),
            Self::Extraction {
                status: None, body, ..
            } => format!("HTTP error: {body}"),
            Self::Pagination { message, .. } => format!("pagination error: {message}"),
            Self::Sink { message, .. } => format!("sink error: {message}"),
        }
    }

    /// Taxonomy name, used as the exception type in run artifacts
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "ConfigurationError",
            Self::Auth(_) => "AuthError",
            Self::Extraction { .. } => "ExtractionError",
            Self::Pagination { .. } => "PaginationError",
            Self::Sink { .. } => "SinkError",
        }
    }

    /// Errors that cannot be contained to a single resource
    pub fn is_run_scoped(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Auth(_))
    }

    /// Rate limits, server errors and failures without a status
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Extraction { status, .. } => {
                matches!(status, None | Some(429) | Some(500..=599))
            }
            _ => false,
        }
    }

    /// 401 from the API: the cached token was rejected
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Extraction {
                status: Some(401),
                ..
            }
        )
    }
}
