//! Error types for Propcast
//!
//! Two layers:
//! - [`PlatformError`] is what adapters produce while driving a network's
//!   publishing protocol. It never leaves the orchestrator.
//! - [`PublishError`] is the uniform taxonomy callers see. Every adapter error
//!   is turned into one through [`PublishError::classify`].

use thiserror::Error;

use crate::types::Platform;

pub type Result<T> = std::result::Result<T, PropcastError>;

/// Result type used inside adapters
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

#[derive(Error, Debug)]
pub enum PropcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PropcastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PropcastError::InvalidInput(_) => 3,
            PropcastError::Publish(e) => e.exit_code(),
            PropcastError::Config(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Failure inside one network's publishing protocol
///
/// `step` names the protocol step that failed ("create container",
/// "initialize upload", ...) so that messages stay useful after
/// classification.
#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("{step} rejected (HTTP {status}): {message}")]
    Api {
        step: &'static str,
        status: u16,
        /// Platform-specific error code from the response body, if any
        code: Option<i64>,
        message: String,
    },

    #[error("{step} request failed: {message}")]
    Network { step: &'static str, message: String },

    #[error("unexpected {step} response: {message}")]
    Response { step: &'static str, message: String },

    #[error("container {container_id} not ready after {attempts} status checks")]
    NotReady { container_id: String, attempts: u32 },

    #[error("container {container_id} reported status {status}")]
    ContainerFailed { container_id: String, status: String },

    #[error("{0} is not supported")]
    Unsupported(String),
}

impl PlatformError {
    /// Build a network error from a reqwest failure
    ///
    /// The request URL is stripped: Graph calls carry the access token in
    /// the query string.
    pub(crate) fn network(step: &'static str, error: reqwest::Error) -> Self {
        PlatformError::Network {
            step,
            message: error.without_url().to_string(),
        }
    }

    pub(crate) fn response(step: &'static str, message: impl Into<String>) -> Self {
        PlatformError::Response {
            step,
            message: message.into(),
        }
    }
}

/// Coarse error kind, mirrored in events and CLI output
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Auth,
    PlatformApi,
    Timeout,
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Auth => "auth",
            ErrorKind::PlatformApi => "platform_api",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Uniform publish failure returned by the orchestrator
#[derive(Error, Debug, Clone)]
pub enum PublishError {
    /// Request violates a static invariant; no network call was made
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Credentials rejected or expired; the caller should reconnect the account
    #[error("{platform} rejected the credentials: {message}")]
    Auth { platform: Platform, message: String },

    /// Non-success response (or no usable response) at a protocol step
    #[error("{platform} API error{}: {message}", status_suffix(.status))]
    PlatformApi {
        platform: Platform,
        status: Option<u16>,
        message: String,
    },

    /// Remote media never became ready within the polling budget
    #[error("{platform} timed out: {message}")]
    Timeout { platform: Platform, message: String },

    /// The caller cancelled the publish
    #[error("publish to {platform} was cancelled")]
    Cancelled { platform: Platform },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

/// Graph API codes meaning the token is invalid or expired
const GRAPH_AUTH_CODES: &[i64] = &[102, 190];

/// Fetching the source image from its public host
pub(crate) const STEP_FETCH_IMAGE: &str = "fetch image";
/// Uploading bytes to a pre-signed upload URL
pub(crate) const STEP_UPLOAD_IMAGE: &str = "upload image";

/// Steps sent without the platform credentials; a 401/403 there says
/// nothing about the caller's token
const UNCREDENTIALED_STEPS: &[&str] = &[STEP_FETCH_IMAGE, STEP_UPLOAD_IMAGE];

impl PublishError {
    /// Classify an adapter error into the uniform taxonomy
    pub fn classify(platform: Platform, error: PlatformError) -> Self {
        match error {
            PlatformError::Api {
                status, code, message, step,
            } => {
                let credentialed = !UNCREDENTIALED_STEPS.contains(&step);
                let is_auth = credentialed
                    && (status == 401
                        || status == 403
                        || code.is_some_and(|c| GRAPH_AUTH_CODES.contains(&c)));
                if is_auth {
                    PublishError::Auth {
                        platform,
                        message: format!("{} failed: {}", step, message),
                    }
                } else {
                    PublishError::PlatformApi {
                        platform,
                        status: Some(status),
                        message: format!("{} failed: {}", step, message),
                    }
                }
            }
            PlatformError::NotReady { .. } => PublishError::Timeout {
                platform,
                message: error.to_string(),
            },
            PlatformError::Unsupported(_) => PublishError::Validation(error.to_string()),
            PlatformError::Network { .. }
            | PlatformError::Response { .. }
            | PlatformError::ContainerFailed { .. } => PublishError::PlatformApi {
                platform,
                status: None,
                message: error.to_string(),
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PublishError::Validation(_) => ErrorKind::Validation,
            PublishError::Auth { .. } => ErrorKind::Auth,
            PublishError::PlatformApi { .. } => ErrorKind::PlatformApi,
            PublishError::Timeout { .. } => ErrorKind::Timeout,
            PublishError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Whether retrying the same request later is reasonable
    ///
    /// Only a hint for the caller; the orchestrator never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            PublishError::Timeout { .. } => true,
            PublishError::PlatformApi { status: None, .. } => true,
            PublishError::PlatformApi {
                status: Some(status),
                ..
            } => *status == 429 || *status >= 500,
            PublishError::Validation(_)
            | PublishError::Auth { .. }
            | PublishError::Cancelled { .. } => false,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            PublishError::Validation(_) => 3,
            PublishError::Auth { .. } => 2,
            PublishError::Timeout { .. } => 4,
            PublishError::Cancelled { .. } => 130,
            PublishError::PlatformApi { .. } => 1,
        }
    }
}
