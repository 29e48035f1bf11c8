// Error types for the diagnosis pipeline
//
// Using thiserror for:
// - Type-safe matching at the presenter boundary
// - Readable Display messages that end up in user-facing notices
// - Source error chaining where an underlying error exists

use thiserror::Error;

/// Rejections raised while ingesting a user-selected image
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please upload an image file (JPEG, PNG). Got type '{mime_type}'")]
    UnsupportedType { mime_type: String },

    #[error("File is too large ({size_bytes} bytes). Please upload an image under 10 MB.")]
    TooLarge { size_bytes: usize, limit: usize },
}

/// A single attempt failed before any HTTP status was received
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct NetworkError {
    pub kind: NetworkErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    Timeout,
    Connect,
    Body,
    Other,
}

impl std::fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            NetworkErrorKind::Timeout => "timeout",
            NetworkErrorKind::Connect => "connection failed",
            NetworkErrorKind::Body => "body read failed",
            NetworkErrorKind::Other => "request failed",
        };
        f.write_str(label)
    }
}

impl NetworkError {
    pub fn new(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            NetworkErrorKind::Timeout
        } else if e.is_connect() {
            NetworkErrorKind::Connect
        } else if e.is_body() || e.is_decode() {
            NetworkErrorKind::Body
        } else {
            NetworkErrorKind::Other
        };
        // Strip the URL so the API key in the query string never reaches logs
        Self::new(kind, e.without_url().to_string())
    }
}

/// Terminal outcomes of the retrying transport
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Non-retryable HTTP status (caller error such as a bad request or key)
    #[error("API request failed: {message}")]
    Rejected { status: u16, message: String },

    #[error("No response after {attempts} attempts (last error: {last_error})")]
    Exhausted { attempts: u32, last_error: String },
}

/// Reasons a reply could not be turned into a diagnosis
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InterpretationError {
    #[error("Received an empty response from the AI.")]
    EmptyResponse,

    #[error("Received an unexpected response from the AI: {0}")]
    UnreadableResponse(String),

    #[error("Could not find a valid JSON object in the AI response.")]
    NoJsonFound,

    #[error("Failed to parse AI response: {reason}")]
    MalformedJson { raw_text: String, reason: String },
}

/// Why a pipeline run ended in `PipelineOutcome::Failure`
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FailureReason {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Interpretation(#[from] InterpretationError),

    #[error("Failed to read the file: {0}")]
    ReadFailed(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No API key configured (set GEMINI_API_KEY environment variable)")]
    MissingApiKey,

    #[error("Invalid API config: {0}")]
    InvalidApiConfig(String),

    #[error("max_retries must be >= 1, got {0}")]
    InvalidMaxRetries(u32),

    #[error("Invalid server config: {0}")]
    InvalidServerConfig(String),
}

/// Form-level errors raised by session commands
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Please upload an image first.")]
    NoImage,

    #[error("An analysis is already running. Please wait for it to finish.")]
    Busy,

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

// Convenience type aliases for Results
pub type ValidationResult<T> = Result<T, ValidationError>;
pub type TransportResult<T> = Result<T, TransportError>;
pub type InterpretationResult<T> = Result<T, InterpretationError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
