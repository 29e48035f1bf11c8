pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{
    ConfigError, FailureReason, InterpretationError, NetworkError, NetworkErrorKind,
    SessionError, TransportError, ValidationError,
};
pub use types::{
    AnalysisRequest, DiagnosisResult, IncomingFile, OutcomeKind, PipelineOutcome, RawResponse,
    SourceImage, TokenUsage, DEFAULT_MEDICINES, MAX_IMAGE_BYTES, NO_CROP_SENTINEL,
};
