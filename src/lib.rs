// Library exports for the crop diagnosis pipeline
//
// ImageIngestor -> RequestBuilder -> RetryingTransport -> ResponseInterpreter -> ResultPresenter

// Core modules
pub mod core;
pub mod orchestration;
pub mod server;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use core::{
    config::Config,
    errors::{
        ConfigError, FailureReason, InterpretationError, NetworkError, SessionError,
        TransportError, ValidationError,
    },
    types::{DiagnosisResult, IncomingFile, OutcomeKind, PipelineOutcome, SourceImage},
};

pub use orchestration::{DiagnosisPipeline, DiagnosisSession};

pub use services::{
    ImageIngestor, RenderedView, RequestBuilder, ResponseInterpreter, ResultPresenter,
    RetryingTransport,
};

pub use utils::Metrics;
