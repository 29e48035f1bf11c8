pub mod gemini;
pub mod ingest;
pub mod presenter;

// Re-export commonly used services
pub use gemini::{RequestBuilder, ResponseInterpreter, RetryingTransport};
pub use ingest::ImageIngestor;
pub use presenter::{format_numbered_list, RenderedView, ResultPresenter};
