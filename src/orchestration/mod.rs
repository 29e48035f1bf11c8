pub mod pipeline;
pub mod session;

pub use pipeline::DiagnosisPipeline;
pub use session::DiagnosisSession;
