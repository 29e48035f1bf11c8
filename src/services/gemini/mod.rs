pub mod interpreter;
pub mod request_builder;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use interpreter::{extract_json_object, Interpretation, ResponseInterpreter};
pub use request_builder::RequestBuilder;
pub use transport::{
    backoff_delay, classify, AttemptFailure, HttpReply, HttpSender, ReqwestSender,
    RetryingTransport,
};
