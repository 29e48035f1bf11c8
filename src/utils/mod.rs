pub mod image_ops;
pub mod metrics;

// Re-export commonly used items
pub use image_ops::{encode_base64_async, read_image_file, sniff_mime_type};
pub use metrics::{Metrics, MetricsSnapshot};
