pub mod capture_request;
pub mod completion;
pub mod graceful_closer;

pub use capture_request::CaptureRequest;
pub use completion::Completion;
pub use graceful_closer::{Closeable, GracefulCloser, CLOSE_REASON, DEFAULT_GRACE};
