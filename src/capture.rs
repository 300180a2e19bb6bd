pub mod capture_streamer;
pub mod types;

pub use capture_streamer::CaptureStreamer;
pub use types::{CaptureOptions, ALL_NIFS};
