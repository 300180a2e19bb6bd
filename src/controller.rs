pub mod controller_handler;
pub mod listing;

pub use controller_handler::{find_target, CaptureCommand, Controller};
pub use listing::{OutputFormat, TargetKind};
