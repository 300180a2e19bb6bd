pub mod config;

pub use config::{ClientOptions, Config, GlobalArgs, DEFAULT_REQUEST_TIMEOUT_SECS};
