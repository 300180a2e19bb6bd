pub mod host_client;
pub mod shark_tank;

pub use host_client::{HostClientFactory, HostSharkTank};
pub use shark_tank::{CaptureSink, ClientFactory, ClientRegistry, SharkTank};
