use async_trait::async_trait;
use log::debug;
use tokio::io::AsyncWrite;

use crate::capture::{CaptureOptions, CaptureStreamer};
use crate::configuration::Config;
use crate::error_handling::types::{CaptureError, ClientError};
use crate::targets::Target;

/// Destination of a capture's pcapng stream.
pub type CaptureSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Namespace of pods given without one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Access to network captures through a capture service.
#[async_trait]
pub trait SharkTank: Send + Sync {
    /// Lists the available capture targets; empty when discovery fails.
    async fn targets(&self) -> Vec<Target>;

    /// Captures from a pod given as `namespace/name`, or just `name` in the
    /// default namespace.
    async fn capture_pod(
        &self,
        sink: CaptureSink,
        pod: &str,
        opts: &CaptureOptions,
    ) -> Result<CaptureStreamer, CaptureError> {
        let target = pod_target(pod)?;
        self.capture(sink, &target, opts).await
    }

    /// Captures from a container (or any other non-pod target) on a node.
    async fn capture_container(
        &self,
        sink: CaptureSink,
        node_name: &str,
        name: &str,
        opts: &CaptureOptions,
    ) -> Result<CaptureStreamer, CaptureError> {
        let target = Target {
            name: name.to_string(),
            node_name: node_name.to_string(),
            ..Default::default()
        };
        self.capture(sink, &target, opts).await
    }

    /// Captures from a target, streaming the packets into `sink`.
    async fn capture(
        &self,
        sink: CaptureSink,
        target: &Target,
        opts: &CaptureOptions,
    ) -> Result<CaptureStreamer, CaptureError>;

    /// Forgets the cached capture targets; they get discovered anew when
    /// needed.
    fn clear(&self);
}

/// Builds a pod target from `namespace/name` or a bare `name`.
pub fn pod_target(pod: &str) -> Result<Target, CaptureError> {
    let name = match pod.split('/').collect::<Vec<_>>()[..] {
        [name] => format!("{}/{}", DEFAULT_NAMESPACE, name),
        [_, _] => pod.to_string(),
        _ => {
            return Err(CaptureError::InvalidRequest(format!(
                "invalid pod namespace/name: {:?}",
                pod
            )))
        }
    };
    Ok(Target::pod(&name))
}

/// Creates capture service clients for a configuration.
pub trait ClientFactory: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns a client when the configuration is meant for this factory's
    /// kind of capture service, `None` otherwise.
    fn create(&self, config: &Config) -> Result<Option<Box<dyn SharkTank>>, ClientError>;
}

/// Ordered list of client factories, filled explicitly at startup.
#[derive(Default)]
pub struct ClientRegistry {
    factories: Vec<Box<dyn ClientFactory>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, factory: Box<dyn ClientFactory>) -> Self {
        self.factories.push(factory);
        self
    }

    /// Returns the client of the first factory accepting the configuration.
    pub fn client(&self, config: &Config) -> Result<Box<dyn SharkTank>, ClientError> {
        for factory in &self.factories {
            if let Some(client) = factory.create(config)? {
                debug!("using {} client", factory.name());
                return Ok(client);
            }
        }
        Err(ClientError::NoClientConfigured)
    }
}
