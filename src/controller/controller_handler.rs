use std::path::Path;

use log::{debug, info};
use tokio::fs::OpenOptions;

use super::listing::{filter_targets, render, OutputFormat, TargetKind};
use crate::capture::CaptureOptions;
use crate::client::{CaptureSink, ClientRegistry, SharkTank};
use crate::configuration::Config;
use crate::error_handling::types::{CaptureError, ControllerError};
use crate::targets::Target;

/// Output file name standing for stdout.
pub const STDOUT_NAME: &str = "-";

/// Which target to capture from, and where to write the packets.
///
/// # Fields Overview
///
/// - `name`: exact target name; pods as `namespace/name`
/// - `kind`: restricts the match to a kind of target, if set
/// - `node`: restricts the match to targets on that node, if set
/// - `options`: interfaces, filter and promiscuous mode avoidance
/// - `output`: file to write the pcapng stream to, or `-` for stdout
#[derive(Debug, Clone, Default)]
pub struct CaptureCommand {
    pub name: String,
    pub kind: Option<TargetKind>,
    pub node: Option<String>,
    pub options: CaptureOptions,
    pub output: String,
}

/// Runs the command line operations against a capture service client.
pub struct Controller {
    pub config: Config,
    client: Box<dyn SharkTank>,
}

impl Controller {
    /// Creates a controller with the first client the registry offers for
    /// the configuration.
    pub fn new(config: Config, registry: &ClientRegistry) -> Result<Self, ControllerError> {
        let client = registry.client(&config)?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: Config, client: Box<dyn SharkTank>) -> Self {
        Self { config, client }
    }

    /// Renders the discovered targets of the given kinds.
    pub async fn list(
        &self,
        kinds: &[TargetKind],
        format: Option<OutputFormat>,
        no_headers: bool,
    ) -> Result<String, ControllerError> {
        debug!("listing targets of kinds {:?}", kinds);
        let targets = self.client.targets().await;
        for t in &targets {
            debug!(
                "found target {:?} ({}) on {:?} via {:?}",
                t.name, t.target_type, t.node_name, t.capture_service
            );
        }
        let shown = filter_targets(targets, kinds);
        render(&shown, kinds, format, no_headers)
            .map_err(|e| ControllerError::InvalidArgument(e.to_string()))
    }

    /// Captures from a single target until interrupted or until the capture
    /// ends by itself.
    pub async fn capture(&self, cmd: &CaptureCommand) -> Result<(), ControllerError> {
        self.capture_until(cmd, shutdown_signal()).await
    }

    /// Captures from a single target until `stop` completes or the capture
    /// ends by itself, then stops the capture gracefully.
    pub async fn capture_until<F>(&self, cmd: &CaptureCommand, stop: F) -> Result<(), ControllerError>
    where
        F: std::future::Future<Output = ()>,
    {
        if cmd.name.is_empty() {
            return Err(ControllerError::InvalidArgument(
                "invalid empty capture target name".to_string(),
            ));
        }
        debug!(
            "looking up capture target {:?} of kind {:?} on node {:?}",
            cmd.name, cmd.kind, cmd.node
        );
        let targets = self.client.targets().await;
        let target = find_target(&targets, &cmd.name, cmd.kind, cmd.node.as_deref())?;

        let sink = open_output(&cmd.output).await?;
        let capture = self.client.capture(sink, &target, &cmd.options).await?;
        info!(
            "[{}] live capture from {} {:?} started",
            capture.session_id(),
            target.target_type,
            target.name
        );

        tokio::select! {
            _ = stop => debug!("closing live network packet capture stream from target {:?}...", target.name),
            _ = capture.wait() => debug!("capture stream from target {:?} ended", target.name),
        }
        capture.stop().await;
        debug!("network packet capture stream from target {:?} finished", target.name);
        Ok(())
    }
}

/// Finds exactly one target by name, optionally restricted to a kind and a
/// node.
pub fn find_target(
    targets: &[Target],
    name: &str,
    kind: Option<TargetKind>,
    node: Option<&str>,
) -> Result<Target, CaptureError> {
    let matches: Vec<&Target> = targets
        .iter()
        .filter(|t| t.name == name)
        .filter(|t| kind.map_or(true, |k| TargetKind::of(t) == k))
        .filter(|t| node.map_or(true, |n| n.is_empty() || t.node_name == n))
        .collect();
    match matches[..] {
        [t] => Ok(t.clone()),
        [] => Err(CaptureError::TargetNotFound(match node {
            Some(n) if !n.is_empty() => format!("{:?} on node {:?}", name, n),
            _ => format!("{:?}", name),
        })),
        _ => Err(CaptureError::AmbiguousTarget(name.to_string(), matches.len())),
    }
}

/// Opens the capture output: stdout for `-`, otherwise a fresh file.
async fn open_output(name: &str) -> Result<CaptureSink, ControllerError> {
    if name.is_empty() || name == STDOUT_NAME {
        return Ok(Box::new(tokio::io::stdout()));
    }
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o640);
    let file = options
        .open(Path::new(name))
        .await
        .map_err(ControllerError::OutputFailed)?;
    Ok(Box::new(file))
}

/// Completes on Ctrl-C, or on SIGTERM where there is such a thing.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => debug!("cannot watch for SIGTERM: {}", e),
        }
    }
    let _ = tokio::signal::ctrl_c().await;
}
