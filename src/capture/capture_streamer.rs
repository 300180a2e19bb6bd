use std::io;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use uuid::Uuid;

use super::types::CaptureOptions;
use crate::network::completion::{Completion, FireOnDrop};
use crate::network::graceful_closer::{Closeable, GracefulCloser, DEFAULT_GRACE};
use crate::pcapng::StreamEditor;
use crate::targets::Target;

/// Control over a single running capture.
///
/// A background task reads the packet capture stream from the capture
/// service websocket and writes it into the sink, after a [`StreamEditor`]
/// has put the target information into the stream's section header block.
///
/// # Fields Overview
///
/// - `id`: session id prefixing all log lines of this capture
/// - `closer`: the websocket, shared with the relay task
/// - `done`: fires once the relay task has finished
/// - `grace`: how long [`CaptureStreamer::stop`] waits for the relay task
///   after the websocket has been closed
pub struct CaptureStreamer {
    id: Uuid,
    closer: Arc<dyn Closeable>,
    done: Completion,
    grace: Duration,
}

impl CaptureStreamer {
    /// Starts relaying the capture stream from `ws` into `sink`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<S, W>(ws: WebSocketStream<S>, target: &Target, opts: &CaptureOptions, sink: W) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::start_with_grace(ws, target, opts, sink, DEFAULT_GRACE)
    }

    pub fn start_with_grace<S, W>(
        ws: WebSocketStream<S>,
        target: &Target,
        opts: &CaptureOptions,
        sink: W,
        grace: Duration,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let id = Uuid::new_v4();
        info!("[{}] capturing from {} {}", id, target.target_type, target.name);
        debug!(
            "[{}] capturing from network interfaces: {}",
            id,
            opts.effective_nifs(&target.network_interfaces).join(", ")
        );

        let closer = Arc::new(GracefulCloser::with_grace(ws, grace));
        let done = Completion::new();
        let editor = StreamEditor::new(sink, target, &opts.filter, opts.avoid_promiscuous_mode);
        tokio::spawn(relay(id, Arc::clone(&closer), editor, done.clone()));

        Self {
            id,
            closer,
            done,
            grace,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.id
    }

    /// True once the capture has terminated.
    pub fn is_done(&self) -> bool {
        self.done.is_fired()
    }

    /// Stops the capture in an orderly manner and waits for it to terminate.
    ///
    /// Idempotent. Returns within about twice the grace period even when the
    /// capture service or the sink hang.
    pub async fn stop(&self) {
        debug!("[{}] stopping capture", self.id);
        self.closer.close().await;
        if tokio::time::timeout(self.grace, self.done.wait()).await.is_err() {
            warn!("[{}] capture relay did not terminate in time", self.id);
        }
    }

    /// Waits for the capture to terminate without initiating termination.
    pub async fn wait(&self) {
        self.done.wait().await;
    }

    /// Waits up to `d` for the capture to terminate, and stops it afterwards
    /// if necessary.
    pub async fn stop_after(&self, d: Duration) {
        tokio::select! {
            _ = self.done.wait() => {}
            _ = tokio::time::sleep(d) => self.stop().await,
        }
    }
}

/// Tells apart a sink that won't accept any more data from other failures.
fn is_sink_gone(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected
    )
}

/// Relays the capture stream until the websocket or the sink breaks.
async fn relay<S, W>(
    id: Uuid,
    closer: Arc<GracefulCloser<S>>,
    mut editor: StreamEditor<W>,
    done: Completion,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let _done = FireOnDrop(done);
    let started = Utc::now();
    let mut relayed: u64 = 0;
    loop {
        let data = match closer.read().await {
            Ok(data) => data,
            Err(e) => {
                debug!("[{}] websocket packet data stream error: {}", id, e);
                break;
            }
        };
        relayed += data.len() as u64;
        if let Err(e) = editor.write(&data).await {
            if is_sink_gone(&e) {
                error!(
                    "[{}] capture stream writer is fed up and does not accept any more packets",
                    id
                );
                // keep reading so that the close handshake can still finish
                tokio::spawn(drain(id, closer));
            } else {
                error!("[{}] capture stream writer failed: {}", id, e);
            }
            break;
        }
    }
    info!(
        "[{}] capture ended after {}s, {} octets relayed",
        id,
        (Utc::now() - started).num_seconds(),
        relayed
    );
}

/// Reads and discards packet data until the websocket is done.
async fn drain<S>(id: Uuid, closer: Arc<GracefulCloser<S>>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    debug!("[{}] draining websocket...", id);
    while closer.read().await.is_ok() {}
    debug!("[{}] ...drained", id);
}
