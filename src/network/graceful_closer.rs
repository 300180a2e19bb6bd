//! Websocket reading with a graceful close handshake.
//!
//! Either side may start the close. When the capture service closes first,
//! [`GracefulCloser::read`] acknowledges the close and tears down the
//! connection. When we close first, [`GracefulCloser::close`] sends the close
//! frame and waits for the service's acknowledgement to arrive via the reader,
//! but never longer than the grace period.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex as AsyncMutex;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use super::completion::Completion;
use crate::error_handling::types::StreamError;

/// Reason text of the close frames we send.
pub const CLOSE_REASON: &str = "ciao";
/// Upper bound on waiting for the peer to acknowledge our close.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(10);

/// Status code reported when the peer closed without giving one.
const NO_STATUS_RECEIVED: u16 = 1005;

/// Something that can be closed gracefully, from any task.
#[async_trait]
pub trait Closeable: Send + Sync {
    /// Closes gracefully and returns once closed, within a bounded time.
    async fn close(&self);

    /// True once the connection has been closed, gracefully or not.
    fn is_closed(&self) -> bool;
}

/// A reading client websocket with graceful close handling.
///
/// Reads and closes may happen concurrently from different tasks.
pub struct GracefulCloser<S> {
    reader: AsyncMutex<Option<SplitStream<WebSocketStream<S>>>>,
    writer: AsyncMutex<Option<SplitSink<WebSocketStream<S>, Message>>>,
    // Set by whoever starts the close handshake first.
    closing: Mutex<bool>,
    closed: Completion,
    grace: Duration,
}

impl<S> GracefulCloser<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(ws: WebSocketStream<S>) -> Self {
        Self::with_grace(ws, DEFAULT_GRACE)
    }

    pub fn with_grace(ws: WebSocketStream<S>, grace: Duration) -> Self {
        let (writer, reader) = ws.split();
        Self {
            reader: AsyncMutex::new(Some(reader)),
            writer: AsyncMutex::new(Some(writer)),
            closing: Mutex::new(false),
            closed: Completion::new(),
            grace,
        }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    fn closing(&self) -> MutexGuard<'_, bool> {
        self.closing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks the connection as closing; returns true if it wasn't before.
    fn start_closing(&self) -> bool {
        let mut closing = self.closing();
        !std::mem::replace(&mut *closing, true)
    }

    /// Reads the next binary message.
    ///
    /// Errors
    /// - [`StreamError::PeerClosed`] once the close handshake has completed,
    ///   no matter which side started it.
    /// - [`StreamError::UnexpectedMessage`] for text messages.
    /// - [`StreamError::Transport`] for websocket and transport failures.
    /// - [`StreamError::ConnectionGone`] when the connection has already been
    ///   torn down, such as after a forced close.
    pub async fn read(&self) -> Result<Vec<u8>, StreamError> {
        let mut reader = self.reader.lock().await;
        loop {
            let Some(stream) = reader.as_mut() else {
                return Err(StreamError::ConnectionGone);
            };
            let next = tokio::select! {
                msg = stream.next() => Some(msg),
                _ = self.closed.wait() => None,
            };
            let msg = match next {
                Some(msg) => msg,
                None => {
                    // forced close while waiting for data
                    *reader = None;
                    return Err(StreamError::ConnectionGone);
                }
            };
            match msg {
                Some(Ok(Message::Binary(data))) => return Ok(data),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    trace!("websocket ping/pong");
                    continue;
                }
                Some(Ok(Message::Close(frame))) => {
                    if self.start_closing() {
                        debug!("server closes websocket, acknowledging close");
                        self.acknowledge_close().await;
                    } else {
                        debug!("server acknowledged websocket close");
                    }
                    *reader = None;
                    self.shutdown().await;
                    let (code, reason) = match frame {
                        Some(f) => (u16::from(f.code), f.reason.into_owned()),
                        None => (NO_STATUS_RECEIVED, String::new()),
                    };
                    return Err(StreamError::PeerClosed { code, reason });
                }
                Some(Ok(unexpected)) => {
                    let kind = match unexpected {
                        Message::Text(_) => "text".to_string(),
                        other => format!("{:?}", other),
                    };
                    debug!("unexpected websocket {} message, tearing down connection", kind);
                    *reader = None;
                    self.shutdown().await;
                    return Err(StreamError::UnexpectedMessage(kind));
                }
                Some(Err(e)) => {
                    debug!("websocket broken: {}", e);
                    *reader = None;
                    self.shutdown().await;
                    return Err(StreamError::Transport(e));
                }
                None => {
                    debug!("websocket ended without close handshake");
                    *reader = None;
                    self.shutdown().await;
                    return Err(StreamError::ConnectionGone);
                }
            }
        }
    }

    /// Gracefully closes the websocket and waits for the close to finish,
    /// forcing the connection down after the grace period.
    pub async fn close(&self) {
        let initiate = self.start_closing();
        let handshake = async {
            if initiate {
                debug!("initiating graceful websocket close");
                self.send_close().await;
            }
            debug!("waiting for graceful close to be finished...");
            self.closed.wait().await;
        };
        if tokio::time::timeout(self.grace, handshake).await.is_err() {
            debug!("graceful websocket close timeout; forced closed");
            self.shutdown().await;
        }
        debug!("websocket gracefully closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_fired()
    }

    /// Sends our close frame, starting the handshake.
    async fn send_close(&self) {
        let mut writer = self.writer.lock().await;
        if let Some(sink) = writer.as_mut() {
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: CLOSE_REASON.into(),
            };
            if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                debug!("cannot send websocket close: {}", e);
            }
        }
    }

    /// Flushes out the close acknowledgement queued by the websocket when the
    /// peer's close frame arrived.
    ///
    /// The websocket queues that acknowledgement itself, echoing the peer's
    /// close code and reason; it does not carry [`CLOSE_REASON`].
    async fn acknowledge_close(&self) {
        let mut writer = self.writer.lock().await;
        if let Some(sink) = writer.as_mut() {
            if let Err(e) = sink.close().await {
                debug!("cannot acknowledge websocket close: {}", e);
            }
        }
    }

    /// Drops our end of the connection and signals that we're closed.
    async fn shutdown(&self) {
        // the transport goes away with the last of both halves; a reader
        // blocked in read() holds its half and lets go on the closed signal
        self.writer.lock().await.take();
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }
        self.closed.fire();
    }
}

#[async_trait]
impl<S> Closeable for GracefulCloser<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn close(&self) {
        GracefulCloser::close(self).await
    }

    fn is_closed(&self) -> bool {
        GracefulCloser::is_closed(self)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, DuplexStream};
    use tokio::sync::oneshot;
    use tokio_tungstenite::tungstenite::protocol::Role;

    /// Connected client and server websockets over an in-memory pipe.
    pub(crate) async fn ws_pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
        let (client_io, server_io) = tokio::io::duplex(256 * 1024);
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        (client, server)
    }

    /// Keeps reading on the server side, reporting the first close frame
    /// received; the websocket answers it automatically.
    pub(crate) fn serve_until_closed(
        mut server: WebSocketStream<DuplexStream>,
    ) -> oneshot::Receiver<Option<CloseFrame<'static>>> {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let mut tx = Some(tx);
            while let Some(Ok(msg)) = server.next().await {
                if let Message::Close(frame) = msg {
                    if let Some(tx) = tx.take() {
                        let _ = tx.send(frame.map(|f| f.into_owned()));
                    }
                }
            }
        });
        rx
    }

    #[tokio::test]
    async fn test_read_binary() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (client, mut server) = ws_pair().await;
        let closer = GracefulCloser::new(client);
        server.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
        server.send(Message::Ping(vec![42])).await.unwrap();
        server.send(Message::Binary(vec![4])).await.unwrap();
        assert_eq!(closer.read().await.unwrap(), vec![1, 2, 3]);
        assert_eq!(closer.read().await.unwrap(), vec![4]);
    }

    #[tokio::test]
    async fn test_read_rejects_text() {
        let (client, mut server) = ws_pair().await;
        let closer = GracefulCloser::new(client);
        server.send(Message::Text("hello".into())).await.unwrap();
        assert!(matches!(
            closer.read().await,
            Err(StreamError::UnexpectedMessage(_))
        ));
        assert!(closer.is_closed());
        assert!(matches!(closer.read().await, Err(StreamError::ConnectionGone)));
        // the connection is gone for the server too
        let end = tokio::time::timeout(Duration::from_secs(2), server.next())
            .await
            .expect("server should see the connection end");
        assert!(!matches!(end, Some(Ok(_))));
    }

    #[tokio::test]
    async fn test_forced_close_drops_transport_without_reader() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (client_io, mut peer) = tokio::io::duplex(1024);
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let closer = GracefulCloser::with_grace(client, Duration::from_millis(200));

        closer.close().await;
        assert!(closer.is_closed());

        // masked close frame: 2 header, 4 mask, 2 code and 4 reason octets,
        // followed by the end of the stream
        let mut received = Vec::new();
        tokio::time::timeout(Duration::from_secs(2), peer.read_to_end(&mut received))
            .await
            .expect("transport should be closed")
            .unwrap();
        assert_eq!(received.len(), 12);
        assert!(matches!(closer.read().await, Err(StreamError::ConnectionGone)));
    }

    #[tokio::test]
    async fn test_peer_initiated_close() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (client, mut server) = ws_pair().await;
        let closer = GracefulCloser::new(client);
        server
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "bye".into(),
            })))
            .await
            .unwrap();

        match closer.read().await {
            Err(StreamError::PeerClosed { code, reason }) => {
                assert_eq!(code, 1000);
                assert_eq!(reason, "bye");
            }
            other => panic!("expected close error, got {:?}", other),
        }
        assert!(closer.is_closed());

        // the server sees our acknowledgement, echoing its own close
        match server.next().await {
            Some(Ok(Message::Close(Some(frame)))) => {
                assert_eq!(frame.code, CloseCode::Normal);
                assert_eq!(frame.reason, "bye");
            }
            other => panic!("expected close acknowledgement, got {:?}", other),
        }

        // closing afterwards returns right away
        let start = Instant::now();
        closer.close().await;
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(matches!(closer.read().await, Err(StreamError::ConnectionGone)));
    }

    #[tokio::test]
    async fn test_local_close_handshake() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (client, server) = ws_pair().await;
        let closer = Arc::new(GracefulCloser::new(client));
        let seen = serve_until_closed(server);

        let reader = {
            let closer = Arc::clone(&closer);
            tokio::spawn(async move {
                loop {
                    if let Err(e) = closer.read().await {
                        return e;
                    }
                }
            })
        };

        let start = Instant::now();
        closer.close().await;
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(closer.is_closed());

        let frame = seen.await.unwrap().expect("close frame with status");
        assert_eq!(frame.code, CloseCode::Normal);
        assert_eq!(frame.reason, CLOSE_REASON);

        match reader.await.unwrap() {
            StreamError::PeerClosed { code, .. } => assert_eq!(code, 1000),
            other => panic!("expected close error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (client, server) = ws_pair().await;
        let closer = Arc::new(GracefulCloser::new(client));
        let _seen = serve_until_closed(server);
        let reader = {
            let closer = Arc::clone(&closer);
            tokio::spawn(async move { while closer.read().await.is_ok() {} })
        };
        tokio::join!(closer.close(), closer.close());
        closer.close().await;
        assert!(closer.is_closed());
        reader.await.unwrap();
    }

    #[tokio::test]
    async fn test_close_without_acknowledgement_is_bounded() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (client, _server) = ws_pair().await;
        let grace = Duration::from_millis(200);
        let closer = Arc::new(GracefulCloser::with_grace(client, grace));
        let reader = {
            let closer = Arc::clone(&closer);
            tokio::spawn(async move { closer.read().await })
        };
        tokio::task::yield_now().await;

        let start = Instant::now();
        closer.close().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= grace);
        assert!(elapsed < Duration::from_secs(5));
        assert!(closer.is_closed());
        // the blocked reader gets released
        assert!(matches!(
            reader.await.unwrap(),
            Err(StreamError::ConnectionGone)
        ));
    }
}
