//! Frame transport seam.
//!
//! [`FrameTransport`] is everything a [`WebSocketConnection`] needs from the
//! framing layer: read the next data frame, write one, check liveness, close.
//! Frame encoding itself (masking, opcodes, fragmentation) is delegated to
//! `tokio-tungstenite` by [`TungsteniteTransport`].
//!
//! [`WebSocketConnection`]: crate::WebSocketConnection

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tokio::task::AbortHandle;
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

use crate::config::WebSocketConfig;
use crate::message::Frame;

/// A framed, already-upgraded byte stream.
///
/// Reads and writes may run concurrently from different tasks.
#[async_trait]
pub trait FrameTransport: Send + Sync {
    /// Waits for the next data frame.
    ///
    /// Returns `Ok(None)` once the peer has closed the stream.
    async fn read(&self) -> io::Result<Option<Frame>>;

    /// Writes a data frame.
    async fn write(&self, frame: Frame) -> io::Result<()>;

    /// Returns `true` once the underlying socket is known to be closed.
    fn is_closed(&self) -> bool;

    /// Closes the stream. Closing twice is not an error.
    async fn close(&self) -> io::Result<()>;

    /// Sends a liveness ping.
    async fn ping(&self) -> io::Result<()> {
        if self.is_closed() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "transport closed"));
        }
        Ok(())
    }
}

/// Data frames read ahead of the handler.
const READ_AHEAD: usize = 16;

/// [`FrameTransport`] backed by `tokio-tungstenite`.
///
/// A reader task owns the receiving half and queues data frames for
/// [`read`](FrameTransport::read). It notices the peer going away even
/// while nobody is reading, which is what lets the reaper evict silent
/// dead sockets.
pub struct TungsteniteTransport<S> {
    sink: Mutex<SplitSink<WebSocketStream<S>, tungstenite::Message>>,
    incoming: Mutex<mpsc::Receiver<io::Result<Frame>>>,
    /// Set by the reader task once the receiving half has ended.
    peer_gone: Arc<AtomicBool>,
    /// Set by `close`.
    closed: AtomicBool,
    reader: AbortHandle,
}

impl<S> TungsteniteTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wraps a raw stream on which the 101 response has already been sent.
    ///
    /// Spawns the reader task, so it needs a running Tokio runtime.
    pub async fn from_raw_socket(stream: S, config: &WebSocketConfig) -> Self {
        let ws_stream = WebSocketStream::from_raw_socket(
            stream,
            tungstenite::protocol::Role::Server,
            None,
        )
        .await;
        let (sink, stream) = ws_stream.split();

        let (frames, incoming) = mpsc::channel(READ_AHEAD);
        let peer_gone = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_frames(
            stream,
            frames,
            Arc::clone(&peer_gone),
            config.max_message_size,
        ))
        .abort_handle();

        Self {
            sink: Mutex::new(sink),
            incoming: Mutex::new(incoming),
            peer_gone,
            closed: AtomicBool::new(false),
            reader,
        }
    }

    fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl<S> Drop for TungsteniteTransport<S> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Pumps data frames from the peer into `frames` until the stream ends, a
/// read fails or the transport is dropped.
async fn read_frames<S>(
    mut stream: SplitStream<WebSocketStream<S>>,
    frames: mpsc::Sender<io::Result<Frame>>,
    peer_gone: Arc<AtomicBool>,
    max_message_size: usize,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    while let Some(next) = stream.next().await {
        let item = match next {
            Ok(tungstenite::Message::Close(frame)) => {
                debug!(?frame, "Received close frame");
                break;
            }
            // Pongs are queued by tungstenite and flushed on the next I/O.
            Ok(msg) => match Frame::from_message(msg) {
                None => continue,
                Some(frame) if frame.len() > max_message_size => Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "frame of {} bytes exceeds limit of {max_message_size}",
                        frame.len()
                    ),
                )),
                Some(frame) => Ok(frame),
            },
            Err(e) => Err(into_io(e)),
        };

        let fatal = item.is_err();
        if fatal {
            peer_gone.store(true, Ordering::SeqCst);
        }
        if frames.send(item).await.is_err() || fatal {
            break;
        }
    }

    if !peer_gone.swap(true, Ordering::SeqCst) {
        debug!("Peer stream ended");
    }
}

fn into_io(err: tungstenite::Error) -> io::Error {
    match err {
        tungstenite::Error::Io(e) => e,
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            io::Error::new(io::ErrorKind::NotConnected, err)
        }
        other => io::Error::other(other),
    }
}

#[async_trait]
impl<S> FrameTransport for TungsteniteTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Frames queued before the peer went away are still delivered.
    async fn read(&self) -> io::Result<Option<Frame>> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.incoming.lock().await.recv().await.transpose()
    }

    async fn write(&self, frame: Frame) -> io::Result<()> {
        if self.is_closed() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "transport closed"));
        }

        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.send(frame.into()).await {
            self.mark_closed();
            return Err(into_io(e));
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.peer_gone.load(Ordering::SeqCst)
    }

    async fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.reader.abort();
        let mut sink = self.sink.lock().await;
        sink.close().await.map_err(into_io)
    }

    async fn ping(&self) -> io::Result<()> {
        if self.is_closed() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "transport closed"));
        }

        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.send(tungstenite::Message::Ping(Bytes::new())).await {
            self.mark_closed();
            return Err(into_io(e));
        }
        Ok(())
    }
}
