//! In-memory transport for unit tests.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::message::Frame;
use crate::transport::FrameTransport;

/// Scripted transport: serves queued frames, then reports end of stream.
#[derive(Default)]
pub(crate) struct MockTransport {
    frames: Mutex<VecDeque<Frame>>,
    written: Mutex<Vec<Frame>>,
    closed: AtomicBool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_pings: AtomicBool,
    stall_pings: AtomicBool,
    close_calls: AtomicUsize,
    pings: AtomicUsize,
}

impl MockTransport {
    pub(crate) fn with_frames(frames: impl IntoIterator<Item = Frame>) -> Arc<Self> {
        Arc::new(Self {
            frames: Mutex::new(frames.into_iter().collect()),
            ..Self::default()
        })
    }

    pub(crate) fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_pings(&self) {
        self.fail_pings.store(true, Ordering::SeqCst);
    }

    /// Pings never complete, like a peer that stopped reading.
    pub(crate) fn stall_pings(&self) {
        self.stall_pings.store(true, Ordering::SeqCst);
    }

    /// Simulates the peer dropping the socket.
    pub(crate) fn drop_peer(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn written(&self) -> Vec<Frame> {
        self.written.lock().clone()
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}

fn broken() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe")
}

#[async_trait]
impl FrameTransport for MockTransport {
    async fn read(&self) -> io::Result<Option<Frame>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(broken());
        }
        Ok(self.frames.lock().pop_front())
    }

    async fn write(&self, frame: Frame) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(broken());
        }
        self.written.lock().push(frame);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> io::Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&self) -> io::Result<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.stall_pings.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_pings.load(Ordering::SeqCst) {
            return Err(broken());
        }
        Ok(())
    }
}
