//! Stop signal shared by the listeners.
//!
//! A [`ShutdownSignal`] is a latch: once tripped, by hand or by SIGINT or
//! SIGTERM, it stays tripped and every pending or future [`recv`] completes.
//!
//! [`recv`]: ShutdownSignal::recv

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::watch;
use tracing::{error, info};

/// Latch that stops a running server.
///
/// Clones share the latch.
///
/// ```rust
/// use routerhttp_server::ShutdownSignal;
///
/// let signal = ShutdownSignal::new();
/// let server_side = signal.clone();
///
/// signal.trigger();
/// assert!(server_side.is_shutdown());
/// ```
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tripped: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    /// A signal that only fires through [`trigger`](Self::trigger).
    #[must_use]
    pub fn new() -> Self {
        let (tripped, _) = watch::channel(false);
        Self {
            tripped: Arc::new(tripped),
        }
    }

    /// A signal that also fires on SIGINT, or SIGTERM on Unix.
    ///
    /// Spawns the watcher task, so it needs a running Tokio runtime.
    #[must_use]
    pub fn with_os_signals() -> Self {
        let signal = Self::new();
        let watcher = signal.clone();
        tokio::spawn(async move {
            os_stop_requested().await;
            watcher.trigger();
        });
        signal
    }

    /// Trips the latch. Later calls do nothing.
    pub fn trigger(&self) {
        if !self.tripped.send_replace(true) {
            info!("Shutdown requested");
        }
    }

    /// Whether the latch has been tripped.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.tripped.borrow()
    }

    /// Resolves once the latch is tripped, immediately if it already is.
    pub fn recv(&self) -> ShutdownReceiver {
        let mut tripped = self.tripped.subscribe();
        let wait = async move {
            let orphaned = tripped.wait_for(|fired| *fired).await.is_err();
            // Every clone is gone, so nothing can trip the latch any more.
            if orphaned {
                std::future::pending::<()>().await;
            }
        };
        ShutdownReceiver { wait: wait.boxed() }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Future returned by [`ShutdownSignal::recv`].
pub struct ShutdownReceiver {
    wait: BoxFuture<'static, ()>,
}

impl fmt::Debug for ShutdownReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownReceiver").finish_non_exhaustive()
    }
}

impl Future for ShutdownReceiver {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.wait.as_mut().poll(cx)
    }
}

async fn os_stop_requested() {
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("SIGINT received"),
            Err(e) => {
                error!(error = %e, "Cannot listen for SIGINT");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("SIGTERM received");
            }
            Err(e) => {
                error!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => {}
        () = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_starts_untripped() {
        assert!(!ShutdownSignal::new().is_shutdown());
        assert!(!ShutdownSignal::default().is_shutdown());
    }

    #[test]
    fn test_trigger_twice() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        signal.trigger();
        assert!(signal.is_shutdown());
    }

    #[test]
    fn test_clones_share_the_latch() {
        let signal = ShutdownSignal::new();
        let other = signal.clone();

        other.trigger();
        assert!(signal.is_shutdown());
    }

    #[tokio::test]
    async fn test_pending_recv_wakes_on_trigger() {
        let signal = ShutdownSignal::new();
        let waiter = tokio::spawn(signal.recv());

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.trigger();
        });

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("receiver should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_recv_after_trigger_is_ready() {
        let signal = ShutdownSignal::new();
        signal.trigger();

        tokio::time::timeout(Duration::from_millis(10), signal.recv())
            .await
            .expect("already tripped");
    }

    #[tokio::test]
    async fn test_every_receiver_wakes() {
        let signal = ShutdownSignal::new();
        let first = signal.recv();
        let second = signal.clone().recv();

        signal.trigger();

        tokio::time::timeout(Duration::from_secs(1), async {
            first.await;
            second.await;
        })
        .await
        .expect("both receivers should wake");
    }

    #[tokio::test(start_paused = true)]
    async fn test_recv_waits_while_untripped() {
        let signal = ShutdownSignal::new();
        let waited = tokio::time::timeout(Duration::from_secs(5), signal.recv()).await;
        assert!(waited.is_err());
    }
}
