//! WebSocket connection registry.
//!
//! The registry is the single owner of the list of live connections. It
//! enforces the connection ceiling, fans messages out to every connection,
//! and runs the reaping sweep that evicts connections whose sockets died
//! without an explicit `close()`.
//!
//! The list is an ordered `Vec` behind a `parking_lot` mutex. The lock is
//! never held across an `.await`: broadcast works on a snapshot, and the
//! sweep marks dead entries and compacts the list under the lock, then
//! closes the evicted transports after releasing it.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;
use indexmap::IndexMap;
use parking_lot::Mutex;
use routerhttp_telemetry::metrics;
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::connection::{ConnectionId, WebSocketConnection};
use crate::error::{WsError, WsResult};
use crate::message::Frame;
use crate::transport::FrameTransport;

/// Statistics about the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Connections currently registered.
    pub active_connections: usize,
    /// Total connections ever opened.
    pub total_accepted: usize,
    /// Total handshakes refused by admission control.
    pub total_rejected: usize,
    /// Total connections removed, by any path.
    pub total_closed: usize,
    /// Connections removed by the reaping sweep.
    pub total_reaped: usize,
}

/// Process-wide registry of live WebSocket connections.
///
/// # Example
///
/// ```
/// use routerhttp_ws::ConnectionRegistry;
///
/// let registry = ConnectionRegistry::new(2);
/// assert!(!registry.is_enough());
/// assert_eq!(registry.max_connections(), 2);
///
/// registry.set_max_connections(-1);
/// assert!(!registry.is_enough());
/// ```
pub struct ConnectionRegistry {
    /// Live connections, in open order.
    connections: Mutex<Vec<Arc<WebSocketConnection>>>,
    /// Handshakes admitted but not yet registered. Counted against the
    /// ceiling; only incremented under the `connections` lock.
    pending: AtomicUsize,
    /// Ceiling; zero or negative means unlimited.
    max_connections: AtomicIsize,
    /// Sweep settings.
    config: RegistryConfig,
    total_accepted: AtomicUsize,
    total_rejected: AtomicUsize,
    total_closed: AtomicUsize,
    total_reaped: AtomicUsize,
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("stats", &self.stats())
            .field("max_connections", &self.max_connections())
            .finish_non_exhaustive()
    }
}

impl ConnectionRegistry {
    /// Create a registry with the given ceiling and default sweep settings.
    pub fn new(max_connections: isize) -> Arc<Self> {
        Self::with_config(RegistryConfig::default().max_connections(max_connections))
    }

    /// Create a registry from a full configuration.
    pub fn with_config(config: RegistryConfig) -> Arc<Self> {
        Arc::new(Self {
            connections: Mutex::new(Vec::new()),
            pending: AtomicUsize::new(0),
            max_connections: AtomicIsize::new(config.max_connections),
            config,
            total_accepted: AtomicUsize::new(0),
            total_rejected: AtomicUsize::new(0),
            total_closed: AtomicUsize::new(0),
            total_reaped: AtomicUsize::new(0),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// The current ceiling.
    pub fn max_connections(&self) -> isize {
        self.max_connections.load(Ordering::SeqCst)
    }

    /// Change the ceiling. Existing connections are never evicted.
    pub fn set_max_connections(&self, limit: isize) {
        self.max_connections.store(limit, Ordering::SeqCst);
        debug!(limit, "Connection limit updated");
    }

    /// Returns `true` if the ceiling is positive and has been reached.
    ///
    /// Handshakes holding an [`AdmissionSlot`] count as connections.
    pub fn is_enough(&self) -> bool {
        let connections = self.connections.lock();
        Self::full(self.max_connections(), connections.len() + self.pending())
    }

    fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Reserves room for one connection before its handshake runs.
    ///
    /// Returns `None` when the ceiling is reached. The slot is released when
    /// dropped unless it was turned into a connection with
    /// [`AdmissionSlot::open`].
    pub fn try_reserve(self: &Arc<Self>) -> Option<AdmissionSlot> {
        let connections = self.connections.lock();
        if Self::full(self.max_connections(), connections.len() + self.pending()) {
            return None;
        }
        self.pending.fetch_add(1, Ordering::SeqCst);
        drop(connections);

        Some(AdmissionSlot {
            registry: Arc::clone(self),
            armed: true,
        })
    }

    fn full(max: isize, len: usize) -> bool {
        max > 0 && isize::try_from(len).map_or(true, |len| len >= max)
    }

    /// Record a handshake refused by admission control.
    pub fn record_rejected(&self) {
        self.total_rejected.fetch_add(1, Ordering::Relaxed);
        metrics::record_ws_rejected();
    }

    /// Register a connection over an upgraded transport, without a prior
    /// reservation.
    ///
    /// Fails when the ceiling, reservations included, is reached.
    pub fn open(
        self: &Arc<Self>,
        transport: Arc<dyn FrameTransport>,
        remote_addr: Option<SocketAddr>,
        headers: IndexMap<String, String>,
    ) -> WsResult<Arc<WebSocketConnection>> {
        self.try_reserve()
            .map(|slot| slot.open(transport, remote_addr, headers))
            .ok_or_else(|| {
                self.record_rejected();
                WsError::too_many_connections(self.max_connections())
            })
    }

    /// Moves a reservation into the connection list.
    fn register(
        self: &Arc<Self>,
        transport: Arc<dyn FrameTransport>,
        remote_addr: Option<SocketAddr>,
        headers: IndexMap<String, String>,
    ) -> Arc<WebSocketConnection> {
        let conn = Arc::new(WebSocketConnection::new(
            transport,
            remote_addr,
            headers,
            Arc::downgrade(self),
        ));

        let active = {
            let mut connections = self.connections.lock();
            self.pending.fetch_sub(1, Ordering::SeqCst);
            connections.push(Arc::clone(&conn));
            connections.len()
        };

        self.total_accepted.fetch_add(1, Ordering::Relaxed);
        metrics::record_ws_accepted();
        metrics::set_ws_active(active);
        info!(
            connection_id = %conn.id(),
            remote_addr = ?remote_addr,
            active,
            "Connection opened"
        );

        conn
    }

    /// Remove a connection. Returns `false` if it was not registered.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let (removed, active) = {
            let mut connections = self.connections.lock();
            let before = connections.len();
            connections.retain(|c| c.id() != id);
            (connections.len() < before, connections.len())
        };

        if removed {
            self.total_closed.fetch_add(1, Ordering::Relaxed);
            metrics::set_ws_active(active);
            debug!(connection_id = %id, active, "Connection removed");
        }
        removed
    }

    /// Check if a connection is registered.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.lock().iter().any(|c| c.id() == id)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    /// Check if no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    /// Snapshot of the registered connections, in open order.
    pub fn connections_alive(&self) -> Vec<Arc<WebSocketConnection>> {
        self.connections.lock().clone()
    }

    /// Get statistics about the registry.
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            active_connections: self.len(),
            total_accepted: self.total_accepted.load(Ordering::Relaxed),
            total_rejected: self.total_rejected.load(Ordering::Relaxed),
            total_closed: self.total_closed.load(Ordering::Relaxed),
            total_reaped: self.total_reaped.load(Ordering::Relaxed),
        }
    }

    /// Send a text frame to every registered connection.
    ///
    /// Returns the number of successful deliveries.
    pub async fn broadcast(&self, text: impl Into<String>) -> usize {
        self.broadcast_frame(Frame::Text(text.into())).await
    }

    /// Send a frame to every registered connection, in open order.
    ///
    /// A connection that fails is closed; delivery to the others goes on.
    pub async fn broadcast_frame(&self, frame: Frame) -> usize {
        let mut delivered = 0;
        for conn in self.connections_alive() {
            match conn.send_frame(frame.clone()).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(connection_id = %conn.id(), error = %e, "Broadcast delivery failed");
                }
            }
        }
        delivered
    }

    /// Evict every connection observed closed.
    ///
    /// With `keepalive_ping` enabled, every survivor is then pinged, all at
    /// once. A ping that fails or is still pending after one reap interval
    /// closes its connection. Returns the number of connections evicted
    /// before the pings.
    pub async fn sweep(&self) -> usize {
        let (dead, active) = {
            let mut connections = self.connections.lock();
            let mut dead = Vec::new();
            connections.retain(|c| {
                if c.is_closed() {
                    dead.push(Arc::clone(c));
                    false
                } else {
                    true
                }
            });
            (dead, connections.len())
        };

        let reaped = dead.len();
        if reaped > 0 {
            self.total_closed.fetch_add(reaped, Ordering::Relaxed);
            self.total_reaped.fetch_add(reaped, Ordering::Relaxed);
            metrics::record_ws_reaped(reaped);
            metrics::set_ws_active(active);
            for conn in dead {
                debug!(connection_id = %conn.id(), "Reaping dead connection");
                conn.close().await;
            }
            info!(count = reaped, active, "Reaped dead connections");
        }

        if self.config.keepalive_ping {
            let deadline = self.config.reap_interval;
            join_all(self.connections_alive().into_iter().map(|conn| async move {
                match tokio::time::timeout(deadline, conn.ping()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(connection_id = %conn.id(), error = %e, "Keep-alive ping failed");
                        conn.close().await;
                    }
                    Err(_) => {
                        debug!(connection_id = %conn.id(), "Keep-alive ping timed out");
                        conn.close().await;
                    }
                }
            }))
            .await;
        }

        reaped
    }

    /// Run the reaping sweep forever at the configured interval.
    pub async fn run_reaper(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.reap_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        debug!(interval_ms = self.config.reap_interval.as_millis() as u64, "Reaper started");

        loop {
            ticker.tick().await;
            self.sweep().await;
        }
    }

    /// Close every registered connection.
    ///
    /// Returns the number of connections closed.
    pub async fn close_all(&self) -> usize {
        let connections = self.connections_alive();
        let count = connections.len();
        if count > 0 {
            info!(connections = count, "Closing all connections");
        }
        for conn in connections {
            conn.close().await;
        }
        count
    }
}

/// Room for one connection, held while its handshake runs.
///
/// Created by [`ConnectionRegistry::try_reserve`].
#[must_use = "dropping the slot releases the reservation"]
pub struct AdmissionSlot {
    registry: Arc<ConnectionRegistry>,
    armed: bool,
}

impl AdmissionSlot {
    /// Registers the connection in the reserved room.
    pub fn open(
        mut self,
        transport: Arc<dyn FrameTransport>,
        remote_addr: Option<SocketAddr>,
        headers: IndexMap<String, String>,
    ) -> Arc<WebSocketConnection> {
        self.armed = false;
        self.registry.register(transport, remote_addr, headers)
    }
}

impl std::fmt::Debug for AdmissionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionSlot")
            .field("armed", &self.armed)
            .finish_non_exhaustive()
    }
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        if self.armed {
            self.registry.pending.fetch_sub(1, Ordering::SeqCst);
            debug!("Admission slot released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use std::time::Duration;

    fn open_mock(registry: &Arc<ConnectionRegistry>) -> (Arc<WebSocketConnection>, Arc<MockTransport>) {
        let transport = MockTransport::with_frames([]);
        let conn = registry
            .open(transport.clone(), None, IndexMap::new())
            .unwrap();
        (conn, transport)
    }

    #[test]
    fn test_is_enough() {
        let registry = ConnectionRegistry::new(2);
        assert!(!registry.is_enough());
        open_mock(&registry);
        assert!(!registry.is_enough());
        open_mock(&registry);
        assert!(registry.is_enough());

        registry.set_max_connections(3);
        assert!(!registry.is_enough());
    }

    #[test]
    fn test_unlimited() {
        for limit in [-1, 0] {
            let registry = ConnectionRegistry::new(limit);
            for _ in 0..10 {
                open_mock(&registry);
            }
            assert!(!registry.is_enough());
            assert_eq!(registry.len(), 10);
        }
    }

    #[test]
    fn test_open_rejects_over_limit() {
        let registry = ConnectionRegistry::new(1);
        open_mock(&registry);

        let err = registry
            .open(MockTransport::with_frames([]), None, IndexMap::new())
            .unwrap_err();
        assert!(matches!(err, WsError::TooManyConnections { limit: 1 }));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.stats().total_rejected, 1);
    }

    #[test]
    fn test_reservation_counts_against_limit() {
        let registry = ConnectionRegistry::new(1);
        let slot = registry.try_reserve().unwrap();

        assert!(registry.is_enough());
        assert!(registry.try_reserve().is_none());
        assert!(registry
            .open(MockTransport::with_frames([]), None, IndexMap::new())
            .is_err());

        let conn = slot.open(MockTransport::with_frames([]), None, IndexMap::new());
        assert!(registry.contains(conn.id()));
        assert_eq!(registry.len(), 1);
        assert!(registry.is_enough());
    }

    #[test]
    fn test_dropped_reservation_frees_room() {
        let registry = ConnectionRegistry::new(1);
        let slot = registry.try_reserve().unwrap();
        assert!(registry.is_enough());

        drop(slot);
        assert!(!registry.is_enough());
        assert!(registry.is_empty());
        open_mock(&registry);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unlimited_reservations() {
        let registry = ConnectionRegistry::new(-1);
        let slots: Vec<AdmissionSlot> = (0..5).filter_map(|_| registry.try_reserve()).collect();
        assert_eq!(slots.len(), 5);
        assert!(!registry.is_enough());
    }

    #[tokio::test]
    async fn test_close_removes_once() {
        let registry = ConnectionRegistry::new(-1);
        let (a, _) = open_mock(&registry);
        let (b, _) = open_mock(&registry);

        a.close().await;
        a.close().await;
        assert!(!registry.contains(a.id()));
        assert!(registry.contains(b.id()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.stats().total_closed, 1);
        assert!(!registry.remove(a.id()));
    }

    #[tokio::test]
    async fn test_freed_slot_admits_next() {
        let registry = ConnectionRegistry::new(1);
        let (a, _) = open_mock(&registry);
        assert!(registry.is_enough());

        a.close().await;
        assert!(!registry.is_enough());
        open_mock(&registry);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_connections_alive_in_open_order() {
        let registry = ConnectionRegistry::new(-1);
        let ids: Vec<ConnectionId> = (0..3).map(|_| open_mock(&registry).0.id()).collect();
        let alive: Vec<ConnectionId> = registry.connections_alive().iter().map(|c| c.id()).collect();
        assert_eq!(alive, ids);
    }

    #[tokio::test]
    async fn test_broadcast_continues_past_failure() {
        let registry = ConnectionRegistry::new(-1);
        let (_, first) = open_mock(&registry);
        let (broken, second) = open_mock(&registry);
        let (_, third) = open_mock(&registry);
        second.fail_writes();

        let delivered = registry.broadcast("news").await;

        assert_eq!(delivered, 2);
        assert_eq!(first.written(), vec![Frame::text("news")]);
        assert_eq!(third.written(), vec![Frame::text("news")]);
        assert!(second.written().is_empty());
        assert!(broken.is_closed());
        assert!(!registry.contains(broken.id()));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_sweep_reaps_dead_sockets() {
        let registry = ConnectionRegistry::new(-1);
        let (alive, _) = open_mock(&registry);
        let (dead, dead_transport) = open_mock(&registry);
        let (beaten, _) = open_mock(&registry);

        dead_transport.drop_peer();
        beaten.heartbeat();

        assert_eq!(registry.sweep().await, 2);
        let ids: Vec<ConnectionId> = registry.connections_alive().iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec![alive.id()]);
        assert!(dead.is_closed());
        assert_eq!(dead_transport.close_calls(), 1);

        let stats = registry.stats();
        assert_eq!(stats.total_reaped, 2);
        assert_eq!(stats.total_closed, 2);
        assert_eq!(stats.active_connections, 1);
    }

    #[tokio::test]
    async fn test_sweep_keepalive_ping() {
        let registry = ConnectionRegistry::with_config(RegistryConfig::new().keepalive_ping(true));
        let (healthy, healthy_transport) = open_mock(&registry);
        let (unreachable, unreachable_transport) = open_mock(&registry);
        unreachable_transport.fail_pings();

        registry.sweep().await;

        assert_eq!(healthy_transport.pings(), 1);
        assert!(!healthy.is_closed());
        assert!(unreachable.is_closed());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_ping_does_not_block_sweep() {
        let registry = ConnectionRegistry::with_config(
            RegistryConfig::new()
                .keepalive_ping(true)
                .reap_interval(Duration::from_secs(1)),
        );
        let (stuck, stuck_transport) = open_mock(&registry);
        let (healthy, healthy_transport) = open_mock(&registry);
        stuck_transport.stall_pings();

        tokio::time::timeout(Duration::from_secs(2), registry.sweep())
            .await
            .expect("sweep should finish within the ping deadline");

        assert!(stuck.is_closed());
        assert!(!registry.contains(stuck.id()));
        assert!(!healthy.is_closed());
        assert_eq!(healthy_transport.pings(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_evicts_within_one_interval() {
        let registry = ConnectionRegistry::with_config(
            RegistryConfig::new().reap_interval(Duration::from_secs(1)),
        );
        let (conn, transport) = open_mock(&registry);
        let reaper = tokio::spawn(Arc::clone(&registry).run_reaper());

        // Let the immediate first tick pass.
        tokio::task::yield_now().await;
        transport.drop_peer();
        assert!(registry.contains(conn.id()));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(!registry.contains(conn.id()));
        assert_eq!(registry.stats().total_reaped, 1);

        reaper.abort();
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = ConnectionRegistry::new(-1);
        let (a, _) = open_mock(&registry);
        let (b, _) = open_mock(&registry);

        assert_eq!(registry.close_all().await, 2);
        assert!(registry.is_empty());
        assert!(a.is_closed() && b.is_closed());
    }
}
