// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 gamenet contributors

//! Named network interface: one socket, a connection table, and the
//! application listener.
//!
//! A UDP interface owns a bound socket and a peer-keyed table of
//! [`Connection`]s. The reader thread feeds inbound datagrams into
//! [`handle_datagram`](NetworkInterface::handle_datagram); the game thread
//! calls [`send`](NetworkInterface::send); the heartbeat thread calls
//! [`send_heartbeats`](NetworkInterface::send_heartbeats). A TCP interface
//! has no socket here; its listener lives in the listen thread and accepted
//! streams are parked in the interface until the application takes them.
//!
//! Listener callbacks are always invoked after internal locks are
//! released, so a callback may call straight back into `send`.

use crate::compress::{CompressError, Compressor};
use crate::config::{NetConfig, PACKET_HEADER_SIZE};
use crate::connection::{
    AckVerdicts, Connection, ConnectionListener, ConnectionStats, DisconnectReason,
};
use crate::reliability::header::{PacketHeader, FLAG_COMPRESSED, FLAG_HEARTBEAT, FLAG_RELIABLE};
use crate::reliability::window::PacketAckState;
use crate::reliability::PacketId;
use crate::transport::{is_would_block, ProtocolType, TcpSocket, TrustZone, UdpSocket};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Payloads below this size are never worth compressing.
const COMPRESS_THRESHOLD: usize = 64;

/// Errors surfaced by the interface and system surfaces.
#[derive(Debug)]
pub enum NetworkError {
    Io(io::Error),
    DuplicateInterface(String),
    InterfaceNotFound(String),
    ConnectionNotFound(SocketAddr),
    ConnectionLimit(usize),
    PayloadTooLarge { len: usize, max: usize },
    UnknownCompressor(String),
    Compression(CompressError),
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "socket error: {err}"),
            Self::DuplicateInterface(name) => write!(f, "interface already exists: {name}"),
            Self::InterfaceNotFound(name) => write!(f, "no such interface: {name}"),
            Self::ConnectionNotFound(addr) => write!(f, "no connection to {addr}"),
            Self::ConnectionLimit(max) => write!(f, "connection limit reached ({max})"),
            Self::PayloadTooLarge { len, max } => {
                write!(f, "payload of {len} bytes exceeds max of {max}")
            }
            Self::UnknownCompressor(name) => write!(f, "no compressor factory named {name}"),
            Self::Compression(err) => write!(f, "compression error: {err}"),
        }
    }
}

impl std::error::Error for NetworkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Compression(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for NetworkError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<CompressError> for NetworkError {
    fn from(err: CompressError) -> Self {
        Self::Compression(err)
    }
}

/// Interface-wide traffic counters, updated lock-free from the I/O threads.
#[derive(Debug, Default)]
pub struct InterfaceStats {
    packets_sent: AtomicU64,
    packets_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    packets_discarded: AtomicU64,
    heartbeats_sent: AtomicU64,
}

/// Point-in-time copy of [`InterfaceStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterfaceStatsSnapshot {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_discarded: u64,
    pub heartbeats_sent: u64,
}

impl InterfaceStats {
    #[must_use]
    pub fn snapshot(&self) -> InterfaceStatsSnapshot {
        InterfaceStatsSnapshot {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            packets_discarded: self.packets_discarded.load(Ordering::Relaxed),
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
        }
    }

    fn discard(&self) {
        self.packets_discarded.fetch_add(1, Ordering::Relaxed);
    }
}

/// A named transport endpoint with its connection table.
pub struct NetworkInterface {
    name: String,
    protocol: ProtocolType,
    trust_zone: TrustZone,
    config: NetConfig,
    /// Bound socket for UDP interfaces; `None` for TCP, whose listener is
    /// owned by the listen thread.
    socket: Option<UdpSocket>,
    /// Set by the reader thread on a hard socket error; the interface
    /// stops being serviced but stays queryable until destroyed.
    socket_failed: AtomicBool,
    /// Local address of the TCP listener, recorded at creation.
    listen_addr: Option<SocketAddr>,
    connections: Mutex<HashMap<SocketAddr, Connection>>,
    /// Accepted TCP streams parked until the application claims them.
    tcp_streams: Mutex<HashMap<SocketAddr, TcpSocket>>,
    listener: Arc<dyn ConnectionListener>,
    stats: InterfaceStats,
}

impl NetworkInterface {
    pub(crate) fn new_udp(
        name: String,
        trust_zone: TrustZone,
        port: u16,
        config: NetConfig,
        listener: Arc<dyn ConnectionListener>,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(port, &config)?;
        log::info!(
            "[NET] interface created name={} protocol=udp local_addr={:?}",
            name,
            socket.local_addr()
        );
        Ok(Self {
            name,
            protocol: ProtocolType::Udp,
            trust_zone,
            config,
            socket: Some(socket),
            socket_failed: AtomicBool::new(false),
            listen_addr: None,
            connections: Mutex::new(HashMap::new()),
            tcp_streams: Mutex::new(HashMap::new()),
            listener,
            stats: InterfaceStats::default(),
        })
    }

    pub(crate) fn new_tcp(
        name: String,
        trust_zone: TrustZone,
        listen_addr: SocketAddr,
        config: NetConfig,
        listener: Arc<dyn ConnectionListener>,
    ) -> Self {
        log::info!("[NET] interface created name={name} protocol=tcp listen_addr={listen_addr}");
        Self {
            name,
            protocol: ProtocolType::Tcp,
            trust_zone,
            config,
            socket: None,
            socket_failed: AtomicBool::new(false),
            listen_addr: Some(listen_addr),
            connections: Mutex::new(HashMap::new()),
            tcp_streams: Mutex::new(HashMap::new()),
            listener,
            stats: InterfaceStats::default(),
        }
    }

    // ===== Accessors =====

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn protocol(&self) -> ProtocolType {
        self.protocol
    }

    #[must_use]
    pub fn trust_zone(&self) -> TrustZone {
        self.trust_zone
    }

    /// Bound address: the UDP socket's, or the TCP listener's.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self.protocol {
            ProtocolType::Udp => self.socket.as_ref().and_then(UdpSocket::local_addr),
            ProtocolType::Tcp => self.listen_addr,
        }
    }

    #[must_use]
    pub fn stats(&self) -> InterfaceStatsSnapshot {
        self.stats.snapshot()
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    #[must_use]
    pub fn connection_stats(&self, remote: SocketAddr) -> Option<ConnectionStats> {
        self.connections.lock().get(&remote).map(|c| c.stats.clone())
    }

    pub(crate) fn udp_socket(&self) -> Option<&UdpSocket> {
        self.socket.as_ref()
    }

    pub(crate) fn is_serviceable(&self) -> bool {
        self.socket.is_some() && !self.socket_failed.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_socket_failed(&self) {
        if !self.socket_failed.swap(true, Ordering::Relaxed) {
            log::error!("[NET] socket failed, interface no longer serviced name={}", self.name);
        }
    }

    // ===== Connection lifecycle =====

    /// Open a connection to `remote`. Idempotent: reconnecting to an
    /// existing peer is a no-op.
    pub fn connect(&self, remote: SocketAddr) -> Result<(), NetworkError> {
        let inserted = {
            let mut connections = self.connections.lock();
            if connections.contains_key(&remote) {
                false
            } else {
                if connections.len() >= self.config.max_connections {
                    return Err(NetworkError::ConnectionLimit(self.config.max_connections));
                }
                connections.insert(remote, Connection::new(remote));
                true
            }
        };
        if inserted {
            log::debug!("[NET] connect name={} remote={remote}", self.name);
            self.listener.on_connect(remote);
        }
        Ok(())
    }

    /// Drop the connection to `remote`, firing `on_disconnect`. Returns
    /// `false` if there was none.
    pub fn disconnect(&self, remote: SocketAddr, reason: DisconnectReason) -> bool {
        let removed = self.connections.lock().remove(&remote).is_some();
        self.tcp_streams.lock().remove(&remote);
        if removed {
            log::debug!("[NET] disconnect name={} remote={remote} reason={reason}", self.name);
            self.listener.on_disconnect(remote, reason);
        }
        removed
    }

    /// Drop every connection, firing `on_disconnect` for each.
    pub fn disconnect_all(&self, reason: DisconnectReason) -> usize {
        let drained: Vec<SocketAddr> = {
            let mut connections = self.connections.lock();
            connections.drain().map(|(addr, _)| addr).collect()
        };
        self.tcp_streams.lock().clear();
        for addr in &drained {
            self.listener.on_disconnect(*addr, reason);
        }
        drained.len()
    }

    /// Remove connections with no inbound traffic for `timeout`; returns
    /// how many were dropped.
    pub(crate) fn sweep_timeouts(&self, now: Instant, timeout: Duration) -> usize {
        let expired: Vec<SocketAddr> = {
            let mut connections = self.connections.lock();
            let expired: Vec<SocketAddr> = connections
                .values()
                .filter(|c| c.is_timed_out(now, timeout))
                .map(|c| c.remote)
                .collect();
            for addr in &expired {
                connections.remove(addr);
            }
            expired
        };
        for addr in &expired {
            log::debug!("[NET] connection timed out name={} remote={addr}", self.name);
            self.tcp_streams.lock().remove(addr);
            self.listener.on_disconnect(*addr, DisconnectReason::Timeout);
        }
        expired.len()
    }

    // ===== Send path =====

    /// Send `payload` to a connected peer. Returns the assigned packet id;
    /// with `reliable`, delivery verdicts for it arrive later via
    /// `on_packet_acked` / `on_packet_lost`.
    pub fn send(
        &self,
        remote: SocketAddr,
        payload: &[u8],
        reliable: bool,
    ) -> Result<PacketId, NetworkError> {
        if payload.len() > self.config.max_packet_size {
            return Err(NetworkError::PayloadTooLarge {
                len: payload.len(),
                max: self.config.max_packet_size,
            });
        }
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "not a datagram interface"))?;

        let mut connections = self.connections.lock();
        let connection = connections
            .get_mut(&remote)
            .ok_or(NetworkError::ConnectionNotFound(remote))?;

        let packet_id = connection.id_generator.next();
        let (ack_head, ack_bitmap) = connection.received_window.most_recent_ack_state();
        let mut flags = if reliable { FLAG_RELIABLE } else { 0 };

        let mut compressed_body: Option<Vec<u8>> = None;
        if let Some(compressor) = connection.compressor.as_mut() {
            if payload.len() >= COMPRESS_THRESHOLD && payload.len() <= compressor.max_chunk_size() {
                let mut scratch = vec![0u8; compressor.max_compressed_size(payload.len())];
                match compressor.compress(payload, &mut scratch) {
                    // Ratio gate: only ship compressed bytes when they
                    // actually beat the original.
                    Ok(written) if written < payload.len() => {
                        scratch.truncate(written);
                        compressed_body = Some(scratch);
                        flags |= FLAG_COMPRESSED;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        log::warn!(
                            "[NET] compression failed, sending raw name={} remote={remote} err={err}",
                            self.name
                        );
                    }
                }
            }
        }

        let header = PacketHeader::new(packet_id, flags, ack_head, ack_bitmap);
        let body = compressed_body.as_deref().unwrap_or(payload);
        let mut datagram = Vec::with_capacity(PACKET_HEADER_SIZE + body.len());
        datagram.extend_from_slice(&header.encode_le());
        datagram.extend_from_slice(body);

        let sent = socket.send_to(&datagram, remote)?;
        if sent != datagram.len() {
            return Err(io::Error::new(io::ErrorKind::Other, "short datagram send").into());
        }

        connection.last_send = Instant::now();
        connection.stats.packets_sent += 1;
        connection.stats.bytes_sent += datagram.len() as u64;
        self.stats.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes_sent.fetch_add(datagram.len() as u64, Ordering::Relaxed);
        Ok(packet_id)
    }

    /// Emit a heartbeat to every connection idle for `interval` or longer.
    /// Heartbeats consume packet ids and carry the ack snapshot, keeping
    /// verdicts flowing on one-way traffic patterns.
    pub(crate) fn send_heartbeats(&self, now: Instant, interval: Duration) -> usize {
        let Some(socket) = self.socket.as_ref() else {
            return 0;
        };
        if self.socket_failed.load(Ordering::Relaxed) {
            return 0;
        }
        let mut sent = 0u64;
        let mut connections = self.connections.lock();
        for connection in connections.values_mut() {
            if now.duration_since(connection.last_send) < interval {
                continue;
            }
            let packet_id = connection.id_generator.next();
            let (ack_head, ack_bitmap) = connection.received_window.most_recent_ack_state();
            let header = PacketHeader::new(packet_id, FLAG_HEARTBEAT, ack_head, ack_bitmap);
            match socket.send_to(&header.encode_le(), connection.remote) {
                Ok(_) => {
                    connection.last_send = now;
                    connection.stats.packets_sent += 1;
                    connection.stats.bytes_sent += PACKET_HEADER_SIZE as u64;
                    sent += 1;
                }
                Err(err) if is_would_block(&err) => {}
                Err(err) => {
                    log::debug!(
                        "[NET] heartbeat send failed name={} remote={} err={err}",
                        self.name,
                        connection.remote
                    );
                }
            }
        }
        drop(connections);
        if sent > 0 {
            self.stats.heartbeats_sent.fetch_add(sent, Ordering::Relaxed);
            self.stats.packets_sent.fetch_add(sent, Ordering::Relaxed);
        }
        sent as usize
    }

    // ===== Receive path =====

    /// Process one inbound datagram. Called from the reader thread; all
    /// listener callbacks fire after the connection table is unlocked.
    pub(crate) fn handle_datagram(&self, data: &[u8], from: SocketAddr) {
        let Some(header) = PacketHeader::decode_le(data) else {
            log::debug!("[NET] malformed datagram name={} from={from} len={}", self.name, data.len());
            self.stats.discard();
            return;
        };
        let wire_payload = &data[PACKET_HEADER_SIZE..];
        if wire_payload.len() > self.config.max_packet_size {
            self.stats.discard();
            return;
        }

        let mut new_connection = false;
        let mut verdicts = AckVerdicts::default();
        let delivered: Option<Vec<u8>>;
        {
            let mut connections = self.connections.lock();
            if !connections.contains_key(&from) {
                // An unknown sender opens a connection implicitly, except
                // that untrusted zones ignore bare heartbeats so idle
                // scans cannot populate the table.
                if self.trust_zone == TrustZone::ExternalClient && header.is_heartbeat() {
                    self.stats.discard();
                    return;
                }
                if connections.len() >= self.config.max_connections {
                    self.stats.discard();
                    return;
                }
                connections.insert(from, Connection::new(from));
                new_connection = true;
            }
            let connection = match connections.get_mut(&from) {
                Some(c) => c,
                None => return,
            };

            if !connection.received_window.update_for_received_packet(&header) {
                connection.stats.packets_discarded += 1;
                self.stats.discard();
                return;
            }
            // The peer can only ack ids this side issued; the generator's
            // next unissued id bounds what a genuine snapshot may claim.
            let newest_sent = connection.id_generator.peek().back(1);
            if !connection.acked_window.update_for_remote_ack_status(
                &header,
                newest_sent,
                &mut verdicts,
            ) {
                connection.stats.packets_discarded += 1;
                self.stats.discard();
                return;
            }
            connection.stats.packets_acked += verdicts.acked.len() as u64;
            connection.stats.packets_lost += verdicts.lost.len() as u64;
            connection.last_recv = Instant::now();
            connection.stats.packets_received += 1;
            connection.stats.bytes_received += data.len() as u64;

            delivered = if header.is_heartbeat() {
                None
            } else if header.is_compressed() {
                match connection.compressor.as_mut() {
                    Some(compressor) => {
                        let mut output = vec![0u8; self.config.max_packet_size];
                        match compressor.decompress(wire_payload, &mut output) {
                            Ok(counts) => {
                                output.truncate(counts.produced);
                                Some(output)
                            }
                            Err(err) => {
                                log::debug!(
                                    "[NET] dropping undecompressable payload name={} from={from} err={err}",
                                    self.name
                                );
                                connection.stats.packets_discarded += 1;
                                self.stats.discard();
                                None
                            }
                        }
                    }
                    None => {
                        log::debug!(
                            "[NET] compressed packet but no compressor attached name={} from={from}",
                            self.name
                        );
                        connection.stats.packets_discarded += 1;
                        self.stats.discard();
                        None
                    }
                }
            } else {
                Some(wire_payload.to_vec())
            };
        }

        self.stats.packets_received.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes_received.fetch_add(data.len() as u64, Ordering::Relaxed);

        if new_connection {
            self.listener.on_connect(from);
        }
        for packet_id in verdicts.acked {
            self.listener.on_packet_acked(from, packet_id);
        }
        for packet_id in verdicts.lost {
            self.listener.on_packet_lost(from, packet_id);
        }
        if let Some(payload) = delivered {
            self.listener.on_packet_received(from, &payload);
        }
    }

    // ===== Queries =====

    /// Delivery verdict for a packet previously sent to `remote`.
    #[must_use]
    pub fn ack_status(&self, remote: SocketAddr, packet_id: PacketId) -> Option<PacketAckState> {
        self.connections
            .lock()
            .get(&remote)
            .map(|c| c.acked_window.get_packet_ack_status(packet_id))
    }

    /// Attach a compressor to an existing connection. Both ends must
    /// attach the same algorithm. Returns `false` for unknown peers.
    pub fn attach_compressor(
        &self,
        remote: SocketAddr,
        compressor: Box<dyn Compressor>,
    ) -> bool {
        match self.connections.lock().get_mut(&remote) {
            Some(connection) => {
                log::debug!(
                    "[NET] compressor attached name={} remote={remote} type={}",
                    self.name,
                    compressor.compressor_type()
                );
                connection.compressor = Some(compressor);
                true
            }
            None => false,
        }
    }

    // ===== TCP accept handoff =====

    /// Park an accepted TCP stream and announce the connection. Called
    /// from the system tick while draining the listen thread's queue.
    pub(crate) fn adopt_tcp_stream(&self, remote: SocketAddr, socket: TcpSocket) {
        {
            let mut connections = self.connections.lock();
            if connections.len() >= self.config.max_connections {
                log::debug!(
                    "[NET] rejecting accepted stream over connection limit name={} remote={remote}",
                    self.name
                );
                return;
            }
            connections.entry(remote).or_insert_with(|| Connection::new(remote));
            self.tcp_streams.lock().insert(remote, socket);
        }
        self.listener.on_connect(remote);
    }

    /// Claim ownership of an accepted TCP stream.
    #[must_use]
    pub fn take_tcp_stream(&self, remote: SocketAddr) -> Option<TcpSocket> {
        self.tcp_streams.lock().remove(&remote)
    }
}

/// Name-keyed table of live interfaces, shared between the façade and the
/// I/O threads. Low churn: interfaces are created at startup and destroyed
/// at teardown, so a reader-writer lock over a plain map is enough.
pub(crate) struct InterfaceRegistry {
    interfaces: parking_lot::RwLock<HashMap<String, Arc<NetworkInterface>>>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self { interfaces: parking_lot::RwLock::new(HashMap::new()) }
    }

    /// Returns `false` without replacing if the name is taken.
    pub fn insert(&self, interface: Arc<NetworkInterface>) -> bool {
        let mut interfaces = self.interfaces.write();
        if interfaces.contains_key(interface.name()) {
            return false;
        }
        interfaces.insert(interface.name().to_owned(), interface);
        true
    }

    pub fn remove(&self, name: &str) -> Option<Arc<NetworkInterface>> {
        self.interfaces.write().remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<NetworkInterface>> {
        self.interfaces.read().get(name).cloned()
    }

    /// Interfaces with a healthy UDP socket, for the reader and heartbeat
    /// pumps.
    pub fn serviceable_udp(&self) -> Vec<Arc<NetworkInterface>> {
        self.interfaces
            .read()
            .values()
            .filter(|i| i.is_serviceable())
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<Arc<NetworkInterface>> {
        self.interfaces.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.interfaces.read().len()
    }
}

impl std::fmt::Debug for NetworkInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkInterface")
            .field("name", &self.name)
            .field("protocol", &self.protocol)
            .field("trust_zone", &self.trust_zone)
            .field("local_addr", &self.local_addr())
            .field("connections", &self.connection_count())
            .finish()
    }
}
