// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 gamenet contributors

//! Per-peer connection state and the application-facing event trait.

use crate::compress::Compressor;
use crate::reliability::window::{AckCallbacks, PacketIdWindow};
use crate::reliability::{PacketId, PacketIdGenerator};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Why a connection went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// No inbound traffic within the configured timeout.
    Timeout,
    /// The peer signalled or the OS reported the remote end gone.
    RemoteClosed,
    /// The application asked for the disconnect.
    LocalRequest,
    /// A socket-level failure made the connection unusable.
    TransportError,
    /// The owning interface or system is shutting down.
    Shutdown,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
            Self::RemoteClosed => f.write_str("remote closed"),
            Self::LocalRequest => f.write_str("local request"),
            Self::TransportError => f.write_str("transport error"),
            Self::Shutdown => f.write_str("shutdown"),
        }
    }
}

/// Application callbacks for connection lifecycle and traffic.
///
/// Invoked from the I/O threads, never while internal locks are held, so
/// implementations may call back into the interface (to reply, for
/// instance) without deadlocking. Implementations must be cheap; a slow
/// callback stalls the reader pump.
pub trait ConnectionListener: Send + Sync {
    fn on_connect(&self, remote: SocketAddr);

    fn on_disconnect(&self, remote: SocketAddr, reason: DisconnectReason);

    /// A data payload arrived (already decompressed). Heartbeats are not
    /// delivered here.
    fn on_packet_received(&self, remote: SocketAddr, payload: &[u8]);

    /// The peer confirmed delivery of a packet we sent. Fires at most once
    /// per packet id.
    ///
    /// Verdicts cover every id the connection put on the wire, including
    /// transport heartbeats, so ids that no `send` call returned may
    /// appear here. Match against the ids you hold and ignore the rest.
    fn on_packet_acked(&self, remote: SocketAddr, packet_id: PacketId) {
        let _ = (remote, packet_id);
    }

    /// A packet we sent fell out of the peer's ack window without ever
    /// being reported; treat it as lost. Fires at most once per packet id,
    /// for heartbeat ids as well as `send` ids (see
    /// [`on_packet_acked`](Self::on_packet_acked)).
    fn on_packet_lost(&self, remote: SocketAddr, packet_id: PacketId) {
        let _ = (remote, packet_id);
    }
}

/// Per-connection traffic counters.
#[derive(Debug, Clone, Default)]
pub struct ConnectionStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_acked: u64,
    pub packets_lost: u64,
    pub packets_discarded: u64,
}

/// State for one remote peer, owned by its interface's connection table.
pub(crate) struct Connection {
    pub remote: SocketAddr,
    /// Inbound ids from the peer; its snapshot rides on our headers.
    pub received_window: PacketIdWindow,
    /// Delivery verdicts for ids we sent, merged from the peer's snapshots.
    pub acked_window: PacketIdWindow,
    pub id_generator: PacketIdGenerator,
    pub compressor: Option<Box<dyn Compressor>>,
    pub last_send: Instant,
    pub last_recv: Instant,
    pub stats: ConnectionStats,
}

impl Connection {
    pub fn new(remote: SocketAddr) -> Self {
        let now = Instant::now();
        Self {
            remote,
            received_window: PacketIdWindow::new(),
            acked_window: PacketIdWindow::new(),
            id_generator: PacketIdGenerator::new(),
            compressor: None,
            last_send: now,
            last_recv: now,
            stats: ConnectionStats::default(),
        }
    }

    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.duration_since(self.last_recv) >= timeout
    }
}

/// Collects merge verdicts while the connection table lock is held, so the
/// listener can be invoked after it is released.
#[derive(Default)]
pub(crate) struct AckVerdicts {
    pub acked: Vec<PacketId>,
    pub lost: Vec<PacketId>,
}

impl AckCallbacks for AckVerdicts {
    fn on_packet_acked(&mut self, packet_id: PacketId) {
        self.acked.push(packet_id);
    }

    fn on_packet_lost(&mut self, packet_id: PacketId) {
        self.lost.push(packet_id);
    }
}
