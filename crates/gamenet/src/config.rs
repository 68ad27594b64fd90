// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 gamenet contributors

//! Transport configuration: compile-time constants and the construction-time
//! [`NetConfig`] struct.
//!
//! There is deliberately no CLI/runtime flag surface: window capacity, buffer
//! sizes, and intervals are fixed at compile time or passed to
//! [`NetworkSystem::new`](crate::system::NetworkSystem::new).

use std::sync::OnceLock;
use std::time::Duration;

/// Number of packet sequence ids tracked by the ack window.
///
/// 16384 bits = 2 KiB per window, per direction, per connection. Packets
/// older than this are reported as `UnknownTooOld` rather than tracked
/// indefinitely, bounding memory regardless of connection lifetime.
pub const PACKET_WINDOW_ACK_COUNT: usize = 16384;

/// Bits per ack-window storage word.
pub const ACK_WORD_BITS: usize = 32;

/// Storage words backing the full ack window (512 x u32 = 16384 bits).
pub const ACK_WINDOW_WORDS: usize = PACKET_WINDOW_ACK_COUNT / ACK_WORD_BITS;

/// Words of ack bitmap piggy-backed on every outgoing packet header
/// (8 x u32 = 256 bits, the newest slice of the full window).
pub const ACK_BITMAP_WORDS: usize = 8;

/// Bits covered by the piggy-backed ack bitmap.
pub const ACK_BITMAP_BITS: u32 = (ACK_BITMAP_WORDS * ACK_WORD_BITS) as u32;

/// Fixed wire header size in bytes.
///
/// Layout (little-endian): magic(4) + version(1) + flags(1) + packet_id(4)
/// + ack_head(4) + ack_bitmap(32).
pub const PACKET_HEADER_SIZE: usize = 14 + ACK_BITMAP_WORDS * 4;

/// Default maximum application payload per datagram.
///
/// Chosen to keep header + payload under a 1500-byte Ethernet MTU with
/// IPv4/UDP overhead and some margin for tunnels.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1408;

/// Largest datagram the reader thread will ever pull off a socket.
pub const MAX_DATAGRAM_SIZE: usize = 65536;

/// Transport configuration, fixed at system construction.
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// Maximum application payload bytes per datagram.
    pub max_packet_size: usize,
    /// SO_SNDBUF requested for each socket.
    pub send_buffer_size: usize,
    /// SO_RCVBUF requested for each socket.
    pub recv_buffer_size: usize,
    /// Interval between keep-alive/ack heartbeats on idle connections.
    pub heartbeat_interval: Duration,
    /// A connection with no inbound traffic for this long is dropped on the
    /// next `on_system_tick` sweep.
    pub connection_timeout: Duration,
    /// Sleep between reader-thread pump iterations when all sockets are idle.
    pub reader_poll_interval: Duration,
    /// Maximum simultaneous connections per network interface. New peers
    /// beyond this are discarded.
    pub max_connections: usize,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            send_buffer_size: 256 * 1024,
            recv_buffer_size: 256 * 1024,
            heartbeat_interval: Duration::from_secs(1),
            connection_timeout: Duration::from_secs(10),
            reader_poll_interval: Duration::from_micros(500),
            max_connections: 1024,
        }
    }
}

/// Whether OS "connection forcibly closed/reset" receive errors on UDP
/// sockets are treated as benign noise (true) or surfaced as socket errors
/// (false).
///
/// On some platforms an ICMP port-unreachable from a departed peer shows up
/// as ECONNRESET on the *local* socket; tearing the socket down for that is
/// almost never what a game server wants. Set `GAMENET_IGNORE_CONN_RESET=0`
/// to surface these instead. Read once per process.
pub fn ignore_connection_reset() -> bool {
    static KNOB: OnceLock<bool> = OnceLock::new();
    *KNOB.get_or_init(|| {
        std::env::var("GAMENET_IGNORE_CONN_RESET")
            .map(|v| v != "0")
            .unwrap_or(true)
    })
}
