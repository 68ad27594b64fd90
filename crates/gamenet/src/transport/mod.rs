// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 gamenet contributors

//! Socket wrappers over non-blocking OS sockets.
//!
//! All sockets are created non-blocking; the I/O threads drain them until
//! the OS reports would-block and sleep briefly between pump iterations.
//! Wrappers own their descriptor through an `Option`, so `close` is
//! idempotent and ownership can be moved between wrappers without closing
//! the underlying descriptor (see
//! [`UdpSocket::clone_and_take_ownership`]).

pub mod tcp;
pub mod udp;

pub use tcp::{TcpListenSocket, TcpSocket};
pub use udp::UdpSocket;

use std::io;

/// Which transport an interface speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolType {
    /// Datagram transport with the packet-id reliability layer on top.
    Udp,
    /// Stream transport; the listen thread accepts and hands off sockets.
    Tcp,
}

impl std::fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolType::Udp => f.write_str("udp"),
            ProtocolType::Tcp => f.write_str("tcp"),
        }
    }
}

/// How much an interface trusts its peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrustZone {
    /// Peers are our own infrastructure; unknown senders may open a
    /// connection with any packet.
    TrustedHost,
    /// Peers are player machines; bare heartbeats from unknown senders are
    /// dropped so an idle scan cannot populate the connection table.
    ExternalClient,
}

/// True for the error kinds a non-blocking pump treats as "no data right
/// now" rather than a failure.
#[must_use]
pub fn is_would_block(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
}

/// True for reset-class errors a UDP socket can report when a peer vanished
/// (ICMP port unreachable surfacing as ECONNRESET on some platforms).
#[must_use]
pub fn is_connection_reset(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
    )
}
