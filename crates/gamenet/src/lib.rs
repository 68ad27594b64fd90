// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 gamenet contributors

//! Reliable UDP transport for game networking.
//!
//! gamenet layers packet-id tracking, ack bitmaps, and loss notification
//! over non-blocking UDP sockets, pumped by plain OS threads rather than an
//! async runtime. Every datagram carries a 46-byte header with the sender's
//! packet id and an ack snapshot of the newest 256 ids received, so
//! delivery verdicts ride for free on return traffic (or on heartbeats when
//! a connection goes quiet). There is no retransmission built in: the
//! application hears `on_packet_acked` / `on_packet_lost` exactly once per
//! packet and decides what is still worth resending.
//!
//! # Quick start
//!
//! ```no_run
//! use gamenet::{NetConfig, NetworkSystem, ProtocolType, TrustZone};
//! use gamenet::{ConnectionListener, DisconnectReason};
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//!
//! struct Game;
//!
//! impl ConnectionListener for Game {
//!     fn on_connect(&self, remote: SocketAddr) {
//!         println!("{remote} connected");
//!     }
//!     fn on_disconnect(&self, remote: SocketAddr, reason: DisconnectReason) {
//!         println!("{remote} gone: {reason}");
//!     }
//!     fn on_packet_received(&self, _remote: SocketAddr, payload: &[u8]) {
//!         println!("got {} bytes", payload.len());
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let system = NetworkSystem::new(NetConfig::default())?;
//! let interface = system.create_network_interface(
//!     "game",
//!     ProtocolType::Udp,
//!     TrustZone::ExternalClient,
//!     27015,
//!     Arc::new(Game),
//! )?;
//! let peer: SocketAddr = "203.0.113.7:27015".parse()?;
//! interface.connect(peer)?;
//! interface.send(peer, b"hello", true)?;
//! loop {
//!     system.on_system_tick();
//!     # break;
//!     // ... run a frame ...
//! }
//! # Ok(())
//! # }
//! ```

pub mod compress;
pub mod config;
pub mod connection;
pub mod interface;
pub mod io;
pub mod reliability;
pub mod system;
pub mod transport;

pub use compress::{
    CompressError, Compressor, CompressorFactory, CompressorRegistry, CompressorType,
    DecompressCounts,
};
pub use config::{NetConfig, PACKET_HEADER_SIZE, PACKET_WINDOW_ACK_COUNT};
pub use connection::{ConnectionListener, ConnectionStats, DisconnectReason};
pub use interface::{InterfaceStatsSnapshot, NetworkError, NetworkInterface};
pub use reliability::window::{PacketAckState, PacketIdWindow};
pub use reliability::{PacketId, SequenceId, INVALID_PACKET_ID};
pub use system::NetworkSystem;
pub use transport::{ProtocolType, TrustZone};
