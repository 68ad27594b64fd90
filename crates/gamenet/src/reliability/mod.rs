// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 gamenet contributors

//! Packet-level reliability: ids, the wire header, and the ack window.
//!
//! Every datagram carries a monotonically increasing [`PacketId`]. The low
//! 16 bits form the [`SequenceId`] used for recency decisions; the high 16
//! bits count 16-bit rollovers, so the full id disambiguates packets that
//! share a sequence number across wraps.
//!
//! Protocol flow per connection, per direction:
//!
//! ```text
//!   sender                               receiver
//!     | --- packet(id, ack snapshot) ---> |  update_for_received_packet
//!     | <-- packet(id', ack snapshot) --- |  (snapshot: head id + 256-bit map)
//!   update_for_remote_ack_status          |
//!   (fires on_packet_acked / _lost)       |
//! ```
//!
//! The snapshot rides on every packet, including heartbeats, so acks flow
//! even when one side has nothing to say.

pub mod header;
pub mod window;

use std::sync::atomic::{AtomicU32, Ordering};

/// Window-local 16-bit sequence number (low half of a [`PacketId`]).
pub type SequenceId = u16;

/// Half of the 16-bit sequence space; the recency comparison boundary.
pub const SEQUENCE_HALF_RANGE: u16 = 0x8000;

/// Full 32-bit packet identifier: `rollover_count << 16 | sequence_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PacketId(pub u32);

/// Reserved id meaning "no packet"; generators never produce it, and an
/// ack head of this value carries no ack information.
pub const INVALID_PACKET_ID: PacketId = PacketId(0);

impl PacketId {
    /// Window-local sequence number (low 16 bits).
    #[must_use]
    pub fn sequence(self) -> SequenceId {
        (self.0 & 0xFFFF) as u16
    }

    /// Number of 16-bit sequence rollovers encoded in this id.
    #[must_use]
    pub fn rollover(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// True for any id other than [`INVALID_PACKET_ID`].
    #[must_use]
    pub fn is_valid(self) -> bool {
        self != INVALID_PACKET_ID
    }

    /// The id `distance` packets before this one, wrapping.
    #[must_use]
    pub fn back(self, distance: u32) -> PacketId {
        PacketId(self.0.wrapping_sub(distance))
    }
}

impl std::fmt::Display for PacketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.rollover(), self.sequence())
    }
}

/// True if `a` is more recent than `b` in wrapping 16-bit sequence space.
///
/// Equal sequences are not "newer"; the exact half-range distance (0x8000)
/// is ambiguous and treated as older, which keeps the relation asymmetric.
#[must_use]
pub fn sequence_more_recent(a: SequenceId, b: SequenceId) -> bool {
    let delta = a.wrapping_sub(b);
    delta != 0 && delta < SEQUENCE_HALF_RANGE
}

/// Wrapping distance from `older` forward to `newer`.
#[must_use]
pub fn sequence_distance(newer: SequenceId, older: SequenceId) -> u16 {
    newer.wrapping_sub(older)
}

/// Lock-free packet id source, one per connection direction.
///
/// Ids start at 1 and increment with relaxed atomics; ordering across
/// threads is supplied by the send path that consumes the id, not by the
/// counter itself. The reserved id 0 is skipped at the 32-bit wrap.
#[derive(Debug)]
pub struct PacketIdGenerator {
    next: AtomicU32,
}

impl PacketIdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self { next: AtomicU32::new(1) }
    }

    /// Allocate the next id.
    pub fn next(&self) -> PacketId {
        loop {
            let id = self.next.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return PacketId(id);
            }
        }
    }

    /// The id that `next()` would return, without consuming it.
    #[must_use]
    pub fn peek(&self) -> PacketId {
        PacketId(self.next.load(Ordering::Relaxed))
    }
}

impl Default for PacketIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
