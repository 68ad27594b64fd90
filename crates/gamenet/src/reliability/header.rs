// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 gamenet contributors

//! Fixed 46-byte wire header, little-endian throughout.
//!
//! ```text
//! offset  size  field
//!      0     4  magic "GNET"
//!      4     1  protocol version
//!      5     1  flags
//!      6     4  packet id (u32)
//!     10     4  ack head: newest packet id received from the peer (u32)
//!     14    32  ack bitmap: 8 x u32; bit i refers to packet (ack_head - i)
//! ```
//!
//! Payload length is implied by datagram size; there is no length field.

use crate::config::{ACK_BITMAP_WORDS, PACKET_HEADER_SIZE};
use crate::reliability::{PacketId, SequenceId, INVALID_PACKET_ID};

pub const HEADER_MAGIC: [u8; 4] = *b"GNET";
pub const HEADER_VERSION: u8 = 1;

/// Sender requests loss notification for this packet.
pub const FLAG_RELIABLE: u8 = 0x01;
/// Payload is compressed with the connection's negotiated compressor.
pub const FLAG_COMPRESSED: u8 = 0x02;
/// Keep-alive carrying only the ack snapshot; no payload is delivered.
pub const FLAG_HEARTBEAT: u8 = 0x04;

const FLAG_MASK: u8 = FLAG_RELIABLE | FLAG_COMPRESSED | FLAG_HEARTBEAT;

/// Decoded packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub packet_id: PacketId,
    pub flags: u8,
    /// Newest peer packet id this header acknowledges; [`INVALID_PACKET_ID`]
    /// when the sender has received nothing yet.
    pub ack_head: PacketId,
    pub ack_bitmap: [u32; ACK_BITMAP_WORDS],
}

impl PacketHeader {
    #[must_use]
    pub fn new(
        packet_id: PacketId,
        flags: u8,
        ack_head: PacketId,
        ack_bitmap: [u32; ACK_BITMAP_WORDS],
    ) -> Self {
        Self { packet_id, flags, ack_head, ack_bitmap }
    }

    /// Header with no ack information, for the first packets of a session.
    #[must_use]
    pub fn without_acks(packet_id: PacketId, flags: u8) -> Self {
        Self::new(packet_id, flags, INVALID_PACKET_ID, [0; ACK_BITMAP_WORDS])
    }

    #[must_use]
    pub fn sequence_id(&self) -> SequenceId {
        self.packet_id.sequence()
    }

    #[must_use]
    pub fn is_reliable(&self) -> bool {
        self.flags & FLAG_RELIABLE != 0
    }

    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        self.flags & FLAG_HEARTBEAT != 0
    }

    /// Serialize into the fixed wire layout.
    #[must_use]
    pub fn encode_le(&self) -> [u8; PACKET_HEADER_SIZE] {
        let mut buf = [0u8; PACKET_HEADER_SIZE];
        buf[0..4].copy_from_slice(&HEADER_MAGIC);
        buf[4] = HEADER_VERSION;
        buf[5] = self.flags;
        buf[6..10].copy_from_slice(&self.packet_id.0.to_le_bytes());
        buf[10..14].copy_from_slice(&self.ack_head.0.to_le_bytes());
        for (i, word) in self.ack_bitmap.iter().enumerate() {
            let off = 14 + i * 4;
            buf[off..off + 4].copy_from_slice(&word.to_le_bytes());
        }
        buf
    }

    /// Parse a header from the front of a datagram.
    ///
    /// Returns `None` for short buffers, bad magic, unknown versions, or
    /// undefined flag bits. Malformed input is the normal case on an open
    /// port; the caller counts and drops.
    #[must_use]
    pub fn decode_le(buf: &[u8]) -> Option<Self> {
        if buf.len() < PACKET_HEADER_SIZE {
            return None;
        }
        if buf[0..4] != HEADER_MAGIC || buf[4] != HEADER_VERSION {
            return None;
        }
        let flags = buf[5];
        if flags & !FLAG_MASK != 0 {
            return None;
        }
        let packet_id = PacketId(u32::from_le_bytes(buf[6..10].try_into().ok()?));
        if !packet_id.is_valid() {
            return None;
        }
        let ack_head = PacketId(u32::from_le_bytes(buf[10..14].try_into().ok()?));
        let mut ack_bitmap = [0u32; ACK_BITMAP_WORDS];
        for (i, word) in ack_bitmap.iter_mut().enumerate() {
            let off = 14 + i * 4;
            *word = u32::from_le_bytes(buf[off..off + 4].try_into().ok()?);
        }
        Some(Self { packet_id, flags, ack_head, ack_bitmap })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> PacketHeader {
        let mut bitmap = [0u32; ACK_BITMAP_WORDS];
        bitmap[0] = 0b1011;
        bitmap[7] = 0x8000_0001;
        PacketHeader::new(
            PacketId(0x0001_0042),
            FLAG_RELIABLE | FLAG_COMPRESSED,
            PacketId(0x0001_003F),
            bitmap,
        )
    }

    #[test]
    fn test_encode_layout() {
        let buf = sample_header().encode_le();
        assert_eq!(&buf[0..4], b"GNET");
        assert_eq!(buf[4], HEADER_VERSION);
        assert_eq!(buf[5], FLAG_RELIABLE | FLAG_COMPRESSED);
        assert_eq!(u32::from_le_bytes(buf[6..10].try_into().unwrap()), 0x0001_0042);
        assert_eq!(u32::from_le_bytes(buf[10..14].try_into().unwrap()), 0x0001_003F);
        assert_eq!(u32::from_le_bytes(buf[14..18].try_into().unwrap()), 0b1011);
    }

    #[test]
    fn test_decode_matches_encode() {
        let header = sample_header();
        let decoded = PacketHeader::decode_le(&header.encode_le()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_decode_trailing_payload_ignored() {
        let mut datagram = sample_header().encode_le().to_vec();
        datagram.extend_from_slice(b"payload bytes");
        let decoded = PacketHeader::decode_le(&datagram).unwrap();
        assert_eq!(decoded.packet_id, PacketId(0x0001_0042));
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        let buf = sample_header().encode_le();
        assert!(PacketHeader::decode_le(&buf[..PACKET_HEADER_SIZE - 1]).is_none());
        assert!(PacketHeader::decode_le(&[]).is_none());
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let mut buf = sample_header().encode_le();
        buf[0] = b'X';
        assert!(PacketHeader::decode_le(&buf).is_none());
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let mut buf = sample_header().encode_le();
        buf[4] = HEADER_VERSION + 1;
        assert!(PacketHeader::decode_le(&buf).is_none());
    }

    #[test]
    fn test_decode_rejects_undefined_flags() {
        let mut buf = sample_header().encode_le();
        buf[5] |= 0x80;
        assert!(PacketHeader::decode_le(&buf).is_none());
    }

    #[test]
    fn test_decode_rejects_invalid_packet_id() {
        let mut buf = sample_header().encode_le();
        buf[6..10].copy_from_slice(&0u32.to_le_bytes());
        assert!(PacketHeader::decode_le(&buf).is_none());
    }

    #[test]
    fn test_heartbeat_flag() {
        let header = PacketHeader::without_acks(PacketId(1), FLAG_HEARTBEAT);
        assert!(header.is_heartbeat());
        assert!(!header.is_reliable());
        assert_eq!(header.ack_head, INVALID_PACKET_ID);
    }
}
