// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 gamenet contributors

//! Fixed-size ring bitset tracking which packet ids have been seen.
//!
//! A [`PacketIdWindow`] covers the most recent [`PACKET_WINDOW_ACK_COUNT`]
//! ids ending at its head. Each connection keeps two: one fed by
//! [`update_for_received_packet`](PacketIdWindow::update_for_received_packet)
//! to record inbound ids (its snapshot rides on outgoing headers), and one
//! fed by
//! [`update_for_remote_ack_status`](PacketIdWindow::update_for_remote_ack_status)
//! to merge the peer's snapshots about our own sent ids, firing ack/lost
//! callbacks exactly once per id.
//!
//! Memory is constant regardless of connection lifetime: 2 KiB of bits plus
//! a few words of head bookkeeping.

use crate::config::{ACK_BITMAP_BITS, ACK_BITMAP_WORDS, ACK_WINDOW_WORDS, PACKET_WINDOW_ACK_COUNT};
use crate::reliability::header::PacketHeader;
use crate::reliability::{
    sequence_distance, sequence_more_recent, PacketId, SequenceId, INVALID_PACKET_ID,
};

/// What the window knows about a single packet id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketAckState {
    /// Seen (received side) or confirmed delivered (sent side).
    Acked,
    /// Inside the window with its bit clear: skipped or lost. The bit is
    /// authoritative; the window cannot tell the two apart and
    /// retransmission logic does not need it to.
    Nacked,
    /// Newer than anything the window has tracked; still in flight.
    UnknownTooNew,
    /// Aged out of the window; no information retained.
    UnknownTooOld,
}

/// Receiver of exactly-once delivery verdicts from a remote-ack merge.
pub trait AckCallbacks {
    fn on_packet_acked(&mut self, packet_id: PacketId);
    fn on_packet_lost(&mut self, packet_id: PacketId);
}

/// Ring bitset over the last [`PACKET_WINDOW_ACK_COUNT`] packet ids.
pub struct PacketIdWindow {
    /// False until the first packet (or first remote snapshot) is observed.
    tracking: bool,
    head_packet_id: PacketId,
    head_sequence_id: SequenceId,
    sequence_rollover_count: u32,
    /// Newest id already run through the remote-ack merge; guards the
    /// exactly-once callback contract against replayed or reordered
    /// snapshots.
    last_remote_processed: PacketId,
    bits: [u32; ACK_WINDOW_WORDS],
}

impl PacketIdWindow {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tracking: false,
            head_packet_id: INVALID_PACKET_ID,
            head_sequence_id: 0,
            sequence_rollover_count: 0,
            last_remote_processed: INVALID_PACKET_ID,
            bits: [0; ACK_WINDOW_WORDS],
        }
    }

    /// Forget everything; the next packet observed starts a new session.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Newest id the window has tracked, [`INVALID_PACKET_ID`] before the
    /// first packet.
    #[must_use]
    pub fn head_packet_id(&self) -> PacketId {
        if self.tracking {
            self.head_packet_id
        } else {
            INVALID_PACKET_ID
        }
    }

    #[must_use]
    pub fn head_sequence_id(&self) -> SequenceId {
        self.head_sequence_id
    }

    /// 16-bit sequence wraps observed since tracking began.
    #[must_use]
    pub fn sequence_rollover_count(&self) -> u32 {
        self.sequence_rollover_count
    }

    /// Record an inbound packet id. Returns `false` if the id is not
    /// plausible for this session and the datagram should be discarded:
    /// a forward jump of a full window or more, or an id that has already
    /// aged out. The first packet of a session is always accepted.
    pub fn update_for_received_packet(&mut self, header: &PacketHeader) -> bool {
        let sequence = header.sequence_id();
        if !self.tracking {
            self.tracking = true;
            self.head_packet_id = header.packet_id;
            self.head_sequence_id = sequence;
            self.sequence_rollover_count = u32::from(header.packet_id.rollover());
            self.set_bit(header.packet_id);
            return true;
        }

        if sequence_more_recent(sequence, self.head_sequence_id) {
            let delta = sequence_distance(sequence, self.head_sequence_id);
            if usize::from(delta) >= PACKET_WINDOW_ACK_COUNT {
                log::debug!(
                    "[ACK] rejecting forward jump of {} past head {}",
                    delta,
                    self.head_packet_id
                );
                return false;
            }
            self.advance_head(u32::from(delta));
            self.set_bit(self.head_packet_id);
            return true;
        }

        // Same as head (duplicate) or older: the distance back decides
        // whether it still fits in the window.
        let behind = sequence_distance(self.head_sequence_id, sequence);
        if usize::from(behind) >= PACKET_WINDOW_ACK_COUNT {
            return false;
        }
        self.set_bit(self.head_packet_id.back(u32::from(behind)));
        true
    }

    /// Merge the peer's ack snapshot about ids *we* sent, firing one
    /// [`AckCallbacks`] verdict per newly covered id.
    ///
    /// `newest_sent` is the newest id this side has actually put on the
    /// wire. A peer can only ack ids we issued, so a snapshot whose head
    /// is ahead of `newest_sent` is forged; it is rejected (`false`)
    /// without touching the window, and the caller discards the datagram.
    ///
    /// Ids in `(last processed, ack_head]` whose bitmap bit is set are
    /// acked; ids with a clear bit, or that fell off the back of the
    /// 256-bit snapshot before ever being reported, are lost. A snapshot
    /// whose head is not newer than the last one processed is a no-op, so
    /// duplicated or reordered datagrams never re-fire callbacks.
    pub fn update_for_remote_ack_status(
        &mut self,
        header: &PacketHeader,
        newest_sent: PacketId,
        callbacks: &mut dyn AckCallbacks,
    ) -> bool {
        let remote_head = header.ack_head;
        if !remote_head.is_valid() {
            return true;
        }
        if !newest_sent.is_valid() {
            // Nothing sent yet, so there is nothing the peer could ack.
            log::debug!("[ACK] rejecting ack head {} before any id was issued", remote_head);
            return false;
        }
        let past_sent = remote_head.0.wrapping_sub(newest_sent.0);
        if past_sent != 0 && past_sent < u32::MAX / 2 {
            log::debug!(
                "[ACK] rejecting forged ack head {} past newest sent {}",
                remote_head,
                newest_sent
            );
            return false;
        }

        let span = remote_head.0.wrapping_sub(self.last_remote_processed.0);
        if span == 0 || span >= u32::MAX / 2 {
            // Stale or duplicated snapshot; everything in it was already
            // processed.
            return true;
        }

        self.advance_to(remote_head);

        let mut span = span;
        if span as usize > PACKET_WINDOW_ACK_COUNT {
            // Every snapshot in between was lost; ids beyond the window
            // aged out and carry no recoverable verdict.
            log::debug!(
                "[ACK] ack head {} advanced {} past {}; clamping merge to window",
                remote_head,
                span,
                self.last_remote_processed
            );
            span = PACKET_WINDOW_ACK_COUNT as u32;
        }

        for offset in (0..span).rev() {
            let packet_id = remote_head.back(offset);
            let reported = offset < ACK_BITMAP_BITS
                && header.ack_bitmap[(offset / 32) as usize] & (1 << (offset % 32)) != 0;
            if reported {
                self.set_bit(packet_id);
                callbacks.on_packet_acked(packet_id);
            } else {
                self.clear_bit(packet_id);
                callbacks.on_packet_lost(packet_id);
            }
        }
        self.last_remote_processed = remote_head;
        true
    }

    /// Delivery verdict for a single id, relative to the current head.
    #[must_use]
    pub fn get_packet_ack_status(&self, packet_id: PacketId) -> PacketAckState {
        if !self.tracking {
            return PacketAckState::UnknownTooNew;
        }
        let ahead = packet_id.0.wrapping_sub(self.head_packet_id.0);
        if ahead != 0 && ahead < u32::MAX / 2 {
            return PacketAckState::UnknownTooNew;
        }
        let behind = self.head_packet_id.0.wrapping_sub(packet_id.0);
        if behind as usize >= PACKET_WINDOW_ACK_COUNT {
            return PacketAckState::UnknownTooOld;
        }
        if self.test_bit(packet_id) {
            PacketAckState::Acked
        } else {
            PacketAckState::Nacked
        }
    }

    /// Snapshot for an outgoing header: the head id plus the newest
    /// [`ACK_BITMAP_BITS`] bits, where bit `i` describes `head - i`.
    #[must_use]
    pub fn most_recent_ack_state(&self) -> (PacketId, [u32; ACK_BITMAP_WORDS]) {
        let mut bitmap = [0u32; ACK_BITMAP_WORDS];
        if !self.tracking {
            return (INVALID_PACKET_ID, bitmap);
        }
        for offset in 0..ACK_BITMAP_BITS {
            if self.test_bit(self.head_packet_id.back(offset)) {
                bitmap[(offset / 32) as usize] |= 1 << (offset % 32);
            }
        }
        (self.head_packet_id, bitmap)
    }

    /// Move the head forward by `delta` ids, zeroing the ring range the
    /// new ids occupy and counting 16-bit rollovers crossed.
    fn advance_head(&mut self, delta: u32) {
        debug_assert!(delta as usize <= PACKET_WINDOW_ACK_COUNT);
        let wraps = (u64::from(self.head_sequence_id) + u64::from(delta)) >> 16;
        self.sequence_rollover_count += wraps as u32;
        for step in 1..=delta {
            self.clear_bit(PacketId(self.head_packet_id.0.wrapping_add(step)));
        }
        self.head_packet_id = PacketId(self.head_packet_id.0.wrapping_add(delta));
        self.head_sequence_id = self.head_packet_id.sequence();
    }

    /// Bring the head up to `target` (used by the remote-ack merge, which
    /// works in full 32-bit id space).
    fn advance_to(&mut self, target: PacketId) {
        if !self.tracking {
            self.tracking = true;
            self.head_packet_id = target;
            self.head_sequence_id = target.sequence();
            self.sequence_rollover_count = u32::from(target.rollover());
            return;
        }
        let ahead = target.0.wrapping_sub(self.head_packet_id.0);
        if ahead == 0 || ahead >= u32::MAX / 2 {
            return;
        }
        if ahead as usize >= PACKET_WINDOW_ACK_COUNT {
            // The entire ring ages out at once.
            let wraps = (u64::from(self.head_sequence_id) + u64::from(ahead)) >> 16;
            self.sequence_rollover_count += wraps as u32;
            self.bits = [0; ACK_WINDOW_WORDS];
            self.head_packet_id = target;
            self.head_sequence_id = target.sequence();
        } else {
            self.advance_head(ahead);
        }
    }

    fn slot(packet_id: PacketId) -> (usize, u32) {
        let bit = packet_id.0 as usize % PACKET_WINDOW_ACK_COUNT;
        (bit / 32, 1 << (bit % 32))
    }

    fn set_bit(&mut self, packet_id: PacketId) {
        let (word, mask) = Self::slot(packet_id);
        self.bits[word] |= mask;
    }

    fn clear_bit(&mut self, packet_id: PacketId) {
        let (word, mask) = Self::slot(packet_id);
        self.bits[word] &= !mask;
    }

    fn test_bit(&self, packet_id: PacketId) -> bool {
        let (word, mask) = Self::slot(packet_id);
        self.bits[word] & mask != 0
    }
}

impl Default for PacketIdWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PacketIdWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketIdWindow")
            .field("tracking", &self.tracking)
            .field("head_packet_id", &self.head_packet_id)
            .field("sequence_rollover_count", &self.sequence_rollover_count)
            .field("last_remote_processed", &self.last_remote_processed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reliability::header::PacketHeader;

    fn data_header(id: u32) -> PacketHeader {
        PacketHeader::without_acks(PacketId(id), 0)
    }

    fn ack_header(head: PacketId, bitmap: [u32; ACK_BITMAP_WORDS]) -> PacketHeader {
        PacketHeader::new(PacketId(1), 0, head, bitmap)
    }

    #[derive(Default)]
    struct Recorder {
        acked: Vec<PacketId>,
        lost: Vec<PacketId>,
    }

    impl AckCallbacks for Recorder {
        fn on_packet_acked(&mut self, packet_id: PacketId) {
            self.acked.push(packet_id);
        }
        fn on_packet_lost(&mut self, packet_id: PacketId) {
            self.lost.push(packet_id);
        }
    }

    fn ids(raw: &[u32]) -> Vec<PacketId> {
        raw.iter().map(|&v| PacketId(v)).collect()
    }

    #[test]
    fn test_fresh_window_knows_nothing() {
        let window = PacketIdWindow::new();
        assert_eq!(window.head_packet_id(), INVALID_PACKET_ID);
        assert_eq!(window.get_packet_ack_status(PacketId(1)), PacketAckState::UnknownTooNew);
        let (head, bitmap) = window.most_recent_ack_state();
        assert_eq!(head, INVALID_PACKET_ID);
        assert_eq!(bitmap, [0; ACK_BITMAP_WORDS]);
    }

    #[test]
    fn test_in_order_receive() {
        let mut window = PacketIdWindow::new();
        for id in 1..=3 {
            assert!(window.update_for_received_packet(&data_header(id)));
        }
        assert_eq!(window.head_packet_id(), PacketId(3));
        for id in 1..=3 {
            assert_eq!(window.get_packet_ack_status(PacketId(id)), PacketAckState::Acked);
        }
        assert_eq!(window.get_packet_ack_status(PacketId(4)), PacketAckState::UnknownTooNew);
    }

    #[test]
    fn test_first_packet_mid_sequence_nacks_predecessors() {
        let mut window = PacketIdWindow::new();
        assert!(window.update_for_received_packet(&data_header(10)));
        assert_eq!(window.get_packet_ack_status(PacketId(10)), PacketAckState::Acked);
        for id in 1..10 {
            assert_eq!(window.get_packet_ack_status(PacketId(id)), PacketAckState::Nacked);
        }
        assert_eq!(window.get_packet_ack_status(PacketId(11)), PacketAckState::UnknownTooNew);
    }

    #[test]
    fn test_gap_then_late_arrival() {
        let mut window = PacketIdWindow::new();
        assert!(window.update_for_received_packet(&data_header(1)));
        assert!(window.update_for_received_packet(&data_header(5)));
        for id in 2..=4 {
            assert_eq!(window.get_packet_ack_status(PacketId(id)), PacketAckState::Nacked);
        }
        // Packet 3 shows up late but inside the window.
        assert!(window.update_for_received_packet(&data_header(3)));
        assert_eq!(window.get_packet_ack_status(PacketId(3)), PacketAckState::Acked);
        assert_eq!(window.head_packet_id(), PacketId(5));
    }

    #[test]
    fn test_duplicate_receive_is_idempotent() {
        let mut window = PacketIdWindow::new();
        assert!(window.update_for_received_packet(&data_header(7)));
        assert!(window.update_for_received_packet(&data_header(7)));
        assert_eq!(window.head_packet_id(), PacketId(7));
        assert_eq!(window.get_packet_ack_status(PacketId(7)), PacketAckState::Acked);
    }

    #[test]
    fn test_forward_jump_of_window_or_more_rejected() {
        let mut window = PacketIdWindow::new();
        assert!(window.update_for_received_packet(&data_header(1)));
        let jump = 1 + PACKET_WINDOW_ACK_COUNT as u32;
        assert!(!window.update_for_received_packet(&data_header(jump)));
        // State untouched by the rejected packet.
        assert_eq!(window.head_packet_id(), PacketId(1));
        assert_eq!(window.get_packet_ack_status(PacketId(jump)), PacketAckState::UnknownTooNew);
    }

    #[test]
    fn test_aged_out_id_rejected_and_reads_too_old() {
        let mut window = PacketIdWindow::new();
        assert!(window.update_for_received_packet(&data_header(1)));
        assert!(window.update_for_received_packet(&data_header(16_000)));
        assert!(window.update_for_received_packet(&data_header(30_000)));
        assert_eq!(window.get_packet_ack_status(PacketId(1)), PacketAckState::UnknownTooOld);
        assert!(!window.update_for_received_packet(&data_header(1)));
        // Just inside the window still answers.
        let oldest_tracked = 30_000 - (PACKET_WINDOW_ACK_COUNT as u32 - 1);
        assert_ne!(
            window.get_packet_ack_status(PacketId(oldest_tracked)),
            PacketAckState::UnknownTooOld
        );
    }

    #[test]
    fn test_rollover_counted_once_per_wrap() {
        let mut window = PacketIdWindow::new();
        assert!(window.update_for_received_packet(&data_header(0xFFF0)));
        assert_eq!(window.sequence_rollover_count(), 0);
        // Sequence wraps 0xFFF0 -> 5; full id carries rollover 1.
        assert!(window.update_for_received_packet(&data_header(0x0001_0005)));
        assert_eq!(window.sequence_rollover_count(), 1);
        assert_eq!(window.head_packet_id(), PacketId(0x0001_0005));
        assert!(window.update_for_received_packet(&data_header(0x0001_FFFE)));
        assert_eq!(window.sequence_rollover_count(), 1);
        assert!(window.update_for_received_packet(&data_header(0x0002_0003)));
        assert_eq!(window.sequence_rollover_count(), 2);
    }

    #[test]
    fn test_ack_round_trip_fires_exact_verdicts() {
        // Receiver saw ids 1, 2, 3, 5; id 4 never arrived.
        let mut receiver = PacketIdWindow::new();
        for id in [1, 2, 3, 5] {
            assert!(receiver.update_for_received_packet(&data_header(id)));
        }
        let (head, bitmap) = receiver.most_recent_ack_state();
        assert_eq!(head, PacketId(5));

        let mut sender = PacketIdWindow::new();
        let mut recorder = Recorder::default();
        assert!(sender.update_for_remote_ack_status(
            &ack_header(head, bitmap),
            PacketId(5),
            &mut recorder
        ));

        assert_eq!(recorder.acked, ids(&[1, 2, 3, 5]));
        assert_eq!(recorder.lost, ids(&[4]));
        assert_eq!(sender.get_packet_ack_status(PacketId(2)), PacketAckState::Acked);
        assert_eq!(sender.get_packet_ack_status(PacketId(4)), PacketAckState::Nacked);
        assert_eq!(sender.get_packet_ack_status(PacketId(6)), PacketAckState::UnknownTooNew);
    }

    #[test]
    fn test_remote_ack_merge_is_exactly_once() {
        let mut receiver = PacketIdWindow::new();
        for id in [1, 2, 3, 5] {
            receiver.update_for_received_packet(&data_header(id));
        }
        let (head, bitmap) = receiver.most_recent_ack_state();

        let mut sender = PacketIdWindow::new();
        let mut recorder = Recorder::default();
        let snapshot = ack_header(head, bitmap);
        assert!(sender.update_for_remote_ack_status(&snapshot, PacketId(5), &mut recorder));
        // Replayed and reordered snapshots change nothing.
        assert!(sender.update_for_remote_ack_status(&snapshot, PacketId(5), &mut recorder));
        let (old_head, old_bitmap) = {
            let mut early = PacketIdWindow::new();
            for id in [1, 2] {
                early.update_for_received_packet(&data_header(id));
            }
            early.most_recent_ack_state()
        };
        assert!(sender.update_for_remote_ack_status(
            &ack_header(old_head, old_bitmap),
            PacketId(5),
            &mut recorder
        ));

        assert_eq!(recorder.acked.len(), 4);
        assert_eq!(recorder.lost.len(), 1);
    }

    #[test]
    fn test_remote_ack_merge_incremental() {
        let mut receiver = PacketIdWindow::new();
        let mut sender = PacketIdWindow::new();
        let mut recorder = Recorder::default();

        for id in 1..=3 {
            receiver.update_for_received_packet(&data_header(id));
        }
        let (head, bitmap) = receiver.most_recent_ack_state();
        assert!(sender.update_for_remote_ack_status(
            &ack_header(head, bitmap),
            PacketId(6),
            &mut recorder
        ));
        assert_eq!(recorder.acked, ids(&[1, 2, 3]));

        // 4 lost, 5 and 6 delivered; only the new ids get verdicts.
        for id in [5, 6] {
            receiver.update_for_received_packet(&data_header(id));
        }
        let (head, bitmap) = receiver.most_recent_ack_state();
        assert!(sender.update_for_remote_ack_status(
            &ack_header(head, bitmap),
            PacketId(6),
            &mut recorder
        ));
        assert_eq!(recorder.acked, ids(&[1, 2, 3, 5, 6]));
        assert_eq!(recorder.lost, ids(&[4]));
    }

    #[test]
    fn test_remote_ack_ignores_headers_without_ack_info() {
        let mut sender = PacketIdWindow::new();
        let mut recorder = Recorder::default();
        assert!(sender.update_for_remote_ack_status(&data_header(9), PacketId(9), &mut recorder));
        assert!(recorder.acked.is_empty());
        assert!(recorder.lost.is_empty());
        assert_eq!(sender.head_packet_id(), INVALID_PACKET_ID);
    }

    #[test]
    fn test_forged_ack_head_rejected_without_wedging() {
        // One id in flight; a forged snapshot claims ids far past it.
        let mut sender = PacketIdWindow::new();
        let mut recorder = Recorder::default();
        let forged = ack_header(PacketId(1000), [0; ACK_BITMAP_WORDS]);
        assert!(!sender.update_for_remote_ack_status(&forged, PacketId(1), &mut recorder));
        assert!(recorder.acked.is_empty());
        assert!(recorder.lost.is_empty());
        assert_eq!(sender.head_packet_id(), INVALID_PACKET_ID);

        // The genuine snapshot still lands afterwards.
        let mut receiver = PacketIdWindow::new();
        receiver.update_for_received_packet(&data_header(1));
        let (head, bitmap) = receiver.most_recent_ack_state();
        assert!(sender.update_for_remote_ack_status(
            &ack_header(head, bitmap),
            PacketId(1),
            &mut recorder
        ));
        assert_eq!(recorder.acked, ids(&[1]));
        assert_eq!(sender.get_packet_ack_status(PacketId(1)), PacketAckState::Acked);
    }

    #[test]
    fn test_ack_head_before_any_send_rejected() {
        let mut sender = PacketIdWindow::new();
        let mut recorder = Recorder::default();
        // Even a numerically huge head is forged when nothing was issued.
        let forged = ack_header(PacketId(0x9000_0000), [0; ACK_BITMAP_WORDS]);
        assert!(!sender.update_for_remote_ack_status(&forged, INVALID_PACKET_ID, &mut recorder));
        assert!(recorder.acked.is_empty());
        assert!(recorder.lost.is_empty());
    }

    #[test]
    fn test_remote_ack_long_gap_clamped_to_window() {
        // Every snapshot between 0 and 20000 was lost; verdicts only exist
        // for ids still inside the window.
        let mut sender = PacketIdWindow::new();
        let mut recorder = Recorder::default();
        let mut bitmap = [0u32; ACK_BITMAP_WORDS];
        bitmap[0] = 1;
        let head = PacketId(20_000);
        assert!(sender.update_for_remote_ack_status(&ack_header(head, bitmap), head, &mut recorder));
        assert_eq!(recorder.acked, ids(&[20_000]));
        assert_eq!(recorder.lost.len(), PACKET_WINDOW_ACK_COUNT - 1);
        assert_eq!(sender.get_packet_ack_status(PacketId(1)), PacketAckState::UnknownTooOld);
    }

    #[test]
    fn test_snapshot_bitmap_marks_head_and_gaps() {
        let mut window = PacketIdWindow::new();
        for id in [1, 2, 4] {
            window.update_for_received_packet(&data_header(id));
        }
        let (head, bitmap) = window.most_recent_ack_state();
        assert_eq!(head, PacketId(4));
        // bit 0 = id 4, bit 1 = id 3 (missing), bits 2 and 3 = ids 2 and 1.
        assert_eq!(bitmap[0] & 0b1111, 0b1101);
    }

    #[test]
    fn test_reset_forgets_session() {
        let mut window = PacketIdWindow::new();
        for id in 1..=20 {
            window.update_for_received_packet(&data_header(id));
        }
        window.reset();
        assert_eq!(window.head_packet_id(), INVALID_PACKET_ID);
        assert_eq!(window.sequence_rollover_count(), 0);
        assert_eq!(window.get_packet_ack_status(PacketId(10)), PacketAckState::UnknownTooNew);
        // A fresh session may start anywhere.
        assert!(window.update_for_received_packet(&data_header(500)));
    }

    #[test]
    fn test_long_session_random_loss_consistent() {
        let mut window = PacketIdWindow::new();
        let mut delivered = Vec::new();
        fastrand::seed(0x6A3E);
        for id in 1..=50_000u32 {
            if fastrand::u8(..) < 230 {
                assert!(window.update_for_received_packet(&data_header(id)));
                delivered.push(id);
            }
        }
        let head = window.head_packet_id().0;
        for &id in delivered.iter().rev().take(2000) {
            if head - id < PACKET_WINDOW_ACK_COUNT as u32 {
                assert_eq!(window.get_packet_ack_status(PacketId(id)), PacketAckState::Acked);
            }
        }
        // Rollover count always mirrors the high bits of the head id.
        assert_eq!(window.sequence_rollover_count(), u32::from(PacketId(head).rollover()));
    }
}
