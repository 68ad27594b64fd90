// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 gamenet contributors

//! Background I/O threads.
//!
//! Three OS threads keep the transport moving without an async runtime:
//!
//! - **reader** ([`reader_thread`]): drains every UDP socket until
//!   would-block, then sleeps briefly
//! - **listen** ([`listen_thread`]): a `mio` poll loop accepting TCP
//!   connections and queueing them for the façade
//! - **heartbeat** ([`heartbeat_thread`]): periodic keep-alive/ack emission
//!
//! Each thread exposes a stop flag, a serviced-socket count, and a
//! last-activity timestamp so the façade can verify liveness from
//! `on_system_tick`.

pub mod heartbeat_thread;
pub mod listen_thread;
pub mod reader_thread;

use std::time::{SystemTime, UNIX_EPOCH};

/// Microseconds since the unix epoch, for thread-health timestamps.
pub(crate) fn unix_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
