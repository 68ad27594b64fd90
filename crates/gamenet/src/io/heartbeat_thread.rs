// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 gamenet contributors

//! Heartbeat thread.
//!
//! Wakes on a fixed interval and asks every serviceable UDP interface to
//! emit keep-alives to connections that have been send-idle for at least
//! one interval. Sleeps in short slices so shutdown is prompt even with a
//! long interval.

use crate::interface::InterfaceRegistry;
use crate::io::unix_micros;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const SHUTDOWN_POLL_SLICE: Duration = Duration::from_millis(25);

pub(crate) struct HeartbeatThread {
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    socket_count: Arc<AtomicUsize>,
    last_update_micros: Arc<AtomicU64>,
}

impl HeartbeatThread {
    pub fn spawn(registry: Arc<InterfaceRegistry>, interval: Duration) -> io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let socket_count = Arc::new(AtomicUsize::new(0));
        let last_update_micros = Arc::new(AtomicU64::new(unix_micros()));

        let thread_running = Arc::clone(&running);
        let thread_socket_count = Arc::clone(&socket_count);
        let thread_last_update = Arc::clone(&last_update_micros);
        let handle = thread::Builder::new()
            .name("gamenet-heartbeat".into())
            .spawn(move || {
                run(
                    &registry,
                    interval,
                    &thread_running,
                    &thread_socket_count,
                    &thread_last_update,
                );
            })?;

        Ok(Self {
            handle: Some(handle),
            running,
            socket_count,
            last_update_micros,
        })
    }

    pub fn socket_count(&self) -> usize {
        self.socket_count.load(Ordering::Relaxed)
    }

    pub fn last_update_micros(&self) -> u64 {
        self.last_update_micros.load(Ordering::Relaxed)
    }

    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("[HEARTBEAT] thread panicked during shutdown");
            }
        }
    }
}

impl Drop for HeartbeatThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    registry: &InterfaceRegistry,
    interval: Duration,
    running: &AtomicBool,
    socket_count: &AtomicUsize,
    last_update_micros: &AtomicU64,
) {
    log::debug!("[HEARTBEAT] thread started interval={interval:?}");
    let mut last_sweep = Instant::now();
    while running.load(Ordering::SeqCst) {
        thread::sleep(SHUTDOWN_POLL_SLICE.min(interval));
        let now = Instant::now();
        if now.duration_since(last_sweep) < interval {
            continue;
        }
        last_sweep = now;

        let interfaces = registry.serviceable_udp();
        socket_count.store(interfaces.len(), Ordering::Relaxed);
        last_update_micros.store(unix_micros(), Ordering::Relaxed);
        for interface in &interfaces {
            let sent = interface.send_heartbeats(now, interval);
            if sent > 0 {
                log::trace!(
                    "[HEARTBEAT] sent={} name={}",
                    sent,
                    interface.name()
                );
            }
        }
    }
    log::debug!("[HEARTBEAT] thread stopped");
}
