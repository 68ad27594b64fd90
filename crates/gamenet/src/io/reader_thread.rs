// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 gamenet contributors

//! UDP reader thread.
//!
//! One thread services every UDP interface: each pump iteration drains each
//! socket until the OS reports would-block, then sleeps for the configured
//! poll interval if nothing arrived anywhere. A hard error on one socket
//! marks that interface failed and leaves the others running.

use crate::config::{ignore_connection_reset, MAX_DATAGRAM_SIZE};
use crate::interface::InterfaceRegistry;
use crate::io::unix_micros;
use crate::transport::{is_connection_reset, is_would_block};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub(crate) struct ReaderThread {
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    socket_count: Arc<AtomicUsize>,
    last_update_micros: Arc<AtomicU64>,
}

impl ReaderThread {
    pub fn spawn(
        registry: Arc<InterfaceRegistry>,
        poll_interval: Duration,
    ) -> io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let socket_count = Arc::new(AtomicUsize::new(0));
        let last_update_micros = Arc::new(AtomicU64::new(unix_micros()));

        let thread_running = Arc::clone(&running);
        let thread_socket_count = Arc::clone(&socket_count);
        let thread_last_update = Arc::clone(&last_update_micros);
        let handle = thread::Builder::new()
            .name("gamenet-reader".into())
            .spawn(move || {
                run(
                    &registry,
                    poll_interval,
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

    /// Sockets serviced on the last pump iteration.
    pub fn socket_count(&self) -> usize {
        self.socket_count.load(Ordering::Relaxed)
    }

    /// Unix micros of the last pump iteration, for liveness checks.
    pub fn last_update_micros(&self) -> u64 {
        self.last_update_micros.load(Ordering::Relaxed)
    }

    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("[READER] thread panicked during shutdown");
            }
        }
    }
}

impl Drop for ReaderThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    registry: &InterfaceRegistry,
    poll_interval: Duration,
    running: &AtomicBool,
    socket_count: &AtomicUsize,
    last_update_micros: &AtomicU64,
) {
    log::debug!("[READER] thread started poll_interval={poll_interval:?}");
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    while running.load(Ordering::SeqCst) {
        let interfaces = registry.serviceable_udp();
        socket_count.store(interfaces.len(), Ordering::Relaxed);
        last_update_micros.store(unix_micros(), Ordering::Relaxed);

        let mut handled = 0usize;
        for interface in &interfaces {
            let Some(socket) = interface.udp_socket() else {
                continue;
            };
            loop {
                match socket.recv_from(&mut buf) {
                    Ok((len, from)) => {
                        interface.handle_datagram(&buf[..len], from);
                        handled += 1;
                    }
                    Err(err) if is_would_block(&err) => break,
                    Err(err) if is_connection_reset(&err) && ignore_connection_reset() => {
                        // ICMP unreachable from a departed peer; the socket
                        // itself is fine, keep draining.
                        log::debug!(
                            "[READER] ignoring reset name={} err={err}",
                            interface.name()
                        );
                    }
                    Err(err) => {
                        log::error!(
                            "[READER] receive failed name={} err={err}",
                            interface.name()
                        );
                        interface.mark_socket_failed();
                        break;
                    }
                }
            }
        }

        if handled == 0 {
            thread::sleep(poll_interval);
        }
    }
    log::debug!("[READER] thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetConfig;
    use crate::connection::{ConnectionListener, DisconnectReason};
    use crate::interface::NetworkInterface;
    use crate::reliability::header::PacketHeader;
    use crate::reliability::PacketId;
    use crate::transport::{TrustZone, UdpSocket};
    use parking_lot::Mutex;
    use std::net::SocketAddr;
    use std::time::Instant;

    #[derive(Default)]
    struct Sink {
        payloads: Mutex<Vec<Vec<u8>>>,
    }

    impl ConnectionListener for Sink {
        fn on_connect(&self, _remote: SocketAddr) {}
        fn on_disconnect(&self, _remote: SocketAddr, _reason: DisconnectReason) {}
        fn on_packet_received(&self, _remote: SocketAddr, payload: &[u8]) {
            self.payloads.lock().push(payload.to_vec());
        }
    }

    #[test]
    fn test_reader_delivers_datagrams() {
        let registry = Arc::new(InterfaceRegistry::new());
        let sink = Arc::new(Sink::default());
        let interface = Arc::new(
            NetworkInterface::new_udp(
                "pump".to_owned(),
                TrustZone::TrustedHost,
                0,
                NetConfig::default(),
                Arc::clone(&sink) as Arc<dyn ConnectionListener>,
            )
            .unwrap(),
        );
        let port = interface.local_addr().unwrap().port();
        assert!(registry.insert(Arc::clone(&interface)));

        let mut reader =
            ReaderThread::spawn(Arc::clone(&registry), Duration::from_micros(500)).unwrap();

        // Hand-rolled datagram from an unmanaged socket.
        let sender = UdpSocket::bind(0, &NetConfig::default()).unwrap();
        let header = PacketHeader::without_acks(PacketId(1), 0);
        let mut datagram = header.encode_le().to_vec();
        datagram.extend_from_slice(b"pumped");
        sender
            .send_to(&datagram, SocketAddr::from(([127, 0, 0, 1], port)))
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while sink.payloads.lock().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        reader.shutdown();

        let payloads = sink.payloads.lock();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0], b"pumped");
        assert!(reader.socket_count() >= 1);
        assert!(reader.last_update_micros() > 0);
    }

    #[test]
    fn test_reader_shutdown_joins_cleanly() {
        let registry = Arc::new(InterfaceRegistry::new());
        let mut reader =
            ReaderThread::spawn(registry, Duration::from_micros(500)).unwrap();
        thread::sleep(Duration::from_millis(10));
        reader.shutdown();
        // Second call is a no-op.
        reader.shutdown();
        assert_eq!(reader.socket_count(), 0);
    }
}
