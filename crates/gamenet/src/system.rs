// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 gamenet contributors

//! The owning façade: socket-layer bring-up, interface registry, I/O
//! threads, and the compressor registry.
//!
//! A game owns exactly one [`NetworkSystem`], creates named interfaces on
//! it, and calls [`on_system_tick`](NetworkSystem::on_system_tick) once per
//! frame from its main loop. Everything else (reading, accepting,
//! heartbeating) happens on the system's background threads.

use crate::compress::deflate::DeflateFactory;
use crate::compress::{Compressor, CompressorFactory, CompressorRegistry};
use crate::config::NetConfig;
use crate::connection::{ConnectionListener, DisconnectReason};
use crate::interface::{InterfaceRegistry, NetworkError, NetworkInterface};
use crate::io::heartbeat_thread::HeartbeatThread;
use crate::io::listen_thread::{AcceptedConnection, ListenThread};
use crate::io::reader_thread::ReaderThread;
use crate::io::unix_micros;
use crate::transport::{ProtocolType, TcpListenSocket, TrustZone, UdpSocket};
use crossbeam::channel::Receiver;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A background thread is considered stalled if it has not pumped for this
/// long; `on_system_tick` logs a warning when it notices.
const THREAD_STALL_WARNING: Duration = Duration::from_secs(5);

/// Top-level transport object; one per process in the common case.
pub struct NetworkSystem {
    config: NetConfig,
    registry: Arc<InterfaceRegistry>,
    compressors: CompressorRegistry,
    reader: Option<ReaderThread>,
    heartbeat: Option<HeartbeatThread>,
    listen: Option<ListenThread>,
    accepted_rx: Receiver<AcceptedConnection>,
}

impl NetworkSystem {
    /// Bring up the socket layer and start the I/O threads.
    ///
    /// Binds and drops a throwaway socket first so platform socket-stack
    /// initialization failures surface here rather than on the first real
    /// interface.
    pub fn new(config: NetConfig) -> io::Result<Self> {
        let probe = UdpSocket::bind(0, &config)?;
        drop(probe);
        log::info!("[SYSTEM] socket layer ready");

        let registry = Arc::new(InterfaceRegistry::new());
        let reader = ReaderThread::spawn(Arc::clone(&registry), config.reader_poll_interval)?;
        let heartbeat = HeartbeatThread::spawn(Arc::clone(&registry), config.heartbeat_interval)?;
        let (listen, accepted_rx) = ListenThread::spawn()?;

        let compressors = CompressorRegistry::new();
        compressors.register(DeflateFactory::with_defaults());
        #[cfg(feature = "lz4")]
        compressors.register(crate::compress::lz4::Lz4Factory::with_defaults());

        Ok(Self {
            config,
            registry,
            compressors,
            reader: Some(reader),
            heartbeat: Some(heartbeat),
            listen: Some(listen),
            accepted_rx,
        })
    }

    // ===== Interfaces =====

    /// Create a named interface bound to `0.0.0.0:port` (0 for ephemeral).
    /// Names are unique per system.
    pub fn create_network_interface(
        &self,
        name: &str,
        protocol: ProtocolType,
        trust_zone: TrustZone,
        port: u16,
        listener: Arc<dyn ConnectionListener>,
    ) -> Result<Arc<NetworkInterface>, NetworkError> {
        if self.registry.get(name).is_some() {
            return Err(NetworkError::DuplicateInterface(name.to_owned()));
        }
        let interface = match protocol {
            ProtocolType::Udp => Arc::new(NetworkInterface::new_udp(
                name.to_owned(),
                trust_zone,
                port,
                self.config.clone(),
                listener,
            )?),
            ProtocolType::Tcp => {
                let listen_socket = TcpListenSocket::listen(port)?;
                let listen_addr = listen_socket.local_addr().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::AddrNotAvailable, "listener has no address")
                })?;
                let interface = Arc::new(NetworkInterface::new_tcp(
                    name.to_owned(),
                    trust_zone,
                    listen_addr,
                    self.config.clone(),
                    listener,
                ));
                if let Some(listen_thread) = self.listen.as_ref() {
                    listen_thread.register(name, listen_socket)?;
                }
                interface
            }
        };
        if !self.registry.insert(Arc::clone(&interface)) {
            // Lost a race on the name; undo the listen registration.
            if protocol == ProtocolType::Tcp {
                if let Some(listen_thread) = self.listen.as_ref() {
                    listen_thread.deregister(name);
                }
            }
            return Err(NetworkError::DuplicateInterface(name.to_owned()));
        }
        Ok(interface)
    }

    /// Tear down an interface: stop accepting, drop every connection with
    /// [`DisconnectReason::Shutdown`], release the socket. Returns `false`
    /// if no such interface exists.
    pub fn destroy_network_interface(&self, name: &str) -> bool {
        let Some(interface) = self.registry.remove(name) else {
            return false;
        };
        if interface.protocol() == ProtocolType::Tcp {
            if let Some(listen_thread) = self.listen.as_ref() {
                listen_thread.deregister(name);
            }
        }
        interface.disconnect_all(DisconnectReason::Shutdown);
        log::info!("[SYSTEM] interface destroyed name={name}");
        true
    }

    #[must_use]
    pub fn get_network_interface(&self, name: &str) -> Option<Arc<NetworkInterface>> {
        self.registry.get(name)
    }

    #[must_use]
    pub fn interface_count(&self) -> usize {
        self.registry.len()
    }

    // ===== Compressors =====

    /// Register a compressor factory by name. Returns `false` if the name
    /// is taken; the first registration wins.
    pub fn register_compressor_factory(&self, factory: Arc<dyn CompressorFactory>) -> bool {
        self.compressors.register(factory)
    }

    pub fn unregister_compressor_factory(&self, name: &str) -> bool {
        self.compressors.unregister(name)
    }

    /// Instantiate a compressor from a registered factory.
    #[must_use]
    pub fn create_compressor(&self, name: &str) -> Option<Box<dyn Compressor>> {
        self.compressors.create(name)
    }

    /// Attach a fresh compressor instance to one connection. Both sides
    /// must attach the same algorithm for traffic to survive.
    pub fn attach_compressor(
        &self,
        interface_name: &str,
        remote: SocketAddr,
        compressor_name: &str,
    ) -> Result<(), NetworkError> {
        let interface = self
            .registry
            .get(interface_name)
            .ok_or_else(|| NetworkError::InterfaceNotFound(interface_name.to_owned()))?;
        let compressor = self
            .compressors
            .create(compressor_name)
            .ok_or_else(|| NetworkError::UnknownCompressor(compressor_name.to_owned()))?;
        if interface.attach_compressor(remote, compressor) {
            Ok(())
        } else {
            Err(NetworkError::ConnectionNotFound(remote))
        }
    }

    // ===== Per-frame maintenance =====

    /// Main-loop hook: dispatch accepted TCP connections, expire idle
    /// connections, and check thread health. Call once per frame.
    pub fn on_system_tick(&self) {
        while let Ok(accepted) = self.accepted_rx.try_recv() {
            match self.registry.get(&accepted.interface) {
                Some(interface) => {
                    interface.adopt_tcp_stream(accepted.remote_addr, accepted.socket);
                }
                None => {
                    log::debug!(
                        "[SYSTEM] accepted connection for dead interface name={} remote={}",
                        accepted.interface,
                        accepted.remote_addr
                    );
                }
            }
        }

        let now = Instant::now();
        for interface in self.registry.all() {
            interface.sweep_timeouts(now, self.config.connection_timeout);
        }

        self.check_thread_health();
    }

    /// Like [`on_system_tick`](Self::on_system_tick), but also flushes a
    /// heartbeat (and with it the latest ack snapshot) to every connection
    /// immediately. For loading screens and other long frames.
    pub fn force_update(&self) {
        self.on_system_tick();
        let now = Instant::now();
        for interface in self.registry.serviceable_udp() {
            interface.send_heartbeats(now, Duration::ZERO);
        }
    }

    fn check_thread_health(&self) {
        let now = unix_micros();
        let stall = THREAD_STALL_WARNING.as_micros() as u64;
        if let Some(reader) = self.reader.as_ref() {
            if now.saturating_sub(reader.last_update_micros()) > stall {
                log::warn!("[SYSTEM] reader thread stalled sockets={}", reader.socket_count());
            }
        }
        if let Some(heartbeat) = self.heartbeat.as_ref() {
            let idle = now.saturating_sub(heartbeat.last_update_micros());
            if idle > stall && Duration::from_micros(idle) > 2 * self.config.heartbeat_interval {
                log::warn!(
                    "[SYSTEM] heartbeat thread stalled sockets={}",
                    heartbeat.socket_count()
                );
            }
        }
        if let Some(listen) = self.listen.as_ref() {
            if now.saturating_sub(listen.last_update_micros()) > stall {
                log::warn!("[SYSTEM] listen thread stalled sockets={}", listen.socket_count());
            }
        }
    }

    // ===== Health stats =====

    /// UDP sockets serviced by the last reader pump.
    #[must_use]
    pub fn reader_socket_count(&self) -> usize {
        self.reader.as_ref().map_or(0, ReaderThread::socket_count)
    }

    /// Unix micros of the reader thread's last pump.
    #[must_use]
    pub fn reader_last_update_micros(&self) -> u64 {
        self.reader.as_ref().map_or(0, ReaderThread::last_update_micros)
    }

    /// TCP listeners currently registered with the listen thread.
    #[must_use]
    pub fn listen_socket_count(&self) -> usize {
        self.listen.as_ref().map_or(0, ListenThread::socket_count)
    }

    // ===== Teardown =====

    /// Stop the threads, drop every interface, release every socket.
    /// Idempotent; also runs from `Drop`.
    pub fn shutdown(&mut self) {
        let had_threads = self.reader.is_some();
        if let Some(mut reader) = self.reader.take() {
            reader.shutdown();
        }
        if let Some(mut heartbeat) = self.heartbeat.take() {
            heartbeat.shutdown();
        }
        if let Some(mut listen) = self.listen.take() {
            listen.shutdown();
        }
        for interface in self.registry.all() {
            self.registry.remove(interface.name());
            interface.disconnect_all(DisconnectReason::Shutdown);
        }
        if had_threads {
            log::info!("[SYSTEM] shut down");
        }
    }
}

impl Drop for NetworkSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for NetworkSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkSystem")
            .field("interfaces", &self.interface_count())
            .field("running", &self.reader.is_some())
            .finish()
    }
}
