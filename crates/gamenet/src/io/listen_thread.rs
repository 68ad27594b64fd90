// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 gamenet contributors

//! TCP listen thread.
//!
//! A `mio` poll loop multiplexes every registered TCP listener. Accepted
//! streams are wrapped, ownership-transferred, and queued for the façade,
//! which dispatches them to the owning interface on the next system tick.
//! Commands arrive over a channel and a waker so registration never blocks
//! the poll.

use crate::io::unix_micros;
use crate::transport::{is_would_block, TcpListenSocket, TcpSocket};
use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use mio::{Events, Interest, Poll, Token, Waker};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Token for the waker (command channel).
const WAKER_TOKEN: Token = Token(0);

/// Starting token for listeners.
const LISTENER_TOKEN_START: usize = 1;

/// Default poll timeout; shutdown latency is bounded by this even if the
/// waker is lost.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Maximum events to process per poll.
const MAX_EVENTS: usize = 128;

/// Queue depth for accepted connections awaiting a system tick.
const ACCEPT_QUEUE_DEPTH: usize = 256;

enum ListenCommand {
    Register {
        interface: String,
        listener: mio::net::TcpListener,
    },
    Deregister {
        interface: String,
    },
    Shutdown,
}

/// An accepted TCP connection awaiting dispatch to its interface.
pub struct AcceptedConnection {
    pub interface: String,
    pub socket: TcpSocket,
    pub remote_addr: SocketAddr,
}

pub(crate) struct ListenThread {
    handle: Option<JoinHandle<()>>,
    command_tx: Sender<ListenCommand>,
    waker: Arc<Waker>,
    socket_count: Arc<AtomicUsize>,
    last_update_micros: Arc<AtomicU64>,
}

impl ListenThread {
    /// Spawn the poll loop; the returned receiver yields accepted
    /// connections.
    pub fn spawn() -> io::Result<(Self, Receiver<AcceptedConnection>)> {
        let poll = Poll::new()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN)?);
        let (command_tx, command_rx) = unbounded();
        let (accepted_tx, accepted_rx) = bounded(ACCEPT_QUEUE_DEPTH);
        let socket_count = Arc::new(AtomicUsize::new(0));
        let last_update_micros = Arc::new(AtomicU64::new(unix_micros()));

        let thread_socket_count = Arc::clone(&socket_count);
        let thread_last_update = Arc::clone(&last_update_micros);
        let handle = thread::Builder::new()
            .name("gamenet-listen".into())
            .spawn(move || {
                run(
                    poll,
                    command_rx,
                    accepted_tx,
                    &thread_socket_count,
                    &thread_last_update,
                );
            })?;

        Ok((
            Self {
                handle: Some(handle),
                command_tx,
                waker,
                socket_count,
                last_update_micros,
            },
            accepted_rx,
        ))
    }

    /// Hand a listen socket over to the poll loop.
    pub fn register(&self, interface: &str, mut listener: TcpListenSocket) -> io::Result<()> {
        let inner = listener.take_inner().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "listen socket already closed")
        })?;
        self.command_tx
            .send(ListenCommand::Register {
                interface: interface.to_owned(),
                listener: inner,
            })
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "listen thread gone"))?;
        self.waker.wake()
    }

    /// Stop accepting for an interface; pending accepts already queued are
    /// unaffected.
    pub fn deregister(&self, interface: &str) {
        if self
            .command_tx
            .send(ListenCommand::Deregister { interface: interface.to_owned() })
            .is_ok()
        {
            let _ = self.waker.wake();
        }
    }

    pub fn socket_count(&self) -> usize {
        self.socket_count.load(Ordering::Relaxed)
    }

    pub fn last_update_micros(&self) -> u64 {
        self.last_update_micros.load(Ordering::Relaxed)
    }

    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.command_tx.send(ListenCommand::Shutdown);
            let _ = self.waker.wake();
            if handle.join().is_err() {
                log::error!("[LISTEN] thread panicked during shutdown");
            }
        }
    }
}

impl Drop for ListenThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    mut poll: Poll,
    command_rx: Receiver<ListenCommand>,
    accepted_tx: Sender<AcceptedConnection>,
    socket_count: &AtomicUsize,
    last_update_micros: &AtomicU64,
) {
    log::debug!("[LISTEN] thread started");
    let mut events = Events::with_capacity(MAX_EVENTS);
    let mut listeners: HashMap<Token, (String, mio::net::TcpListener)> = HashMap::new();
    let mut next_token = LISTENER_TOKEN_START;

    'outer: loop {
        if let Err(err) = poll.poll(&mut events, Some(POLL_TIMEOUT)) {
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            log::error!("[LISTEN] poll failed err={err}");
            break;
        }
        last_update_micros.store(unix_micros(), Ordering::Relaxed);

        // Commands are drained every iteration, not just on a waker event;
        // waker wakeups coalesce and the poll timeout bounds the latency.
        while let Ok(command) = command_rx.try_recv() {
            match command {
                ListenCommand::Register { interface, mut listener } => {
                    let token = Token(next_token);
                    next_token += 1;
                    match poll
                        .registry()
                        .register(&mut listener, token, Interest::READABLE)
                    {
                        Ok(()) => {
                            log::debug!(
                                "[LISTEN] registered interface={interface} token={}",
                                token.0
                            );
                            listeners.insert(token, (interface, listener));
                        }
                        Err(err) => {
                            log::error!(
                                "[LISTEN] register failed interface={interface} err={err}"
                            );
                        }
                    }
                }
                ListenCommand::Deregister { interface } => {
                    let token = listeners
                        .iter()
                        .find(|(_, (name, _))| *name == interface)
                        .map(|(token, _)| *token);
                    if let Some(token) = token {
                        if let Some((_, mut listener)) = listeners.remove(&token) {
                            let _ = poll.registry().deregister(&mut listener);
                            log::debug!("[LISTEN] deregistered interface={interface}");
                        }
                    }
                }
                ListenCommand::Shutdown => break 'outer,
            }
        }

        for event in events.iter() {
            match event.token() {
                WAKER_TOKEN => {}
                token => {
                    let failed = match listeners.get(&token) {
                        Some((interface, listener)) => {
                            !drain_accepts(interface, listener, &accepted_tx)
                        }
                        None => false,
                    };
                    // Per-socket isolation: a broken listener is dropped,
                    // the rest keep accepting.
                    if failed {
                        if let Some((interface, mut listener)) = listeners.remove(&token) {
                            let _ = poll.registry().deregister(&mut listener);
                            log::error!(
                                "[LISTEN] listener failed, dropped interface={interface}"
                            );
                        }
                    }
                }
            }
        }
        socket_count.store(listeners.len(), Ordering::Relaxed);
    }
    log::debug!("[LISTEN] thread stopped");
}

/// Accept until would-block. Returns `false` if the listener hit a hard
/// error.
fn drain_accepts(
    interface: &str,
    listener: &mio::net::TcpListener,
    accepted_tx: &Sender<AcceptedConnection>,
) -> bool {
    loop {
        match listener.accept() {
            Ok((stream, remote_addr)) => {
                log::debug!("[LISTEN] accepted interface={interface} remote={remote_addr}");
                let accepted = AcceptedConnection {
                    interface: interface.to_owned(),
                    socket: TcpSocket::from_mio(stream, remote_addr),
                    remote_addr,
                };
                if accepted_tx.try_send(accepted).is_err() {
                    // Queue full or façade gone; the stream drops and the
                    // peer sees a close.
                    log::warn!(
                        "[LISTEN] accept queue full, dropping interface={interface} remote={remote_addr}"
                    );
                }
            }
            Err(err) if is_would_block(&err) => return true,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => {
                log::error!("[LISTEN] accept failed interface={interface} err={err}");
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_register_accept_and_queue() {
        let (mut listen_thread, accepted_rx) = ListenThread::spawn().unwrap();
        let listener = TcpListenSocket::listen(0).unwrap();
        let port = listener.local_addr().unwrap().port();
        listen_thread.register("game", listener).unwrap();

        // Give the waker a moment to deliver the registration.
        thread::sleep(Duration::from_millis(50));
        let _client = TcpSocket::connect(SocketAddr::from(([127, 0, 0, 1], port))).unwrap();

        let accepted = accepted_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("no accepted connection");
        assert_eq!(accepted.interface, "game");
        assert!(accepted.socket.is_open());
        assert_eq!(listen_thread.socket_count(), 1);

        listen_thread.shutdown();
    }

    #[test]
    fn test_deregister_stops_accepting() {
        let (mut listen_thread, accepted_rx) = ListenThread::spawn().unwrap();
        let listener = TcpListenSocket::listen(0).unwrap();
        let port = listener.local_addr().unwrap().port();
        listen_thread.register("gone", listener).unwrap();
        thread::sleep(Duration::from_millis(50));
        listen_thread.deregister("gone");
        thread::sleep(Duration::from_millis(50));

        // The listener socket is closed now; connects are refused or
        // time out, and nothing lands in the queue.
        let _ = TcpSocket::connect(SocketAddr::from(([127, 0, 0, 1], port)));
        assert!(accepted_rx.recv_timeout(Duration::from_millis(300)).is_err());
        assert_eq!(listen_thread.socket_count(), 0);

        listen_thread.shutdown();
    }

    #[test]
    fn test_shutdown_joins_quickly() {
        let (mut listen_thread, _accepted_rx) = ListenThread::spawn().unwrap();
        let start = Instant::now();
        listen_thread.shutdown();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
