// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 gamenet contributors

//! Non-blocking UDP socket wrapper.
//!
//! Construction goes through `socket2` so SO_REUSEADDR and buffer sizes can
//! be set before bind; after that the socket is a plain `std::net::UdpSocket`
//! in non-blocking mode.

use crate::config::NetConfig;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// A bound, non-blocking UDP socket.
///
/// The descriptor lives in an `Option` so that `close` is idempotent and
/// ownership can move between wrappers without a syscall. Operations on a
/// closed wrapper fail with `ErrorKind::NotConnected`.
pub struct UdpSocket {
    inner: Option<std::net::UdpSocket>,
    local_addr: Option<SocketAddr>,
}

impl UdpSocket {
    /// Bind to `0.0.0.0:port` (port 0 picks an ephemeral port).
    pub fn bind(port: u16, config: &NetConfig) -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.set_send_buffer_size(config.send_buffer_size)?;
        socket.set_recv_buffer_size(config.recv_buffer_size)?;

        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        socket.bind(&bind_addr.into())?;

        let inner: std::net::UdpSocket = socket.into();
        let local_addr = inner.local_addr()?;
        log::debug!("[UDP] bound local_addr={local_addr}");
        Ok(Self { inner: Some(inner), local_addr: Some(local_addr) })
    }

    /// Wrap an already-bound socket, switching it to non-blocking mode.
    pub fn from_std(socket: std::net::UdpSocket) -> io::Result<Self> {
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;
        Ok(Self { inner: Some(socket), local_addr: Some(local_addr) })
    }

    /// Send a single datagram. Partial sends do not happen on UDP; a short
    /// count means the OS truncated, which the caller treats as an error.
    pub fn send_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
        match &self.inner {
            Some(socket) => socket.send_to(data, addr),
            None => Err(closed()),
        }
    }

    /// Receive one datagram if available; `WouldBlock` when the queue is
    /// empty.
    pub fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        match &self.inner {
            Some(socket) => socket.recv_from(buf),
            None => Err(closed()),
        }
    }

    /// Release the descriptor. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(addr) = self.local_addr.take() {
            log::debug!("[UDP] closing local_addr={addr}");
        }
        self.inner = None;
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Move the descriptor out of this wrapper into a new one, leaving
    /// this one closed. Used to hand a socket to another owner without
    /// the OS ever seeing a close.
    pub fn clone_and_take_ownership(&mut self) -> UdpSocket {
        UdpSocket { inner: self.inner.take(), local_addr: self.local_addr.take() }
    }

    /// Raw descriptor for platform-specific socket options.
    #[cfg(unix)]
    #[must_use]
    pub fn raw_fd(&self) -> Option<std::os::unix::io::RawFd> {
        use std::os::unix::io::AsRawFd;
        self.inner.as_ref().map(|s| s.as_raw_fd())
    }
}

impl std::fmt::Debug for UdpSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpSocket")
            .field("open", &self.is_open())
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "socket closed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::is_would_block;

    fn config() -> NetConfig {
        NetConfig::default()
    }

    #[test]
    fn test_bind_ephemeral() {
        let socket = UdpSocket::bind(0, &config()).unwrap();
        assert!(socket.is_open());
        let addr = socket.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn test_send_and_receive_loopback() {
        let a = UdpSocket::bind(0, &config()).unwrap();
        let b = UdpSocket::bind(0, &config()).unwrap();
        let b_addr = SocketAddr::from(([127, 0, 0, 1], b.local_addr().unwrap().port()));

        let sent = a.send_to(b"ping", b_addr).unwrap();
        assert_eq!(sent, 4);

        let mut buf = [0u8; 64];
        let mut received = None;
        for _ in 0..200 {
            match b.recv_from(&mut buf) {
                Ok((n, from)) => {
                    received = Some((n, from));
                    break;
                }
                Err(e) if is_would_block(&e) => {
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
                Err(e) => panic!("recv failed: {e}"),
            }
        }
        let (n, from) = received.expect("datagram never arrived");
        assert_eq!(&buf[..n], b"ping");
        assert_eq!(from.port(), a.local_addr().unwrap().port());
    }

    #[test]
    fn test_recv_on_empty_socket_would_block() {
        let socket = UdpSocket::bind(0, &config()).unwrap();
        let mut buf = [0u8; 16];
        let err = socket.recv_from(&mut buf).unwrap_err();
        assert!(is_would_block(&err));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut socket = UdpSocket::bind(0, &config()).unwrap();
        socket.close();
        socket.close();
        assert!(!socket.is_open());
        let err = socket.send_to(b"x", SocketAddr::from(([127, 0, 0, 1], 9))).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn test_ownership_transfer_leaves_source_closed() {
        let mut original = UdpSocket::bind(0, &config()).unwrap();
        let addr = original.local_addr();
        let moved = original.clone_and_take_ownership();
        assert!(!original.is_open());
        assert!(moved.is_open());
        assert_eq!(moved.local_addr(), addr);
    }
}
