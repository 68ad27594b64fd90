// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 gamenet contributors

//! Non-blocking TCP wrappers.
//!
//! Listeners and streams are `mio` sockets so the listen thread can
//! register them with its poll loop; accepted streams are handed to the
//! application as [`TcpSocket`]s via ownership transfer.

use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// A non-blocking TCP stream.
///
/// Connects are initiated non-blocking; writability signals establishment.
/// Like [`UdpSocket`](crate::transport::UdpSocket), the descriptor lives in
/// an `Option` for idempotent close and ownership transfer.
pub struct TcpSocket {
    inner: Option<mio::net::TcpStream>,
    remote_addr: Option<SocketAddr>,
}

impl TcpSocket {
    /// Start a non-blocking connect to `addr`. The returned socket is not
    /// yet established; poll it for writability or just start writing and
    /// handle `WouldBlock`.
    pub fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = mio::net::TcpStream::connect(addr)?;
        log::debug!("[TCP] connect started remote={addr}");
        Ok(Self { inner: Some(stream), remote_addr: Some(addr) })
    }

    pub(crate) fn from_mio(stream: mio::net::TcpStream, remote_addr: SocketAddr) -> Self {
        Self { inner: Some(stream), remote_addr: Some(remote_addr) }
    }

    /// Wrap an established std stream, switching it to non-blocking mode.
    /// The injection counterpart of [`raw_fd`](Self::raw_fd), for streams
    /// set up below this abstraction (TLS wrappers, inherited sockets).
    pub fn from_std(stream: std::net::TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        let remote_addr = stream.peer_addr().ok();
        Ok(Self { inner: Some(mio::net::TcpStream::from_std(stream)), remote_addr })
    }

    pub fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            Some(stream) => stream.write(data),
            None => Err(closed()),
        }
    }

    pub fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Some(stream) => stream.read(buf),
            None => Err(closed()),
        }
    }

    /// Release the descriptor. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(addr) = self.remote_addr.take() {
            log::debug!("[TCP] closing remote={addr}");
        }
        self.inner = None;
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    #[must_use]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Move the descriptor into a new wrapper, leaving this one closed.
    pub fn clone_and_take_ownership(&mut self) -> TcpSocket {
        TcpSocket { inner: self.inner.take(), remote_addr: self.remote_addr.take() }
    }

    #[cfg(unix)]
    #[must_use]
    pub fn raw_fd(&self) -> Option<std::os::unix::io::RawFd> {
        use std::os::unix::io::AsRawFd;
        self.inner.as_ref().map(|s| s.as_raw_fd())
    }
}

impl std::fmt::Debug for TcpSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpSocket")
            .field("open", &self.is_open())
            .field("remote_addr", &self.remote_addr)
            .finish()
    }
}

/// A non-blocking TCP listener, registered with the listen thread's poll
/// loop after creation.
pub struct TcpListenSocket {
    inner: Option<mio::net::TcpListener>,
    local_addr: Option<SocketAddr>,
}

impl TcpListenSocket {
    /// Listen on `0.0.0.0:port` (port 0 picks an ephemeral port).
    pub fn listen(port: u16) -> io::Result<Self> {
        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        let listener = mio::net::TcpListener::bind(bind_addr)?;
        let local_addr = listener.local_addr()?;
        log::debug!("[TCP] listening local_addr={local_addr}");
        Ok(Self { inner: Some(listener), local_addr: Some(local_addr) })
    }

    /// Accept one pending connection; `WouldBlock` when none is queued.
    pub fn accept(&self) -> io::Result<(TcpSocket, SocketAddr)> {
        match &self.inner {
            Some(listener) => {
                let (stream, remote_addr) = listener.accept()?;
                Ok((TcpSocket::from_mio(stream, remote_addr), remote_addr))
            }
            None => Err(closed()),
        }
    }

    /// Release the descriptor. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(addr) = self.local_addr.take() {
            log::debug!("[TCP] listener closed local_addr={addr}");
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

    /// Take the mio listener out for poll registration; the wrapper is
    /// closed afterwards.
    pub(crate) fn take_inner(&mut self) -> Option<mio::net::TcpListener> {
        self.inner.take()
    }
}

impl std::fmt::Debug for TcpListenSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpListenSocket")
            .field("open", &self.is_open())
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "socket closed")
}
