// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP transport for discovery multicast send/receive.
//!
//! Consolidates socket management, multicast configuration, and send
//! operations. One multicast socket is shared between the probe (send) and
//! the responder thread (receive); reply collection uses short-lived
//! ephemeral unicast sockets so replies come back to the querying thread
//! directly.

use crate::config::{
    log_udp_enabled, reuseport_enabled, PortProfile, MULTICAST_GROUP, RESPONDER_POLL_MS,
};
use crate::discovery::Error;
use crate::transport::multicast::join_multicast_group;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

/// UDP transport for bidirectional discovery traffic.
pub struct UdpTransport {
    /// Shared multicast socket (send announce/revoke/query, responder recv).
    socket: Arc<UdpSocket>,
    /// Multicast destination for discovery packets.
    multicast_addr: SocketAddr,
    /// Interface used for multicast sends (UNSPECIFIED when auto).
    iface: Ipv4Addr,
    /// Bound discovery port (for introspection/logging).
    discovery_port: u16,
}

impl UdpTransport {
    /// Create the transport for a port profile.
    ///
    /// Binds the discovery port with `SO_REUSEADDR` (and `SO_REUSEPORT` on
    /// Unix when `PLEXD_REUSEPORT=1`, required for multi-process discovery on
    /// one Linux host), joins the multicast group and arms a receive timeout
    /// so the responder thread can observe its shutdown flag.
    ///
    /// # Errors
    /// [`Error::BindFailed`] when the socket cannot be created or bound,
    /// [`Error::MulticastJoinFailed`] when the group join fails.
    pub fn new(profile: &PortProfile) -> Result<Self, Error> {
        crate::trace_fn!("UdpTransport::new");
        let port = profile.discovery_port;

        let socket2 = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| Error::BindFailed(e.to_string()))?;
        socket2
            .set_reuse_address(true)
            .map_err(|e| Error::BindFailed(e.to_string()))?;
        #[cfg(unix)]
        if reuseport_enabled() {
            set_reuseport(&socket2).map_err(|e| Error::BindFailed(e.to_string()))?;
            log::info!("[plexd/udp] SO_REUSEPORT enabled via PLEXD_REUSEPORT=1 (multi-process mode)");
        }

        let bind_addr: SocketAddr = parse_socket_addr(format!("0.0.0.0:{}", port), "bind address")
            .map_err(|e| Error::BindFailed(e.to_string()))?;
        socket2
            .bind(&bind_addr.into())
            .map_err(|e| Error::BindFailed(e.to_string()))?;
        log::debug!("[plexd/udp] transport bound to {}", bind_addr);

        let socket: UdpSocket = socket2.into();
        let iface = join_multicast_group(&socket)
            .map_err(|e| Error::MulticastJoinFailed(e.to_string()))?;

        socket
            .set_read_timeout(Some(Duration::from_millis(RESPONDER_POLL_MS)))
            .map_err(Error::IoError)?;

        let multicast_addr =
            parse_socket_addr(format!("{}:{}", MULTICAST_GROUP, port), "multicast address")
                .map_err(Error::IoError)?;

        Ok(Self {
            socket: Arc::new(socket),
            multicast_addr,
            iface,
            discovery_port: port,
        })
    }

    /// Send a packet to the discovery multicast group.
    pub fn send(&self, data: &[u8]) -> io::Result<usize> {
        crate::trace_fn!("UdpTransport::send");
        let sent = match self.socket.send_to(data, self.multicast_addr) {
            Ok(n) => n,
            Err(e) => {
                log::debug!(
                    "[plexd/udp] multicast send error={} dest={} len={} iface={}",
                    e,
                    self.multicast_addr,
                    data.len(),
                    self.format_iface()
                );
                return Err(e);
            }
        };

        if log_udp_enabled() {
            log::debug!(
                "[plexd/udp] send -> {} len={} iface={}",
                self.multicast_addr,
                sent,
                self.format_iface()
            );
        }
        Ok(sent)
    }

    /// Send a packet to a specific unicast endpoint (query replies).
    pub fn send_to_endpoint(&self, data: &[u8], endpoint: &SocketAddr) -> io::Result<usize> {
        crate::trace_fn!("UdpTransport::send_to_endpoint");
        let sent = self.socket.send_to(data, endpoint)?;

        if log_udp_enabled() {
            log::debug!(
                "[plexd/udp] send_unicast -> {} len={} iface={}",
                endpoint,
                sent,
                self.format_iface()
            );
        }
        Ok(sent)
    }

    /// Create an ephemeral unicast socket for reply collection.
    ///
    /// Queries are sent from this socket so peer replies come straight back
    /// to the collecting thread; the receive timeout bounds each poll of the
    /// collection loop.
    pub fn reply_socket(&self) -> io::Result<UdpSocket> {
        crate::trace_fn!("UdpTransport::reply_socket");
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_read_timeout(Some(Duration::from_millis(RESPONDER_POLL_MS)))?;
        Ok(socket)
    }

    /// Shared multicast socket for the responder thread.
    #[must_use]
    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }

    /// Multicast destination address.
    #[must_use]
    pub fn multicast_addr(&self) -> SocketAddr {
        self.multicast_addr
    }

    /// Bound discovery port.
    #[must_use]
    pub fn discovery_port(&self) -> u16 {
        self.discovery_port
    }

    /// Format the send interface for logging.
    fn format_iface(&self) -> String {
        if self.iface.is_unspecified() {
            "default".to_string()
        } else {
            self.iface.to_string()
        }
    }
}

/// Parse a socket address with proper error context.
fn parse_socket_addr(addr: String, label: &str) -> io::Result<SocketAddr> {
    addr.parse().map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid {}: {}", label, e),
        )
    })
}

/// Set SO_REUSEPORT for multi-process port sharing (Unix only).
#[cfg(unix)]
fn set_reuseport(socket: &Socket) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    let fd = socket.as_raw_fd();
    let optval: libc::c_int = 1;
    // SAFETY: setsockopt FFI with a valid fd, standard socket option, and
    // correctly sized optval pointer
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEPORT,
            std::ptr::addr_of!(optval).cast(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
