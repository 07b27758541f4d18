// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multicast group management and interface discovery.

use crate::config::{multicast_if_override, MULTICAST_IP};
use std::io;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Join the plexd discovery multicast group on all available interfaces.
///
/// Joining on every non-loopback interface keeps discovery working on
/// multi-homed machines; joins that fail on an individual interface are
/// non-fatal and skipped. Loopback is enabled so processes on the same host
/// see each other; TTL stays at 1 (discovery never leaves the subnet).
///
/// # Returns
/// The first interface address, used as the send interface (UNSPECIFIED when
/// none was found).
pub fn join_multicast_group(socket: &UdpSocket) -> io::Result<Ipv4Addr> {
    crate::trace_fn!("multicast::join_multicast_group");
    let interfaces = get_multicast_interfaces()?;

    if interfaces.is_empty() {
        log::debug!("[plexd/udp] no suitable interface for multicast, joining on UNSPECIFIED");
        socket.join_multicast_v4(&MULTICAST_IP, &Ipv4Addr::UNSPECIFIED)?;
    } else {
        for iface in &interfaces {
            match socket.join_multicast_v4(&MULTICAST_IP, iface) {
                Ok(()) => {
                    log::debug!("[plexd/udp] joined {} on interface {}", MULTICAST_IP, iface);
                }
                Err(e) if e.raw_os_error() == Some(98) => {
                    // EADDRINUSE: already joined on the same physical NIC
                    log::debug!(
                        "[plexd/udp] join {} on {} - already joined, skipping",
                        MULTICAST_IP,
                        iface
                    );
                }
                Err(e) => {
                    log::debug!(
                        "[plexd/udp] join {} on {} failed (non-fatal): {}",
                        MULTICAST_IP,
                        iface,
                        e
                    );
                }
            }
        }
    }

    socket.set_multicast_loop_v4(true)?;
    let _ = socket.set_multicast_ttl_v4(1);

    Ok(interfaces.first().copied().unwrap_or(Ipv4Addr::UNSPECIFIED))
}

/// Get all non-loopback IPv4 interfaces suitable for multicast.
///
/// Honors the `PLEXD_MULTICAST_IF` override, otherwise enumerates via the
/// `local_ip_address` crate.
pub fn get_multicast_interfaces() -> io::Result<Vec<Ipv4Addr>> {
    if let Some(addr) = multicast_if_override() {
        log::debug!("[plexd/udp] using PLEXD_MULTICAST_IF override: {}", addr);
        return Ok(vec![addr]);
    }

    let interfaces = match local_ip_address::list_afinet_netifas() {
        Ok(ifs) => ifs,
        Err(e) => {
            log::debug!("[plexd/udp] failed to list network interfaces: {}", e);
            return Ok(vec![]);
        }
    };

    let mut addrs = Vec::new();
    for (_name, ip) in interfaces {
        if let IpAddr::V4(ipv4) = ip {
            if !ipv4.is_loopback() {
                addrs.push(ipv4);
            }
        }
    }

    log::debug!(
        "[plexd/udp] discovered {} non-loopback interface(s)",
        addrs.len()
    );
    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_enumeration_never_errors() {
        // Machines without usable interfaces yield an empty list, not an error.
        let interfaces = get_multicast_interfaces().expect("enumeration should not fail");
        for iface in interfaces {
            assert!(!iface.is_loopback());
        }
    }

    #[test]
    fn test_join_on_unbound_socket() {
        let socket = UdpSocket::bind("0.0.0.0:0").expect("bind ephemeral");
        let iface = join_multicast_group(&socket);
        assert!(iface.is_ok(), "group join should succeed: {:?}", iface);
    }
}
