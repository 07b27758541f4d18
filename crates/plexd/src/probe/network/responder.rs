// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Responder thread for peer discovery traffic.
//!
//! Dedicated receive thread on the multicast socket. Ingests peer
//! ANNOUNCE/REVOKE packets into the registry and answers QUERY packets with
//! matching records, unicast back to the query's source address. A malformed
//! packet is counted and dropped; it never aborts the loop or the collection
//! of other peers' traffic.

use super::seen::SeenTable;
use crate::config::MAX_PACKET_SIZE;
use crate::core::{CapabilitySet, ExportRecord, ExportTable, OwnerId};
use crate::protocol::{
    build_reply, parse_announce, parse_header, parse_query, parse_revoke, MessageKind, ReplyInfo,
    ReplyRecord,
};
use crate::transport::UdpTransport;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Responder metrics for diagnostics.
#[derive(Debug, Default)]
pub struct ProbeMetrics {
    /// Total packets received (all kinds)
    pub packets_received: AtomicU64,
    /// Malformed packets dropped
    pub packets_invalid: AtomicU64,
    /// Peer announcements ingested into the registry
    pub announces_ingested: AtomicU64,
    /// Peer revocations applied
    pub revokes_applied: AtomicU64,
    /// Queries answered with at least one record
    pub queries_answered: AtomicU64,
}

impl ProbeMetrics {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Get a snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> (u64, u64, u64, u64, u64) {
        (
            self.packets_received.load(Ordering::Relaxed),
            self.packets_invalid.load(Ordering::Relaxed),
            self.announces_ingested.load(Ordering::Relaxed),
            self.revokes_applied.load(Ordering::Relaxed),
            self.queries_answered.load(Ordering::Relaxed),
        )
    }
}

/// Background responder owned by the network probe.
///
/// Started on probe construction, stopped on `stop()`/`Drop` (running flag +
/// receive timeout bound the shutdown latency).
pub struct Responder {
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl Responder {
    /// Spawn the responder thread.
    pub(crate) fn spawn(
        transport: Arc<UdpTransport>,
        table: Arc<ExportTable>,
        node_id: OwnerId,
        metrics: Arc<ProbeMetrics>,
    ) -> io::Result<Self> {
        crate::trace_fn!("Responder::spawn");
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("plexd-responder".to_string())
            .spawn(move || {
                run_loop(&transport, &table, node_id, &metrics, &running_clone);
            })?;

        Ok(Self {
            handle: Some(handle),
            running,
        })
    }

    /// Signal the thread to stop and wait for it.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Main receive loop (runs in the responder thread).
fn run_loop(
    transport: &UdpTransport,
    table: &ExportTable,
    node_id: OwnerId,
    metrics: &ProbeMetrics,
    running: &AtomicBool,
) {
    let socket = transport.socket();
    let mut seen = SeenTable::new();
    let reply_sequence = AtomicU32::new(1);
    let mut buf = [0u8; MAX_PACKET_SIZE];

    log::debug!("[responder] listening on {}", transport.multicast_addr());

    while running.load(Ordering::Relaxed) {
        match socket.recv_from(&mut buf) {
            Ok((len, src)) => {
                handle_packet(
                    &buf[..len],
                    src,
                    transport,
                    table,
                    node_id,
                    metrics,
                    &mut seen,
                    &reply_sequence,
                );
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
            {
                // Receive timeout: loop back to check the running flag.
            }
            Err(e) => {
                log::debug!("[responder] recv error: {}", e);
                thread::sleep(Duration::from_millis(50));
            }
        }
    }

    log::debug!("[responder] shutdown signal received, stopping");
}

#[allow(clippy::too_many_arguments)] // plain dispatch, all state is shared-by-reference
fn handle_packet(
    packet: &[u8],
    src: SocketAddr,
    transport: &UdpTransport,
    table: &ExportTable,
    node_id: OwnerId,
    metrics: &ProbeMetrics,
    seen: &mut SeenTable,
    reply_sequence: &AtomicU32,
) {
    metrics.packets_received.fetch_add(1, Ordering::Relaxed);

    let Some(header) = parse_header(packet) else {
        metrics.packets_invalid.fetch_add(1, Ordering::Relaxed);
        log::debug!("[responder] dropped malformed packet from {}", src);
        return;
    };

    // Our own multicast loopback.
    if header.origin == node_id {
        return;
    }

    match header.kind {
        MessageKind::Announce => {
            let Some(announce) = parse_announce(packet) else {
                metrics.packets_invalid.fetch_add(1, Ordering::Relaxed);
                log::debug!("[responder] dropped malformed ANNOUNCE from {}", src);
                return;
            };
            if seen.is_seen(announce.origin, announce.sequence, now_ns()) {
                return;
            }

            let record = ExportRecord {
                owner: announce.owner,
                capabilities: CapabilitySet::from_iter(announce.capabilities),
                method: announce.method,
                endpoint: announce.endpoint,
                exported_at: SystemTime::now()
                    .checked_sub(Duration::from_millis(announce.age_ms))
                    .unwrap_or(UNIX_EPOCH),
                lease: Duration::from_millis(announce.lease_ms),
                distance: 1,
            };
            log::debug!(
                "[responder] ingesting announce owner={} method={} endpoint={}",
                record.owner,
                record.method,
                record.endpoint
            );
            table.announce(record);
            metrics.announces_ingested.fetch_add(1, Ordering::Relaxed);
        }
        MessageKind::Revoke => {
            let Some(revoke) = parse_revoke(packet) else {
                metrics.packets_invalid.fetch_add(1, Ordering::Relaxed);
                log::debug!("[responder] dropped malformed REVOKE from {}", src);
                return;
            };
            let removed = table.revoke(&revoke.owner, revoke.method, &revoke.endpoint);
            if removed > 0 {
                log::debug!(
                    "[responder] revoked owner={} endpoint={}",
                    revoke.owner,
                    revoke.endpoint
                );
                metrics.revokes_applied.fetch_add(1, Ordering::Relaxed);
            }
        }
        MessageKind::Query => {
            let Some(query) = parse_query(packet) else {
                metrics.packets_invalid.fetch_add(1, Ordering::Relaxed);
                log::debug!("[responder] dropped malformed QUERY from {}", src);
                return;
            };

            let matches = table.query_by_capability(&query.capability);
            if matches.is_empty() {
                return;
            }

            let now = SystemTime::now();
            let records = matches
                .iter()
                .map(|r| ReplyRecord {
                    owner: r.owner,
                    method: r.method,
                    endpoint: r.endpoint.clone(),
                    distance: r.distance,
                    age_ms: duration_to_ms(r.age(now)),
                })
                .collect();

            let reply = ReplyInfo {
                origin: node_id,
                sequence: reply_sequence.fetch_add(1, Ordering::Relaxed),
                query_id: query.query_id,
                records,
            };
            let packet = build_reply(&reply);

            match transport.send_to_endpoint(&packet, &src) {
                Ok(_) => {
                    metrics.queries_answered.fetch_add(1, Ordering::Relaxed);
                    log::debug!(
                        "[responder] answered query '{}' from {} with {} record(s)",
                        query.capability,
                        src,
                        reply.records.len()
                    );
                }
                Err(e) => {
                    log::debug!("[responder] failed to answer query from {}: {}", src, e);
                }
            }
        }
        MessageKind::Reply => {
            // Replies travel unicast to the querying socket; one showing up
            // on the multicast group is noise.
        }
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

pub(crate) fn duration_to_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
