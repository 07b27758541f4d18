// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Network probe: multicast announce/revoke propagation and bounded-window
//! discovery.
//!
//! # Architecture
//!
//! ```text
//! announce/revoke:  registry update -> multicast packet (fire-and-forget)
//!
//! discover:         QUERY -> multicast group
//!                     ephemeral socket <- unicast REPLY from each peer
//!                     collect until window closes, dedup, return partials
//!
//! responder thread: multicast recv -> ingest ANNOUNCE/REVOKE
//!                                  -> answer QUERY from own registry
//! lease thread:     1 Hz sweep of expired remote records
//! ```
//!
//! Both background threads are owned by the probe: started on construction,
//! stopped on `shutdown()`/`Drop`.

use super::Probe;
use crate::config::{MAX_PACKET_SIZE, RESPONDER_POLL_MS, RuntimeConfig};
use crate::core::{
    Capability, DiscoveredPlugin, ExportRecord, ExportTable, OwnerId, PublishMethod,
};
use crate::discovery::Error;
use crate::protocol::{build_announce, build_query, build_revoke, parse_reply, AnnounceInfo,
    QueryInfo, RevokeInfo};
use crate::transport::UdpTransport;
use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

mod lease;
mod responder;
mod seen;

pub use lease::LeaseTracker;
pub use responder::{ProbeMetrics, Responder};
pub use seen::SeenTable;

use responder::duration_to_ms;

/// Probe scoped to network visibility (one multicast domain).
pub struct NetworkProbe {
    /// Identity of this node (loopback suppression on the wire).
    node_id: OwnerId,
    /// Own exports (distance 0) plus records learned from peers (distance 1).
    table: Arc<ExportTable>,
    transport: Arc<UdpTransport>,
    /// Per-node packet sequence (duplicate suppression key at the peers).
    sequence: AtomicU32,
    query_counter: AtomicU64,
    /// Reply collection window for discover().
    window: Duration,
    metrics: Arc<ProbeMetrics>,
    responder: Option<Responder>,
    lease_tracker: Option<LeaseTracker>,
}

impl NetworkProbe {
    /// Create the probe and start its background machinery.
    ///
    /// # Errors
    /// Transport construction errors ([`Error::BindFailed`],
    /// [`Error::MulticastJoinFailed`]) and thread spawn failures.
    pub fn new(config: &RuntimeConfig) -> Result<Self, Error> {
        crate::trace_fn!("NetworkProbe::new");
        let profile = config.port_profile();
        let transport = Arc::new(UdpTransport::new(&profile)?);
        let table = Arc::new(ExportTable::new());
        let metrics = ProbeMetrics::new();
        let node_id = OwnerId::generate();

        let responder = Responder::spawn(
            Arc::clone(&transport),
            Arc::clone(&table),
            node_id,
            Arc::clone(&metrics),
        )
        .map_err(Error::IoError)?;
        let lease_tracker = LeaseTracker::start(Arc::clone(&table)).map_err(Error::IoError)?;

        log::debug!(
            "[probe/net] node {} up on port {}",
            node_id,
            transport.discovery_port()
        );

        Ok(Self {
            node_id,
            table,
            transport,
            sequence: AtomicU32::new(1),
            query_counter: AtomicU64::new(1),
            window: config.collection_window(),
            metrics,
            responder: Some(responder),
            lease_tracker: Some(lease_tracker),
        })
    }

    /// Identity of this node on the wire.
    #[must_use]
    pub fn node_id(&self) -> OwnerId {
        self.node_id
    }

    /// Responder metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<ProbeMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Number of records currently in the probe's registry (own + learned).
    #[must_use]
    pub fn registry_len(&self) -> usize {
        self.table.len()
    }

    /// Stop background threads and drop the probe.
    pub fn shutdown(mut self) {
        if let Some(responder) = self.responder.take() {
            responder.stop();
        }
        if let Some(tracker) = self.lease_tracker.take() {
            tracker.stop();
        }
    }

    fn next_sequence(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Collect replies for one query until the window closes.
    ///
    /// Whatever arrived in time is returned; late replies are discarded with
    /// the socket. Results are deduplicated by identifying triple.
    fn collect_replies(
        &self,
        socket: &std::net::UdpSocket,
        query_id: u64,
        window: Duration,
    ) -> Vec<DiscoveredPlugin> {
        let deadline = Instant::now() + window;
        let poll = Duration::from_millis(RESPONDER_POLL_MS);
        let mut buf = [0u8; MAX_PACKET_SIZE];
        let mut found = Vec::new();
        let mut seen_triples: HashSet<(OwnerId, u8, String)> = HashSet::new();

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let remaining = deadline - now;
            if socket.set_read_timeout(Some(remaining.min(poll))).is_err() {
                break;
            }

            match socket.recv_from(&mut buf) {
                Ok((len, src)) => match parse_reply(&buf[..len]) {
                    Some(reply) if reply.query_id == query_id => {
                        for record in reply.records {
                            let key = (record.owner, record.method.code(), record.endpoint.clone());
                            if !seen_triples.insert(key) {
                                continue;
                            }
                            found.push(DiscoveredPlugin {
                                method: record.method,
                                endpoint: record.endpoint,
                                distance_hint: record.distance + 1,
                                time_since_export: Duration::from_millis(record.age_ms),
                            });
                        }
                    }
                    Some(_) => {
                        // Reply to some other (stale) query on a recycled port.
                    }
                    None => {
                        self.metrics.packets_invalid.fetch_add(1, Ordering::Relaxed);
                        log::debug!("[probe/net] dropped malformed reply from {}", src);
                    }
                },
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut => {}
                Err(e) => {
                    log::debug!("[probe/net] reply recv error: {}", e);
                    break;
                }
            }
        }

        found
    }
}

impl Probe for NetworkProbe {
    fn announce(&self, record: &ExportRecord) {
        crate::trace_fn!("NetworkProbe::announce");
        let mut own = record.clone();
        own.distance = 0;
        self.table.announce(own);

        let info = AnnounceInfo {
            origin: self.node_id,
            sequence: self.next_sequence(),
            owner: record.owner,
            method: record.method,
            endpoint: record.endpoint.clone(),
            lease_ms: duration_to_ms(record.lease),
            age_ms: duration_to_ms(record.age(SystemTime::now())),
            capabilities: record.capabilities.iter().cloned().collect(),
        };
        let packet = build_announce(&info);

        // Best-effort broadcast; peers that miss it still answer queries once
        // a later announce or query reaches them.
        if let Err(e) = self.transport.send(&packet) {
            log::debug!(
                "[probe/net] announce broadcast failed (owner={}): {}",
                record.owner,
                e
            );
        }
    }

    fn revoke(&self, owner: &OwnerId, method: PublishMethod, endpoint: &str) {
        crate::trace_fn!("NetworkProbe::revoke");
        self.table.revoke(owner, method, endpoint);

        let info = RevokeInfo {
            origin: self.node_id,
            sequence: self.next_sequence(),
            owner: *owner,
            method,
            endpoint: endpoint.to_string(),
        };
        let packet = build_revoke(&info);

        if let Err(e) = self.transport.send(&packet) {
            log::debug!(
                "[probe/net] revoke broadcast failed (owner={}): {}",
                owner,
                e
            );
        }
    }

    fn discover(&self, capability: &Capability) -> Vec<DiscoveredPlugin> {
        self.discover_within(capability, self.window)
    }

    fn discover_within(&self, capability: &Capability, window: Duration) -> Vec<DiscoveredPlugin> {
        crate::trace_fn!("NetworkProbe::discover_within");
        let socket = match self.transport.reply_socket() {
            Ok(socket) => socket,
            Err(e) => {
                log::debug!("[probe/net] transport unavailable, empty result: {}", e);
                return Vec::new();
            }
        };

        let query_id = self.query_counter.fetch_add(1, Ordering::Relaxed);
        let info = QueryInfo {
            origin: self.node_id,
            sequence: self.next_sequence(),
            query_id,
            capability: capability.clone(),
        };
        let packet = build_query(&info);

        if let Err(e) = socket.send_to(&packet, self.transport.multicast_addr()) {
            log::debug!(
                "[probe/net] query broadcast failed for '{}': {}",
                capability,
                e
            );
            return Vec::new();
        }

        let found = self.collect_replies(&socket, query_id, window);
        log::debug!(
            "[probe/net] query '{}' collected {} record(s) within {:?}",
            capability,
            found.len(),
            window
        );
        found
    }
}

impl Drop for NetworkProbe {
    fn drop(&mut self) {
        if let Some(responder) = self.responder.take() {
            responder.stop();
        }
        if let Some(tracker) = self.lease_tracker.take() {
            tracker.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PortProfile;
    use crate::core::CapabilitySet;

    fn probe_on_domain(domain: u32) -> NetworkProbe {
        let config = RuntimeConfig::new();
        config.set_port_profile(PortProfile::calculate(domain).expect("valid domain"));
        config.set("discovery.window_ms", "300");
        NetworkProbe::new(&config).expect("probe should start")
    }

    fn record(caps: &[&str], endpoint: &str) -> ExportRecord {
        ExportRecord::new(
            OwnerId::generate(),
            CapabilitySet::from_names(caps),
            PublishMethod::TcpRpc,
            endpoint,
            Duration::from_secs(30),
        )
    }

    #[test]
    fn test_probe_lifecycle() {
        let probe = probe_on_domain(210);
        assert!(!probe.node_id().is_zero());
        probe.shutdown();
    }

    #[test]
    fn test_announce_lands_in_own_registry() {
        let probe = probe_on_domain(211);
        probe.announce(&record(&["Foo"], "tcp://host:9000"));
        assert_eq!(probe.registry_len(), 1);

        let rec = record(&["Foo"], "tcp://host:9001");
        probe.announce(&rec);
        probe.revoke(&rec.owner, rec.method, &rec.endpoint);
        assert_eq!(probe.registry_len(), 1);

        probe.shutdown();
    }

    #[test]
    fn test_discover_with_no_peers_is_empty() {
        let probe = probe_on_domain(212);
        let start = Instant::now();
        let found = probe.discover_within(&Capability::new("Foo"), Duration::from_millis(200));
        assert!(found.is_empty());
        // The window bounds the call; generous margin for slow machines.
        assert!(start.elapsed() < Duration::from_secs(5));
        probe.shutdown();
    }

    #[test]
    #[ignore = "requires UDP multicast loopback"]
    fn test_two_probes_discover_each_other() {
        let a = probe_on_domain(213);
        let b = probe_on_domain(213);

        a.announce(&record(&["com.example.Codec"], "tcp://host:9000"));

        // The announce may race the responder startup; the query path does
        // not depend on it, so B should see A's record via QUERY/REPLY.
        let mut found = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            found = b.discover(&Capability::new("com.example.Codec"));
            if !found.is_empty() {
                break;
            }
        }

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].endpoint, "tcp://host:9000");
        assert!(found[0].distance_hint >= 1);

        a.shutdown();
        b.shutdown();
    }
}
