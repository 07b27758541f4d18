// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Export registry: the only mutable shared state of a probe.
//!
//! Maps nothing - an unordered record set behind one mutex. Queries take a
//! defensive snapshot under the lock so callers can iterate safely against
//! concurrent announce/revoke.

use super::record::{Capability, ExportRecord, OwnerId, PublishMethod};
use parking_lot::Mutex;
use std::time::SystemTime;

/// Registry of export records.
///
/// All mutation goes through [`announce`](Self::announce) /
/// [`revoke`](Self::revoke); all reads return copies, never references into
/// the guarded collection.
#[derive(Debug, Default)]
pub struct ExportTable {
    records: Mutex<Vec<ExportRecord>>,
}

impl ExportTable {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        crate::trace_fn!("ExportTable::new");
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    /// Insert or refresh a record.
    ///
    /// If a record with the same identifying triple `(owner, method,
    /// endpoint)` exists it is replaced (timestamp, lease and manifest are
    /// refreshed); the registry never holds two records for one triple.
    ///
    /// # Returns
    /// `true` if a new record was inserted, `false` if an existing record
    /// was refreshed.
    pub fn announce(&self, record: ExportRecord) -> bool {
        crate::trace_fn!("ExportTable::announce");
        let mut records = self.records.lock();

        if let Some(existing) = records.iter_mut().find(|r| r.same_triple(&record)) {
            *existing = record;
            false
        } else {
            records.push(record);
            true
        }
    }

    /// Remove all records matching the triple exactly.
    ///
    /// Idempotent: removing an absent triple is a no-op.
    ///
    /// # Returns
    /// Number of records removed.
    pub fn revoke(&self, owner: &OwnerId, method: PublishMethod, endpoint: &str) -> usize {
        crate::trace_fn!("ExportTable::revoke");
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|r| !r.matches_triple(owner, method, endpoint));
        before - records.len()
    }

    /// Find all records whose manifest contains `capability`.
    ///
    /// Returns a snapshot; the caller owns the result.
    #[must_use]
    pub fn query_by_capability(&self, capability: &Capability) -> Vec<ExportRecord> {
        crate::trace_fn!("ExportTable::query_by_capability");
        self.records
            .lock()
            .iter()
            .filter(|r| r.capabilities.contains(capability))
            .cloned()
            .collect()
    }

    /// Remove every record of an owner.
    ///
    /// Used when a remote node disappears without revoking.
    ///
    /// # Returns
    /// Number of records removed.
    pub fn remove_owner(&self, owner: &OwnerId) -> usize {
        crate::trace_fn!("ExportTable::remove_owner");
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|r| r.owner != *owner);
        before - records.len()
    }

    /// Drop remote records whose lease elapsed.
    ///
    /// Records exported by this node (`distance == 0`) are never expired
    /// locally; only revoke removes them.
    ///
    /// # Returns
    /// Number of records removed.
    pub fn expire(&self, now: SystemTime) -> usize {
        crate::trace_fn!("ExportTable::expire");
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|r| r.distance == 0 || !r.is_expired(now));
        before - records.len()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Check whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Snapshot of all records.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ExportRecord> {
        self.records.lock().clone()
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::CapabilitySet;
    use std::sync::Arc;
    use std::time::Duration;

    fn record(owner: OwnerId, endpoint: &str, caps: &[&str]) -> ExportRecord {
        ExportRecord::new(
            owner,
            CapabilitySet::from_names(caps),
            PublishMethod::TcpRpc,
            endpoint,
            Duration::from_secs(30),
        )
    }

    #[test]
    fn test_announce_then_query() {
        let table = ExportTable::new();
        let owner = OwnerId::generate();
        assert!(table.announce(record(owner, "tcp://host:9000", &["Foo", "Bar"])));

        let hits = table.query_by_capability(&Capability::new("Foo"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].endpoint, "tcp://host:9000");

        assert!(table.query_by_capability(&Capability::new("Baz")).is_empty());
    }

    #[test]
    fn test_announce_same_triple_refreshes() {
        let table = ExportTable::new();
        let owner = OwnerId::generate();

        assert!(table.announce(record(owner, "tcp://host:9000", &["Foo"])));
        assert!(!table.announce(record(owner, "tcp://host:9000", &["Foo", "Bar"])));

        assert_eq!(table.len(), 1);
        let hits = table.query_by_capability(&Capability::new("Bar"));
        assert_eq!(hits.len(), 1, "refresh replaces the manifest");
    }

    #[test]
    fn test_same_owner_multiple_endpoints() {
        let table = ExportTable::new();
        let owner = OwnerId::generate();
        table.announce(record(owner, "tcp://host:9000", &["Foo"]));
        table.announce(record(owner, "tcp://host:9001", &["Foo"]));

        assert_eq!(table.len(), 2);
        assert_eq!(table.query_by_capability(&Capability::new("Foo")).len(), 2);
    }

    #[test]
    fn test_revoke_exact_triple_only() {
        let table = ExportTable::new();
        let owner = OwnerId::generate();
        table.announce(record(owner, "tcp://host:9000", &["Foo"]));
        table.announce(record(owner, "tcp://host:9001", &["Foo"]));

        let removed = table.revoke(&owner, PublishMethod::TcpRpc, "tcp://host:9000");
        assert_eq!(removed, 1);
        assert_eq!(table.len(), 1);

        let hits = table.query_by_capability(&Capability::new("Foo"));
        assert_eq!(hits[0].endpoint, "tcp://host:9001");
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let table = ExportTable::new();
        let owner = OwnerId::generate();
        table.announce(record(owner, "tcp://host:9000", &["Foo"]));

        assert_eq!(table.revoke(&owner, PublishMethod::TcpRpc, "tcp://host:9000"), 1);
        assert_eq!(table.revoke(&owner, PublishMethod::TcpRpc, "tcp://host:9000"), 0);
        assert!(table.is_empty());
    }

    #[test]
    fn test_remove_owner_drops_all_endpoints() {
        let table = ExportTable::new();
        let gone = OwnerId::generate();
        let stays = OwnerId::generate();
        table.announce(record(gone, "tcp://host:9000", &["Foo"]));
        table.announce(record(gone, "tcp://host:9001", &["Foo"]));
        table.announce(record(stays, "tcp://host:9002", &["Foo"]));

        assert_eq!(table.remove_owner(&gone), 2);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_expire_spares_own_exports() {
        let table = ExportTable::new();
        let now = SystemTime::now();

        let mut own = record(OwnerId::generate(), "tcp://a:1", &["Foo"]);
        own.exported_at = now - Duration::from_secs(120);
        own.lease = Duration::from_millis(100);
        own.distance = 0;

        let mut remote_stale = record(OwnerId::generate(), "tcp://b:1", &["Foo"]);
        remote_stale.exported_at = now - Duration::from_secs(120);
        remote_stale.lease = Duration::from_millis(100);
        remote_stale.distance = 1;

        let mut remote_fresh = record(OwnerId::generate(), "tcp://c:1", &["Foo"]);
        remote_fresh.distance = 1;

        table.announce(own);
        table.announce(remote_stale);
        table.announce(remote_fresh);

        assert_eq!(table.expire(now), 1);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_query_returns_snapshot() {
        let table = ExportTable::new();
        let owner = OwnerId::generate();
        table.announce(record(owner, "tcp://host:9000", &["Foo"]));

        let snapshot = table.query_by_capability(&Capability::new("Foo"));
        table.revoke(&owner, PublishMethod::TcpRpc, "tcp://host:9000");

        // The earlier snapshot is unaffected by the concurrent mutation.
        assert_eq!(snapshot.len(), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn test_concurrent_stress_net_count() {
        let table = Arc::new(ExportTable::new());
        let threads = 8;
        let per_thread = 50;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    let owner = OwnerId::generate();
                    for i in 0..per_thread {
                        let endpoint = format!("tcp://node{}:{}", t, 9000 + i);
                        table.announce(ExportRecord::new(
                            owner,
                            CapabilitySet::from_names(&["Stress"]),
                            PublishMethod::TcpRpc,
                            endpoint.clone(),
                            Duration::from_secs(30),
                        ));
                        // Revoke every other announcement.
                        if i % 2 == 0 {
                            table.revoke(&owner, PublishMethod::TcpRpc, &endpoint);
                        }
                        let _ = table.query_by_capability(&Capability::new("Stress"));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("stress thread panicked");
        }

        // Each thread leaves the odd-indexed announcements in place.
        let expected = threads * (per_thread / 2);
        assert_eq!(table.len(), expected);

        // No duplicate triples survived the interleaving.
        let snapshot = table.snapshot();
        for (i, a) in snapshot.iter().enumerate() {
            for b in &snapshot[i + 1..] {
                assert!(!a.same_triple(b), "ghost duplicate for {}", a.endpoint);
            }
        }
    }
}
