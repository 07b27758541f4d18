// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host-local probe over a shared store.
//!
//! No network I/O: discover is a fast store read, announce/revoke are
//! read-modify-write cycles. Cross-process visibility comes from the store
//! itself (one shared file per host/domain by default).

use super::Probe;
use crate::core::{Capability, DiscoveredPlugin, ExportRecord, OwnerId, PublishMethod};
use crate::store::ExportStore;
use parking_lot::Mutex;
use std::time::SystemTime;

/// Probe scoped to same-host visibility.
pub struct LocalProbe {
    store: Box<dyn ExportStore>,
    /// Serializes read-modify-write cycles between threads of this process.
    /// Cross-process races on the shared file are tolerated by contract.
    write_lock: Mutex<()>,
}

impl LocalProbe {
    /// Create a probe over a store backend.
    #[must_use]
    pub fn new(store: Box<dyn ExportStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }
}

impl Probe for LocalProbe {
    fn announce(&self, record: &ExportRecord) {
        crate::trace_fn!("LocalProbe::announce");
        let _guard = self.write_lock.lock();

        let mut records = self.store.load();
        let mut own = record.clone();
        own.distance = 0;

        if let Some(existing) = records.iter_mut().find(|r| r.same_triple(&own)) {
            *existing = own;
        } else {
            records.push(own);
        }

        if let Err(e) = self.store.save(&records) {
            log::debug!("[probe/local] failed to persist announce: {}", e);
        }
    }

    fn revoke(&self, owner: &OwnerId, method: PublishMethod, endpoint: &str) {
        crate::trace_fn!("LocalProbe::revoke");
        let _guard = self.write_lock.lock();

        let mut records = self.store.load();
        let before = records.len();
        records.retain(|r| !r.matches_triple(owner, method, endpoint));

        if records.len() == before {
            return;
        }
        if let Err(e) = self.store.save(&records) {
            log::debug!("[probe/local] failed to persist revoke: {}", e);
        }
    }

    fn discover(&self, capability: &Capability) -> Vec<DiscoveredPlugin> {
        crate::trace_fn!("LocalProbe::discover");
        let now = SystemTime::now();
        self.store
            .load()
            .iter()
            .filter(|r| r.capabilities.contains(capability))
            .map(|r| r.to_discovered(now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CapabilitySet;
    use crate::store::{FileStore, MemoryStore};
    use std::io;
    use std::time::Duration;

    fn record(endpoint: &str, caps: &[&str]) -> ExportRecord {
        ExportRecord::new(
            OwnerId::generate(),
            CapabilitySet::from_names(caps),
            PublishMethod::TcpRpc,
            endpoint,
            Duration::from_secs(30),
        )
    }

    #[test]
    fn test_announce_then_discover() {
        let probe = LocalProbe::new(Box::new(MemoryStore::new()));
        probe.announce(&record("tcp://host:9000", &["Foo"]));

        let hits = probe.discover(&Capability::new("Foo"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].endpoint, "tcp://host:9000");
        assert_eq!(hits[0].distance_hint, 0, "local results are distance 0");
    }

    #[test]
    fn test_discover_absent_is_empty_not_error() {
        let probe = LocalProbe::new(Box::new(MemoryStore::new()));
        assert!(probe.discover(&Capability::new("Nothing")).is_empty());
    }

    #[test]
    fn test_revoke_removes_record() {
        let probe = LocalProbe::new(Box::new(MemoryStore::new()));
        let rec = record("tcp://host:9000", &["Foo"]);
        probe.announce(&rec);
        probe.revoke(&rec.owner, rec.method, &rec.endpoint);

        assert!(probe.discover(&Capability::new("Foo")).is_empty());
        // Idempotent second revoke.
        probe.revoke(&rec.owner, rec.method, &rec.endpoint);
    }

    #[test]
    fn test_reannounce_refreshes_instead_of_duplicating() {
        let probe = LocalProbe::new(Box::new(MemoryStore::new()));
        let rec = record("tcp://host:9000", &["Foo"]);
        probe.announce(&rec);
        probe.announce(&rec);

        assert_eq!(probe.discover(&Capability::new("Foo")).len(), 1);
    }

    #[test]
    fn test_two_probes_share_one_file() {
        // Two probes over the same path model two processes on one host.
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("registry.json");

        let a = LocalProbe::new(Box::new(FileStore::new(&path)));
        let b = LocalProbe::new(Box::new(FileStore::new(&path)));

        a.announce(&record("tcp://host:9000", &["Foo"]));
        let hits = b.discover(&Capability::new("Foo"));
        assert_eq!(hits.len(), 1);
    }

    struct FailingStore;

    impl ExportStore for FailingStore {
        fn load(&self) -> Vec<ExportRecord> {
            Vec::new()
        }
        fn save(&self, _records: &[ExportRecord]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        }
    }

    #[test]
    fn test_backend_failure_never_panics() {
        let probe = LocalProbe::new(Box::new(FailingStore));
        let rec = record("tcp://host:9000", &["Foo"]);
        probe.announce(&rec);
        probe.revoke(&rec.owner, rec.method, &rec.endpoint);
        assert!(probe.discover(&Capability::new("Foo")).is_empty());
    }
}
