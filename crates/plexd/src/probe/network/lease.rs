// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Lease expiration tracking for remote export records.
//!
//! Background thread (1 Hz) sweeps the registry and removes remote records
//! whose lease elapsed. A peer that crashed without revoking stops refreshing
//! its announcements, so its records age out instead of lingering forever.
//! Records exported by this node are never expired locally.

use crate::config::LEASE_CHECK_INTERVAL_MS;
use crate::core::ExportTable;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

/// Lease sweeper for the network probe's registry.
///
/// # Graceful Shutdown
/// Call `stop()` to signal the thread to exit and wait for join; `Drop` does
/// the same.
pub struct LeaseTracker {
    /// Stop flag for graceful shutdown
    stop_flag: Arc<AtomicBool>,
    /// Background thread handle
    handle: Option<JoinHandle<()>>,
}

impl LeaseTracker {
    /// Start the sweeper thread over a shared registry.
    ///
    /// # Errors
    /// Propagates thread spawn failures.
    pub fn start(table: Arc<ExportTable>) -> std::io::Result<Self> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_flag_clone = Arc::clone(&stop_flag);

        let handle = thread::Builder::new()
            .name("plexd-lease".to_string())
            .spawn(move || {
                Self::run_loop(&table, &stop_flag_clone);
            })?;

        Ok(Self {
            stop_flag,
            handle: Some(handle),
        })
    }

    /// Main loop (runs in background thread).
    fn run_loop(table: &ExportTable, stop_flag: &AtomicBool) {
        while !stop_flag.load(Ordering::Relaxed) {
            // Sleep one interval, in small chunks for responsive shutdown.
            let sleep_end = Instant::now() + Duration::from_millis(LEASE_CHECK_INTERVAL_MS);
            while Instant::now() < sleep_end {
                if stop_flag.load(Ordering::Relaxed) {
                    return;
                }
                thread::sleep(Duration::from_millis(50));
            }

            let removed = table.expire(SystemTime::now());
            if removed > 0 {
                log::debug!("[lease] expired {} stale remote record(s)", removed);
            }
        }
    }

    /// Stop the sweeper gracefully.
    pub fn stop(mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LeaseTracker {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CapabilitySet, ExportRecord, OwnerId, PublishMethod};

    fn remote_record(endpoint: &str, lease: Duration, age: Duration) -> ExportRecord {
        let mut record = ExportRecord::new(
            OwnerId::generate(),
            CapabilitySet::from_names(&["cap"]),
            PublishMethod::TcpRpc,
            endpoint,
            lease,
        );
        record.exported_at = SystemTime::now() - age;
        record.distance = 1;
        record
    }

    #[test]
    fn test_tracker_start_stop() {
        let table = Arc::new(ExportTable::new());
        let tracker = LeaseTracker::start(Arc::clone(&table)).expect("tracker should start");

        thread::sleep(Duration::from_millis(100));
        tracker.stop();
    }

    #[test]
    fn test_tracker_removes_expired() {
        let table = Arc::new(ExportTable::new());
        table.announce(remote_record(
            "tcp://dead:1",
            Duration::from_millis(100),
            Duration::from_secs(10),
        ));

        let tracker = LeaseTracker::start(Arc::clone(&table)).expect("tracker should start");

        // One sweep interval plus margin.
        thread::sleep(Duration::from_millis(1300));
        assert!(table.is_empty());

        tracker.stop();
    }

    #[test]
    fn test_tracker_retains_active() {
        let table = Arc::new(ExportTable::new());
        table.announce(remote_record(
            "tcp://alive:1",
            Duration::from_secs(10),
            Duration::ZERO,
        ));

        let tracker = LeaseTracker::start(Arc::clone(&table)).expect("tracker should start");

        thread::sleep(Duration::from_millis(1300));
        assert_eq!(table.len(), 1);

        tracker.stop();
    }

    #[test]
    fn test_tracker_spares_own_exports() {
        let table = Arc::new(ExportTable::new());
        let mut own = remote_record(
            "tcp://own:1",
            Duration::from_millis(100),
            Duration::from_secs(10),
        );
        own.distance = 0;
        table.announce(own);

        let tracker = LeaseTracker::start(Arc::clone(&table)).expect("tracker should start");

        thread::sleep(Duration::from_millis(1300));
        assert_eq!(table.len(), 1, "own exports are never lease-expired");

        tracker.stop();
    }
}
