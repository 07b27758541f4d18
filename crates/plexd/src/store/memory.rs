// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory store for tests and single-process deployments.

use super::ExportStore;
use crate::core::ExportRecord;
use parking_lot::Mutex;
use std::io;

/// Volatile store; contents die with the process.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<ExportRecord>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExportStore for MemoryStore {
    fn load(&self) -> Vec<ExportRecord> {
        self.records.lock().clone()
    }

    fn save(&self, records: &[ExportRecord]) -> io::Result<()> {
        *self.records.lock() = records.to_vec();
        Ok(())
    }
}
